//! Configuration schema types for `xsp.toml`
//!
//! Defines the structure and validation rules for compiler and loader
//! defaults.

use serde::{Deserialize, Serialize};

use crate::compiler::{Anchor, Mode};
use crate::loader::LoadPolicy;

/// Compiler defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Conversion mode (auto, xobj, sp)
    #[serde(default)]
    pub mode: Mode,
    /// Two-letter anchor code, X then Y (e.g. "cb")
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Emit a single `.xsb` container instead of separate files
    #[serde(default)]
    pub container: bool,
}

fn default_origin() -> String {
    "cc".to_string()
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self { mode: Mode::default(), origin: default_origin(), container: false }
    }
}

impl CompileConfig {
    /// The configured anchor. Only meaningful after validation.
    pub fn anchor(&self) -> Anchor {
        Anchor::from_code(&self.origin).unwrap_or_default()
    }
}

/// Runtime loader defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// What to do with a bundle that cannot be read during load
    #[serde(default)]
    pub policy: LoadPolicy,
}

/// Tile preview defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Tiles per row
    #[serde(default = "default_columns")]
    pub columns: u32,
    /// Integer upscale factor
    #[serde(default = "default_scale")]
    pub scale: u8,
}

fn default_columns() -> u32 {
    16
}

fn default_scale() -> u8 {
    1
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { columns: default_columns(), scale: default_scale() }
    }
}

/// Complete `xsp.toml` configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XspConfig {
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "compile.origin")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "xsp.toml: '{}' {}", self.field, self.message)
    }
}

impl XspConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.compile.origin.parse::<Anchor>().is_err() {
            errors.push(ConfigValidationError {
                field: "compile.origin".to_string(),
                message: format!(
                    "'{}' is not an origin code (X from l/c/r, then Y from t/c/b)",
                    self.compile.origin
                ),
            });
        }

        if self.preview.columns == 0 {
            errors.push(ConfigValidationError {
                field: "preview.columns".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if !(1..=16).contains(&self.preview.scale) {
            errors.push(ConfigValidationError {
                field: "preview.scale".to_string(),
                message: "must be between 1 and 16".to_string(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: XspConfig = toml::from_str("").unwrap();
        assert_eq!(config, XspConfig::default());
        assert_eq!(config.compile.anchor(), Anchor::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[compile]
mode = "xobj"
origin = "cb"
container = true

[load]
policy = "strict"

[preview]
columns = 8
scale = 2
"#;
        let config: XspConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.compile.mode, Mode::Composite);
        assert_eq!(config.compile.anchor().to_string(), "cb");
        assert!(config.compile.container);
        assert_eq!(config.load.policy, LoadPolicy::Strict);
        assert_eq!(config.preview.columns, 8);
        assert_eq!(config.preview.scale, 2);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result: Result<XspConfig, _> = toml::from_str("[compile]\nmode = \"fancy\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let mut config = XspConfig::default();
        config.compile.origin = "zz".to_string();
        config.preview.columns = 0;
        config.preview.scale = 40;
        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].to_string().contains("compile.origin"));
    }
}
