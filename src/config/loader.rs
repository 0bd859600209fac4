//! Configuration loading and discovery for `xsp.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::XspConfig;
use crate::compiler::Mode;
use crate::loader::LoadPolicy;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for.
pub const CONFIG_FILE: &str = "xsp.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse xsp.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override conversion mode
    pub mode: Option<Mode>,
    /// Override anchor code
    pub origin: Option<String>,
    /// Force container output
    pub container: Option<bool>,
    /// Override load policy
    pub policy: Option<LoadPolicy>,
    /// Override preview columns
    pub columns: Option<u32>,
    /// Override preview scale
    pub scale: Option<u8>,
}

/// Find xsp.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for xsp.toml
/// 2. Check XDG_CONFIG_HOME/xspkit/xsp.toml (or ~/.config/xspkit/xsp.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find xsp.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("xspkit").join(CONFIG_FILE);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find xsp.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an xsp.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// `find_config()` to locate one. If no config file is found, returns the
/// default configuration.
pub fn load_config(path: Option<&Path>) -> Result<XspConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(XspConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<XspConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: XspConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    log::debug!("using config {}", path.display());
    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut XspConfig, overrides: &CliOverrides) {
    if let Some(mode) = overrides.mode {
        config.compile.mode = mode;
    }
    if let Some(ref origin) = overrides.origin {
        config.compile.origin = origin.clone();
    }
    if let Some(container) = overrides.container {
        config.compile.container = container;
    }
    if let Some(policy) = overrides.policy {
        config.load.policy = policy;
    }
    if let Some(columns) = overrides.columns {
        config.preview.columns = columns;
    }
    if let Some(scale) = overrides.scale {
        config.preview.scale = scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(b"[compile]\nmode = \"xobj\"")
            .expect("should write config content");

        let subdir = temp.path().join("art").join("sheets");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        assert_eq!(find_config_from(subdir), Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "[load]\npolicy = \"strict\"\n").unwrap();

        let config = load_config(Some(&config_path)).expect("should load");
        assert_eq!(config.load.policy, LoadPolicy::Strict);
        assert_eq!(config.compile.mode, Mode::Auto);
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "[compile]\norigin = \"q\"\n").unwrap();

        match load_config(Some(&config_path)) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_parse_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "[compile\n").unwrap();
        assert!(matches!(load_config(Some(&config_path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = XspConfig::default();
        let overrides = CliOverrides {
            mode: Some(Mode::SinglePattern),
            origin: Some("rb".to_string()),
            policy: Some(LoadPolicy::Strict),
            ..Default::default()
        };
        merge_cli_overrides(&mut config, &overrides);
        assert_eq!(config.compile.mode, Mode::SinglePattern);
        assert_eq!(config.compile.origin, "rb");
        assert_eq!(config.load.policy, LoadPolicy::Strict);
        assert!(!config.compile.container);
        assert_eq!(config.preview.columns, 16);
    }
}
