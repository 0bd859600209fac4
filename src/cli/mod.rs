//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod compile;
mod inspect;
mod link;
mod preview;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glob::{glob, Pattern};

use crate::bundle::{with_extension, EXT_CONTAINER, EXT_REF, EXT_SINGLE_PCG};
use crate::config::{load_config, CliOverrides};
use crate::error::Error;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Parse a frame dimension given in decimal or `0x` hex.
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|_| format!("'{}' is not a size (decimal or 0x hex)", s))
}

/// Find bundles in a directory: `.xsb` containers, plus base paths of
/// separate-file bundles (marked by their `.ref` or `.sp` file).
///
/// Results are sorted so registration order is stable.
pub fn find_bundles(dir: &Path) -> Vec<PathBuf> {
    let dir_str = Pattern::escape(&dir.display().to_string());
    let mut found = Vec::new();

    for ext in [EXT_CONTAINER, EXT_REF, EXT_SINGLE_PCG] {
        if let Ok(paths) = glob(&format!("{}/*.{}", dir_str, ext)) {
            for path in paths.filter_map(Result::ok) {
                if ext == EXT_CONTAINER {
                    found.push(path);
                } else {
                    found.push(path.with_extension(""));
                }
            }
        }
    }

    found.sort();
    found.dedup();
    found
}

/// Map a library error to a process exit code.
pub(crate) fn exit_code_for(err: &Error) -> ExitCode {
    match err {
        Error::MalformedInput(_) => ExitCode::from(EXIT_INVALID_ARGS),
        _ => ExitCode::from(EXIT_ERROR),
    }
}

/// Report an error on stderr and turn it into an exit code.
pub(crate) fn fail(err: Error) -> ExitCode {
    eprintln!("Error: {}", err);
    exit_code_for(&err)
}

/// xsp - Compile sprite sheets into PCG/FRM/REF bundles and link them
#[derive(Parser)]
#[command(name = "xsp")]
#[command(about = "Compile indexed sprite sheets into PCG/FRM/REF bundles and link bundles together")]
#[command(version)]
pub struct Cli {
    /// Path to an xsp.toml (default: search upwards from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show per-claim and per-bundle detail
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments of the `compile` command.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Indexed-colour PNG sprite sheet
    pub image: PathBuf,

    /// Width of one sprite cell (decimal or 0x hex, at least 16)
    #[arg(value_parser = parse_size)]
    pub frame_w: u32,

    /// Height of one sprite cell (decimal or 0x hex, at least 16)
    #[arg(value_parser = parse_size)]
    pub frame_h: u32,

    /// Base path for output files
    pub output_base: PathBuf,

    /// Mode: a = auto, x = xobj (composite), s = sp (single pattern)
    pub mode: Option<String>,

    /// Origin: X from l/c/r then Y from t/c/b, e.g. "cb"
    pub origin: Option<String>,

    /// Write one .xsb container instead of separate files
    #[arg(long)]
    pub container: bool,

    /// Print every cell as a hex grid before it is chopped
    #[arg(long)]
    pub dump: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a sprite sheet into a bundle
    ///
    /// Example: xsp compile player.png 32 48 out/player x cb
    Compile(CompileArgs),

    /// Show the contents of a compiled bundle
    Inspect {
        /// Bundle: a .xsb container or a separate-file base path
        bundle: PathBuf,

        /// Only show this composite sprite
        #[arg(long)]
        sprite: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register several bundles, load them into combined tables and report
    Link {
        /// Bundles in registration order
        bundles: Vec<PathBuf>,

        /// Also register every bundle found in this directory (sorted by name)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Write the combined tables as one composite bundle at this base path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the combined bundle as a .xsb container
        #[arg(long)]
        container: bool,

        /// Abort when any bundle cannot be loaded
        #[arg(long)]
        strict: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a bundle's tiles to a PNG sheet
    Preview {
        /// Bundle: a .xsb container or a separate-file base path
        bundle: PathBuf,

        /// Output PNG file (default: <bundle>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tiles per row
        #[arg(long)]
        columns: Option<u32>,

        /// Scale output by integer factor (1-16)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
        scale: Option<u8>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are not failures; everything else is.
            let code = if e.use_stderr() { EXIT_INVALID_ARGS } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(cli.verbose, cli.quiet);

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(Error::from(e)),
    };

    match cli.command {
        Commands::Compile(args) => compile::run_compile(&args, config),
        Commands::Inspect { bundle, sprite, json } => inspect::run_inspect(&bundle, sprite, json),
        Commands::Link { bundles, dir, output, container, strict, json } => {
            let mut paths = bundles;
            if let Some(dir) = dir {
                paths.extend(find_bundles(&dir));
            }
            let overrides = CliOverrides {
                policy: strict.then_some(crate::loader::LoadPolicy::Strict),
                container: container.then_some(true),
                ..Default::default()
            };
            link::run_link(&paths, output.as_deref(), config, &overrides, json)
        }
        Commands::Preview { bundle, output, columns, scale } => {
            let output = output.unwrap_or_else(|| with_extension(&bundle, "png"));
            let overrides = CliOverrides { columns, scale, ..Default::default() };
            preview::run_preview(&bundle, &output, config, &overrides)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("32"), Ok(32));
        assert_eq!(parse_size("0x20"), Ok(32));
        assert_eq!(parse_size("0X1f"), Ok(31));
        assert!(parse_size("wide").is_err());
        assert!(parse_size("-16").is_err());
    }

    #[test]
    fn test_find_bundles_sorted_and_deduplicated() {
        let dir = tempdir().unwrap();
        for name in ["b.ref", "b.frm", "b.xsp", "a.sp", "c.xsb", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = find_bundles(dir.path());
        assert_eq!(found, vec![dir.path().join("a"), dir.path().join("b"), dir.path().join("c.xsb")]);
    }

    #[test]
    fn test_find_bundles_in_directory_with_glob_characters() {
        let root = tempdir().unwrap();
        let dir = root.path().join("set[1]*");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("hero.xsb"), b"").unwrap();
        fs::write(dir.join("tiles.sp"), b"").unwrap();
        fs::write(root.path().join("other.xsb"), b"").unwrap();

        let found = find_bundles(&dir);
        assert_eq!(found, vec![dir.join("hero.xsb"), dir.join("tiles")]);
    }

    #[test]
    fn test_config_error_exits_with_error_code() {
        let err = Error::from(crate::config::ConfigError::Validation(vec!["bad".to_string()]));
        assert_eq!(err.kind(), "config_error");
        assert_eq!(exit_code_for(&err), ExitCode::from(EXIT_ERROR));
    }

    #[test]
    fn test_cli_parses_positional_mode_and_origin() {
        let cli = Cli::try_parse_from(["xsp", "compile", "s.png", "32", "0x30", "out/s", "x", "cb"]).unwrap();
        match cli.command {
            Commands::Compile(args) => {
                assert_eq!((args.frame_w, args.frame_h), (32, 48));
                assert_eq!(args.mode.as_deref(), Some("x"));
                assert_eq!(args.origin.as_deref(), Some("cb"));
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_cli_rejects_missing_arguments() {
        assert!(Cli::try_parse_from(["xsp", "compile", "s.png", "32"]).is_err());
    }
}
