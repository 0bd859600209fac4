//! Link command implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{fail, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::bundle::{Bundle, BundleFormat, BundleKind};
use crate::config::{merge_cli_overrides, CliOverrides, XspConfig};
use crate::loader::{BundleStatus, SpriteManager};

/// Execute the link command
pub fn run_link(
    paths: &[PathBuf],
    output: Option<&Path>,
    mut config: XspConfig,
    overrides: &CliOverrides,
    json: bool,
) -> ExitCode {
    if paths.is_empty() {
        eprintln!("Error: no bundles given");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    merge_cli_overrides(&mut config, overrides);

    let mut manager = SpriteManager::new(config.load.policy);
    for path in paths {
        if let Err(e) = manager.register_bundle(path) {
            return fail(e);
        }
    }
    if let Err(e) = manager.load() {
        return fail(e);
    }

    let degraded = manager.loaded_bundles().iter().filter(|b| b.status != BundleStatus::Loaded).count();

    if json {
        let report = serde_json::json!({
            "tiles": manager.tile_count(),
            "frm_bytes": manager.frm_data().map_or(0, |f| f.len()),
            "sprites": manager.sprite_count(),
            "degraded": degraded,
            "bundles": manager.loaded_bundles(),
        });
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        for b in manager.loaded_bundles() {
            let what = match b.kind {
                BundleKind::Composite => "sprite",
                BundleKind::SinglePattern => "pattern",
            };
            match &b.status {
                BundleStatus::Loaded => println!("{}: {} base {}", b.path.display(), what, b.base),
                BundleStatus::Degraded(why) => {
                    println!("{}: {} base {} (empty: {})", b.path.display(), what, b.base, why)
                }
            }
        }
        println!(
            "Linked {} bundles: {} tiles, {} sprites, {} FRM bytes",
            paths.len(),
            manager.tile_count(),
            manager.sprite_count(),
            manager.frm_data().map_or(0, |f| f.len())
        );
    }

    if let Some(base) = output {
        let mut combined = Bundle::new(BundleKind::Composite);
        combined.pcg = manager.pcg_data().unwrap_or_default().to_vec();
        combined.frm = manager.frm_data().unwrap_or_default().to_vec();
        combined.refs = manager.ref_data().unwrap_or_default().to_vec();
        let format = if config.compile.container { BundleFormat::Container } else { BundleFormat::Separate };
        match combined.write(base, format) {
            Ok(written) if !json => written.iter().for_each(|p| println!("  wrote {}", p.display())),
            Ok(_) => {}
            Err(e) => return fail(e),
        }
    }

    manager.shutdown();
    ExitCode::from(EXIT_SUCCESS)
}
