//! Inspect command implementation

use std::path::Path;
use std::process::ExitCode;

use super::{fail, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::bundle::{Bundle, BundleKind};
use crate::record::FrameRecord;

/// Execute the inspect command
pub fn run_inspect(path: &Path, sprite: Option<usize>, json: bool) -> ExitCode {
    let bundle = match Bundle::read(path) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    if let Some(n) = sprite {
        if n >= bundle.sprite_count() {
            eprintln!("Error: sprite {} out of range ({} sprites)", n, bundle.sprite_count());
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    }

    let selected: Vec<usize> = match sprite {
        Some(n) => vec![n],
        None => (0..bundle.sprite_count()).collect(),
    };

    if json {
        let sprites: Vec<serde_json::Value> = selected
            .iter()
            .map(|&i| {
                let r = bundle.references().nth(i);
                serde_json::json!({
                    "index": i,
                    "reference": r,
                    "frames": bundle.sprite_frames(i).unwrap_or_default(),
                })
            })
            .collect();
        let report = serde_json::json!({
            "path": path.display().to_string(),
            "kind": bundle.kind,
            "tiles": bundle.tile_count(),
            "frames": bundle.frame_count(),
            "sprites": bundle.sprite_count(),
            "palette": bundle.palette.iter().map(|c| format!("{:04X}", c)).collect::<Vec<_>>(),
            "sprite_table": sprites,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(super::EXIT_ERROR);
            }
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    println!("{}", path.display());
    match bundle.kind {
        BundleKind::SinglePattern => println!("  kind: single pattern"),
        BundleKind::Composite => println!("  kind: composite"),
    }
    println!("  tiles: {}", bundle.tile_count());
    if bundle.kind == BundleKind::Composite {
        println!("  frames: {}", bundle.frame_count());
        println!("  sprites: {}", bundle.sprite_count());
    }

    for i in selected {
        let Some(r) = bundle.references().nth(i) else { continue };
        println!("  sprite {}: {} frames @ FRM+{}", i, r.frame_count, r.frame_offset);
        match bundle.sprite_frames(i) {
            Some(frames) => frames.iter().for_each(print_frame),
            None => println!("    (frame range outside FRM table)"),
        }
    }

    ExitCode::from(EXIT_SUCCESS)
}

fn print_frame(f: &FrameRecord) {
    println!("    ({:>4}, {:>4}) pattern {:>5} rv {:04X}", f.rel_x, f.rel_y, f.pattern, f.reflection);
}
