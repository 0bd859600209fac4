//! Preview command implementation

use std::path::Path;
use std::process::ExitCode;

use super::{fail, EXIT_SUCCESS};
use crate::bundle::Bundle;
use crate::config::{merge_cli_overrides, CliOverrides, XspConfig};
use crate::preview::{render_tiles, save_png, PreviewOptions};

/// Execute the preview command
pub fn run_preview(bundle_path: &Path, output: &Path, mut config: XspConfig, overrides: &CliOverrides) -> ExitCode {
    merge_cli_overrides(&mut config, overrides);

    let bundle = match Bundle::read(bundle_path) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    let options = PreviewOptions { columns: config.preview.columns, scale: config.preview.scale };
    let image = render_tiles(&bundle, &options);
    if let Err(e) = save_png(&image, output) {
        return fail(e);
    }

    println!("Saved {} ({} tiles, {}x{})", output.display(), bundle.tile_count(), image.width(), image.height());
    ExitCode::from(EXIT_SUCCESS)
}
