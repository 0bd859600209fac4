//! Compile command implementation

use std::process::ExitCode;

use super::{fail, CompileArgs, EXIT_SUCCESS};
use crate::bitmap::IndexedBitmap;
use crate::bundle::{BundleFormat, BundleKind};
use crate::compiler::{compile, Anchor, CompileOptions, Mode};
use crate::config::{merge_cli_overrides, CliOverrides, XspConfig};

/// Execute the compile command
pub fn run_compile(args: &CompileArgs, mut config: XspConfig) -> ExitCode {
    // Positional mode/origin are lenient: an unknown value warns and falls back.
    let overrides = CliOverrides {
        mode: args.mode.as_deref().map(Mode::from_code_lenient),
        origin: args.origin.as_deref().map(|o| Anchor::from_code_lenient(o).to_string()),
        container: args.container.then_some(true),
        ..Default::default()
    };
    merge_cli_overrides(&mut config, &overrides);

    let options = CompileOptions {
        frame_w: args.frame_w,
        frame_h: args.frame_h,
        mode: config.compile.mode,
        anchor: config.compile.anchor(),
        dump_regions: args.dump,
    };

    let bitmap = match IndexedBitmap::load_png(&args.image) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    let (width, height) = (bitmap.width(), bitmap.height());

    let output = match compile(bitmap, &options) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    for dump in &output.dumps {
        print!("{}", dump);
    }

    let format = if config.compile.container { BundleFormat::Container } else { BundleFormat::Separate };
    let written = match output.bundle.write(&args.output_base, format) {
        Ok(w) => w,
        Err(e) => return fail(e),
    };

    let bundle = &output.bundle;
    match bundle.kind {
        BundleKind::SinglePattern => println!(
            "Compiled {} ({}x{}): {} cells, {} unique tiles",
            args.image.display(),
            width,
            height,
            output.cell_count(),
            bundle.tile_count()
        ),
        BundleKind::Composite => println!(
            "Compiled {} ({}x{}): {} sprites, {} frames, {} unique tiles (origin {})",
            args.image.display(),
            width,
            height,
            bundle.sprite_count(),
            bundle.frame_count(),
            bundle.tile_count(),
            options.anchor
        ),
    }
    for path in written {
        println!("  wrote {}", path.display());
    }

    ExitCode::from(EXIT_SUCCESS)
}
