//! CLI integration tests for the xsp binary
//!
//! These tests run the built binary against sheets synthesized into a temp
//! directory and check exit codes, files written and reported numbers.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run xsp inside `dir`, isolated from any user configuration.
fn xsp(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xsp"))
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute xsp")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// 32x32 sheet made of four 16x16 cells; the two on the left are identical.
fn write_sheet(path: &Path) {
    let (w, h) = (32u32, 32u32);
    let mut pixels = vec![0u8; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let index = match (x / 16, y / 16) {
                (0, _) => 1,
                (1, 0) => 2,
                _ => ((x + y) % 15 + 1) as u8,
            };
            pixels[(y * w + x) as usize] = index;
        }
    }
    let file = File::create(path).unwrap();
    let mut encoder = png::Encoder::new(BufWriter::new(file), w, h);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette((0..16u8).flat_map(|i| [i * 16, i * 16, i * 16]).collect::<Vec<u8>>());
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(&pixels).unwrap();
}

#[test]
fn test_no_arguments_is_usage_error() {
    let temp = TempDir::new().unwrap();
    let output = xsp(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_help_exits_successfully() {
    let temp = TempDir::new().unwrap();
    let output = xsp(temp.path(), &["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("compile"));
}

#[test]
fn test_missing_image_is_runtime_error() {
    let temp = TempDir::new().unwrap();
    let output = xsp(temp.path(), &["compile", "missing.png", "16", "16", "out/missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.png"));
}

#[test]
fn test_frame_below_tile_size_is_invalid_input() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));
    let output = xsp(temp.path(), &["compile", "sheet.png", "8", "16", "out/sheet"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_compile_writes_separate_files() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));

    let output = xsp(temp.path(), &["compile", "sheet.png", "0x10", "16", "out/sheet", "x", "lt"]);
    assert!(output.status.success(), "compile failed: {}", String::from_utf8_lossy(&output.stderr));

    let out = temp.path().join("out");
    // Four cells, the two left cells share one pattern.
    assert_eq!(fs::read(out.join("sheet.xsp")).unwrap().len(), 3 * 128);
    assert_eq!(fs::read(out.join("sheet.frm")).unwrap().len(), 4 * 8);
    assert_eq!(fs::read(out.join("sheet.ref")).unwrap().len(), 4 * 8);
}

#[test]
fn test_compile_auto_mode_single_pattern() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));

    let output = xsp(temp.path(), &["compile", "sheet.png", "16", "16", "tiles"]);
    assert!(output.status.success());
    assert_eq!(fs::read(temp.path().join("tiles.sp")).unwrap().len(), 3 * 128);
    assert!(!temp.path().join("tiles.frm").exists());
}

#[test]
fn test_config_file_selects_container_and_origin() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));
    fs::write(temp.path().join("xsp.toml"), "[compile]\nmode = \"xobj\"\norigin = \"lt\"\ncontainer = true\n").unwrap();

    let output = xsp(temp.path(), &["compile", "sheet.png", "32", "32", "sheet"]);
    assert!(output.status.success(), "compile failed: {}", String::from_utf8_lossy(&output.stderr));

    let inspect = xsp(temp.path(), &["inspect", "sheet.xsb", "--json"]);
    assert!(inspect.status.success());
    let report: serde_json::Value = serde_json::from_slice(&inspect.stdout).unwrap();
    assert_eq!(report["sprites"], 1);
    assert_eq!(report["frames"], 4);
    assert_eq!(report["tiles"], 3);
    // Left-top origin: the first block sits right on it.
    let first = &report["sprite_table"][0]["frames"][0];
    assert_eq!((first["rel_x"].as_i64(), first["rel_y"].as_i64()), (Some(0), Some(0)));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));
    fs::write(temp.path().join("xsp.toml"), "[preview]\nscale = 0\n").unwrap();

    let output = xsp(temp.path(), &["compile", "sheet.png", "16", "16", "sheet"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("scale"));
}

#[test]
fn test_link_reports_relocated_bases() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));
    assert!(xsp(temp.path(), &["compile", "sheet.png", "16", "16", "a", "x"]).status.success());
    assert!(xsp(temp.path(), &["compile", "sheet.png", "32", "32", "b", "x", "--container"]).status.success());

    let output = xsp(temp.path(), &["link", "a", "b.xsb", "--json", "-o", "linked/all"]);
    assert!(output.status.success(), "link failed: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["sprites"], 5);
    assert_eq!(report["tiles"], 6);
    assert_eq!(report["degraded"], 0);
    assert_eq!(report["bundles"][1]["base"], 4);

    assert_eq!(fs::read(temp.path().join("linked/all.xsp")).unwrap().len(), 6 * 128);
    assert_eq!(fs::read(temp.path().join("linked/all.ref")).unwrap().len(), 5 * 8);
}

#[test]
fn test_link_strict_fails_on_broken_bundle() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));
    assert!(xsp(temp.path(), &["compile", "sheet.png", "16", "16", "a", "x"]).status.success());
    // A REF record pointing past the end of the FRM table.
    fs::write(temp.path().join("a.ref"), [0, 1, 0, 0, 1, 0, 0, 0]).unwrap();

    let lenient = xsp(temp.path(), &["link", "a", "--json"]);
    assert!(lenient.status.success());
    let report: serde_json::Value = serde_json::from_slice(&lenient.stdout).unwrap();
    assert_eq!(report["degraded"], 1);

    let strict = xsp(temp.path(), &["link", "a", "--strict"]);
    assert_eq!(strict.status.code(), Some(1));
}

#[test]
fn test_preview_writes_scaled_sheet() {
    let temp = TempDir::new().unwrap();
    write_sheet(&temp.path().join("sheet.png"));
    assert!(xsp(temp.path(), &["compile", "sheet.png", "16", "16", "tiles"]).status.success());

    let output = xsp(temp.path(), &["preview", "tiles", "--columns", "2", "--scale", "2"]);
    assert!(output.status.success(), "preview failed: {}", String::from_utf8_lossy(&output.stderr));

    let img = image::open(temp.path().join("tiles.png")).unwrap();
    assert_eq!((img.width(), img.height()), (64, 64));
}
