#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// A `models-DF2K` directory with placeholder `x{scale}` files.
pub fn model_dir(root: &Path, scale: u32) -> PathBuf {
    let dir = root.join("models-DF2K");
    std::fs::create_dir_all(&dir).expect("create model dir");
    std::fs::write(dir.join(format!("x{scale}.param")), b"7767517\n").expect("write param");
    std::fs::write(dir.join(format!("x{scale}.bin")), b"\0\0\0\0").expect("write bin");
    dir
}

/// A small gradient PNG.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 40) as u8, (y * 60) as u8, 128]));
    img.save(path).expect("write png");
}

pub fn srvk(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_srvk"));
    cmd.arg("--config").arg(config);
    cmd
}

pub fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{what} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
