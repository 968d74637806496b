use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=csrc/srvk_engine.h");
    println!("cargo:rerun-if-changed=csrc/srvk_engine.cpp");
    println!("cargo:rerun-if-env-changed=SRVK_NCNN_LIB_DIR");
    println!("cargo:rerun-if-env-changed=SRVK_NCNN_INCLUDE_DIR");

    // Without the `vulkan` feature only the reference backend is built.
    if env::var_os("CARGO_FEATURE_VULKAN").is_none() {
        return;
    }

    let mut build = cc::Build::new();
    build.cpp(true).file("csrc/srvk_engine.cpp").include("csrc");
    if let Some(dir) = env::var_os("SRVK_NCNN_INCLUDE_DIR") {
        let dir = PathBuf::from(dir);
        build.include(&dir).include(dir.join("ncnn"));
    }
    build.compile("srvk_engine");

    if let Some(dir) = env::var_os("SRVK_NCNN_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", PathBuf::from(dir).display());
    }
    println!("cargo:rustc-link-lib=sr-ncnn-vulkan");
    println!("cargo:rustc-link-lib=ncnn");
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        println!("cargo:rustc-link-lib=vulkan-1");
    } else {
        println!("cargo:rustc-link-lib=vulkan");
    }
}
