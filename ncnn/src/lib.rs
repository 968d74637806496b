//! Rust bindings for the ncnn-vulkan super-resolution engine.
//!
//! The engine itself (Vulkan device management, the ncnn graph executor,
//! tiling and TTA) is native code reached through a small C shim in
//! `csrc/`. This crate exposes it as a [`NativeEngine`] handle created by a
//! [`Backend`], plus borrowed pixel descriptors for the process call.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use srvk_ncnn::{BackendKind, ImageMut, ImageRef};
//!
//! let backend = BackendKind::Vulkan.backend().unwrap();
//! let mut engine = backend.create_engine(0, false).unwrap();
//! engine.set_scale(4);
//! engine.set_tilesize(200);
//! engine.set_prepadding(10);
//! engine.load(Path::new("models-DF2K/x4.param"), Path::new("models-DF2K/x4.bin")).unwrap();
//!
//! let input = vec![0u8; 64 * 64 * 3];
//! let mut output = vec![0u8; 256 * 256 * 3];
//! engine
//!     .process(
//!         &ImageRef::new(&input, 64, 64, 3).unwrap(),
//!         &mut ImageMut::new(&mut output, 256, 256, 3).unwrap(),
//!     )
//!     .unwrap();
//! ```
//!
//! # Linking
//!
//! The `vulkan` feature compiles the shim with `cc` and links `ncnn`,
//! `sr-ncnn-vulkan` and Vulkan from `SRVK_NCNN_LIB_DIR`. Without it only the
//! [`ReferenceBackend`] is available.
//!
//! # Thread Safety
//!
//! Engine handles are `Send` but not `Sync`: one binding owns one handle.
//! Backends are shared freely.

mod engine;
mod error;
#[cfg(feature = "vulkan")]
mod ffi;
mod image;
pub mod reference;
#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use engine::{Backend, BackendKind, NativeEngine};
pub use error::EngineError;
pub use image::{buffer_len, check_scaled, ImageMut, ImageRef};
pub use reference::{ReferenceBackend, ReferenceEngine};
