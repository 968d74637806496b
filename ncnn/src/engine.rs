//! The native engine seam: one handle per binding, one backend per process.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::image::{ImageMut, ImageRef};
use crate::reference::ReferenceBackend;

/// A loaded super-resolution engine handle.
///
/// Mirrors the native `SR` object: three mutable parameters, `load`,
/// `process` and `cleanup`. Handles are owned by exactly one binding and are
/// never shared between threads.
pub trait NativeEngine: Send {
    /// Sets the integer upscale factor used by `process`.
    fn set_scale(&mut self, scale: u32);

    /// Sets the tile size used to bound device memory during inference.
    fn set_tilesize(&mut self, tilesize: u32);

    /// Sets the per-tile border the engine pads before convolution.
    fn set_prepadding(&mut self, prepadding: u32);

    /// Loads the `.param` graph and `.bin` weights.
    fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), EngineError>;

    /// Upscales `input` into `output`. Only `output` is written.
    fn process(&self, input: &ImageRef<'_>, output: &mut ImageMut<'_>) -> Result<(), EngineError>;

    /// Releases the pipelines created by `load`.
    fn cleanup(&mut self) -> Result<(), EngineError>;
}

/// Creates engine handles and answers device queries.
pub trait Backend: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Creates an engine handle bound to `gpuid`.
    fn create_engine(&self, gpuid: i32, tta_mode: bool) -> Result<Box<dyn NativeEngine>, EngineError>;

    /// Reports the device memory headroom of `gpuid` in megabytes.
    fn heap_budget(&self, gpuid: i32) -> Result<u32, EngineError>;

    /// Number of usable devices.
    fn gpu_count(&self) -> Result<i32, EngineError>;
}

/// Selects which [`Backend`] a binding runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// ncnn over Vulkan, through the C shim. Needs the `vulkan` feature.
    #[default]
    Vulkan,
    /// Pure-Rust nearest-neighbour engine.
    Reference,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Vulkan, BackendKind::Reference];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Vulkan => "vulkan",
            BackendKind::Reference => "reference",
        }
    }

    /// Returns the backend for this kind.
    pub fn backend(self) -> Result<Arc<dyn Backend>, EngineError> {
        match self {
            BackendKind::Vulkan => vulkan_backend(),
            BackendKind::Reference => Ok(Arc::new(ReferenceBackend::default())),
        }
    }
}

#[cfg(feature = "vulkan")]
fn vulkan_backend() -> Result<Arc<dyn Backend>, EngineError> {
    Ok(Arc::new(crate::vulkan::VulkanBackend::new()?))
}

#[cfg(not(feature = "vulkan"))]
fn vulkan_backend() -> Result<Arc<dyn Backend>, EngineError> {
    Err(EngineError::Unavailable {
        backend: "vulkan",
        reason: "built without the `vulkan` feature".into(),
    })
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::Internal(format!("unknown backend {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parse() {
        assert_eq!("vulkan".parse::<BackendKind>().unwrap(), BackendKind::Vulkan);
        assert_eq!("Reference".parse::<BackendKind>().unwrap(), BackendKind::Reference);
        assert!("cuda".parse::<BackendKind>().is_err());
    }

    #[test]
    fn backend_kind_default_is_vulkan() {
        assert_eq!(BackendKind::default(), BackendKind::Vulkan);
    }

    #[test]
    fn reference_backend_always_available() {
        let backend = BackendKind::Reference.backend().unwrap();
        assert_eq!(backend.name(), "reference");
    }

    #[cfg(not(feature = "vulkan"))]
    #[test]
    fn vulkan_backend_unavailable_without_feature() {
        assert!(matches!(
            BackendKind::Vulkan.backend(),
            Err(EngineError::Unavailable { backend: "vulkan", .. })
        ));
    }
}
