//! Engine configuration and the construction recipe sent to worker processes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use srvk_ncnn::BackendKind;

use crate::error::{Result, SrError};
use crate::model::DEFAULT_MODEL;

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_scale() -> u32 {
    2
}

/// Construction parameters of a [`SuperResolution`](crate::SuperResolution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Vulkan device index.
    #[serde(default)]
    pub gpuid: i32,

    /// Model name (looked up in the search roots) or model directory path.
    #[serde(default = "default_model")]
    pub model: String,

    /// Test-time augmentation inside the native engine.
    #[serde(default)]
    pub tta_mode: bool,

    /// Integer upscale factor.
    #[serde(default = "default_scale")]
    pub scale: u32,

    /// Tile size; 0 picks one from the device heap budget.
    #[serde(default)]
    pub tilesize: u32,

    /// Explicit `.param` path. Both paths must be set to bypass model lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_path: Option<PathBuf>,

    /// Explicit `.bin` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_path: Option<PathBuf>,

    #[serde(default)]
    pub backend: BackendKind,

    /// Directories searched for named models before the defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_roots: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gpuid: 0,
            model: default_model(),
            tta_mode: false,
            scale: default_scale(),
            tilesize: 0,
            param_path: None,
            bin_path: None,
            backend: BackendKind::default(),
            search_roots: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_gpuid(mut self, gpuid: i32) -> Self {
        self.gpuid = gpuid;
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_tilesize(mut self, tilesize: u32) -> Self {
        self.tilesize = tilesize;
        self
    }

    pub fn with_tta(mut self, tta_mode: bool) -> Self {
        self.tta_mode = tta_mode;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_model_files(mut self, param: impl Into<PathBuf>, bin: impl Into<PathBuf>) -> Self {
        self.param_path = Some(param.into());
        self.bin_path = Some(bin.into());
        self
    }

    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_roots.push(root.into());
        self
    }

    /// Rejects values the native engine cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(SrError::InvalidConfig("scale must be at least 1".into()));
        }
        if i32::try_from(self.scale).is_err() || i32::try_from(self.tilesize).is_err() {
            return Err(SrError::InvalidConfig("scale and tilesize must fit in an i32".into()));
        }
        if self.model.is_empty() && (self.param_path.is_none() || self.bin_path.is_none()) {
            return Err(SrError::InvalidConfig("model is empty and no model files were given".into()));
        }
        Ok(())
    }
}

/// Everything a fresh process needs to rebuild an equivalent binding.
///
/// The native handle is never transferred; the receiver replays full
/// construction. A tile size of 0 is re-derived from the receiver's own
/// device query; a pinned one travels as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub gpuid: i32,
    pub tta_mode: bool,
    pub model: String,
    pub scale: u32,
    pub param_path: Option<PathBuf>,
    pub bin_path: Option<PathBuf>,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    /// Requested tile size; 0 picks one from the heap budget.
    #[serde(default)]
    pub tilesize: u32,
}

impl Recipe {
    /// The configuration this recipe rebuilds.
    pub fn into_config(self) -> EngineConfig {
        EngineConfig {
            gpuid: self.gpuid,
            model: self.model,
            tta_mode: self.tta_mode,
            scale: self.scale,
            tilesize: self.tilesize,
            param_path: self.param_path,
            bin_path: self.bin_path,
            backend: self.backend,
            search_roots: self.search_roots,
        }
    }
}

impl From<&EngineConfig> for Recipe {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            gpuid: cfg.gpuid,
            tta_mode: cfg.tta_mode,
            model: cfg.model.clone(),
            scale: cfg.scale,
            param_path: cfg.param_path.clone(),
            bin_path: cfg.bin_path.clone(),
            backend: cfg.backend,
            search_roots: cfg.search_roots.clone(),
            tilesize: cfg.tilesize,
        }
    }
}
