//! Supported model families and their tiling policy.

use std::fmt;
use std::path::Path;

use crate::error::{Result, SrError};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "models-DF2K";

/// A model family the native engine has pre-padding and tiling numbers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    /// `models-DF2K`: trained on DIV2K + Flickr2K.
    Df2k,
    /// `models-DF2K_JPEG`: same data with JPEG degradation.
    Df2kJpeg,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 2] = [ModelFamily::Df2k, ModelFamily::Df2kJpeg];

    /// Directory name of the family's bundled model.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::Df2k => "models-DF2K",
            ModelFamily::Df2kJpeg => "models-DF2K_JPEG",
        }
    }

    /// Identifies the family of a model name or model directory path.
    ///
    /// Only the final path component is compared, and only for exact
    /// equality: `/opt/sr/models-DF2K` is DF2K, `models-DF2K-v2` is not.
    pub fn from_model(model: &str) -> Result<Self> {
        let name = Path::new(model)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| SrError::UnsupportedModel(model.to_string()))
    }

    /// Border, in pixels, added around every tile.
    pub fn prepadding(self) -> u32 {
        match self {
            ModelFamily::Df2k | ModelFamily::Df2kJpeg => 10,
        }
    }

    /// Picks a tile size for a device reporting `heap_budget_mb` of headroom.
    pub fn tile_size_for_budget(self, heap_budget_mb: u32) -> u32 {
        match self {
            ModelFamily::Df2k | ModelFamily::Df2kJpeg => match heap_budget_mb {
                b if b > 1900 => 200,
                b if b > 550 => 100,
                b if b > 190 => 64,
                _ => 32,
            },
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
