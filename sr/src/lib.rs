//! Super-resolution binding over the ncnn-vulkan engine.
//!
//! [`SuperResolution`] owns one native engine handle. Construction resolves
//! the model files, picks tile size and pre-padding for the model family and
//! loads the weights; [`SuperResolution::process`] upscales an [`Image`].
//!
//! # Model files
//!
//! A model is a directory holding `x{scale}.param` and `x{scale}.bin`. Named
//! models are looked up in the configured search roots, then `models/` next
//! to the executable, then `~/.srvk/models`. Explicit file paths bypass the
//! lookup. Both files must exist before the native load runs.
//!
//! # Isolation
//!
//! [`SuperResolution::process_isolated`] hands the binding's [`Recipe`] and
//! the image to a [`WorkerPool`], so a crash inside the GPU driver or the
//! native engine only kills a worker process.
//!
//! ```no_run
//! use srvk_sr::{EngineConfig, Image, PoolConfig, SuperResolution, WorkerPool};
//!
//! # async fn run() -> srvk_sr::Result<()> {
//! let sr = SuperResolution::new(EngineConfig::new("models-DF2K_JPEG").with_scale(4))?;
//! let pool = WorkerPool::new(PoolConfig::current_exe()?.with_workers(2))?;
//! let out = sr.process_isolated(&pool, Image::zeroed(32, 32, 3)?).await?;
//! assert_eq!(out.width(), 128);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod image;
mod model;
mod paths;
mod sr;
pub mod worker;

pub use config::{EngineConfig, Recipe};
pub use error::{Result, SrError};
pub use crate::image::{Image, SUPPORTED_CHANNELS};
pub use model::{ModelFamily, DEFAULT_MODEL};
pub use paths::{ModelFiles, ModelLocator, DEFAULT_BASE_DIR, MODELS_DIR};
pub use sr::SuperResolution;
pub use worker::{PoolConfig, TaskOptions, WorkerPool};

pub use srvk_ncnn::{Backend, BackendKind, EngineError};
#[cfg(feature = "vulkan")]
pub use srvk_ncnn::vulkan::release_gpu_instance;
