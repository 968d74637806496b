use std::io;
use std::path::PathBuf;
use std::time::Duration;

use srvk_ncnn::EngineError;
use thiserror::Error;

/// Errors returned by the super-resolution binding.
#[derive(Debug, Error)]
pub enum SrError {
    #[error("{} or {} not found", .param.display(), .model.display())]
    MissingArtifact { param: PathBuf, model: PathBuf },

    #[error("model {0:?} is not supported")]
    UnsupportedModel(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("worker protocol: {0}")]
    Protocol(String),

    #[error("worker failed ({kind}): {message}")]
    Remote { kind: String, message: String },

    #[error("an error occurred during NCNN processing (worker exited with {status})")]
    WorkerExited { status: String },

    #[error("worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("task cancelled")]
    Cancelled,

    #[error("worker pool is closed")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, SrError>;
