use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by native engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ncnn: {0}")]
    Internal(String),

    #[error("ncnn: {op} returned {code}")]
    Native { op: &'static str, code: i32 },

    #[error("ncnn: backend {backend:?} unavailable: {reason}")]
    Unavailable { backend: &'static str, reason: String },

    #[error("ncnn: invalid gpu id {gpuid}, {count} device(s) available")]
    InvalidDevice { gpuid: i32, count: i32 },

    #[error("ncnn: path {0:?} cannot be passed to the native engine")]
    InvalidPath(PathBuf),

    #[error("ncnn: buffer holds {got} bytes, {width}x{height}x{channels} needs {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        channels: u32,
        expected: usize,
        got: usize,
    },

    #[error("ncnn: output {got_w}x{got_h} does not match input scaled by {scale} ({want_w}x{want_h})")]
    OutputShape {
        scale: u32,
        want_w: u32,
        want_h: u32,
        got_w: u32,
        got_h: u32,
    },

    #[error("ncnn: model not loaded")]
    NotLoaded,

    #[error("ncnn: empty data")]
    EmptyData,
}
