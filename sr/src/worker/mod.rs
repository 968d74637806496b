//! Isolated invocation.
//!
//! [`WorkerPool`] runs each task in a fresh process that speaks the framed
//! protocol in [`protocol`] on stdin/stdout. The `srvk worker` subcommand is
//! such a process: it calls [`serve_stdio`], which rebuilds the binding from
//! the request's [`Recipe`](crate::Recipe) and answers once.

mod pool;
pub mod protocol;
mod serve;

pub use pool::{PoolConfig, TaskOptions, WorkerPool};
pub use protocol::{RemoteError, MAX_FRAME_LEN};
pub use serve::{serve, serve_stdio};
pub use tokio_util::sync::CancellationToken;
