//! Supervised worker processes behind one task queue.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Recipe;
use crate::error::{Result, SrError};
use crate::image::Image;
use crate::worker::protocol::{read_response, write_request};

/// How long a worker may take to exit after its output stream ends.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// How worker processes are launched and scheduled.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Executable serving the worker protocol on stdin/stdout.
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Number of tasks processed concurrently.
    pub workers: usize,
    /// Tasks queued before `submit` waits.
    pub queue_depth: usize,
    /// Default per-task timeout.
    pub timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workers: 1,
            queue_depth: 16,
            timeout: None,
        }
    }

    /// Re-executes the running binary as `<exe> worker`.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?).with_args(["worker"]))
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Per-task overrides.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Replaces the pool's default timeout.
    pub timeout: Option<Duration>,
    /// Cancelling kills the task's worker, or skips the task if it is still queued.
    pub cancel: Option<CancellationToken>,
}

impl TaskOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

struct Task {
    recipe: Recipe,
    image: Image,
    opts: TaskOptions,
    reply: oneshot::Sender<Result<Image>>,
}

/// Runs each task in a fresh worker process.
///
/// A native crash, hang or abort takes down only that task's worker; the
/// caller gets [`SrError::WorkerExited`], [`SrError::Timeout`] or
/// [`SrError::Cancelled`]. Must be created inside a tokio runtime.
pub struct WorkerPool {
    tx: mpsc::Sender<Task>,
    shutdown: CancellationToken,
    supervisors: StdMutex<Vec<JoinHandle<()>>>,
    config: Arc<PoolConfig>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(SrError::InvalidConfig("worker pool needs at least one worker".into()));
        }
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();
        let config = Arc::new(config);

        let supervisors = (0..config.workers)
            .map(|id| tokio::spawn(supervise(id, rx.clone(), config.clone(), shutdown.clone())))
            .collect();
        info!(
            program = %config.program.display(),
            workers = config.workers,
            "worker pool started"
        );
        Ok(Self {
            tx,
            shutdown,
            supervisors: StdMutex::new(supervisors),
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Processes `image` with the binding described by `recipe` in a worker.
    pub async fn submit(&self, recipe: Recipe, image: Image) -> Result<Image> {
        self.submit_with(recipe, image, TaskOptions::default()).await
    }

    pub async fn submit_with(&self, recipe: Recipe, image: Image, opts: TaskOptions) -> Result<Image> {
        if self.shutdown.is_cancelled() {
            return Err(SrError::PoolClosed);
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Task {
                recipe,
                image,
                opts,
                reply,
            })
            .await
            .map_err(|_| SrError::PoolClosed)?;
        rx.await.map_err(|_| SrError::PoolClosed)?
    }

    /// Stops the supervisors. Running workers are killed; queued and later
    /// tasks fail with [`SrError::PoolClosed`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles = match self.supervisors.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn supervise(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    config: Arc<PoolConfig>,
    shutdown: CancellationToken,
) {
    loop {
        let task = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                task = rx.recv() => task,
            }
        };
        let Some(task) = task else {
            break;
        };
        let result = run_task(&config, &task, &shutdown).await;
        if let Err(e) = &result {
            debug!(supervisor = id, error = %e, "task failed");
        }
        let _ = task.reply.send(result);
    }
    debug!(supervisor = id, "supervisor exiting");
}

async fn run_task(config: &PoolConfig, task: &Task, shutdown: &CancellationToken) -> Result<Image> {
    let cancel = task.opts.cancel.clone().unwrap_or_default();
    if cancel.is_cancelled() {
        return Err(SrError::Cancelled);
    }
    let timeout = task.opts.timeout.or(config.timeout);

    let mut child = Command::new(&config.program)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;
    let pid = child.id();
    debug!(?pid, "worker spawned");

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| SrError::Protocol("worker stdin not captured".into()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SrError::Protocol("worker stdout not captured".into()))?;

    let exchange = async move {
        match write_request(&mut stdin, &task.recipe, &task.image).await {
            Err(SrError::Io(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("worker closed its input early");
            }
            other => other?,
        }
        drop(stdin);
        read_response(&mut stdout).await
    };

    let response = tokio::select! {
        r = exchange => r,
        _ = expire(timeout) => {
            return abort(&mut child, SrError::Timeout(timeout.unwrap_or_default())).await;
        }
        _ = cancel.cancelled() => return abort(&mut child, SrError::Cancelled).await,
        _ = shutdown.cancelled() => return abort(&mut child, SrError::PoolClosed).await,
    };

    match response {
        Ok(Some(result)) => {
            let status = reap(&mut child).await;
            debug!(?pid, %status, "worker finished");
            result
        }
        Ok(None) => {
            let status = reap(&mut child).await;
            warn!(?pid, %status, "worker exited without a response");
            Err(SrError::WorkerExited { status })
        }
        Err(e) => {
            let _ = child.kill().await;
            Err(e)
        }
    }
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

async fn abort(child: &mut Child, err: SrError) -> Result<Image> {
    warn!(pid = ?child.id(), error = %err, "killing worker");
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill worker");
    }
    Err(err)
}

/// Waits for the worker to exit and renders its status.
async fn reap(child: &mut Child) -> String {
    match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => status.to_string(),
        Ok(Err(e)) => format!("unknown status ({e})"),
        Err(_) => {
            let _ = child.kill().await;
            "no exit after closing output, killed".to_string()
        }
    }
}
