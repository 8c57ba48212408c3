//! Worker thread that owns a heap-analysis backend and serves requests.
//!
//! The worker runs on a dedicated OS thread and sequentially processes
//! messages from an `mpsc` channel, replying on a `oneshot` per request.
//! Analyses may block for a long time; keeping them off the async runtime
//! means the store keeps reducing actions while a census is computed.
//!
//! Public API: [`HeapAnalysesClient`] (cloneable async handle) and
//! [`WorkerConfig`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::analyses::{CensusReport, DominatorTreeId, DominatorTreeNode, FetchLimits, HeapAnalyses};
use crate::error::WorkerError;

/// Configuration for the worker thread.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Requests that may queue before senders wait.
    pub queue_capacity: usize,
    /// OS thread name, shown in debuggers and panics.
    pub thread_name: String,
    /// How much of a dominator tree each fetch returns.
    pub fetch_limits: FetchLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            thread_name: "heap-analyses".into(),
            fetch_limits: FetchLimits::default(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, WorkerError>>;

/// Messages sent from [`HeapAnalysesClient`] to the worker loop.
pub(crate) enum WorkerMessage {
    ReadHeapSnapshot {
        path: PathBuf,
        reply: Reply<()>,
    },
    TakeCensus {
        path: PathBuf,
        breakdown: Value,
        filter: Option<String>,
        reply: Reply<CensusReport>,
    },
    TakeCensusDiff {
        first: PathBuf,
        second: PathBuf,
        breakdown: Value,
        filter: Option<String>,
        reply: Reply<CensusReport>,
    },
    ComputeDominatorTree {
        path: PathBuf,
        reply: Reply<DominatorTreeId>,
    },
    GetDominatorTree {
        tree: DominatorTreeId,
        breakdown: Value,
        limits: FetchLimits,
        reply: Reply<DominatorTreeNode>,
    },
    DeleteHeapSnapshot {
        path: PathBuf,
    },
    /// Stop the loop and drop the backend.
    Shutdown,
}

/// Runs the worker loop on its own thread.
///
/// Exits when the channel closes (all clients dropped), a `Shutdown`
/// message arrives, or the destroyed flag is observed between messages.
/// The backend is dropped on exit.
pub(crate) fn run_worker<H: HeapAnalyses>(
    mut analyses: H,
    mut rx: mpsc::Receiver<WorkerMessage>,
    destroyed: Arc<AtomicBool>,
) {
    while let Some(msg) = rx.blocking_recv() {
        if destroyed.load(Ordering::Acquire) {
            break;
        }
        match msg {
            WorkerMessage::ReadHeapSnapshot { path, reply } => {
                let _span = tracing::info_span!("read_heap_snapshot", path = %path.display())
                    .entered();
                let result = analyses.read_heap_snapshot(&path).map_err(WorkerError::from);
                // The caller may have given up waiting; nothing to do then.
                let _ = reply.send(result);
            }
            WorkerMessage::TakeCensus {
                path,
                breakdown,
                filter,
                reply,
            } => {
                let _span = tracing::info_span!("census", path = %path.display()).entered();
                let result = analyses
                    .take_census(&path, &breakdown, filter.as_deref())
                    .map_err(WorkerError::from);
                let _ = reply.send(result);
            }
            WorkerMessage::TakeCensusDiff {
                first,
                second,
                breakdown,
                filter,
                reply,
            } => {
                let _span = tracing::info_span!(
                    "census_diff",
                    first = %first.display(),
                    second = %second.display()
                )
                .entered();
                let result = analyses
                    .take_census_diff(&first, &second, &breakdown, filter.as_deref())
                    .map_err(WorkerError::from);
                let _ = reply.send(result);
            }
            WorkerMessage::ComputeDominatorTree { path, reply } => {
                let _span = tracing::info_span!("compute_dominator_tree", path = %path.display())
                    .entered();
                let result = analyses
                    .compute_dominator_tree(&path)
                    .map_err(WorkerError::from);
                let _ = reply.send(result);
            }
            WorkerMessage::GetDominatorTree {
                tree,
                breakdown,
                limits,
                reply,
            } => {
                let _span = tracing::info_span!("get_dominator_tree", tree = tree.0).entered();
                let result = analyses
                    .get_dominator_tree(tree, &breakdown, limits)
                    .map_err(WorkerError::from);
                let _ = reply.send(result);
            }
            WorkerMessage::DeleteHeapSnapshot { path } => {
                analyses.delete_heap_snapshot(&path);
                tracing::debug!(path = %path.display(), "heap snapshot deleted");
            }
            WorkerMessage::Shutdown => break,
        }
    }
    tracing::debug!("heap analyses worker stopped");
}

/// Async handle to a running heap-analysis worker.
///
/// Lightweight, cloneable, and `Send + Sync`. Every clone talks to the same
/// worker thread; [`destroy`](HeapAnalysesClient::destroy) through any of
/// them stops it for all.
#[derive(Debug, Clone)]
pub struct HeapAnalysesClient {
    sender: mpsc::Sender<WorkerMessage>,
    destroyed: Arc<AtomicBool>,
    limits: FetchLimits,
}

impl HeapAnalysesClient {
    /// Spawn a worker thread owning `analyses`, with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] if the OS refuses to spawn the thread.
    pub fn spawn<H: HeapAnalyses>(analyses: H) -> io::Result<Self> {
        Self::spawn_with_config(analyses, WorkerConfig::default())
    }

    /// Spawn a worker thread owning `analyses`.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] if the OS refuses to spawn the thread.
    pub fn spawn_with_config<H: HeapAnalyses>(analyses: H, config: WorkerConfig) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<WorkerMessage>(config.queue_capacity.max(1));
        let destroyed = Arc::new(AtomicBool::new(false));
        let worker_destroyed = Arc::clone(&destroyed);

        std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || run_worker(analyses, rx, worker_destroyed))?;

        Ok(Self {
            sender: tx,
            destroyed,
            limits: config.fetch_limits,
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> WorkerMessage,
    ) -> Result<T, WorkerError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(WorkerError::WorkerGone);
        }
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| WorkerError::WorkerGone)?;
        rx.await.map_err(|_| WorkerError::WorkerGone)?
    }

    /// Load the snapshot at `path` into the worker.
    ///
    /// # Errors
    ///
    /// * [`WorkerError::Analysis`] -- the backend could not read it.
    /// * [`WorkerError::WorkerGone`] -- the worker has exited.
    pub async fn read_heap_snapshot(&self, path: &Path) -> Result<(), WorkerError> {
        let path = path.to_path_buf();
        self.request(|reply| WorkerMessage::ReadHeapSnapshot { path, reply })
            .await
    }

    pub async fn take_census(
        &self,
        path: &Path,
        breakdown: &Value,
        filter: Option<&str>,
    ) -> Result<CensusReport, WorkerError> {
        let path = path.to_path_buf();
        let breakdown = breakdown.clone();
        let filter = filter.map(str::to_owned);
        self.request(|reply| WorkerMessage::TakeCensus {
            path,
            breakdown,
            filter,
            reply,
        })
        .await
    }

    pub async fn take_census_diff(
        &self,
        first: &Path,
        second: &Path,
        breakdown: &Value,
        filter: Option<&str>,
    ) -> Result<CensusReport, WorkerError> {
        let first = first.to_path_buf();
        let second = second.to_path_buf();
        let breakdown = breakdown.clone();
        let filter = filter.map(str::to_owned);
        self.request(|reply| WorkerMessage::TakeCensusDiff {
            first,
            second,
            breakdown,
            filter,
            reply,
        })
        .await
    }

    pub async fn compute_dominator_tree(&self, path: &Path) -> Result<DominatorTreeId, WorkerError> {
        let path = path.to_path_buf();
        self.request(|reply| WorkerMessage::ComputeDominatorTree { path, reply })
            .await
    }

    /// Fetch the top of a computed dominator tree, labeled per `breakdown`,
    /// within the configured [`FetchLimits`].
    pub async fn get_dominator_tree(
        &self,
        tree: DominatorTreeId,
        breakdown: &Value,
    ) -> Result<DominatorTreeNode, WorkerError> {
        let breakdown = breakdown.clone();
        let limits = self.limits;
        self.request(|reply| WorkerMessage::GetDominatorTree {
            tree,
            breakdown,
            limits,
            reply,
        })
        .await
    }

    /// Ask the worker to forget a snapshot. Does not wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::WorkerGone`] if the worker has exited.
    pub async fn delete_heap_snapshot(&self, path: &Path) -> Result<(), WorkerError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(WorkerError::WorkerGone);
        }
        self.sender
            .send(WorkerMessage::DeleteHeapSnapshot {
                path: path.to_path_buf(),
            })
            .await
            .map_err(|_| WorkerError::WorkerGone)
    }

    /// Stop the worker thread.
    ///
    /// Requests already queued are dropped; their callers see
    /// [`WorkerError::WorkerGone`]. Safe to call more than once.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        // A full queue still stops: the loop checks the flag before
        // handling the next message.
        let _ = self.sender.try_send(WorkerMessage::Shutdown);
        tracing::debug!("heap analyses worker destroyed");
    }

    /// Whether the worker is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.destroyed.load(Ordering::Acquire) && !self.sender.is_closed()
    }
}
