//! The store: sole owner of [`AppState`] and the only place it changes.
//!
//! The store runs as an actor task. Actions arrive over an `mpsc` channel
//! and are reduced one at a time, so every published state is the result
//! of a complete dispatch and no observer ever sees a partial update.
//! After each change the actor publishes the new state twice: to a
//! `watch` channel for cheap latest-value reads, and to every registered
//! observer so subscriptions see each intermediate state in order.
//!
//! Opened through [`StoreBuilder`]; used through the cloneable
//! [`StoreHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::{UnboundedReceiverStream, WatchStream};

use crate::action::Action;
use crate::display::DisplayCatalogs;
use crate::error::StoreError;
use crate::state::{AppState, RequestId, SnapshotId, View};

/// Default number of actions that may queue before dispatchers wait.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Messages sent from [`StoreHandle`] to the store actor.
enum StoreMessage {
    /// Reduce an action and reply with the resulting state.
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Arc<AppState>>,
    },

    /// Register an observer. Replies with the state as of registration so
    /// the observer's view has neither gaps nor overlaps.
    Subscribe { reply: oneshot::Sender<Subscription> },

    /// Stop the actor. Queued dispatches behind it are dropped.
    Shutdown,
}

/// Runs the store actor until shutdown or until every handle is dropped.
async fn run_store(
    mut state: Arc<AppState>,
    mut rx: mpsc::Receiver<StoreMessage>,
    published: watch::Sender<Arc<AppState>>,
) {
    let mut observers: Vec<mpsc::UnboundedSender<Arc<AppState>>> = Vec::new();

    while let Some(msg) = rx.recv().await {
        match msg {
            StoreMessage::Dispatch { action, reply } => {
                let next = AppState::clone(&state).apply(&action);
                if next != *state {
                    state = Arc::new(next);
                    published.send_replace(Arc::clone(&state));
                    // Dropped subscriptions fall out here.
                    observers.retain(|observer| observer.send(Arc::clone(&state)).is_ok());
                    tracing::debug!(action = action.kind(), "action reduced");
                } else {
                    tracing::trace!(action = action.kind(), "action left state unchanged");
                }
                let _ = reply.send(Arc::clone(&state));
            }
            StoreMessage::Subscribe { reply } => {
                let (tx, rx) = mpsc::unbounded_channel();
                observers.push(tx);
                let _ = reply.send(Subscription {
                    current: Arc::clone(&state),
                    rx,
                });
            }
            StoreMessage::Shutdown => break,
        }
    }
    tracing::debug!("store actor stopped");
}

/// A gap-free view of the store's state over time.
///
/// Starts at the state current when it was created and then sees every
/// later state, in dispatch order. Dropping it unregisters the observer.
#[derive(Debug)]
pub struct Subscription {
    current: Arc<AppState>,
    rx: mpsc::UnboundedReceiver<Arc<AppState>>,
}

impl Subscription {
    /// The most recent state this subscription has observed.
    pub fn current(&self) -> &Arc<AppState> {
        &self.current
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` once the store has shut down and every state
    /// published before that has been seen.
    pub async fn next(&mut self) -> Option<Arc<AppState>> {
        let state = self.rx.recv().await?;
        self.current = Arc::clone(&state);
        Some(state)
    }

    /// Suspend until `predicate` holds.
    ///
    /// Checks the current state first, then each published state in
    /// order, and returns the first one that satisfies the predicate.
    /// There is no internal timeout; wrap the call in
    /// `tokio::time::timeout` to bound it. Can be called repeatedly to
    /// follow successive transitions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the store shuts down before the
    /// predicate holds.
    pub async fn wait_until<P>(&mut self, mut predicate: P) -> Result<Arc<AppState>, StoreError>
    where
        P: FnMut(&AppState) -> bool,
    {
        if predicate(&self.current) {
            return Ok(Arc::clone(&self.current));
        }
        while let Some(state) = self.next().await {
            if predicate(&state) {
                return Ok(state);
            }
        }
        Err(StoreError::StoreGone)
    }

    /// Turn the remaining notifications into a stream.
    pub fn into_stream(self) -> UnboundedReceiverStream<Arc<AppState>> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Async handle to the store actor.
///
/// `Clone` is cheap: all clones talk to the same actor and share the id
/// counters.
#[derive(Clone)]
pub struct StoreHandle {
    sender: mpsc::Sender<StoreMessage>,
    latest: watch::Receiver<Arc<AppState>>,
    snapshot_ids: Arc<AtomicU64>,
    request_ids: Arc<AtomicU64>,
    task: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

// Manual `Debug`: the channels carry nothing worth printing.
impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl StoreHandle {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Reduce `action` and return the resulting state.
    ///
    /// Resolves as soon as the reducer has applied the action; it never
    /// waits for asynchronous work the action may lead to.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the actor has stopped.
    pub async fn dispatch(&self, action: Action) -> Result<Arc<AppState>, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StoreMessage::Dispatch { action, reply: tx })
            .await
            .map_err(|_| StoreError::StoreGone)?;
        rx.await.map_err(|_| StoreError::StoreGone)
    }

    /// The state as of the latest completed dispatch.
    pub fn get_state(&self) -> Arc<AppState> {
        Arc::clone(&self.latest.borrow())
    }

    /// Register a [`Subscription`] starting at the current state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the actor has stopped.
    pub async fn subscribe(&self) -> Result<Subscription, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StoreMessage::Subscribe { reply: tx })
            .await
            .map_err(|_| StoreError::StoreGone)?;
        rx.await.map_err(|_| StoreError::StoreGone)
    }

    /// Suspend until `predicate` holds for the current or a later state.
    ///
    /// One-shot form of [`Subscription::wait_until`]. To follow several
    /// transitions without missing one in between, subscribe once and
    /// wait on the subscription repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreGone`] if the store shuts down first.
    pub async fn wait_until<P>(&self, predicate: P) -> Result<Arc<AppState>, StoreError>
    where
        P: FnMut(&AppState) -> bool,
    {
        self.subscribe().await?.wait_until(predicate).await
    }

    /// Latest-value stream of states: yields the current state, then the
    /// newest state whenever it changes. Intermediate states may be
    /// skipped; use [`subscribe`](StoreHandle::subscribe) to see them all.
    pub fn changes(&self) -> WatchStream<Arc<AppState>> {
        WatchStream::new(self.latest.clone())
    }

    /// Allocate the id for a new snapshot.
    pub fn next_snapshot_id(&self) -> SnapshotId {
        SnapshotId(self.snapshot_ids.fetch_add(1, Ordering::AcqRel))
    }

    /// Allocate the id for a new worker round trip.
    pub fn next_request_id(&self) -> RequestId {
        RequestId(self.request_ids.fetch_add(1, Ordering::AcqRel))
    }

    /// Whether the actor is still accepting actions.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Stop the actor and wait for it to exit.
    ///
    /// Pending subscriptions end with [`StoreError::StoreGone`]. Calling
    /// `shutdown` more than once is safe.
    pub async fn shutdown(&self) {
        // The actor may already be gone; that is the goal anyway.
        let _ = self.sender.send(StoreMessage::Shutdown).await;

        let task = self.task.lock().await.take();
        if let Some(join_handle) = task
            && let Err(e) = join_handle.await
        {
            tracing::error!(error = %e, "store actor task failed");
        }
    }
}

/// Builder for the store.
///
/// ```no_run
/// # async fn demo() {
/// use heapfold::{StoreBuilder, View};
///
/// let store = StoreBuilder::new()
///     .initial_view(View::Census)
///     .open();
/// assert_eq!(store.get_state().view.current, View::Census);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    queue_capacity: usize,
    catalogs: DisplayCatalogs,
    initial_view: View,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            catalogs: DisplayCatalogs::default(),
            initial_view: View::TreeMap,
        }
    }

    /// Actions that may queue before `dispatch` callers wait.
    ///
    /// Defaults to 64.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// The display catalogs the panel offers.
    ///
    /// Defaults to [`DisplayCatalogs::default()`].
    pub fn catalogs(mut self, catalogs: DisplayCatalogs) -> Self {
        self.catalogs = catalogs;
        self
    }

    /// The view the panel opens on. Defaults to [`View::TreeMap`].
    pub fn initial_view(mut self, view: View) -> Self {
        self.initial_view = view;
        self
    }

    /// Spawn the store actor.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn open(self) -> StoreHandle {
        let initial = Arc::new(AppState::new(self.catalogs, self.initial_view));
        let (published, latest) = watch::channel(Arc::clone(&initial));
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let task = tokio::spawn(run_store(initial, rx, published));

        StoreHandle {
            sender: tx,
            latest,
            snapshot_ids: Arc::new(AtomicU64::new(1)),
            request_ids: Arc::new(AtomicU64::new(1)),
            task: Arc::new(tokio::sync::Mutex::new(Some(task))),
        }
    }
}
