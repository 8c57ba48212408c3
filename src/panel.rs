//! The memory panel: store, worker, and front as one scoped resource.
//!
//! [`MemoryPanelBuilder::open`] attaches the front, spawns the worker
//! thread, and opens the store. [`MemoryPanel::perform`] checks a toolbar
//! intent against the rendered toolbar and spawns the matching workflow.
//! [`MemoryPanel::shutdown`] releases everything in reverse order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::analyses::HeapAnalyses;
use crate::error::{PanelError, WorkflowError};
use crate::front::MemoryFront;
use crate::store::{StoreBuilder, StoreHandle};
use crate::toolbar::{Toolbar, ToolbarAction, ToolbarModel, resolve_display};
use crate::worker::{HeapAnalysesClient, WorkerConfig};
use crate::workflow;

type Job = Pin<Box<dyn Future<Output = Result<(), WorkflowError>> + Send>>;

/// A running panel.
///
/// Call [`shutdown`](MemoryPanel::shutdown) when done; dropping the panel
/// without it leaves the front attached.
pub struct MemoryPanel {
    store: StoreHandle,
    worker: HeapAnalysesClient,
    front: Arc<dyn MemoryFront>,
    closed: AtomicBool,
}

impl std::fmt::Debug for MemoryPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPanel")
            .field("store", &self.store)
            .field("worker", &self.worker)
            .field("front_attached", &self.front.is_attached())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl MemoryPanel {
    pub fn builder() -> MemoryPanelBuilder {
        MemoryPanelBuilder::new()
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn worker(&self) -> &HeapAnalysesClient {
        &self.worker
    }

    pub fn front(&self) -> &Arc<dyn MemoryFront> {
        &self.front
    }

    /// The toolbar for the current state.
    pub fn toolbar(&self) -> ToolbarModel {
        Toolbar::render_state(&self.store.get_state())
    }

    /// Run the workflow behind a toolbar intent.
    ///
    /// The intent is checked against the toolbar rendered from the current
    /// state, and display names are resolved, before anything is
    /// dispatched. The workflow itself runs on its own task; a failure is
    /// logged and recorded in the state. The returned handle completes
    /// when the workflow does.
    ///
    /// # Errors
    ///
    /// * [`PanelError::ActionDisabled`] -- the toolbar does not offer the
    ///   intent right now.
    /// * [`PanelError::Toolbar`] -- a display name is not in its catalog.
    pub fn perform(&self, action: ToolbarAction) -> Result<JoinHandle<()>, PanelError> {
        let state = self.store.get_state();
        let kind = action.kind();
        if !Toolbar::render_state(&state).allows(&action) {
            return Err(PanelError::ActionDisabled(kind));
        }

        let store = self.store.clone();
        let worker = self.worker.clone();
        let front = Arc::clone(&self.front);

        let job: Job = match action {
            ToolbarAction::TakeSnapshot => Box::pin(async move {
                workflow::take_snapshot_and_census(&store, &*front, &worker)
                    .await
                    .map(drop)
            }),
            ToolbarAction::ImportSnapshot(path) => Box::pin(async move {
                workflow::import_snapshot_and_census(&store, &worker, path)
                    .await
                    .map(drop)
            }),
            ToolbarAction::ClearSnapshots => Box::pin(async move {
                workflow::clear_snapshots(&store, &worker).await.map(drop)
            }),
            ToolbarAction::ToggleDiffing => {
                Box::pin(async move { workflow::toggle_diffing(&store).await.map(drop) })
            }
            ToolbarAction::ToggleRecordAllocationStacks => Box::pin(async move {
                workflow::toggle_recording_allocation_stacks(&store, &*front)
                    .await
                    .map(drop)
            }),
            ToolbarAction::ChangeView(view) => Box::pin(async move {
                workflow::change_view_and_refresh(&store, &worker, view).await
            }),
            ToolbarAction::ChangeCensusDisplay(name) => {
                let display = resolve_display(&state.catalogs.census, &name)?;
                Box::pin(async move {
                    workflow::set_census_display_and_refresh(&store, &worker, display).await
                })
            }
            ToolbarAction::ChangeTreeMapDisplay(name) => {
                let display = resolve_display(&state.catalogs.tree_map, &name)?;
                Box::pin(async move {
                    workflow::set_tree_map_display_and_refresh(&store, &worker, display).await
                })
            }
            ToolbarAction::ChangeDominatorTreeDisplay(name) => {
                let display = resolve_display(&state.catalogs.dominator_tree, &name)?;
                Box::pin(async move {
                    workflow::set_dominator_tree_display_and_refresh(&store, &worker, display)
                        .await
                })
            }
            ToolbarAction::SetFilterString(filter) => Box::pin(async move {
                workflow::set_filter_string_and_refresh(&store, &worker, filter).await
            }),
        };

        tracing::debug!(action = kind, "performing toolbar action");
        Ok(tokio::spawn(async move {
            if let Err(e) = job.await {
                tracing::error!(action = kind, error = %e, "toolbar workflow failed");
            }
        }))
    }

    /// Destroy the worker, detach the front, and stop the store.
    ///
    /// Every step runs even if an earlier one fails. Calling `shutdown`
    /// again does nothing.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.worker.destroy();
        if self.front.is_attached()
            && let Err(e) = self.front.detach().await
        {
            tracing::error!(error = %e, "failed to detach memory front");
        }
        self.store.shutdown().await;
        tracing::info!("memory panel shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Builder for [`MemoryPanel`].
///
/// ```no_run
/// # async fn demo() -> Result<(), heapfold::PanelError> {
/// use heapfold::{MemoryPanel, StubAnalyses, StubbedMemoryFront, View};
///
/// let panel = MemoryPanel::builder()
///     .store(heapfold::StoreBuilder::new().initial_view(View::DominatorTree))
///     .open(StubbedMemoryFront::new(), StubAnalyses::default())
///     .await?;
/// panel.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryPanelBuilder {
    store: StoreBuilder,
    worker: WorkerConfig,
}

impl MemoryPanelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store configuration. Defaults to [`StoreBuilder::new()`].
    pub fn store(mut self, store: StoreBuilder) -> Self {
        self.store = store;
        self
    }

    /// Worker configuration. Defaults to [`WorkerConfig::default()`].
    pub fn worker(mut self, config: WorkerConfig) -> Self {
        self.worker = config;
        self
    }

    /// Attach `front`, spawn a worker owning `analyses`, and open the
    /// store.
    ///
    /// If the worker cannot be spawned the front is detached again before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// * [`PanelError::Front`] -- attaching the front failed.
    /// * [`PanelError::WorkerSpawn`] -- the worker thread could not start.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub async fn open<F, H>(self, front: F, analyses: H) -> Result<MemoryPanel, PanelError>
    where
        F: MemoryFront,
        H: HeapAnalyses,
    {
        let front: Arc<dyn MemoryFront> = Arc::new(front);
        front.attach().await?;

        let worker = match HeapAnalysesClient::spawn_with_config(analyses, self.worker) {
            Ok(worker) => worker,
            Err(e) => {
                if let Err(detach) = front.detach().await {
                    tracing::error!(error = %detach, "failed to detach memory front");
                }
                return Err(e.into());
            }
        };

        let store = self.store.open();
        tracing::info!("memory panel opened");
        Ok(MemoryPanel {
            store,
            worker,
            front,
            closed: AtomicBool::new(false),
        })
    }
}
