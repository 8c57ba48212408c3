//! Crate-level error types for the store, the analysis worker, the memory
//! front, and the workflows that tie them together.

use crate::state::SnapshotId;

/// Error returned when talking to the store actor fails.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store actor has shut down, so no further actions can be
    /// reduced and no further states will be published.
    #[error("store actor is no longer running")]
    StoreGone,
}

/// Error reported by a [`HeapAnalyses`](crate::HeapAnalyses) backend.
///
/// Carried back across the worker thread boundary, so it holds only
/// owned data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The snapshot at this path was never read into the worker.
    #[error("heap snapshot not read: {0}")]
    SnapshotNotRead(String),

    /// The dominator tree id does not name a computed tree.
    #[error("unknown dominator tree: {0}")]
    UnknownDominatorTree(u64),

    /// The backend failed for a reason of its own.
    #[error("analysis failed: {0}")]
    Failed(String),
}

/// Error returned when a request to the heap-analysis worker fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// The analysis itself failed.
    ///
    /// Forwards the backend's `Display` so the message stored in the
    /// state reads the same as the backend's.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Worker thread exited (destroyed, or its channel closed).
    #[error("heap analysis worker is no longer running")]
    WorkerGone,
}

/// Error returned by a [`MemoryFront`](crate::MemoryFront).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontError {
    /// An operation needed an attached front.
    #[error("memory front is not attached")]
    NotAttached,

    /// `attach` was called on a front that is already attached.
    #[error("memory front is already attached")]
    AlreadyAttached,

    /// The debuggee side reported a failure.
    #[error("memory front request failed: {0}")]
    Request(String),
}

/// Error returned when building a display catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Every catalog must offer at least one display.
    #[error("display catalog must not be empty")]
    Empty,

    /// Two displays in one catalog share a name, so lookups by name
    /// would be ambiguous.
    #[error("duplicate display name in catalog: {0}")]
    DuplicateName(String),
}

/// Error returned when a toolbar intent cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolbarError {
    /// The display name is not in the catalog the intent targets.
    #[error("no display named {0:?} in the catalog")]
    UnknownDisplay(String),
}

/// Error returned by a workflow (the async action sequences in
/// [`workflow`](crate::workflow)).
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The store actor is gone.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The heap-analysis worker failed or is gone.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The memory front failed.
    #[error(transparent)]
    Front(#[from] FrontError),

    /// The workflow was asked to act on a snapshot the state no longer
    /// holds.
    #[error("no snapshot with id {0}")]
    UnknownSnapshot(SnapshotId),

    /// The workflow needs diffing to be active.
    #[error("diffing is not active")]
    NotDiffing,
}

/// Error returned by [`MemoryPanel`](crate::MemoryPanel).
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// The toolbar currently has this action disabled or not offered.
    #[error("toolbar action is disabled: {0}")]
    ActionDisabled(&'static str),

    /// The intent named a display the catalog does not hold.
    #[error(transparent)]
    Toolbar(#[from] ToolbarError),

    /// Acquiring or releasing the memory front failed.
    #[error(transparent)]
    Front(#[from] FrontError),

    /// The store actor is gone.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The OS refused to start the worker thread.
    #[error("failed to spawn heap analysis worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_error_forwards_analysis_message() {
        let err = WorkerError::from(AnalysisError::Failed("out of memory".into()));
        assert_eq!(err.to_string(), "analysis failed: out of memory");
    }

    #[test]
    fn worker_gone_display() {
        assert_eq!(
            WorkerError::WorkerGone.to_string(),
            "heap analysis worker is no longer running"
        );
    }

    #[test]
    fn workflow_error_wraps_store_error() {
        let err = WorkflowError::from(StoreError::StoreGone);
        assert!(matches!(err, WorkflowError::Store(StoreError::StoreGone)));
        assert_eq!(err.to_string(), "store actor is no longer running");
    }

    #[test]
    fn workflow_error_unknown_snapshot_names_id() {
        let err = WorkflowError::UnknownSnapshot(SnapshotId(7));
        assert_eq!(err.to_string(), "no snapshot with id 7");
    }

    #[test]
    fn toolbar_error_quotes_display_name() {
        let err = ToolbarError::UnknownDisplay("Nope".into());
        assert_eq!(err.to_string(), "no display named \"Nope\" in the catalog");
    }

    #[test]
    fn panel_error_from_front_error() {
        let err = PanelError::from(FrontError::AlreadyAttached);
        assert_eq!(err.to_string(), "memory front is already attached");
    }

    // Errors cross the worker thread and tokio task boundaries.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<StoreError>();
            assert_send_sync::<WorkerError>();
            assert_send_sync::<FrontError>();
            assert_send_sync::<WorkflowError>();
            assert_send_sync::<PanelError>();
        }
    };
}
