use std::collections::HashSet;
use std::path::PathBuf;

use crate::action::Action;
use crate::error::WorkflowError;
use crate::front::MemoryFront;
use crate::state::{SnapshotId, View};
use crate::store::StoreHandle;
use crate::worker::HeapAnalysesClient;

use super::{census, dominator_tree, require_snapshot, view};

/// Save a new heap snapshot through the front.
///
/// The new snapshot is selected and starts out `Saving`; it ends `Saved`
/// with the path the front returned, or `Error` if saving failed.
pub async fn take_snapshot(
    store: &StoreHandle,
    front: &dyn MemoryFront,
) -> Result<SnapshotId, WorkflowError> {
    let id = store.next_snapshot_id();
    store
        .dispatch(Action::TakeSnapshotStart { snapshot: id })
        .await?;

    match front.save_heap_snapshot().await {
        Ok(path) => {
            tracing::info!(snapshot = %id, path = %path.display(), "heap snapshot saved");
            store
                .dispatch(Action::TakeSnapshotEnd { snapshot: id, path })
                .await?;
            Ok(id)
        }
        Err(e) => {
            tracing::warn!(snapshot = %id, error = %e, "saving heap snapshot failed");
            store
                .dispatch(Action::SnapshotError {
                    snapshot: id,
                    error: e.to_string(),
                })
                .await?;
            Err(e.into())
        }
    }
}

/// Have the worker read snapshot `id` so it can be analysed.
pub async fn read_snapshot(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    let path = require_snapshot(&state, id)?
        .path
        .clone()
        .ok_or(WorkflowError::UnknownSnapshot(id))?;

    store
        .dispatch(Action::ReadSnapshotStart { snapshot: id })
        .await?;
    match worker.read_heap_snapshot(&path).await {
        Ok(()) => {
            store
                .dispatch(Action::ReadSnapshotEnd { snapshot: id })
                .await?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(snapshot = %id, error = %e, "reading heap snapshot failed");
            store
                .dispatch(Action::SnapshotError {
                    snapshot: id,
                    error: e.to_string(),
                })
                .await?;
            Err(e.into())
        }
    }
}

/// Compute what the active view shows for snapshot `id`.
///
/// Census and diffing views take a census; the tree-map and dominator-tree
/// views take a tree map. The dominator-tree view also computes the
/// dominator tree if the snapshot has none. Does nothing until the snapshot
/// is read.
pub async fn compute_snapshot_data(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    if !require_snapshot(&state, id)?.is_read() {
        return Ok(());
    }

    match state.view.current {
        View::Census | View::Diffing => census::take_census(store, worker, id).await?,
        View::TreeMap | View::DominatorTree => census::take_tree_map(store, worker, id).await?,
    }

    let state = store.get_state();
    let needs_tree = state.view.current == View::DominatorTree
        && state
            .snapshot(id)
            .is_some_and(|s| s.dominator_tree.is_none());
    if needs_tree {
        dominator_tree::compute_and_fetch_dominator_tree(store, worker, id).await?;
    }
    Ok(())
}

/// Save a snapshot, read it, and compute the active view's data for it.
pub async fn take_snapshot_and_census(
    store: &StoreHandle,
    front: &dyn MemoryFront,
    worker: &HeapAnalysesClient,
) -> Result<SnapshotId, WorkflowError> {
    let id = take_snapshot(store, front).await?;
    read_snapshot(store, worker, id).await?;
    compute_snapshot_data(store, worker, id).await?;
    Ok(id)
}

/// Import a snapshot file from disk, read it, and compute the active
/// view's data for it.
pub async fn import_snapshot_and_census(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    path: impl Into<PathBuf>,
) -> Result<SnapshotId, WorkflowError> {
    let path = path.into();
    let id = store.next_snapshot_id();
    tracing::info!(snapshot = %id, path = %path.display(), "importing heap snapshot");
    store
        .dispatch(Action::ImportSnapshotStart { snapshot: id, path })
        .await?;
    read_snapshot(store, worker, id).await?;
    compute_snapshot_data(store, worker, id).await?;
    Ok(id)
}

/// Select snapshot `id` and bring the active view's data for it up to date.
pub async fn select_snapshot_and_refresh(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    require_snapshot(&store.get_state(), id)?;
    store
        .dispatch(Action::SelectSnapshot { snapshot: id })
        .await?;
    view::refresh(store, worker).await
}

/// Remove every settled snapshot and have the worker forget them.
///
/// Snapshots still being saved, read, or analysed are kept, and the worker
/// keeps any file a kept snapshot still uses. Every removed file is
/// forgotten even if one deletion fails; the first failure is returned.
/// Returns the ids that were removed.
pub async fn clear_snapshots(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
) -> Result<Vec<SnapshotId>, WorkflowError> {
    let state = store.get_state();
    let (cleared, kept): (Vec<_>, Vec<_>) = state.snapshots.iter().partition(|s| s.is_settled());
    if cleared.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<SnapshotId> = cleared.iter().map(|s| s.id).collect();
    let kept_paths: HashSet<&PathBuf> = kept.iter().filter_map(|s| s.path.as_ref()).collect();
    let mut paths: Vec<PathBuf> = Vec::new();
    for path in cleared.iter().filter_map(|s| s.path.as_ref()) {
        if !kept_paths.contains(path) && !paths.contains(path) {
            paths.push(path.clone());
        }
    }

    tracing::info!(count = ids.len(), files = paths.len(), "clearing snapshots");
    store
        .dispatch(Action::DeleteSnapshots {
            snapshots: ids.clone(),
        })
        .await?;

    let mut first_error = None;
    for path in &paths {
        if let Err(e) = worker.delete_heap_snapshot(path).await {
            tracing::warn!(path = %path.display(), error = %e, "worker failed to forget snapshot");
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(ids),
    }
}
