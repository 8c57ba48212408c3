use crate::action::Action;
use crate::display::{DominatorTreeDisplay, NamedDisplay};
use crate::error::{WorkerError, WorkflowError};
use crate::state::{RequestId, SnapshotId, View};
use crate::store::StoreHandle;
use crate::worker::HeapAnalysesClient;

use super::{readable_path, require_snapshot};

/// Compute snapshot `id`'s dominator tree in the worker, then fetch its
/// top with the current dominator-tree display.
///
/// Does nothing if the snapshot is not read yet, or if the dominator-tree
/// view is not active.
pub async fn compute_and_fetch_dominator_tree(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    let Some(path) = readable_path(&state, id)? else {
        return Ok(());
    };
    if state.view.current != View::DominatorTree {
        tracing::debug!(snapshot = %id, view = ?state.view.current, "dominator tree view not active");
        return Ok(());
    }

    let display = state.dominator_tree_display.clone();
    let display_name = display.display_name();
    let request = store.next_request_id();
    tracing::debug!(
        snapshot = %id,
        %request,
        display = display_name,
        "computing dominator tree"
    );
    store
        .dispatch(Action::FetchDominatorTreeStart {
            snapshot: id,
            request,
            display: display.clone(),
        })
        .await?;

    let tree = match worker.compute_dominator_tree(&path).await {
        Ok(tree) => tree,
        Err(e) => return fail(store, id, request, e).await,
    };
    store
        .dispatch(Action::DominatorTreeComputed {
            snapshot: id,
            request,
            tree,
        })
        .await?;

    match worker.get_dominator_tree(tree, display.breakdown()).await {
        Ok(root) => finish(store, id, request, root).await,
        Err(e) => fail(store, id, request, e).await,
    }
}

/// Fetch snapshot `id`'s dominator tree with the current dominator-tree
/// display, superseding any fetch in flight.
///
/// Reuses the computed tree when there is one; otherwise computes it
/// first.
pub async fn fetch_dominator_tree(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    let snapshot = require_snapshot(&state, id)?;
    let Some(tree) = snapshot.dominator_tree.as_ref().and_then(|d| d.tree) else {
        return compute_and_fetch_dominator_tree(store, worker, id).await;
    };

    let display = state.dominator_tree_display.clone();
    let display_name = display.display_name();
    let request = store.next_request_id();
    tracing::debug!(
        snapshot = %id,
        %request,
        display = display_name,
        "fetching dominator tree"
    );
    store
        .dispatch(Action::FetchDominatorTreeStart {
            snapshot: id,
            request,
            display: display.clone(),
        })
        .await?;

    match worker.get_dominator_tree(tree, display.breakdown()).await {
        Ok(root) => finish(store, id, request, root).await,
        Err(e) => fail(store, id, request, e).await,
    }
}

/// Re-fetch the selected snapshot's dominator tree with the current
/// display, computing it first if needed.
///
/// Does nothing outside the dominator-tree view; the new display is picked
/// up when that view is entered.
pub async fn refresh_selected_dominator_tree(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    if state.view.current != View::DominatorTree {
        return Ok(());
    }
    let selected = state
        .selected_snapshot()
        .filter(|s| s.is_read())
        .map(|s| s.id);
    match selected {
        Some(id) => fetch_dominator_tree(store, worker, id).await,
        None => Ok(()),
    }
}

/// Select `display` for dominator trees and re-fetch the selected
/// snapshot's tree with it.
///
/// Selecting the display that is already active still re-fetches. Outside
/// the dominator-tree view only the selection changes.
pub async fn set_dominator_tree_display_and_refresh(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    display: DominatorTreeDisplay,
) -> Result<(), WorkflowError> {
    store
        .dispatch(Action::SetDominatorTreeDisplay(display))
        .await?;
    refresh_selected_dominator_tree(store, worker).await
}

async fn finish(
    store: &StoreHandle,
    id: SnapshotId,
    request: RequestId,
    root: crate::analyses::DominatorTreeNode,
) -> Result<(), WorkflowError> {
    let state = store
        .dispatch(Action::FetchDominatorTreeEnd {
            snapshot: id,
            request,
            root,
        })
        .await?;
    let superseded = state
        .snapshot(id)
        .and_then(|s| s.dominator_tree.as_ref())
        .is_none_or(|d| d.request != request);
    if superseded {
        tracing::warn!(snapshot = %id, %request, "discarded superseded dominator tree");
    }
    Ok(())
}

async fn fail(
    store: &StoreHandle,
    id: SnapshotId,
    request: RequestId,
    error: WorkerError,
) -> Result<(), WorkflowError> {
    tracing::warn!(snapshot = %id, error = %error, "dominator tree failed");
    store
        .dispatch(Action::DominatorTreeError {
            snapshot: id,
            request,
            error: error.to_string(),
        })
        .await?;
    Err(error.into())
}
