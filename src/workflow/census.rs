use crate::action::Action;
use crate::display::{CensusDisplay, NamedDisplay, TreeMapDisplay};
use crate::error::WorkflowError;
use crate::state::{CensusState, SnapshotId};
use crate::store::StoreHandle;
use crate::worker::HeapAnalysesClient;

use super::{readable_path, view};

/// Take a census of snapshot `id` with the current census display and
/// filter.
///
/// Does nothing if the snapshot is not read yet, or if its census already
/// matches the current display and filter (in flight or saved).
pub async fn take_census(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    let Some(path) = readable_path(&state, id)? else {
        return Ok(());
    };
    if let Some(census) = state.snapshot(id).and_then(|s| s.census.as_ref())
        && census.state != CensusState::Error
        && state.census_is_current(census)
    {
        return Ok(());
    }

    let display = state.census_display.clone();
    let filter = state.filter.clone();
    let display_name = display.display_name();
    let request = store.next_request_id();
    tracing::debug!(
        snapshot = %id,
        %request,
        display = display_name,
        "taking census"
    );
    store
        .dispatch(Action::TakeCensusStart {
            snapshot: id,
            request,
            display: display.clone(),
            filter: filter.clone(),
        })
        .await?;

    match worker
        .take_census(&path, display.breakdown(), filter.as_deref())
        .await
    {
        Ok(report) => {
            let state = store
                .dispatch(Action::TakeCensusEnd {
                    snapshot: id,
                    request,
                    report,
                })
                .await?;
            let superseded = state
                .snapshot(id)
                .and_then(|s| s.census.as_ref())
                .is_none_or(|c| c.request != request);
            if superseded {
                tracing::warn!(snapshot = %id, %request, "discarded superseded census");
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(snapshot = %id, error = %e, "census failed");
            store
                .dispatch(Action::TakeCensusError {
                    snapshot: id,
                    request,
                    error: e.to_string(),
                })
                .await?;
            Err(e.into())
        }
    }
}

/// Take a tree-map census of snapshot `id` with the current tree-map
/// display.
///
/// Does nothing if the snapshot is not read yet, or if its tree map already
/// uses the current display.
pub async fn take_tree_map(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    let Some(path) = readable_path(&state, id)? else {
        return Ok(());
    };
    if let Some(tree_map) = state.snapshot(id).and_then(|s| s.tree_map.as_ref())
        && tree_map.state != CensusState::Error
        && tree_map.display == state.tree_map_display
    {
        return Ok(());
    }

    let display = state.tree_map_display.clone();
    let display_name = display.display_name();
    let request = store.next_request_id();
    tracing::debug!(
        snapshot = %id,
        %request,
        display = display_name,
        "taking tree map"
    );
    store
        .dispatch(Action::TakeTreeMapStart {
            snapshot: id,
            request,
            display: display.clone(),
        })
        .await?;

    match worker.take_census(&path, display.breakdown(), None).await {
        Ok(report) => {
            store
                .dispatch(Action::TakeTreeMapEnd {
                    snapshot: id,
                    request,
                    report,
                })
                .await?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(snapshot = %id, error = %e, "tree map failed");
            store
                .dispatch(Action::TakeTreeMapError {
                    snapshot: id,
                    request,
                    error: e.to_string(),
                })
                .await?;
            Err(e.into())
        }
    }
}

/// Re-take the selected snapshot's census if it is stale.
pub async fn refresh_selected_census(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
) -> Result<(), WorkflowError> {
    match store.get_state().selected_snapshot().map(|s| s.id) {
        Some(id) => take_census(store, worker, id).await,
        None => Ok(()),
    }
}

/// Re-take the selected snapshot's tree map if it is stale.
pub async fn refresh_selected_tree_map(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
) -> Result<(), WorkflowError> {
    match store.get_state().selected_snapshot().map(|s| s.id) {
        Some(id) => take_tree_map(store, worker, id).await,
        None => Ok(()),
    }
}

pub async fn set_census_display_and_refresh(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    display: CensusDisplay,
) -> Result<(), WorkflowError> {
    store.dispatch(Action::SetCensusDisplay(display)).await?;
    view::refresh(store, worker).await
}

pub async fn set_tree_map_display_and_refresh(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    display: TreeMapDisplay,
) -> Result<(), WorkflowError> {
    store.dispatch(Action::SetTreeMapDisplay(display)).await?;
    view::refresh(store, worker).await
}

/// Set the census filter and refresh the active view. An empty string
/// clears the filter.
pub async fn set_filter_string_and_refresh(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    filter: impl Into<String>,
) -> Result<(), WorkflowError> {
    store
        .dispatch(Action::SetFilterString(Some(filter.into())))
        .await?;
    view::refresh(store, worker).await
}
