use std::sync::Arc;

use crate::action::Action;
use crate::display::NamedDisplay;
use crate::error::WorkflowError;
use crate::state::{AppState, CensusState, SnapshotId};
use crate::store::StoreHandle;
use crate::worker::HeapAnalysesClient;

use super::require_snapshot;

/// Enter diffing (needs two snapshots) or leave it, returning to the view
/// that was active before.
pub async fn toggle_diffing(store: &StoreHandle) -> Result<Arc<AppState>, WorkflowError> {
    Ok(store.dispatch(Action::ToggleDiffing).await?)
}

/// Pick snapshot `id` for the comparison. Once two are picked, takes the
/// census diff.
///
/// # Errors
///
/// * [`WorkflowError::NotDiffing`] -- diffing is not active.
/// * [`WorkflowError::UnknownSnapshot`] -- no snapshot has this id.
pub async fn select_snapshot_for_diffing(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    id: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    if state.diffing.is_none() {
        return Err(WorkflowError::NotDiffing);
    }
    require_snapshot(&state, id)?;

    let state = store
        .dispatch(Action::SelectSnapshotForDiffing { snapshot: id })
        .await?;
    match state.diffing.as_ref().and_then(|d| d.pair()) {
        Some((first, second)) => take_census_diff(store, worker, first, second).await,
        None => Ok(()),
    }
}

/// Take a census of what changed between `first` and `second`, with the
/// current census display and filter.
pub async fn take_census_diff(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    first: SnapshotId,
    second: SnapshotId,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    if state.diffing.is_none() {
        return Err(WorkflowError::NotDiffing);
    }
    let first_path = require_snapshot(&state, first)?
        .path
        .clone()
        .ok_or(WorkflowError::UnknownSnapshot(first))?;
    let second_path = require_snapshot(&state, second)?
        .path
        .clone()
        .ok_or(WorkflowError::UnknownSnapshot(second))?;

    let display = state.census_display.clone();
    let filter = state.filter.clone();
    let display_name = display.display_name();
    let request = store.next_request_id();
    tracing::debug!(
        %first,
        %second,
        %request,
        display = display_name,
        "taking census diff"
    );
    store
        .dispatch(Action::TakeCensusDiffStart {
            first,
            second,
            request,
            display: display.clone(),
            filter: filter.clone(),
        })
        .await?;

    match worker
        .take_census_diff(&first_path, &second_path, display.breakdown(), filter.as_deref())
        .await
    {
        Ok(report) => {
            store
                .dispatch(Action::TakeCensusDiffEnd { request, report })
                .await?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(%first, %second, error = %e, "census diff failed");
            store
                .dispatch(Action::TakeCensusDiffError {
                    request,
                    error: e.to_string(),
                })
                .await?;
            Err(e.into())
        }
    }
}

/// Re-take the census diff if both snapshots are picked and the diff does
/// not match the current census display and filter.
pub async fn refresh_diffing(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
) -> Result<(), WorkflowError> {
    let state = store.get_state();
    let Some(diffing) = state.diffing.as_ref() else {
        return Ok(());
    };
    let Some((first, second)) = diffing.pair() else {
        return Ok(());
    };
    let current = diffing
        .census
        .as_ref()
        .is_some_and(|c| c.state != CensusState::Error && state.census_is_current(c));
    if current {
        return Ok(());
    }
    take_census_diff(store, worker, first, second).await
}
