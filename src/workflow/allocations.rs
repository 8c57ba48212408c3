use crate::action::Action;
use crate::error::WorkflowError;
use crate::front::MemoryFront;
use crate::store::StoreHandle;

/// Start recording allocation stacks if stopped, stop if recording.
///
/// The toggle is claimed in the store for the duration of the front
/// request. On completion the state records whether the front is actually
/// recording, which on failure is the value it had before. Returns the new
/// recording value. A toggle while another owns the claim does nothing and
/// returns the current value.
pub async fn toggle_recording_allocation_stacks(
    store: &StoreHandle,
    front: &dyn MemoryFront,
) -> Result<bool, WorkflowError> {
    let request = store.next_request_id();
    let state = store
        .dispatch(Action::ToggleRecordAllocationStacksStart { request })
        .await?;
    let allocations = state.allocations;
    if allocations.toggle != Some(request) {
        tracing::debug!(%request, "allocation toggle already in progress");
        return Ok(allocations.recording);
    }

    let start = !allocations.recording;
    let result = if start {
        front.start_recording_allocations().await
    } else {
        front.stop_recording_allocations().await
    };

    let recording = if result.is_ok() { start } else { !start };
    store
        .dispatch(Action::ToggleRecordAllocationStacksEnd { request, recording })
        .await?;
    if let Err(e) = result {
        tracing::warn!(%request, error = %e, "toggling allocation stacks failed");
        return Err(e.into());
    }
    tracing::info!(%request, recording, "allocation stack recording toggled");
    Ok(recording)
}
