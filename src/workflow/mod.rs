//! Async action sequences that bridge the store to the worker and front.
//!
//! A workflow reads the current state, dispatches a `*Start` action, awaits
//! a round trip to the [`HeapAnalysesClient`](crate::HeapAnalysesClient) or
//! the [`MemoryFront`](crate::MemoryFront), and dispatches the matching
//! `*End` or `*Error` action. Failures are recorded in the state before the
//! workflow returns them, so a caller that drops the error still leaves the
//! panel showing it.
//!
//! Workflows never hold the state across an await; each step re-reads it
//! from the store.

mod allocations;
mod census;
mod diffing;
mod dominator_tree;
mod snapshot;
mod view;

use std::path::PathBuf;

pub use allocations::toggle_recording_allocation_stacks;
pub use census::{
    refresh_selected_census, refresh_selected_tree_map, set_census_display_and_refresh,
    set_filter_string_and_refresh, set_tree_map_display_and_refresh, take_census, take_tree_map,
};
pub use diffing::{refresh_diffing, select_snapshot_for_diffing, take_census_diff, toggle_diffing};
pub use dominator_tree::{
    compute_and_fetch_dominator_tree, fetch_dominator_tree, refresh_selected_dominator_tree,
    set_dominator_tree_display_and_refresh,
};
pub use snapshot::{
    clear_snapshots, compute_snapshot_data, import_snapshot_and_census, read_snapshot,
    select_snapshot_and_refresh, take_snapshot, take_snapshot_and_census,
};
pub use view::{change_view, change_view_and_refresh, refresh};

use crate::error::WorkflowError;
use crate::state::{AppState, SnapshotId, SnapshotModel};

/// Look up a snapshot the caller named explicitly.
fn require_snapshot(state: &AppState, id: SnapshotId) -> Result<&SnapshotModel, WorkflowError> {
    state.snapshot(id).ok_or(WorkflowError::UnknownSnapshot(id))
}

/// The snapshot's path, if it is read and therefore ready for analysis.
///
/// `Ok(None)` means the snapshot exists but is still being saved or read,
/// or failed; analysis waits for it.
fn readable_path(state: &AppState, id: SnapshotId) -> Result<Option<PathBuf>, WorkflowError> {
    let snapshot = require_snapshot(state, id)?;
    if !snapshot.is_read() {
        tracing::debug!(snapshot = %id, state = ?snapshot.state, "snapshot not read yet");
        return Ok(None);
    }
    Ok(snapshot.path.clone())
}
