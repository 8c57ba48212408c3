//! Plain actions: the only input the reducer accepts.
//!
//! Actions are data. Anything asynchronous (saving a snapshot, asking the
//! worker for a census) happens in a [`workflow`](crate::workflow), which
//! dispatches a `*Start` action before the round trip and an `*End` or
//! `*Error` action after it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analyses::{CensusReport, DominatorTreeId, DominatorTreeNode};
use crate::display::{CensusDisplay, DominatorTreeDisplay, TreeMapDisplay};
use crate::state::{RequestId, SnapshotId, View};

/// A state transition request, reduced by [`AppState::apply`](crate::AppState::apply).
///
/// Uses adjacently tagged serialization (`"type"` + `"data"`) so a log of
/// dispatched actions reads as a flat list of named transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Action {
    /// Switch the active view. `View::Diffing` is ignored here; diffing is
    /// entered only through [`Action::ToggleDiffing`].
    ChangeView(View),

    TakeSnapshotStart {
        snapshot: SnapshotId,
    },
    TakeSnapshotEnd {
        snapshot: SnapshotId,
        path: PathBuf,
    },
    ImportSnapshotStart {
        snapshot: SnapshotId,
        path: PathBuf,
    },
    ReadSnapshotStart {
        snapshot: SnapshotId,
    },
    ReadSnapshotEnd {
        snapshot: SnapshotId,
    },
    /// Saving, importing, or reading the snapshot failed.
    SnapshotError {
        snapshot: SnapshotId,
        error: String,
    },
    SelectSnapshot {
        snapshot: SnapshotId,
    },
    DeleteSnapshots {
        snapshots: Vec<SnapshotId>,
    },

    TakeCensusStart {
        snapshot: SnapshotId,
        request: RequestId,
        display: CensusDisplay,
        filter: Option<String>,
    },
    TakeCensusEnd {
        snapshot: SnapshotId,
        request: RequestId,
        report: CensusReport,
    },
    TakeCensusError {
        snapshot: SnapshotId,
        request: RequestId,
        error: String,
    },

    TakeTreeMapStart {
        snapshot: SnapshotId,
        request: RequestId,
        display: TreeMapDisplay,
    },
    TakeTreeMapEnd {
        snapshot: SnapshotId,
        request: RequestId,
        report: CensusReport,
    },
    TakeTreeMapError {
        snapshot: SnapshotId,
        request: RequestId,
        error: String,
    },

    /// Begin (or restart) fetching the snapshot's dominator tree with
    /// `display`. Supersedes any fetch already in flight.
    FetchDominatorTreeStart {
        snapshot: SnapshotId,
        request: RequestId,
        display: DominatorTreeDisplay,
    },
    /// The worker finished computing the tree; fetching continues.
    DominatorTreeComputed {
        snapshot: SnapshotId,
        request: RequestId,
        tree: DominatorTreeId,
    },
    FetchDominatorTreeEnd {
        snapshot: SnapshotId,
        request: RequestId,
        root: DominatorTreeNode,
    },
    DominatorTreeError {
        snapshot: SnapshotId,
        request: RequestId,
        error: String,
    },

    SetCensusDisplay(CensusDisplay),
    SetTreeMapDisplay(TreeMapDisplay),
    SetDominatorTreeDisplay(DominatorTreeDisplay),
    /// Set the census filter. An empty string clears it.
    SetFilterString(Option<String>),

    ToggleDiffing,
    SelectSnapshotForDiffing {
        snapshot: SnapshotId,
    },
    TakeCensusDiffStart {
        first: SnapshotId,
        second: SnapshotId,
        request: RequestId,
        display: CensusDisplay,
        filter: Option<String>,
    },
    TakeCensusDiffEnd {
        request: RequestId,
        report: CensusReport,
    },
    TakeCensusDiffError {
        request: RequestId,
        error: String,
    },

    /// Claims the toggle for `request`; ignored while another toggle owns
    /// it.
    ToggleRecordAllocationStacksStart {
        request: RequestId,
    },
    ToggleRecordAllocationStacksEnd {
        request: RequestId,
        recording: bool,
    },
}

impl Action {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::ChangeView(_) => "change_view",
            Action::TakeSnapshotStart { .. } => "take_snapshot_start",
            Action::TakeSnapshotEnd { .. } => "take_snapshot_end",
            Action::ImportSnapshotStart { .. } => "import_snapshot_start",
            Action::ReadSnapshotStart { .. } => "read_snapshot_start",
            Action::ReadSnapshotEnd { .. } => "read_snapshot_end",
            Action::SnapshotError { .. } => "snapshot_error",
            Action::SelectSnapshot { .. } => "select_snapshot",
            Action::DeleteSnapshots { .. } => "delete_snapshots",
            Action::TakeCensusStart { .. } => "take_census_start",
            Action::TakeCensusEnd { .. } => "take_census_end",
            Action::TakeCensusError { .. } => "take_census_error",
            Action::TakeTreeMapStart { .. } => "take_tree_map_start",
            Action::TakeTreeMapEnd { .. } => "take_tree_map_end",
            Action::TakeTreeMapError { .. } => "take_tree_map_error",
            Action::FetchDominatorTreeStart { .. } => "fetch_dominator_tree_start",
            Action::DominatorTreeComputed { .. } => "dominator_tree_computed",
            Action::FetchDominatorTreeEnd { .. } => "fetch_dominator_tree_end",
            Action::DominatorTreeError { .. } => "dominator_tree_error",
            Action::SetCensusDisplay(_) => "set_census_display",
            Action::SetTreeMapDisplay(_) => "set_tree_map_display",
            Action::SetDominatorTreeDisplay(_) => "set_dominator_tree_display",
            Action::SetFilterString(_) => "set_filter_string",
            Action::ToggleDiffing => "toggle_diffing",
            Action::SelectSnapshotForDiffing { .. } => "select_snapshot_for_diffing",
            Action::TakeCensusDiffStart { .. } => "take_census_diff_start",
            Action::TakeCensusDiffEnd { .. } => "take_census_diff_end",
            Action::TakeCensusDiffError { .. } => "take_census_diff_error",
            Action::ToggleRecordAllocationStacksStart { .. } => "toggle_record_allocation_stacks_start",
            Action::ToggleRecordAllocationStacksEnd { .. } => "toggle_record_allocation_stacks_end",
        }
    }
}
