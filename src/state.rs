//! Application state and the reducer that folds actions into it.
//!
//! The state is a plain value. [`AppState::apply`] is the only way it
//! changes: a pure, total function from the current state and an action to
//! the next state. Actions that do not fit the current state (a completion
//! for a superseded request, a fetch for a snapshot that is not read yet)
//! leave the state unchanged.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::analyses::{CensusReport, DominatorTreeId, DominatorTreeNode};
use crate::display::{CensusDisplay, DisplayCatalogs, DominatorTreeDisplay, TreeMapDisplay};

/// Identifies one snapshot in the panel. Allocated by the store, monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tags one worker round trip. Allocated by the store, monotonic, so a
/// later request always compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The panel's main view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    TreeMap,
    Census,
    DominatorTree,
    /// Comparing two snapshots' censuses. Entered only by toggling diffing.
    Diffing,
}

impl View {
    /// The views the general view selector offers.
    pub const SELECTABLE: [View; 3] = [View::TreeMap, View::Census, View::DominatorTree];
}

/// The active view and the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub current: View,
    pub previous: Option<View>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    Saving,
    Importing,
    Saved,
    Reading,
    Read,
    Error,
}

/// Lifecycle shared by censuses, tree maps, and census diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CensusState {
    Saving,
    Saved,
    Error,
}

/// A census (or census diff) of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusModel {
    pub state: CensusState,
    pub display: CensusDisplay,
    pub filter: Option<String>,
    pub request: RequestId,
    pub report: Option<CensusReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMapModel {
    pub state: CensusState,
    pub display: TreeMapDisplay,
    pub request: RequestId,
    pub report: Option<CensusReport>,
    pub error: Option<String>,
}

/// Lifecycle of a dominator tree once it exists. Absence is `None` on the
/// owning [`SnapshotModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DominatorTreeState {
    Fetching,
    Loaded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominatorTreeModel {
    pub state: DominatorTreeState,
    /// Display the latest fetch was started with.
    pub display: DominatorTreeDisplay,
    /// The latest fetch; completions for other requests are discarded.
    pub request: RequestId,
    /// Worker-side handle, set once the tree has been computed.
    pub tree: Option<DominatorTreeId>,
    pub root: Option<DominatorTreeNode>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotModel {
    pub id: SnapshotId,
    pub state: SnapshotState,
    pub path: Option<PathBuf>,
    pub imported: bool,
    pub selected: bool,
    pub census: Option<CensusModel>,
    pub tree_map: Option<TreeMapModel>,
    pub dominator_tree: Option<DominatorTreeModel>,
    pub error: Option<String>,
}

impl SnapshotModel {
    fn new(id: SnapshotId, state: SnapshotState) -> Self {
        Self {
            id,
            state,
            path: None,
            imported: false,
            selected: true,
            census: None,
            tree_map: None,
            dominator_tree: None,
            error: None,
        }
    }

    /// Whether the worker has read this snapshot and can analyse it.
    pub fn is_read(&self) -> bool {
        self.state == SnapshotState::Read
    }

    /// Whether nothing is in flight for this snapshot, so it can be
    /// cleared without orphaning a worker request.
    pub fn is_settled(&self) -> bool {
        let snapshot_done = matches!(self.state, SnapshotState::Read | SnapshotState::Error);
        let census_done = self
            .census
            .as_ref()
            .is_none_or(|c| c.state != CensusState::Saving);
        let tree_map_done = self
            .tree_map
            .as_ref()
            .is_none_or(|t| t.state != CensusState::Saving);
        let dominator_done = self
            .dominator_tree
            .as_ref()
            .is_none_or(|d| d.state != DominatorTreeState::Fetching);
        snapshot_done && census_done && tree_map_done && dominator_done
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationsModel {
    pub recording: bool,
    /// The start/stop request that owns the toggle; the toggle is disabled
    /// until it clears.
    pub toggle: Option<RequestId>,
}

impl AllocationsModel {
    pub fn toggling_in_progress(&self) -> bool {
        self.toggle.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffingState {
    Selecting,
    TakingDiff,
    TookDiff,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffingModel {
    pub first: Option<SnapshotId>,
    pub second: Option<SnapshotId>,
    pub state: DiffingState,
    pub census: Option<CensusModel>,
    pub error: Option<String>,
}

impl DiffingModel {
    fn selecting() -> Self {
        Self {
            first: None,
            second: None,
            state: DiffingState::Selecting,
            census: None,
            error: None,
        }
    }

    /// Both snapshots, once the second has been chosen.
    pub fn pair(&self) -> Option<(SnapshotId, SnapshotId)> {
        self.first.zip(self.second)
    }
}

/// Everything the panel shows, owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub view: ViewState,
    pub snapshots: Vec<SnapshotModel>,
    pub allocations: AllocationsModel,
    pub diffing: Option<DiffingModel>,
    pub filter: Option<String>,
    pub catalogs: DisplayCatalogs,
    pub census_display: CensusDisplay,
    pub tree_map_display: TreeMapDisplay,
    pub dominator_tree_display: DominatorTreeDisplay,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DisplayCatalogs::default(), View::TreeMap)
    }
}

impl AppState {
    /// Fresh state with each view on its catalog's default display.
    ///
    /// `View::Diffing` is not a valid starting view and falls back to
    /// `View::Census`.
    pub fn new(catalogs: DisplayCatalogs, initial_view: View) -> Self {
        let current = if initial_view == View::Diffing {
            View::Census
        } else {
            initial_view
        };
        Self {
            view: ViewState {
                current,
                previous: None,
            },
            snapshots: Vec::new(),
            allocations: AllocationsModel::default(),
            diffing: None,
            filter: None,
            census_display: catalogs.census.default_display().clone(),
            tree_map_display: catalogs.tree_map.default_display().clone(),
            dominator_tree_display: catalogs.dominator_tree.default_display().clone(),
            catalogs,
        }
    }

    pub fn snapshot(&self, id: SnapshotId) -> Option<&SnapshotModel> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn selected_snapshot(&self) -> Option<&SnapshotModel> {
        self.snapshots.iter().find(|s| s.selected)
    }

    fn snapshot_mut(&mut self, id: SnapshotId) -> Option<&mut SnapshotModel> {
        self.snapshots.iter_mut().find(|s| s.id == id)
    }

    fn select_only(&mut self, id: Option<SnapshotId>) {
        for snapshot in &mut self.snapshots {
            snapshot.selected = Some(snapshot.id) == id;
        }
    }

    fn set_view(&mut self, view: View) {
        if self.view.current == view {
            return;
        }
        self.view.previous = Some(self.view.current);
        self.view.current = view;
        if view != View::Diffing {
            self.diffing = None;
        }
    }

    /// Apply a single action to produce the next state.
    ///
    /// Pure and total: never panics, never performs I/O. Actions that
    /// reference unknown snapshots or superseded requests are ignored.
    pub fn apply(mut self, action: &Action) -> Self {
        match action {
            Action::ChangeView(view) => {
                if *view != View::Diffing {
                    self.set_view(*view);
                }
            }

            Action::TakeSnapshotStart { snapshot } => {
                self.select_only(None);
                self.snapshots
                    .push(SnapshotModel::new(*snapshot, SnapshotState::Saving));
            }
            Action::TakeSnapshotEnd { snapshot, path } => {
                if let Some(s) = self.snapshot_mut(*snapshot)
                    && s.state == SnapshotState::Saving
                {
                    s.state = SnapshotState::Saved;
                    s.path = Some(path.clone());
                }
            }
            Action::ImportSnapshotStart { snapshot, path } => {
                self.select_only(None);
                let mut model = SnapshotModel::new(*snapshot, SnapshotState::Importing);
                model.path = Some(path.clone());
                model.imported = true;
                self.snapshots.push(model);
            }
            Action::ReadSnapshotStart { snapshot } => {
                if let Some(s) = self.snapshot_mut(*snapshot)
                    && matches!(s.state, SnapshotState::Saved | SnapshotState::Importing)
                {
                    s.state = SnapshotState::Reading;
                }
            }
            Action::ReadSnapshotEnd { snapshot } => {
                if let Some(s) = self.snapshot_mut(*snapshot)
                    && s.state == SnapshotState::Reading
                {
                    s.state = SnapshotState::Read;
                }
            }
            Action::SnapshotError { snapshot, error } => {
                if let Some(s) = self.snapshot_mut(*snapshot) {
                    s.state = SnapshotState::Error;
                    s.error = Some(error.clone());
                }
            }
            Action::SelectSnapshot { snapshot } => {
                if self.snapshot(*snapshot).is_some() {
                    self.select_only(Some(*snapshot));
                }
            }
            Action::DeleteSnapshots { snapshots } => {
                self.snapshots.retain(|s| !snapshots.contains(&s.id));
                let diff_lost = self.diffing.as_ref().is_some_and(|d| {
                    [d.first, d.second]
                        .iter()
                        .flatten()
                        .any(|id| snapshots.contains(id))
                });
                if diff_lost {
                    let back = self.view.previous.unwrap_or(View::Census);
                    self.set_view(back);
                    self.diffing = None;
                }
            }

            Action::TakeCensusStart {
                snapshot,
                request,
                display,
                filter,
            } => {
                if let Some(s) = self.snapshot_mut(*snapshot)
                    && s.is_read()
                {
                    s.census = Some(CensusModel {
                        state: CensusState::Saving,
                        display: display.clone(),
                        filter: filter.clone(),
                        request: *request,
                        report: None,
                        error: None,
                    });
                }
            }
            Action::TakeCensusEnd {
                snapshot,
                request,
                report,
            } => {
                if let Some(census) = self.current_census(*snapshot, *request) {
                    census.state = CensusState::Saved;
                    census.report = Some(report.clone());
                }
            }
            Action::TakeCensusError {
                snapshot,
                request,
                error,
            } => {
                if let Some(census) = self.current_census(*snapshot, *request) {
                    census.state = CensusState::Error;
                    census.error = Some(error.clone());
                }
            }

            Action::TakeTreeMapStart {
                snapshot,
                request,
                display,
            } => {
                if let Some(s) = self.snapshot_mut(*snapshot)
                    && s.is_read()
                {
                    s.tree_map = Some(TreeMapModel {
                        state: CensusState::Saving,
                        display: display.clone(),
                        request: *request,
                        report: None,
                        error: None,
                    });
                }
            }
            Action::TakeTreeMapEnd {
                snapshot,
                request,
                report,
            } => {
                if let Some(tree_map) = self.current_tree_map(*snapshot, *request) {
                    tree_map.state = CensusState::Saved;
                    tree_map.report = Some(report.clone());
                }
            }
            Action::TakeTreeMapError {
                snapshot,
                request,
                error,
            } => {
                if let Some(tree_map) = self.current_tree_map(*snapshot, *request) {
                    tree_map.state = CensusState::Error;
                    tree_map.error = Some(error.clone());
                }
            }

            Action::FetchDominatorTreeStart {
                snapshot,
                request,
                display,
            } => {
                if let Some(s) = self.snapshot_mut(*snapshot)
                    && s.is_read()
                {
                    let tree = s.dominator_tree.as_ref().and_then(|d| d.tree);
                    s.dominator_tree = Some(DominatorTreeModel {
                        state: DominatorTreeState::Fetching,
                        display: display.clone(),
                        request: *request,
                        tree,
                        root: None,
                        error: None,
                    });
                }
            }
            Action::DominatorTreeComputed {
                snapshot,
                request,
                tree,
            } => {
                if let Some(model) = self.current_dominator_tree(*snapshot, *request) {
                    model.tree = Some(*tree);
                }
            }
            Action::FetchDominatorTreeEnd {
                snapshot,
                request,
                root,
            } => {
                if let Some(model) = self.current_dominator_tree(*snapshot, *request) {
                    model.state = DominatorTreeState::Loaded;
                    model.root = Some(root.clone());
                }
            }
            Action::DominatorTreeError {
                snapshot,
                request,
                error,
            } => {
                if let Some(model) = self.current_dominator_tree(*snapshot, *request) {
                    model.state = DominatorTreeState::Error;
                    model.error = Some(error.clone());
                }
            }

            Action::SetCensusDisplay(display) => {
                if self.catalogs.census.contains(display) {
                    self.census_display = display.clone();
                }
            }
            Action::SetTreeMapDisplay(display) => {
                if self.catalogs.tree_map.contains(display) {
                    self.tree_map_display = display.clone();
                }
            }
            Action::SetDominatorTreeDisplay(display) => {
                if self.catalogs.dominator_tree.contains(display) {
                    self.dominator_tree_display = display.clone();
                }
            }
            Action::SetFilterString(filter) => {
                self.filter = filter.clone().filter(|f| !f.is_empty());
            }

            Action::ToggleDiffing => {
                if self.diffing.is_some() {
                    let back = self.view.previous.unwrap_or(View::Census);
                    self.set_view(back);
                    self.diffing = None;
                } else if self.snapshots.len() >= 2 {
                    self.set_view(View::Diffing);
                    self.diffing = Some(DiffingModel::selecting());
                }
            }
            Action::SelectSnapshotForDiffing { snapshot } => {
                let readable = self.snapshot(*snapshot).is_some_and(SnapshotModel::is_read);
                if let Some(diffing) = self.diffing.as_mut()
                    && readable
                {
                    match (diffing.first, diffing.second) {
                        (None, _) => diffing.first = Some(*snapshot),
                        (Some(first), None) if first != *snapshot => {
                            diffing.second = Some(*snapshot);
                        }
                        (Some(_), None) => {}
                        (Some(_), Some(_)) => {
                            *diffing = DiffingModel::selecting();
                            diffing.first = Some(*snapshot);
                        }
                    }
                }
            }
            Action::TakeCensusDiffStart {
                first,
                second,
                request,
                display,
                filter,
            } => {
                if let Some(diffing) = self.diffing.as_mut()
                    && diffing.pair() == Some((*first, *second))
                {
                    diffing.state = DiffingState::TakingDiff;
                    diffing.error = None;
                    diffing.census = Some(CensusModel {
                        state: CensusState::Saving,
                        display: display.clone(),
                        filter: filter.clone(),
                        request: *request,
                        report: None,
                        error: None,
                    });
                }
            }
            Action::TakeCensusDiffEnd { request, report } => {
                if let Some(diffing) = self.current_diff(*request) {
                    diffing.state = DiffingState::TookDiff;
                    if let Some(census) = diffing.census.as_mut() {
                        census.state = CensusState::Saved;
                        census.report = Some(report.clone());
                    }
                }
            }
            Action::TakeCensusDiffError { request, error } => {
                if let Some(diffing) = self.current_diff(*request) {
                    diffing.state = DiffingState::Error;
                    diffing.error = Some(error.clone());
                    if let Some(census) = diffing.census.as_mut() {
                        census.state = CensusState::Error;
                        census.error = Some(error.clone());
                    }
                }
            }

            Action::ToggleRecordAllocationStacksStart { request } => {
                if self.allocations.toggle.is_none() {
                    self.allocations.toggle = Some(*request);
                }
            }
            Action::ToggleRecordAllocationStacksEnd { request, recording } => {
                if self.allocations.toggle == Some(*request) {
                    self.allocations.toggle = None;
                    self.allocations.recording = *recording;
                }
            }
        }
        self
    }

    fn current_census(&mut self, id: SnapshotId, request: RequestId) -> Option<&mut CensusModel> {
        self.snapshot_mut(id)?
            .census
            .as_mut()
            .filter(|c| c.request == request)
    }

    fn current_tree_map(
        &mut self,
        id: SnapshotId,
        request: RequestId,
    ) -> Option<&mut TreeMapModel> {
        self.snapshot_mut(id)?
            .tree_map
            .as_mut()
            .filter(|t| t.request == request)
    }

    fn current_dominator_tree(
        &mut self,
        id: SnapshotId,
        request: RequestId,
    ) -> Option<&mut DominatorTreeModel> {
        self.snapshot_mut(id)?
            .dominator_tree
            .as_mut()
            .filter(|d| d.request == request)
    }

    fn current_diff(&mut self, request: RequestId) -> Option<&mut DiffingModel> {
        self.diffing.as_mut().filter(|d| {
            d.census
                .as_ref()
                .is_some_and(|c| c.request == request)
        })
    }

    /// Whether the selected census already reflects the current display
    /// and filter.
    pub(crate) fn census_is_current(&self, census: &CensusModel) -> bool {
        census.display == self.census_display && census.filter == self.filter
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::{fold, read_snapshot, report, root, with_read_snapshots};
    use super::*;

    #[test]
    fn default_state_uses_catalog_defaults() {
        let state = AppState::default();
        assert_eq!(state.view.current, View::TreeMap);
        assert_eq!(
            state.dominator_tree_display,
            DominatorTreeDisplay::coarse_type()
        );
        assert_eq!(state.census_display, CensusDisplay::coarse_type());
        assert!(state.snapshots.is_empty());
    }

    #[test]
    fn diffing_is_not_a_valid_initial_view() {
        let state = AppState::new(DisplayCatalogs::default(), View::Diffing);
        assert_eq!(state.view.current, View::Census);
    }

    #[test]
    fn change_view_records_previous() {
        let state = fold(&[Action::ChangeView(View::DominatorTree)]);
        assert_eq!(state.view.current, View::DominatorTree);
        assert_eq!(state.view.previous, Some(View::TreeMap));
    }

    #[test]
    fn change_view_to_diffing_is_ignored() {
        let state = with_read_snapshots(2).apply(&Action::ChangeView(View::Diffing));
        assert_eq!(state.view.current, View::TreeMap);
        assert!(state.diffing.is_none());
    }

    #[test]
    fn snapshot_lifecycle_and_selection() {
        let state = fold(&read_snapshot(1));
        let snapshot = state.snapshot(SnapshotId(1)).unwrap();
        assert_eq!(snapshot.state, SnapshotState::Read);
        assert!(snapshot.selected);
        assert!(snapshot.path.is_some());

        let state = state.apply(&Action::TakeSnapshotStart {
            snapshot: SnapshotId(2),
        });
        assert!(!state.snapshot(SnapshotId(1)).unwrap().selected);
        assert_eq!(state.selected_snapshot().unwrap().id, SnapshotId(2));
    }

    #[test]
    fn import_goes_through_reading() {
        let snapshot = SnapshotId(5);
        let state = fold(&[
            Action::ImportSnapshotStart {
                snapshot,
                path: PathBuf::from("/tmp/imported.fxsnapshot"),
            },
            Action::ReadSnapshotStart { snapshot },
        ]);
        let model = state.snapshot(snapshot).unwrap();
        assert!(model.imported);
        assert_eq!(model.state, SnapshotState::Reading);
    }

    #[test]
    fn snapshot_error_is_terminal_state() {
        let snapshot = SnapshotId(1);
        let state = fold(&[
            Action::TakeSnapshotStart { snapshot },
            Action::SnapshotError {
                snapshot,
                error: "boom".into(),
            },
        ]);
        let model = state.snapshot(snapshot).unwrap();
        assert_eq!(model.state, SnapshotState::Error);
        assert_eq!(model.error.as_deref(), Some("boom"));
        assert!(model.is_settled());
    }

    #[test]
    fn dominator_tree_not_fetched_before_read() {
        let snapshot = SnapshotId(1);
        let state = fold(&[
            Action::TakeSnapshotStart { snapshot },
            Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(1),
                display: DominatorTreeDisplay::coarse_type(),
            },
        ]);
        assert!(state.snapshot(snapshot).unwrap().dominator_tree.is_none());
    }

    #[test]
    fn dominator_tree_fetch_then_load() {
        let snapshot = SnapshotId(1);
        let state = with_read_snapshots(1)
            .apply(&Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(1),
                display: DominatorTreeDisplay::coarse_type(),
            })
            .apply(&Action::DominatorTreeComputed {
                snapshot,
                request: RequestId(1),
                tree: DominatorTreeId(9),
            });
        let tree = state.snapshot(snapshot).unwrap().dominator_tree.as_ref().unwrap();
        assert_eq!(tree.state, DominatorTreeState::Fetching);
        assert_eq!(tree.tree, Some(DominatorTreeId(9)));

        let state = state.apply(&Action::FetchDominatorTreeEnd {
            snapshot,
            request: RequestId(1),
            root: root("Type"),
        });
        let tree = state.snapshot(snapshot).unwrap().dominator_tree.as_ref().unwrap();
        assert_eq!(tree.state, DominatorTreeState::Loaded);
        assert_eq!(tree.display, DominatorTreeDisplay::coarse_type());
        assert_eq!(tree.root.as_ref().unwrap().label, "Type");
    }

    #[test]
    fn refetch_keeps_computed_tree_and_replaces_display() {
        let snapshot = SnapshotId(1);
        let state = with_read_snapshots(1)
            .apply(&Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(1),
                display: DominatorTreeDisplay::coarse_type(),
            })
            .apply(&Action::DominatorTreeComputed {
                snapshot,
                request: RequestId(1),
                tree: DominatorTreeId(4),
            })
            .apply(&Action::FetchDominatorTreeEnd {
                snapshot,
                request: RequestId(1),
                root: root("Type"),
            })
            .apply(&Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(2),
                display: DominatorTreeDisplay::allocation_stack(),
            });
        let tree = state.snapshot(snapshot).unwrap().dominator_tree.as_ref().unwrap();
        assert_eq!(tree.state, DominatorTreeState::Fetching);
        assert_eq!(tree.display, DominatorTreeDisplay::allocation_stack());
        assert_eq!(tree.tree, Some(DominatorTreeId(4)));
        assert!(tree.root.is_none());
    }

    #[test]
    fn stale_dominator_tree_completion_is_discarded() {
        let snapshot = SnapshotId(1);
        let state = with_read_snapshots(1)
            .apply(&Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(1),
                display: DominatorTreeDisplay::coarse_type(),
            })
            .apply(&Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(2),
                display: DominatorTreeDisplay::internal_type(),
            })
            .apply(&Action::FetchDominatorTreeEnd {
                snapshot,
                request: RequestId(1),
                root: root("stale"),
            });
        let tree = state.snapshot(snapshot).unwrap().dominator_tree.as_ref().unwrap();
        assert_eq!(tree.state, DominatorTreeState::Fetching);
        assert_eq!(tree.display, DominatorTreeDisplay::internal_type());

        let state = state.apply(&Action::FetchDominatorTreeEnd {
            snapshot,
            request: RequestId(2),
            root: root("fresh"),
        });
        let tree = state.snapshot(snapshot).unwrap().dominator_tree.as_ref().unwrap();
        assert_eq!(tree.state, DominatorTreeState::Loaded);
        assert_eq!(tree.root.as_ref().unwrap().label, "fresh");
    }

    #[test]
    fn dominator_tree_error_is_distinct_from_fetching() {
        let snapshot = SnapshotId(1);
        let state = with_read_snapshots(1)
            .apply(&Action::FetchDominatorTreeStart {
                snapshot,
                request: RequestId(1),
                display: DominatorTreeDisplay::coarse_type(),
            })
            .apply(&Action::DominatorTreeError {
                snapshot,
                request: RequestId(1),
                error: "worker crashed".into(),
            });
        let tree = state.snapshot(snapshot).unwrap().dominator_tree.as_ref().unwrap();
        assert_eq!(tree.state, DominatorTreeState::Error);
        assert_eq!(tree.error.as_deref(), Some("worker crashed"));
    }

    #[test]
    fn census_request_tokens_guard_completion() {
        let snapshot = SnapshotId(1);
        let state = with_read_snapshots(1)
            .apply(&Action::TakeCensusStart {
                snapshot,
                request: RequestId(3),
                display: CensusDisplay::coarse_type(),
                filter: None,
            })
            .apply(&Action::TakeCensusEnd {
                snapshot,
                request: RequestId(2),
                report: report("old"),
            });
        let census = state.snapshot(snapshot).unwrap().census.as_ref().unwrap();
        assert_eq!(census.state, CensusState::Saving);
        assert!(!state.snapshot(snapshot).unwrap().is_settled());

        let state = state.apply(&Action::TakeCensusEnd {
            snapshot,
            request: RequestId(3),
            report: report("new"),
        });
        let census = state.snapshot(snapshot).unwrap().census.as_ref().unwrap();
        assert_eq!(census.state, CensusState::Saved);
        assert_eq!(census.report.as_ref().unwrap().root.name, "new");
    }

    #[test]
    fn tree_map_error_recorded() {
        let snapshot = SnapshotId(1);
        let state = with_read_snapshots(1)
            .apply(&Action::TakeTreeMapStart {
                snapshot,
                request: RequestId(1),
                display: TreeMapDisplay::coarse_type(),
            })
            .apply(&Action::TakeTreeMapError {
                snapshot,
                request: RequestId(1),
                error: "nope".into(),
            });
        let tree_map = state.snapshot(snapshot).unwrap().tree_map.as_ref().unwrap();
        assert_eq!(tree_map.state, CensusState::Error);
    }

    #[test]
    fn display_outside_catalog_is_ignored() {
        let mut foreign = DominatorTreeDisplay::coarse_type();
        foreign.display_name = "Foreign".into();
        let state = fold(&[Action::SetDominatorTreeDisplay(foreign)]);
        assert_eq!(
            state.dominator_tree_display,
            DominatorTreeDisplay::coarse_type()
        );

        let state = state.apply(&Action::SetDominatorTreeDisplay(
            DominatorTreeDisplay::allocation_stack(),
        ));
        assert_eq!(
            state.dominator_tree_display,
            DominatorTreeDisplay::allocation_stack()
        );
    }

    #[test]
    fn empty_filter_clears() {
        let state = fold(&[Action::SetFilterString(Some("Array".into()))]);
        assert_eq!(state.filter.as_deref(), Some("Array"));
        let state = state.apply(&Action::SetFilterString(Some(String::new())));
        assert_eq!(state.filter, None);
    }

    #[test]
    fn toggle_diffing_needs_two_snapshots() {
        let state = with_read_snapshots(1).apply(&Action::ToggleDiffing);
        assert!(state.diffing.is_none());
        assert_eq!(state.view.current, View::TreeMap);
    }

    #[test]
    fn toggle_diffing_round_trip_restores_view() {
        let state = with_read_snapshots(2)
            .apply(&Action::ChangeView(View::Census))
            .apply(&Action::ToggleDiffing);
        assert_eq!(state.view.current, View::Diffing);
        assert_eq!(state.diffing.as_ref().unwrap().state, DiffingState::Selecting);

        let state = state.apply(&Action::ToggleDiffing);
        assert_eq!(state.view.current, View::Census);
        assert!(state.diffing.is_none());
    }

    #[test]
    fn selecting_snapshots_for_diffing() {
        let state = with_read_snapshots(3)
            .apply(&Action::ToggleDiffing)
            .apply(&Action::SelectSnapshotForDiffing {
                snapshot: SnapshotId(1),
            })
            .apply(&Action::SelectSnapshotForDiffing {
                snapshot: SnapshotId(1),
            });
        let diffing = state.diffing.as_ref().unwrap();
        assert_eq!(diffing.first, Some(SnapshotId(1)));
        assert_eq!(diffing.second, None);

        let state = state.apply(&Action::SelectSnapshotForDiffing {
            snapshot: SnapshotId(3),
        });
        assert_eq!(
            state.diffing.as_ref().unwrap().pair(),
            Some((SnapshotId(1), SnapshotId(3)))
        );

        // A third pick starts a new pair.
        let state = state.apply(&Action::SelectSnapshotForDiffing {
            snapshot: SnapshotId(2),
        });
        let diffing = state.diffing.as_ref().unwrap();
        assert_eq!(diffing.first, Some(SnapshotId(2)));
        assert_eq!(diffing.second, None);
    }

    #[test]
    fn census_diff_lifecycle() {
        let state = with_read_snapshots(2)
            .apply(&Action::ToggleDiffing)
            .apply(&Action::SelectSnapshotForDiffing {
                snapshot: SnapshotId(1),
            })
            .apply(&Action::SelectSnapshotForDiffing {
                snapshot: SnapshotId(2),
            })
            .apply(&Action::TakeCensusDiffStart {
                first: SnapshotId(1),
                second: SnapshotId(2),
                request: RequestId(7),
                display: CensusDisplay::coarse_type(),
                filter: None,
            });
        assert_eq!(
            state.diffing.as_ref().unwrap().state,
            DiffingState::TakingDiff
        );

        let state = state.apply(&Action::TakeCensusDiffEnd {
            request: RequestId(7),
            report: report("diff"),
        });
        let diffing = state.diffing.as_ref().unwrap();
        assert_eq!(diffing.state, DiffingState::TookDiff);
        assert_eq!(
            diffing.census.as_ref().unwrap().report.as_ref().unwrap().root.name,
            "diff"
        );
    }

    #[test]
    fn deleting_a_diffed_snapshot_leaves_diffing() {
        let state = with_read_snapshots(2)
            .apply(&Action::ChangeView(View::Census))
            .apply(&Action::ToggleDiffing)
            .apply(&Action::SelectSnapshotForDiffing {
                snapshot: SnapshotId(1),
            })
            .apply(&Action::DeleteSnapshots {
                snapshots: vec![SnapshotId(1)],
            });
        assert!(state.diffing.is_none());
        assert_eq!(state.view.current, View::Census);
        assert_eq!(state.snapshots.len(), 1);
    }

    #[test]
    fn leaving_diffing_through_change_view_clears_it() {
        let state = with_read_snapshots(2)
            .apply(&Action::ToggleDiffing)
            .apply(&Action::ChangeView(View::DominatorTree));
        assert!(state.diffing.is_none());
        assert_eq!(state.view.current, View::DominatorTree);
    }

    #[test]
    fn allocation_toggle_flags() {
        let state = fold(&[Action::ToggleRecordAllocationStacksStart {
            request: RequestId(1),
        }]);
        assert!(state.allocations.toggling_in_progress());
        assert!(!state.allocations.recording);

        let state = state.apply(&Action::ToggleRecordAllocationStacksEnd {
            request: RequestId(1),
            recording: true,
        });
        assert!(!state.allocations.toggling_in_progress());
        assert!(state.allocations.recording);
    }

    #[test]
    fn allocation_toggle_has_one_owner() {
        let state = fold(&[
            Action::ToggleRecordAllocationStacksStart {
                request: RequestId(1),
            },
            Action::ToggleRecordAllocationStacksStart {
                request: RequestId(2),
            },
        ]);
        assert_eq!(state.allocations.toggle, Some(RequestId(1)));

        let state = state.apply(&Action::ToggleRecordAllocationStacksEnd {
            request: RequestId(2),
            recording: true,
        });
        assert_eq!(state.allocations.toggle, Some(RequestId(1)));
        assert!(!state.allocations.recording);

        let state = state.apply(&Action::ToggleRecordAllocationStacksEnd {
            request: RequestId(1),
            recording: true,
        });
        assert!(!state.allocations.toggling_in_progress());
        assert!(state.allocations.recording);
    }

    #[test]
    fn state_serializes_to_json() {
        let state = with_read_snapshots(1);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["snapshots"][0]["state"], "Read");
        assert_eq!(value["view"]["current"], "TreeMap");
    }
}
