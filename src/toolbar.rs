//! The toolbar as a pure projection of the application state.
//!
//! [`ToolbarProps::from_state`] picks out every field the toolbar reads;
//! [`Toolbar::render`] turns those props into a [`ToolbarModel`] saying
//! which controls are offered and which are enabled. The model holds no
//! state of its own and identical props always render the same model.
//!
//! User input comes back as a [`ToolbarAction`]. [`ToolbarModel::allows`]
//! says whether the rendered toolbar would accept it.

use std::path::PathBuf;

use serde::Serialize;

use crate::display::{
    Catalog, CensusDisplay, DisplayCatalogs, DominatorTreeDisplay, NamedDisplay, TreeMapDisplay,
};
use crate::error::ToolbarError;
use crate::state::{AllocationsModel, AppState, View};

/// Everything the toolbar reads from the state.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolbarProps {
    pub view: View,
    pub diffing: bool,
    pub snapshot_count: usize,
    pub allocations: AllocationsModel,
    pub filter: Option<String>,
    pub catalogs: DisplayCatalogs,
    pub census_display: CensusDisplay,
    pub tree_map_display: TreeMapDisplay,
    pub dominator_tree_display: DominatorTreeDisplay,
}

impl ToolbarProps {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            view: state.view.current,
            diffing: state.diffing.is_some(),
            snapshot_count: state.snapshots.len(),
            allocations: state.allocations,
            filter: state.filter.clone(),
            catalogs: state.catalogs.clone(),
            census_display: state.census_display.clone(),
            tree_map_display: state.tree_map_display.clone(),
            dominator_tree_display: state.dominator_tree_display.clone(),
        }
    }
}

/// One entry of a display selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub display_name: String,
    pub tooltip: String,
}

/// A display selector: the catalog's entries and the selected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplaySelect {
    pub options: Vec<SelectOption>,
    pub selected: String,
}

impl DisplaySelect {
    fn new<D: NamedDisplay>(catalog: &Catalog<D>, selected: &D) -> Self {
        Self {
            options: catalog
                .entries()
                .iter()
                .map(|d| SelectOption {
                    display_name: d.display_name().to_owned(),
                    tooltip: d.tooltip().to_owned(),
                })
                .collect(),
            selected: selected.display_name().to_owned(),
        }
    }

    /// Whether `display_name` is one of the options.
    pub fn offers(&self, display_name: &str) -> bool {
        self.options.iter().any(|o| o.display_name == display_name)
    }
}

/// The view-specific part of the toolbar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ViewOptions {
    /// Census and diffing views: census display selector and filter input.
    Census {
        displays: DisplaySelect,
        filter: Option<String>,
    },
    /// Tree-map view: a display selector only when there is a choice.
    TreeMap(Option<DisplaySelect>),
    /// Dominator-tree view: always a display selector.
    DominatorTree(DisplaySelect),
}

/// The general view selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSelect {
    pub options: Vec<View>,
    pub selected: View,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Toggle {
    pub enabled: bool,
    pub checked: bool,
}

/// What the toolbar shows, derived from [`ToolbarProps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolbarModel {
    pub view_options: ViewOptions,
    /// `None` while diffing; leaving diffing goes through its toggle.
    pub view_select: Option<ViewSelect>,
    pub diff_snapshots: Toggle,
    pub record_allocation_stacks: Toggle,
}

/// A user intent raised from the toolbar.
///
/// Display changes carry the display name; they are resolved against the
/// catalog before anything is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarAction {
    TakeSnapshot,
    ImportSnapshot(PathBuf),
    ClearSnapshots,
    ToggleDiffing,
    ToggleRecordAllocationStacks,
    ChangeView(View),
    ChangeCensusDisplay(String),
    ChangeTreeMapDisplay(String),
    ChangeDominatorTreeDisplay(String),
    SetFilterString(String),
}

impl ToolbarAction {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolbarAction::TakeSnapshot => "take_snapshot",
            ToolbarAction::ImportSnapshot(_) => "import_snapshot",
            ToolbarAction::ClearSnapshots => "clear_snapshots",
            ToolbarAction::ToggleDiffing => "toggle_diffing",
            ToolbarAction::ToggleRecordAllocationStacks => "toggle_record_allocation_stacks",
            ToolbarAction::ChangeView(_) => "change_view",
            ToolbarAction::ChangeCensusDisplay(_) => "change_census_display",
            ToolbarAction::ChangeTreeMapDisplay(_) => "change_tree_map_display",
            ToolbarAction::ChangeDominatorTreeDisplay(_) => "change_dominator_tree_display",
            ToolbarAction::SetFilterString(_) => "set_filter_string",
        }
    }
}

impl ToolbarModel {
    /// Whether the rendered toolbar offers `action` and has it enabled.
    pub fn allows(&self, action: &ToolbarAction) -> bool {
        match action {
            ToolbarAction::TakeSnapshot
            | ToolbarAction::ImportSnapshot(_)
            | ToolbarAction::ClearSnapshots => true,
            ToolbarAction::ToggleDiffing => self.diff_snapshots.enabled,
            ToolbarAction::ToggleRecordAllocationStacks => self.record_allocation_stacks.enabled,
            ToolbarAction::ChangeView(view) => self
                .view_select
                .as_ref()
                .is_some_and(|s| s.options.contains(view)),
            ToolbarAction::ChangeCensusDisplay(name) => matches!(
                &self.view_options,
                ViewOptions::Census { displays, .. } if displays.offers(name)
            ),
            ToolbarAction::ChangeTreeMapDisplay(name) => matches!(
                &self.view_options,
                ViewOptions::TreeMap(Some(displays)) if displays.offers(name)
            ),
            ToolbarAction::ChangeDominatorTreeDisplay(name) => matches!(
                &self.view_options,
                ViewOptions::DominatorTree(displays) if displays.offers(name)
            ),
            ToolbarAction::SetFilterString(_) => {
                matches!(self.view_options, ViewOptions::Census { .. })
            }
        }
    }

    /// Kinds of every action the toolbar currently accepts, in toolbar
    /// order. Display changes and view changes count once each.
    pub fn enabled_actions(&self) -> Vec<&'static str> {
        let mut kinds = vec!["take_snapshot", "import_snapshot", "clear_snapshots"];
        if self.diff_snapshots.enabled {
            kinds.push("toggle_diffing");
        }
        if self.record_allocation_stacks.enabled {
            kinds.push("toggle_record_allocation_stacks");
        }
        if self.view_select.is_some() {
            kinds.push("change_view");
        }
        match &self.view_options {
            ViewOptions::Census { .. } => {
                kinds.push("change_census_display");
                kinds.push("set_filter_string");
            }
            ViewOptions::TreeMap(Some(_)) => kinds.push("change_tree_map_display"),
            ViewOptions::TreeMap(None) => {}
            ViewOptions::DominatorTree(_) => kinds.push("change_dominator_tree_display"),
        }
        kinds
    }
}

/// Renders [`ToolbarProps`] into a [`ToolbarModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Toolbar;

impl Toolbar {
    /// # Panics
    ///
    /// Panics if the dominator-tree catalog is empty in the dominator-tree
    /// view. [`Catalog`] cannot be built empty, so this is a programming
    /// error.
    pub fn render(props: &ToolbarProps) -> ToolbarModel {
        let view_options = match props.view {
            View::Census | View::Diffing => ViewOptions::Census {
                displays: DisplaySelect::new(&props.catalogs.census, &props.census_display),
                filter: props.filter.clone(),
            },
            View::TreeMap => {
                let catalog = &props.catalogs.tree_map;
                ViewOptions::TreeMap(
                    (catalog.len() > 1)
                        .then(|| DisplaySelect::new(catalog, &props.tree_map_display)),
                )
            }
            View::DominatorTree => {
                let catalog = &props.catalogs.dominator_tree;
                assert!(
                    !catalog.is_empty(),
                    "dominator tree view needs at least one display"
                );
                ViewOptions::DominatorTree(DisplaySelect::new(catalog, &props.dominator_tree_display))
            }
        };

        let view_select = (props.view != View::Diffing).then(|| ViewSelect {
            options: View::SELECTABLE.to_vec(),
            selected: props.view,
        });

        ToolbarModel {
            view_options,
            view_select,
            diff_snapshots: Toggle {
                enabled: props.snapshot_count >= 2,
                checked: props.diffing,
            },
            record_allocation_stacks: Toggle {
                enabled: !props.allocations.toggling_in_progress(),
                checked: props.allocations.recording,
            },
        }
    }

    /// Project the state straight to a model.
    pub fn render_state(state: &AppState) -> ToolbarModel {
        Self::render(&ToolbarProps::from_state(state))
    }
}

/// Resolve a display name from a toolbar intent against `catalog`.
///
/// # Errors
///
/// Returns [`ToolbarError::UnknownDisplay`] if no entry has that name.
pub fn resolve_display<D: NamedDisplay>(
    catalog: &Catalog<D>,
    display_name: &str,
) -> Result<D, ToolbarError> {
    catalog
        .find(display_name)
        .cloned()
        .ok_or_else(|| ToolbarError::UnknownDisplay(display_name.to_owned()))
}
