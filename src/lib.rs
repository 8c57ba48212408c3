//! Reducer-driven state core for a heap-snapshot inspection panel.
//!
//! The panel's state lives in a single store actor and changes only through
//! plain [`Action`]s folded by [`AppState::apply`]. Asynchronous work
//! (saving snapshots through a [`MemoryFront`], censuses and dominator trees
//! on the [`HeapAnalysesClient`] worker thread) lives in [`workflow`]
//! functions that dispatch actions around each round trip. The toolbar is a
//! pure projection of the state.
//!
//! Tests and callers observe transitions through
//! [`Subscription::wait_until`], which suspends until a predicate over the
//! state holds.

mod action;
mod analyses;
mod display;
mod error;
mod front;
mod panel;
mod state;
mod store;
mod toolbar;
mod worker;
pub mod workflow;

pub use action::Action;
pub use analyses::{
    CensusNode, CensusReport, DominatorTreeId, DominatorTreeNode, FetchLimits, HeapAnalyses,
    StubAnalyses, StubAnalysesConfig,
};
pub use display::{
    Catalog, CensusDisplay, DisplayCatalogs, DominatorTreeDisplay, NamedDisplay, TreeMapDisplay,
};
pub use error::{
    AnalysisError, CatalogError, FrontError, PanelError, StoreError, ToolbarError, WorkerError,
    WorkflowError,
};
pub use front::{FrontFuture, MemoryFront, StubbedMemoryFront, StubbedMemoryFrontBuilder};
pub use panel::{MemoryPanel, MemoryPanelBuilder};
pub use state::{
    AllocationsModel, AppState, CensusModel, CensusState, DiffingModel, DiffingState,
    DominatorTreeModel, DominatorTreeState, RequestId, SnapshotId, SnapshotModel, SnapshotState,
    TreeMapModel, View, ViewState,
};
pub use store::{StoreBuilder, StoreHandle, Subscription};
pub use toolbar::{
    DisplaySelect, SelectOption, Toggle, Toolbar, ToolbarAction, ToolbarModel, ToolbarProps,
    ViewOptions, ViewSelect, resolve_display,
};
pub use worker::{HeapAnalysesClient, WorkerConfig};
