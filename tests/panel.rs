//! The panel as a whole: toolbar intents, resource release on failure.

mod common;

use std::sync::Arc;

use heapfold::{
    DominatorTreeDisplay, DominatorTreeState, MemoryFront, MemoryPanel, PanelError, StubAnalyses,
    StubbedMemoryFront, ToolbarAction, ToolbarError, View, ViewOptions,
};

use common::{open_default, wait_for, with_panel_teardown, with_teardown};

async fn open_panel(front: StubbedMemoryFront) -> Arc<MemoryPanel> {
    common::init_tracing();
    let panel = MemoryPanel::builder()
        .open(front, StubAnalyses::default())
        .await
        .expect("open panel");
    Arc::new(panel)
}

#[tokio::test]
async fn teardown_runs_when_scenario_panics() {
    let harness = open_default(View::TreeMap).await;
    let worker = harness.worker.clone();
    let front = harness.front.clone();
    let store = harness.store.clone();

    let outcome = tokio::spawn(with_teardown(harness, |h| async move {
        assert_eq!(h.store.get_state().snapshots.len(), 1, "scenario failed");
    }))
    .await;

    let err = outcome.expect_err("panic is re-raised");
    assert!(err.is_panic());
    assert!(!worker.is_alive());
    assert!(!front.is_attached());
    assert!(!store.is_alive());
}

#[tokio::test]
async fn panel_teardown_runs_when_scenario_panics() {
    let front = StubbedMemoryFront::new();
    let panel = open_panel(front.clone()).await;

    let outcome = tokio::spawn(with_panel_teardown(Arc::clone(&panel), |panel| async move {
        assert_eq!(panel.store().get_state().snapshots.len(), 1, "scenario failed");
    }))
    .await;

    assert!(outcome.expect_err("panic is re-raised").is_panic());
    assert!(panel.is_closed());
    assert!(!front.is_attached());
    assert!(!panel.worker().is_alive());
}

#[tokio::test]
async fn toolbar_drives_dominator_tree_display() {
    let front = StubbedMemoryFront::new();
    let panel = open_panel(front.clone()).await;

    with_panel_teardown(panel, |panel| async move {
        let mut sub = panel.store().subscribe().await.expect("subscribe");
        panel
            .perform(ToolbarAction::ChangeView(View::DominatorTree))
            .expect("view select offered")
            .await
            .expect("join");
        panel
            .perform(ToolbarAction::TakeSnapshot)
            .expect("take snapshot offered")
            .await
            .expect("join");

        let coarse_type = DominatorTreeDisplay::coarse_type();
        wait_for(&mut sub, "tree loaded", |state| {
            state
                .selected_snapshot()
                .and_then(|s| s.dominator_tree.as_ref())
                .is_some_and(|t| t.state == DominatorTreeState::Loaded && t.display == coarse_type)
        })
        .await;

        match panel.toolbar().view_options {
            ViewOptions::DominatorTree(select) => assert_eq!(select.selected, "Type"),
            other => panic!("expected dominator tree options, got {other:?}"),
        }

        let unknown = panel.perform(ToolbarAction::ChangeDominatorTreeDisplay("Nope".into()));
        assert!(matches!(unknown, Err(PanelError::ActionDisabled(_))));

        panel
            .perform(ToolbarAction::ChangeDominatorTreeDisplay("Call Stack".into()))
            .expect("display offered")
            .await
            .expect("join");

        let state = panel.store().get_state();
        let tree = state
            .selected_snapshot()
            .and_then(|s| s.dominator_tree.as_ref())
            .expect("tree");
        assert_eq!(tree.state, DominatorTreeState::Loaded);
        assert_eq!(tree.display, DominatorTreeDisplay::allocation_stack());
        assert_eq!(
            state.dominator_tree_display,
            DominatorTreeDisplay::allocation_stack()
        );
    })
    .await;

    assert!(!front.is_attached());
}

#[tokio::test]
async fn census_intents_are_rejected_outside_census_view() {
    let panel = open_panel(StubbedMemoryFront::new()).await;

    with_panel_teardown(panel, |panel| async move {
        let result = panel.perform(ToolbarAction::SetFilterString("Array".into()));
        assert!(matches!(
            result,
            Err(PanelError::ActionDisabled("set_filter_string"))
        ));

        panel
            .perform(ToolbarAction::ChangeView(View::Census))
            .expect("view select offered")
            .await
            .expect("join");
        panel
            .perform(ToolbarAction::SetFilterString("Array".into()))
            .expect("filter offered")
            .await
            .expect("join");
        assert_eq!(panel.store().get_state().filter.as_deref(), Some("Array"));
    })
    .await;
}

#[tokio::test]
async fn failing_workflow_is_logged_not_propagated() {
    let front = StubbedMemoryFront::builder().fail_saves().build();
    let panel = open_panel(front.clone()).await;

    with_panel_teardown(panel, |panel| async move {
        panel
            .perform(ToolbarAction::TakeSnapshot)
            .expect("take snapshot offered")
            .await
            .expect("task completes despite the failure");
        let state = panel.store().get_state();
        assert!(state.snapshots[0].error.is_some());
    })
    .await;

    assert!(!front.is_attached());
}

#[test]
fn unknown_display_name_error() {
    let err = PanelError::from(ToolbarError::UnknownDisplay("Nope".into()));
    assert_eq!(err.to_string(), "no display named \"Nope\" in the catalog");
}
