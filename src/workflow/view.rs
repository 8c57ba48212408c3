use std::sync::Arc;

use crate::action::Action;
use crate::error::WorkflowError;
use crate::state::{AppState, View};
use crate::store::StoreHandle;
use crate::worker::HeapAnalysesClient;

use super::{census, diffing, dominator_tree};

/// Switch the active view without computing anything for it.
pub async fn change_view(store: &StoreHandle, view: View) -> Result<Arc<AppState>, WorkflowError> {
    Ok(store.dispatch(Action::ChangeView(view)).await?)
}

/// Switch the active view, then compute whatever the new view needs for
/// the selected snapshot.
pub async fn change_view_and_refresh(
    store: &StoreHandle,
    worker: &HeapAnalysesClient,
    view: View,
) -> Result<(), WorkflowError> {
    change_view(store, view).await?;
    refresh(store, worker).await
}

/// Bring the active view's data up to date with the current displays and
/// filter.
///
/// Data that already matches is left alone. The dominator tree is computed
/// when the selected snapshot has none, and re-fetched when its display
/// differs from the current selection.
pub async fn refresh(store: &StoreHandle, worker: &HeapAnalysesClient) -> Result<(), WorkflowError> {
    let state = store.get_state();
    match state.view.current {
        View::Census => census::refresh_selected_census(store, worker).await,
        View::TreeMap => census::refresh_selected_tree_map(store, worker).await,
        View::Diffing => diffing::refresh_diffing(store, worker).await,
        View::DominatorTree => {
            let Some(snapshot) = state.selected_snapshot().filter(|s| s.is_read()) else {
                return Ok(());
            };
            match snapshot.dominator_tree.as_ref() {
                None => {
                    dominator_tree::compute_and_fetch_dominator_tree(store, worker, snapshot.id)
                        .await
                }
                Some(tree) if tree.display != state.dominator_tree_display => {
                    dominator_tree::fetch_dominator_tree(store, worker, snapshot.id).await
                }
                Some(_) => Ok(()),
            }
        }
    }
}
