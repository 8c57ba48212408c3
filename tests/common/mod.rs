//! Shared harness for the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use heapfold::{
    AppState, HeapAnalysesClient, MemoryFront, MemoryPanel, StoreBuilder, StoreHandle,
    StubAnalyses, StubbedMemoryFront, Subscription, View,
};
use tracing_subscriber::EnvFilter;

/// Upper bound for any single awaited transition.
pub const WAIT: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heapfold=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Store, worker, and front for one scenario.
#[derive(Clone)]
pub struct Harness {
    pub store: StoreHandle,
    pub worker: HeapAnalysesClient,
    pub front: StubbedMemoryFront,
}

/// Attach `front`, spawn a worker over `analyses`, and open a store on
/// `view`.
pub async fn open(view: View, front: StubbedMemoryFront, analyses: StubAnalyses) -> Harness {
    init_tracing();
    front.attach().await.expect("attach front");
    let worker = HeapAnalysesClient::spawn(analyses).expect("spawn worker");
    let store = StoreBuilder::new().initial_view(view).open();
    Harness {
        store,
        worker,
        front,
    }
}

/// A harness with default stubs.
pub async fn open_default(view: View) -> Harness {
    open(view, StubbedMemoryFront::new(), StubAnalyses::default()).await
}

/// Run `scenario`, then destroy the worker, detach the front, and stop the
/// store whether or not the scenario panicked. A scenario panic is
/// re-raised afterwards.
pub async fn with_teardown<F, Fut>(harness: Harness, scenario: F)
where
    F: FnOnce(Harness) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let Harness {
        store,
        worker,
        front,
    } = harness.clone();

    let outcome = tokio::spawn(scenario(harness)).await;

    worker.destroy();
    if front.is_attached() {
        front.detach().await.expect("detach front");
    }
    store.shutdown().await;

    if let Err(e) = outcome {
        if e.is_panic() {
            std::panic::resume_unwind(e.into_panic());
        }
        panic!("scenario task did not finish: {e}");
    }
}

/// Wait on `sub` until `predicate` holds, failing the test after [`WAIT`].
pub async fn wait_for<P>(sub: &mut Subscription, what: &str, predicate: P) -> Arc<AppState>
where
    P: FnMut(&AppState) -> bool,
{
    tokio::time::timeout(WAIT, sub.wait_until(predicate))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("store shut down while waiting")
}

/// [`with_teardown`] for a whole panel: runs `scenario`, then shuts the
/// panel down whether or not the scenario panicked.
pub async fn with_panel_teardown<F, Fut>(panel: Arc<MemoryPanel>, scenario: F)
where
    F: FnOnce(Arc<MemoryPanel>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let scenario = tokio::spawn(scenario(Arc::clone(&panel)));
    let outcome = tokio::time::timeout(WAIT * 2, scenario).await;
    panel.shutdown().await;

    match outcome {
        Err(_) => panic!("scenario timed out"),
        Ok(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Ok(Err(e)) => panic!("scenario task did not finish: {e}"),
        Ok(Ok(())) => {}
    }
}
