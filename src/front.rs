//! The data source the panel takes snapshots from.
//!
//! A [`MemoryFront`] talks to the debuggee: it saves heap snapshots to
//! disk and toggles allocation-stack recording. It must be attached before
//! first use and detached after last use.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use uuid::Uuid;

use crate::error::FrontError;

/// Boxed future returned by [`MemoryFront`] methods, so the trait stays
/// object safe.
pub type FrontFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FrontError>> + Send + 'a>>;

/// Connection to the debuggee's memory actor.
///
/// # Contract
///
/// - `attach` succeeds once; every other method except `is_attached`
///   fails with [`FrontError::NotAttached`] until it has.
/// - `save_heap_snapshot` returns the path the snapshot was written to;
///   the path is what the analysis worker reads.
pub trait MemoryFront: Send + Sync + 'static {
    fn attach(&self) -> FrontFuture<'_, ()>;

    fn detach(&self) -> FrontFuture<'_, ()>;

    fn is_attached(&self) -> bool;

    fn save_heap_snapshot(&self) -> FrontFuture<'_, PathBuf>;

    fn start_recording_allocations(&self) -> FrontFuture<'_, ()>;

    fn stop_recording_allocations(&self) -> FrontFuture<'_, ()>;
}

#[derive(Debug)]
struct StubInner {
    attached: AtomicBool,
    recording: AtomicBool,
    snapshots_saved: AtomicU64,
    allocation_toggles: AtomicU64,
    dir: PathBuf,
    latency: Duration,
    fail_saves: bool,
    fail_allocation_toggles: bool,
}

/// In-process front that pretends to save snapshots.
///
/// Saved paths are fresh names under a directory (the system temp dir by
/// default); nothing is written. `Clone` is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct StubbedMemoryFront {
    inner: Arc<StubInner>,
}

impl Default for StubbedMemoryFront {
    fn default() -> Self {
        Self::new()
    }
}

impl StubbedMemoryFront {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> StubbedMemoryFrontBuilder {
        StubbedMemoryFrontBuilder::default()
    }

    /// Whether allocation stacks are currently being recorded.
    pub fn is_recording(&self) -> bool {
        self.inner.recording.load(Ordering::Acquire)
    }

    /// How many snapshots have been saved since construction.
    pub fn snapshots_saved(&self) -> u64 {
        self.inner.snapshots_saved.load(Ordering::Acquire)
    }

    /// How many start/stop recording requests have reached the front.
    pub fn allocation_toggles(&self) -> u64 {
        self.inner.allocation_toggles.load(Ordering::Acquire)
    }

    fn require_attached(&self) -> Result<(), FrontError> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(FrontError::NotAttached)
        }
    }

    async fn pause(&self) {
        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }
    }

    async fn set_recording(&self, recording: bool) -> Result<(), FrontError> {
        self.require_attached()?;
        self.inner.allocation_toggles.fetch_add(1, Ordering::AcqRel);
        self.pause().await;
        if self.inner.fail_allocation_toggles {
            return Err(FrontError::Request("allocation recording unavailable".into()));
        }
        self.inner.recording.store(recording, Ordering::Release);
        Ok(())
    }
}

impl MemoryFront for StubbedMemoryFront {
    fn attach(&self) -> FrontFuture<'_, ()> {
        Box::pin(async move {
            if self.inner.attached.swap(true, Ordering::AcqRel) {
                return Err(FrontError::AlreadyAttached);
            }
            tracing::debug!("memory front attached");
            Ok(())
        })
    }

    fn detach(&self) -> FrontFuture<'_, ()> {
        Box::pin(async move {
            if !self.inner.attached.swap(false, Ordering::AcqRel) {
                return Err(FrontError::NotAttached);
            }
            self.inner.recording.store(false, Ordering::Release);
            tracing::debug!("memory front detached");
            Ok(())
        })
    }

    fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::Acquire)
    }

    fn save_heap_snapshot(&self) -> FrontFuture<'_, PathBuf> {
        Box::pin(async move {
            self.require_attached()?;
            self.pause().await;
            if self.inner.fail_saves {
                return Err(FrontError::Request("could not save heap snapshot".into()));
            }
            self.inner.snapshots_saved.fetch_add(1, Ordering::AcqRel);
            Ok(self
                .inner
                .dir
                .join(format!("{}.fxsnapshot", Uuid::new_v4())))
        })
    }

    fn start_recording_allocations(&self) -> FrontFuture<'_, ()> {
        Box::pin(self.set_recording(true))
    }

    fn stop_recording_allocations(&self) -> FrontFuture<'_, ()> {
        Box::pin(self.set_recording(false))
    }
}

/// Builder for [`StubbedMemoryFront`].
#[derive(Debug, Clone, Default)]
pub struct StubbedMemoryFrontBuilder {
    dir: Option<PathBuf>,
    latency: Duration,
    fail_saves: bool,
    fail_allocation_toggles: bool,
}

impl StubbedMemoryFrontBuilder {
    /// Directory the fake snapshot paths live under.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Delay every request by `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every `save_heap_snapshot` fail.
    pub fn fail_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Make every allocation-recording toggle fail.
    pub fn fail_allocation_toggles(mut self) -> Self {
        self.fail_allocation_toggles = true;
        self
    }

    pub fn build(self) -> StubbedMemoryFront {
        StubbedMemoryFront {
            inner: Arc::new(StubInner {
                attached: AtomicBool::new(false),
                recording: AtomicBool::new(false),
                snapshots_saved: AtomicU64::new(0),
                allocation_toggles: AtomicU64::new(0),
                dir: self.dir.unwrap_or_else(std::env::temp_dir),
                latency: self.latency,
                fail_saves: self.fail_saves,
                fail_allocation_toggles: self.fail_allocation_toggles,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attach_detach_lifecycle() {
        let front = StubbedMemoryFront::new();
        assert!(!front.is_attached());

        front.attach().await.expect("attach");
        assert!(front.is_attached());
        assert_eq!(front.attach().await, Err(FrontError::AlreadyAttached));

        front.detach().await.expect("detach");
        assert!(!front.is_attached());
        assert_eq!(front.detach().await, Err(FrontError::NotAttached));
    }

    #[tokio::test]
    async fn save_requires_attach() {
        let front = StubbedMemoryFront::new();
        assert_eq!(front.save_heap_snapshot().await, Err(FrontError::NotAttached));
    }

    #[tokio::test]
    async fn saved_paths_are_unique_and_under_dir() {
        let front = StubbedMemoryFront::builder().dir("/var/snapshots").build();
        front.attach().await.expect("attach");
        let a = front.save_heap_snapshot().await.expect("save a");
        let b = front.save_heap_snapshot().await.expect("save b");
        assert_ne!(a, b);
        assert!(a.starts_with("/var/snapshots"));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("fxsnapshot"));
        assert_eq!(front.snapshots_saved(), 2);
    }

    #[tokio::test]
    async fn recording_toggles_and_resets_on_detach() {
        let front = StubbedMemoryFront::new();
        front.attach().await.expect("attach");
        front.start_recording_allocations().await.expect("start");
        assert!(front.is_recording());
        assert_eq!(front.allocation_toggles(), 1);

        front.detach().await.expect("detach");
        assert!(!front.is_recording());
    }

    #[tokio::test]
    async fn injected_failures() {
        let front = StubbedMemoryFront::builder()
            .fail_saves()
            .fail_allocation_toggles()
            .build();
        front.attach().await.expect("attach");
        assert!(matches!(
            front.save_heap_snapshot().await,
            Err(FrontError::Request(_))
        ));
        assert!(matches!(
            front.start_recording_allocations().await,
            Err(FrontError::Request(_))
        ));
        assert!(!front.is_recording());
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let front: Arc<dyn MemoryFront> = Arc::new(StubbedMemoryFront::new());
        front.attach().await.expect("attach");
        front.save_heap_snapshot().await.expect("save");
        front.detach().await.expect("detach");
    }
}
