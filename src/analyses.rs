//! The analysis backend the worker thread drives, and the result types it
//! hands back.
//!
//! Parsing snapshots, aggregating censuses, and computing dominators are
//! the backend's business. The panel only needs the contract below. The
//! crate ships [`StubAnalyses`], a deterministic in-memory backend with
//! configurable latency and failure injection, used by the tests and by
//! embedders that want the panel without a real engine.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalysisError;

/// A node of a census tree: one group and the objects it counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusNode {
    pub name: String,
    pub count: u64,
    pub bytes: u64,
    pub children: Vec<CensusNode>,
}

/// A census, tree map, or census diff as produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusReport {
    pub root: CensusNode,
}

/// Worker-side handle of a computed dominator tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DominatorTreeId(pub u64);

/// One fetched node of a dominator tree, labeled with the display the
/// fetch asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominatorTreeNode {
    pub node_id: u64,
    pub label: String,
    pub shallow_size: u64,
    pub retained_size: u64,
    pub children: Vec<DominatorTreeNode>,
    /// The fetch was truncated below this node.
    pub more_children_available: bool,
}

/// Limits on how much of a dominator tree one fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_depth: u32,
    pub max_siblings: u32,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_siblings: 15,
        }
    }
}

/// A heap-analysis engine, owned by the worker thread.
///
/// # Contract
///
/// - Methods run on the worker thread, one at a time, and may block.
/// - Snapshots are identified by the path the memory front saved them to.
///   Every operation except [`read_heap_snapshot`](HeapAnalyses::read_heap_snapshot)
///   requires the snapshot to have been read first.
/// - Breakdowns are the JSON grouping descriptions from the panel's
///   display catalogs, passed through unchanged.
pub trait HeapAnalyses: Send + 'static {
    fn read_heap_snapshot(&mut self, path: &Path) -> Result<(), AnalysisError>;

    fn take_census(
        &mut self,
        path: &Path,
        breakdown: &Value,
        filter: Option<&str>,
    ) -> Result<CensusReport, AnalysisError>;

    /// Census of what changed between `first` and `second`.
    fn take_census_diff(
        &mut self,
        first: &Path,
        second: &Path,
        breakdown: &Value,
        filter: Option<&str>,
    ) -> Result<CensusReport, AnalysisError>;

    fn compute_dominator_tree(&mut self, path: &Path) -> Result<DominatorTreeId, AnalysisError>;

    fn get_dominator_tree(
        &mut self,
        tree: DominatorTreeId,
        breakdown: &Value,
        limits: FetchLimits,
    ) -> Result<DominatorTreeNode, AnalysisError>;

    /// Forget a snapshot and any dominator trees computed from it.
    fn delete_heap_snapshot(&mut self, path: &Path);
}

/// Knobs for [`StubAnalyses`].
#[derive(Debug, Clone, Default)]
pub struct StubAnalysesConfig {
    /// Sleep before answering every request, to widen race windows.
    pub latency: Duration,
    /// Fail every `read_heap_snapshot`.
    pub fail_reads: bool,
    /// Fail every census, tree map, and census diff.
    pub fail_censuses: bool,
    /// Fail every dominator tree computation and fetch.
    pub fail_dominator_trees: bool,
}

/// Deterministic in-memory backend.
///
/// Every read snapshot has the same synthetic heap: a handful of groups
/// whose labels follow the breakdown's grouping key. Results depend only
/// on the inputs, so tests can assert on them.
#[derive(Debug, Default)]
pub struct StubAnalyses {
    config: StubAnalysesConfig,
    read: HashSet<PathBuf>,
    trees: HashMap<DominatorTreeId, PathBuf>,
    next_tree: u64,
}

const STUB_GROUPS: [(&str, u64, u64); 4] = [
    ("objects", 120, 9_600),
    ("strings", 80, 2_560),
    ("scripts", 12, 4_096),
    ("other", 30, 1_200),
];

impl StubAnalyses {
    pub fn new(config: StubAnalysesConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn pause(&self) {
        if !self.config.latency.is_zero() {
            std::thread::sleep(self.config.latency);
        }
    }

    fn require_read(&self, path: &Path) -> Result<(), AnalysisError> {
        if self.read.contains(path) {
            Ok(())
        } else {
            Err(AnalysisError::SnapshotNotRead(path.display().to_string()))
        }
    }

    fn census_tree(breakdown: &Value, filter: Option<&str>, scale: u64) -> CensusReport {
        let kind = breakdown
            .get("by")
            .and_then(Value::as_str)
            .unwrap_or("count");
        let children: Vec<CensusNode> = STUB_GROUPS
            .iter()
            .map(|(group, count, bytes)| CensusNode {
                name: format!("{kind}:{group}"),
                count: count * scale,
                bytes: bytes * scale,
                children: vec![],
            })
            .filter(|node| filter.is_none_or(|f| node.name.contains(f)))
            .collect();
        CensusReport {
            root: CensusNode {
                name: kind.to_owned(),
                count: children.iter().map(|c| c.count).sum(),
                bytes: children.iter().map(|c| c.bytes).sum(),
                children,
            },
        }
    }
}

impl HeapAnalyses for StubAnalyses {
    fn read_heap_snapshot(&mut self, path: &Path) -> Result<(), AnalysisError> {
        self.pause();
        if self.config.fail_reads {
            return Err(AnalysisError::Failed(format!(
                "could not read {}",
                path.display()
            )));
        }
        self.read.insert(path.to_path_buf());
        Ok(())
    }

    fn take_census(
        &mut self,
        path: &Path,
        breakdown: &Value,
        filter: Option<&str>,
    ) -> Result<CensusReport, AnalysisError> {
        self.pause();
        self.require_read(path)?;
        if self.config.fail_censuses {
            return Err(AnalysisError::Failed("census failed".into()));
        }
        Ok(Self::census_tree(breakdown, filter, 1))
    }

    fn take_census_diff(
        &mut self,
        first: &Path,
        second: &Path,
        breakdown: &Value,
        filter: Option<&str>,
    ) -> Result<CensusReport, AnalysisError> {
        self.pause();
        self.require_read(first)?;
        self.require_read(second)?;
        if self.config.fail_censuses {
            return Err(AnalysisError::Failed("census diff failed".into()));
        }
        // Both sides hold the same synthetic heap; report the second
        // side's groups as the delta so the diff is non-empty.
        Ok(Self::census_tree(breakdown, filter, 1))
    }

    fn compute_dominator_tree(&mut self, path: &Path) -> Result<DominatorTreeId, AnalysisError> {
        self.pause();
        self.require_read(path)?;
        if self.config.fail_dominator_trees {
            return Err(AnalysisError::Failed("dominator tree computation failed".into()));
        }
        self.next_tree += 1;
        let id = DominatorTreeId(self.next_tree);
        self.trees.insert(id, path.to_path_buf());
        Ok(id)
    }

    fn get_dominator_tree(
        &mut self,
        tree: DominatorTreeId,
        breakdown: &Value,
        limits: FetchLimits,
    ) -> Result<DominatorTreeNode, AnalysisError> {
        self.pause();
        if !self.trees.contains_key(&tree) {
            return Err(AnalysisError::UnknownDominatorTree(tree.0));
        }
        if self.config.fail_dominator_trees {
            return Err(AnalysisError::Failed("dominator tree fetch failed".into()));
        }
        let kind = breakdown
            .get("by")
            .and_then(Value::as_str)
            .unwrap_or("count");
        let shown = STUB_GROUPS.len().min(limits.max_siblings as usize);
        let children = if limits.max_depth == 0 {
            vec![]
        } else {
            STUB_GROUPS[..shown]
                .iter()
                .enumerate()
                .map(|(i, (group, _, bytes))| DominatorTreeNode {
                    node_id: i as u64 + 2,
                    label: format!("{kind}:{group}"),
                    shallow_size: bytes / 4,
                    retained_size: *bytes,
                    children: vec![],
                    more_children_available: false,
                })
                .collect()
        };
        Ok(DominatorTreeNode {
            node_id: 1,
            label: kind.to_owned(),
            shallow_size: 0,
            retained_size: children.iter().map(|c| c.retained_size).sum(),
            more_children_available: shown < STUB_GROUPS.len() || limits.max_depth == 0,
            children,
        })
    }

    fn delete_heap_snapshot(&mut self, path: &Path) {
        self.read.remove(path);
        self.trees.retain(|_, p| p != path);
    }
}
