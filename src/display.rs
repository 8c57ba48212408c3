//! Display strategies and their catalogs.
//!
//! A display names how census, tree-map, and dominator-tree nodes are
//! grouped and labeled. The `breakdown` is a JSON description of the
//! grouping that is handed to the heap-analysis worker unchanged; the
//! panel itself only reads its top-level `"by"` key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use crate::error::CatalogError;

/// Anything that can sit in a [`Catalog`]: a display with a unique,
/// user-facing name.
pub trait NamedDisplay: Clone + PartialEq + Send + Sync + 'static {
    /// The name shown in the selector and used to look the display up.
    fn display_name(&self) -> &str;

    /// Hover text for the selector entry.
    fn tooltip(&self) -> &str;

    /// The grouping description handed to the worker.
    fn breakdown(&self) -> &Value;

    /// The breakdown's top-level grouping key (e.g. `"coarseType"`).
    fn breakdown_kind(&self) -> &str {
        self.breakdown()
            .get("by")
            .and_then(Value::as_str)
            .unwrap_or("count")
    }
}

fn count() -> Value {
    json!({ "by": "count", "count": true, "bytes": true })
}

fn internal_type() -> Value {
    json!({ "by": "internalType", "then": count() })
}

fn object_class() -> Value {
    json!({ "by": "objectClass", "then": count(), "other": count() })
}

fn allocation_stack() -> Value {
    json!({ "by": "allocationStack", "then": count(), "noStack": count() })
}

fn coarse_type() -> Value {
    json!({
        "by": "coarseType",
        "objects": object_class(),
        "strings": count(),
        "scripts": {
            "by": "filename",
            "then": internal_type(),
            "noFilename": internal_type(),
        },
        "other": internal_type(),
    })
}

/// How a census (and a census diff) groups its nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusDisplay {
    /// Selector label; unique within its catalog.
    pub display_name: String,
    /// Hover text for the selector entry.
    pub tooltip: String,
    /// Whether the census tree is inverted (leaves become roots).
    #[serde(default)]
    pub inverted: bool,
    /// Grouping handed to the worker.
    pub breakdown: Value,
}

impl CensusDisplay {
    /// Group by coarse type: objects, strings, scripts, other.
    pub fn coarse_type() -> Self {
        Self {
            display_name: "Type".into(),
            tooltip: "Group items by their type".into(),
            inverted: false,
            breakdown: coarse_type(),
        }
    }

    /// Group by the JavaScript stack recorded at allocation time.
    pub fn allocation_stack() -> Self {
        Self {
            display_name: "Call Stack".into(),
            tooltip: "Group items by the JavaScript stack recorded when the object was allocated"
                .into(),
            inverted: false,
            breakdown: allocation_stack(),
        }
    }

    /// Allocation stacks, youngest frame first.
    pub fn inverted_allocation_stack() -> Self {
        Self {
            display_name: "Inverted Call Stack".into(),
            tooltip: "Group items by the inverted JavaScript call stack recorded when the object was allocated".into(),
            inverted: true,
            breakdown: allocation_stack(),
        }
    }
}

impl NamedDisplay for CensusDisplay {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn tooltip(&self) -> &str {
        &self.tooltip
    }

    fn breakdown(&self) -> &Value {
        &self.breakdown
    }
}

/// How dominator-tree nodes are labeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominatorTreeDisplay {
    /// Selector label; unique within its catalog.
    pub display_name: String,
    /// Hover text for the selector entry.
    pub tooltip: String,
    /// Labeling handed to the worker.
    pub breakdown: Value,
}

impl DominatorTreeDisplay {
    pub fn coarse_type() -> Self {
        Self {
            display_name: "Type".into(),
            tooltip: "Label objects by the broad categories they fit in".into(),
            breakdown: json!({
                "by": "coarseType",
                "objects": object_class(),
                "strings": internal_type(),
                "scripts": internal_type(),
                "other": internal_type(),
            }),
        }
    }

    pub fn allocation_stack() -> Self {
        Self {
            display_name: "Call Stack".into(),
            tooltip: "Label objects by the JavaScript stack recorded when it was allocated".into(),
            breakdown: json!({
                "by": "allocationStack",
                "then": coarse_type(),
                "noStack": coarse_type(),
            }),
        }
    }

    pub fn internal_type() -> Self {
        Self {
            display_name: "Internal Type".into(),
            tooltip: "Label objects by their internal C++ type name".into(),
            breakdown: internal_type(),
        }
    }
}

impl NamedDisplay for DominatorTreeDisplay {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn tooltip(&self) -> &str {
        &self.tooltip
    }

    fn breakdown(&self) -> &Value {
        &self.breakdown
    }
}

/// How the tree map groups its rectangles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMapDisplay {
    /// Selector label; unique within its catalog.
    pub display_name: String,
    /// Hover text for the selector entry.
    pub tooltip: String,
    /// Grouping handed to the worker.
    pub breakdown: Value,
}

impl TreeMapDisplay {
    pub fn coarse_type() -> Self {
        Self {
            display_name: "Type".into(),
            tooltip: "Group items by their type".into(),
            breakdown: coarse_type(),
        }
    }
}

impl NamedDisplay for TreeMapDisplay {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn tooltip(&self) -> &str {
        &self.tooltip
    }

    fn breakdown(&self) -> &Value {
        &self.breakdown
    }
}

/// An ordered, non-empty list of displays with unique names.
///
/// The first entry is the default selection. Deserialization goes through
/// [`Catalog::new`], so an empty or ambiguous catalog cannot be loaded
/// from configuration either.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    try_from = "Vec<D>",
    bound(deserialize = "D: NamedDisplay + DeserializeOwned")
)]
pub struct Catalog<D> {
    entries: Vec<D>,
}

impl<D: NamedDisplay> Catalog<D> {
    /// Build a catalog from its entries.
    ///
    /// # Errors
    ///
    /// * [`CatalogError::Empty`] if `entries` is empty.
    /// * [`CatalogError::DuplicateName`] if two entries share a display name.
    pub fn new(entries: Vec<D>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, entry) in entries.iter().enumerate() {
            let name = entry.display_name();
            if entries[..i].iter().any(|e| e.display_name() == name) {
                return Err(CatalogError::DuplicateName(name.to_owned()));
            }
        }
        Ok(Self { entries })
    }

    /// The display selected before the user picks one.
    pub fn default_display(&self) -> &D {
        // Non-empty by construction.
        &self.entries[0]
    }

    /// Look a display up by its name.
    pub fn find(&self, display_name: &str) -> Option<&D> {
        self.entries
            .iter()
            .find(|d| d.display_name() == display_name)
    }

    pub fn contains(&self, display: &D) -> bool {
        self.entries.iter().any(|d| d == display)
    }

    pub fn entries(&self) -> &[D] {
        &self.entries
    }

    /// Number of displays; always at least one.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; present so the type reads like a collection.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D: NamedDisplay> TryFrom<Vec<D>> for Catalog<D> {
    type Error = CatalogError;

    fn try_from(entries: Vec<D>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl<D: Serialize> Serialize for Catalog<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// The three catalogs the panel offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayCatalogs {
    pub census: Catalog<CensusDisplay>,
    pub tree_map: Catalog<TreeMapDisplay>,
    pub dominator_tree: Catalog<DominatorTreeDisplay>,
}

impl Default for DisplayCatalogs {
    fn default() -> Self {
        Self {
            census: Catalog {
                entries: vec![
                    CensusDisplay::coarse_type(),
                    CensusDisplay::allocation_stack(),
                    CensusDisplay::inverted_allocation_stack(),
                ],
            },
            tree_map: Catalog {
                entries: vec![TreeMapDisplay::coarse_type()],
            },
            dominator_tree: Catalog {
                entries: vec![
                    DominatorTreeDisplay::coarse_type(),
                    DominatorTreeDisplay::allocation_stack(),
                    DominatorTreeDisplay::internal_type(),
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_is_rejected() {
        let result = Catalog::<TreeMapDisplay>::new(vec![]);
        assert_eq!(result.unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Catalog::new(vec![
            CensusDisplay::coarse_type(),
            CensusDisplay::coarse_type(),
        ]);
        assert_eq!(
            result.unwrap_err(),
            CatalogError::DuplicateName("Type".into())
        );
    }

    #[test]
    fn default_display_is_first_entry() {
        let catalogs = DisplayCatalogs::default();
        assert_eq!(
            catalogs.dominator_tree.default_display(),
            &DominatorTreeDisplay::coarse_type()
        );
        assert_eq!(
            catalogs.census.default_display(),
            &CensusDisplay::coarse_type()
        );
        assert_eq!(catalogs.tree_map.len(), 1);
    }

    #[test]
    fn find_by_display_name() {
        let catalogs = DisplayCatalogs::default();
        let found = catalogs.dominator_tree.find("Call Stack");
        assert_eq!(found, Some(&DominatorTreeDisplay::allocation_stack()));
        assert!(catalogs.dominator_tree.find("Nope").is_none());
    }

    #[test]
    fn breakdown_kind_reads_top_level_by() {
        assert_eq!(
            DominatorTreeDisplay::allocation_stack().breakdown_kind(),
            "allocationStack"
        );
        assert_eq!(
            DominatorTreeDisplay::internal_type().breakdown_kind(),
            "internalType"
        );
        assert_eq!(TreeMapDisplay::coarse_type().breakdown_kind(), "coarseType");
    }

    #[test]
    fn catalog_serializes_as_plain_list() {
        let catalog = Catalog::new(vec![TreeMapDisplay::coarse_type()]).unwrap();
        let value = serde_json::to_value(&catalog).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["display_name"], "Type");
    }

    #[test]
    fn deserializing_empty_catalog_fails() {
        let result: Result<Catalog<TreeMapDisplay>, _> = serde_json::from_str("[]");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("must not be empty"), "got: {err}");
    }

    #[test]
    fn catalogs_deserialize_from_json() {
        let json = serde_json::to_string(&DisplayCatalogs::default()).unwrap();
        let back: DisplayCatalogs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DisplayCatalogs::default());
    }
}
