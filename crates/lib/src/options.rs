use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{ContainerPage, Document};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort(pub Vec<SortKey>);

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| compare_values(Some(a), Some(b)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort(vec![SortKey {
            field: field.into(),
            direction: Direction::Asc,
        }])
    }

    /// Normalized title ascending.
    #[must_use]
    pub fn by_title() -> Self {
        Sort::asc("sortTitle")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares by each key in turn, then by `_id` so equal keys still order stably.
    #[must_use]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.0
            .iter()
            .map(|key| {
                let ordering = compare_values(a.get(&key.field), b.get(&key.field));
                match key.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or_else(|| compare_values(a.get("_id"), b.get("_id")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    #[must_use]
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Projection::All => doc,
            Projection::Include(fields) => {
                doc.retain(|k, _| k == "_id" || fields.iter().any(|f| f == k));
                doc
            }
            Projection::Exclude(fields) => {
                doc.retain(|k, _| !fields.iter().any(|f| f == k));
                doc
            }
        }
    }
}

/// What the store is asked for alongside the criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    pub skip: usize,
    pub limit: Option<usize>,
    pub sort: Sort,
    pub projection: Projection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacetSpec {
    /// Allow-list applied to the distinct values.
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub always: Option<String>,
    /// Request parameter carrying the caller's active value for this facet.
    pub param: Option<String>,
    /// Hard restriction reapplied when the facet's own filter is lifted. Set from the container page, never by callers.
    #[serde(skip)]
    pub restrict: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joins {
    #[default]
    All,
    Skip,
    Only(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permalink {
    #[default]
    Off,
    /// Resolve the best container page for every item, in order.
    BestPage,
    /// Place every item under this page.
    Under(ContainerPage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    Any,
    Yes,
    No,
}

/// Everything a listing needs besides the stored criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub skip: usize,
    pub limit: Option<usize>,
    pub sort: Sort,
    /// Field must hold at least one of the values.
    pub any_of: BTreeMap<String, Vec<Value>>,
    /// Field must hold none of the values.
    pub none_of: BTreeMap<String, Vec<Value>>,
    pub search: Option<String>,
    pub published: Tristate,
    pub trash: Tristate,
    pub slugs: Option<Vec<String>>,
    pub ids: Option<Vec<String>>,
    /// Restore the order of `ids` instead of sorting.
    pub order_by_ids: bool,
    pub facets: BTreeMap<String, FacetSpec>,
    pub joins: Joins,
    pub permalink: Permalink,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: None,
            sort: Sort::by_title(),
            any_of: BTreeMap::new(),
            none_of: BTreeMap::new(),
            search: None,
            published: Tristate::Yes,
            trash: Tristate::No,
            slugs: None,
            ids: None,
            order_by_ids: false,
            facets: BTreeMap::new(),
            joins: Joins::All,
            permalink: Permalink::Off,
        }
    }
}

impl ListOptions {
    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            skip: self.skip,
            limit: self.limit,
            sort: self.sort.clone(),
            projection: Projection::All,
        }
    }
}
