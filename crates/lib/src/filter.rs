use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::{FacetSpec, Sort, Tristate};

/// The recognized options a caller may pass when listing items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Filter {
    /// Items must carry at least one of these tags.
    pub tags: Vec<String>,
    /// Items must carry none of these tags.
    pub not_tags: Vec<String>,
    /// Only honored for administrative retrieval.
    pub published: Option<Tristate>,
    /// Only honored for administrative retrieval.
    pub trash: Option<Tristate>,
    pub search: Option<String>,
    pub slugs: Option<Vec<String>>,
    pub ids: Option<Vec<String>>,
    pub facets: Option<BTreeMap<String, FacetSpec>>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    /// Feed output: first page only, capped at the configured feed limit.
    pub feed: bool,
    pub sort: Option<Sort>,
    /// Joins to run; `None` runs all of them, an empty list none.
    pub joins: Option<Vec<String>>,
    pub permalink: bool,
}

fn check_values(name: &str, values: &[String]) -> Result<()> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(Error::invalid(format!("{name} must not contain empty values")));
    }
    Ok(())
}

impl Filter {
    /// Decodes a loosely-typed filter, rejecting unknown keys and mistyped values.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Filter::default());
        }
        let filter: Filter =
            serde_json::from_value(value).map_err(|err| Error::invalid(err.to_string()))?;
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<()> {
        check_values("tags", &self.tags)?;
        check_values("notTags", &self.not_tags)?;
        if let Some(slugs) = &self.slugs {
            check_values("slugs", slugs)?;
        }
        if let Some(ids) = &self.ids {
            check_values("ids", ids)?;
        }
        if self.per_page == Some(0) {
            return Err(Error::invalid("perPage must be greater than zero"));
        }
        if let Some(sort) = &self.sort {
            if sort.0.iter().any(|key| key.field.trim().is_empty()) {
                return Err(Error::invalid("sort fields must be non-empty"));
            }
        }
        Ok(())
    }

    /// True when the caller asked for exact records rather than a scoped listing.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.slugs.is_some() || self.ids.is_some()
    }
}
