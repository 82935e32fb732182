use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::builder::Selection;
use crate::context::RequestContext;
use crate::error::Result;
use crate::executor::compose;
use crate::options::FacetSpec;
use crate::store::Store;

pub type Facets = BTreeMap<String, Vec<String>>;

fn collate_strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(v) => Some(v),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Applies `only`, then `except`, then `always`, and sorts.
#[must_use]
pub fn refine(mut values: Vec<String>, spec: &FacetSpec) -> Vec<String> {
    if !spec.only.is_empty() {
        values.retain(|v| spec.only.contains(v));
    }
    values.retain(|v| !spec.except.contains(v));
    if let Some(always) = &spec.always {
        if !values.contains(always) {
            values.push(always.clone());
        }
    }
    values.sort();
    values.dedup();
    values
}

/// Distinct values per requested facet over the selection's criteria, ignoring skip and limit.
///
/// Facets resolve one after another; the first store failure aborts the lot.
pub async fn resolve_facets<S: Store + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    selection: &Selection,
) -> Result<Facets> {
    let mut facets = Facets::new();

    for (name, spec) in &selection.options.facets {
        let mut options = selection.options.clone();
        options.skip = 0;
        options.limit = None;

        let active = spec.param.as_deref().and_then(|param| ctx.param(param));
        if active.is_some() {
            options.any_of.remove(name);
            if !spec.restrict.is_empty() {
                let restriction = spec.restrict.iter().cloned().map(Value::String).collect();
                options.any_of.insert(name.clone(), restriction);
            }
        }

        let criteria = compose(&selection.kind, &selection.criteria, &options);
        let values = store.distinct(&criteria, name).await?;
        let values = refine(collate_strings(values), spec);

        debug!("Resolved facet {name}: {values:?}");
        facets.insert(name.clone(), values);
    }

    Ok(facets)
}
