use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::criteria::{Condition, Criteria};
use crate::error::{Error, Result};
use crate::options::{ListOptions, Projection, Sort, StoreOptions, Tristate};
use crate::record::{ContainerPage, Item, PATH_SEPARATOR};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct Found<T = Item> {
    pub items: Vec<T>,
    pub total: usize,
}

/// A boolean flag filter where a missing field reads as `missing`.
fn flag(field: &str, state: Tristate, missing: bool) -> Criteria {
    let wanted = match state {
        Tristate::Any => return Criteria::All,
        Tristate::Yes => true,
        Tristate::No => false,
    };
    if wanted == missing {
        Criteria::field(field, Condition::Ne(Value::Bool(!wanted)))
    } else {
        Criteria::field(field, Condition::Eq(Value::Bool(wanted)))
    }
}

fn strings(values: &[String]) -> Vec<Value> {
    values.iter().cloned().map(Value::String).collect()
}

/// The full store criteria for a listing: type, state, the stored criteria and every option filter.
#[must_use]
pub fn compose(kind: &str, criteria: &Criteria, options: &ListOptions) -> Criteria {
    let mut clauses = vec![
        Criteria::field("type", Condition::Eq(Value::String(kind.to_owned()))),
        flag("published", options.published, true),
        flag("trash", options.trash, false),
        criteria.clone(),
    ];
    for (field, values) in &options.any_of {
        clauses.push(Criteria::field(field, Condition::In(values.clone())));
    }
    for (field, values) in &options.none_of {
        clauses.push(Criteria::field(field, Condition::Nin(values.clone())));
    }
    if let Some(search) = &options.search {
        clauses.push(Criteria::field("searchText", Condition::Contains(search.clone())));
    }
    if let Some(slugs) = &options.slugs {
        clauses.push(Criteria::field("slug", Condition::In(strings(slugs))));
    }
    if let Some(ids) = &options.ids {
        clauses.push(Criteria::field("_id", Condition::In(strings(ids))));
    }
    Criteria::and(clauses)
}

/// Leaves out document bodies and search text.
#[must_use]
pub fn without_heavy_fields() -> Projection {
    Projection::Exclude(vec!["body".to_owned(), "searchText".to_owned()])
}

/// Criteria for navigable, untrashed pages of the given types.
#[must_use]
pub fn navigable_pages(page_types: &[String]) -> Criteria {
    Criteria::and([
        Criteria::field("type", Condition::In(strings(page_types))),
        Criteria::field("slug", Condition::Prefix(PATH_SEPARATOR.to_string())),
        Criteria::field("trash", Condition::Ne(Value::Bool(true))),
    ])
}

/// Runs one store query and decodes the records. Store failures propagate untouched.
pub async fn execute<T, S>(store: &S, criteria: &Criteria, options: &StoreOptions) -> Result<Found<T>>
where
    T: DeserializeOwned,
    S: Store + ?Sized,
{
    let mut options = options.clone();
    if options.sort.is_empty() {
        options.sort = Sort::by_title();
    }

    debug!("Executing query: {criteria:?} with {options:?}");
    let result = store.query(criteria, &options).await?;

    let items = result
        .records
        .into_iter()
        .map(|doc| {
            let id = doc.get("_id").cloned().unwrap_or(Value::Null);
            serde_json::from_value(Value::Object(doc))
                .map_err(|err| Error::store(format!("Malformed record ({id}): {err}")))
        })
        .collect::<Result<Vec<T>>>()?;

    Ok(Found {
        items,
        total: result.total,
    })
}

/// The untrashed container page at `slug`.
pub async fn find_page<S: Store + ?Sized>(store: &S, slug: &str) -> Result<ContainerPage> {
    let criteria = Criteria::and([
        Criteria::field("slug", Condition::Eq(Value::String(slug.to_owned()))),
        Criteria::field("trash", Condition::Ne(Value::Bool(true))),
    ]);
    let options = StoreOptions {
        limit: Some(1),
        projection: without_heavy_fields(),
        ..StoreOptions::default()
    };
    let found: Found<ContainerPage> = execute(store, &criteria, &options).await?;
    found
        .items
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("No page at {slug}")))
}
