use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SchemaField;
use crate::context::{Audience, RequestContext};
use crate::criteria::Criteria;
use crate::error::Result;
use crate::executor::{compose, execute, without_heavy_fields, Found};
use crate::options::{Joins, ListOptions, StoreOptions, Tristate};
use crate::record::{Document, Item};
use crate::store::Store;

pub const JOIN_KIND: &str = "join";

/// Attaches related records to items in place, after the base query and before facets and permalinks.
#[async_trait]
pub trait Joiner: Send + Sync {
    async fn join(
        &self,
        ctx: &RequestContext,
        schema: &[SchemaField],
        items: &mut [Item],
        joins: &Joins,
    ) -> Result<()>;
}

pub struct NoJoins;

#[async_trait]
impl Joiner for NoJoins {
    async fn join(&self, _: &RequestContext, _: &[SchemaField], _: &mut [Item], _: &Joins) -> Result<()> {
        Ok(())
    }
}

fn wanted(joins: &Joins, name: &str) -> bool {
    match joins {
        Joins::All => true,
        Joins::Skip => false,
        Joins::Only(names) => names.iter().any(|n| n == name),
    }
}

/// Resolves `join` schema fields against the same store: the ids in `idsField`
/// are fetched as `withType` records and attached under `_<name>`.
pub struct StoreJoiner<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> StoreJoiner<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<'a, S: Store + ?Sized> Joiner for StoreJoiner<'a, S> {
    async fn join(
        &self,
        ctx: &RequestContext,
        schema: &[SchemaField],
        items: &mut [Item],
        joins: &Joins,
    ) -> Result<()> {
        let fields = schema
            .iter()
            .filter(|f| f.kind == JOIN_KIND && wanted(joins, &f.name));

        for field in fields {
            let (Some(with_type), Some(ids_field)) = (&field.with_type, &field.ids_field) else {
                warn!("Join field {} has no withType or idsField; skipped", field.name);
                continue;
            };

            let mut ids: Vec<String> = vec![];
            for id in items.iter().flat_map(|item| item.values(ids_field)) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }

            let mut by_id = HashMap::new();
            if !ids.is_empty() {
                let options = ListOptions {
                    ids: Some(ids),
                    published: match ctx.audience {
                        Audience::Public => Tristate::Yes,
                        Audience::Admin => Tristate::Any,
                    },
                    ..ListOptions::default()
                };
                let criteria = compose(with_type, &Criteria::All, &options);
                let store_options = StoreOptions {
                    projection: without_heavy_fields(),
                    ..StoreOptions::default()
                };
                let found: Found<Document> = execute(self.store, &criteria, &store_options).await?;
                debug!("Joined {} {with_type} records for {}", found.total, field.name);

                for doc in found.items {
                    if let Some(id) = doc.get("_id").and_then(Value::as_str) {
                        by_id.insert(id.to_owned(), doc);
                    }
                }
            }

            let key = format!("_{}", field.name);
            for item in items.iter_mut() {
                let joined = item
                    .values(ids_field)
                    .iter()
                    .filter_map(|id| by_id.get(id).cloned().map(Value::Object))
                    .collect();
                item.fields.insert(key.clone(), Value::Array(joined));
            }
        }

        Ok(())
    }
}
