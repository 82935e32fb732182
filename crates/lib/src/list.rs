use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::builder::{build, Selection};
use crate::context::{Audience, RequestContext};
use crate::error::Result;
use crate::executor::{compose, execute, Found};
use crate::facet::{resolve_facets, Facets};
use crate::filter::Filter;
use crate::options::Permalink;
use crate::permalink::{apply_best, apply_to_page};
use crate::record::Item;
use crate::reorder::reorder;
use crate::store::Store;
use crate::Engine;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Args {
    #[serde(rename = "type")]
    pub kind: String,
    pub filter: Value,
    /// Slug of the container page the listing appears under.
    pub page: Option<String>,
    pub params: BTreeMap<String, String>,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub items: Vec<Item>,
    pub total: usize,
    #[serde(skip_serializing_if = "Facets::is_empty")]
    pub facets: Facets,
}

fn paginate(items: Vec<Item>, skip: usize, limit: Option<usize>) -> Vec<Item> {
    match limit {
        None => items.into_iter().skip(skip).collect(),
        Some(limit) => items.into_iter().skip(skip).take(limit).collect(),
    }
}

/// Query, then joins, then facets, then permalinks. The first failing step aborts the rest.
pub async fn retrieve<S: Store + ?Sized>(
    engine: &Engine<'_, S>,
    ctx: &mut RequestContext,
    selection: &Selection,
) -> Result<Response> {
    let options = &selection.options;
    let criteria = compose(&selection.kind, &selection.criteria, options);

    let Found { mut items, total } = if options.order_by_ids {
        let mut store_options = options.store_options();
        store_options.skip = 0;
        store_options.limit = None;
        let found: Found = execute(engine.store, &criteria, &store_options).await?;
        let ids = options.ids.as_deref().unwrap_or_default();
        let ordered = reorder(ids, found.items);
        Found {
            total: ordered.len(),
            items: paginate(ordered, options.skip, options.limit),
        }
    } else {
        execute(engine.store, &criteria, &options.store_options()).await?
    };

    engine
        .joiner
        .join(ctx, engine.config.schema(&selection.kind), &mut items, &options.joins)
        .await?;

    let facets = resolve_facets(engine.store, ctx, selection).await?;

    let permalinker = engine.permalinker(&selection.kind);
    match &options.permalink {
        Permalink::Off => {}
        Permalink::BestPage => {
            let resolver = engine.best_pages();
            apply_best(&resolver, permalinker.as_ref(), ctx, &mut items).await?;
        }
        Permalink::Under(page) => apply_to_page(permalinker.as_ref(), &mut items, page).await?,
    }

    debug!(
        "Retrieved {} of {total} {} items",
        items.len(),
        selection.kind
    );

    Ok(Response {
        items,
        total,
        facets,
    })
}

/// Runs one listing request with a fresh request context.
pub async fn query<S: Store + ?Sized>(engine: &Engine<'_, S>, args: Args) -> Result<Response> {
    let audience = if args.admin {
        Audience::Admin
    } else {
        Audience::Public
    };
    let mut ctx = RequestContext::new(audience, args.params);
    let filter = Filter::from_value(args.filter)?;

    let (scope, page) = engine.page_scope(args.page.as_deref()).await?;
    let mut selection = build(engine.config, &ctx, &args.kind, &filter, &scope)?;
    if let Some(page) = page {
        selection.options.permalink = Permalink::Under(page);
    }

    retrieve(engine, &mut ctx, &selection).await
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::{query, Args};
    use crate::config::{Config, SchemaField, TypeConfig};
    use crate::context::RequestContext;
    use crate::criteria::Criteria;
    use crate::error::{Error, Result};
    use crate::frontmatter_file::Keeper;
    use crate::join::{Joiner, NoJoins, StoreJoiner};
    use crate::options::{Joins, StoreOptions};
    use crate::record::{Document, Item};
    use crate::store::{QueryResult, Store};
    use crate::Engine;

    macro_rules! s {
        ($v:literal) => {
            $v.to_string()
        };
    }

    macro_rules! deserial {
        ($tokens:tt) => {
            serde_json::from_value(json!($tokens)).unwrap()
        };
    }

    macro_rules! doc {
        ($tokens:tt) => {
            serde_json::from_value::<Document>(json!($tokens)).unwrap()
        };
    }

    fn make_test_keeper() -> Keeper {
        Keeper::from_documents([
            doc!({ "_id": "1", "type": "blogPost", "slug": "apples", "sortTitle": "apples", "tags": ["red", "fruit"], "authorIds": ["a1"] }),
            doc!({ "_id": "2", "type": "blogPost", "slug": "berries", "sortTitle": "berries", "tags": ["blue", "fruit"] }),
            doc!({ "_id": "3", "type": "blogPost", "slug": "cherries", "sortTitle": "cherries", "tags": ["red", "fruit", "old"] }),
            doc!({ "_id": "4", "type": "blogPost", "slug": "dates", "sortTitle": "dates", "tags": ["brown"] }),
            doc!({ "_id": "a1", "type": "person", "slug": "ann", "sortTitle": "ann" }),
            doc!({ "_id": "p1", "type": "blog", "slug": "/fruit/", "settings": { "tags": ["fruit"], "notTags": ["old"] } }),
        ])
    }

    fn make_test_config() -> Config {
        let mut config = Config::default();
        config.types.insert(
            s!("blogPost"),
            TypeConfig {
                pages: vec![s!("blog")],
                facets: vec![s!("tags")],
                schema: deserial!([
                    { "name": "authors", "type": "join", "withType": "person", "idsField": "authorIds" }
                ]),
                ..TypeConfig::default()
            },
        );
        config
    }

    fn slugs(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.slug.as_str()).collect()
    }

    #[tokio::test]
    async fn listing_under_a_page() {
        let keeper = make_test_keeper();
        let config = make_test_config();
        let joiner = StoreJoiner::new(&keeper);
        let engine = Engine::new(&keeper, &config, &joiner);

        let response = query(
            &engine,
            Args {
                kind: s!("blogPost"),
                page: Some(s!("/fruit/")),
                ..Args::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(vec!["apples", "berries"], slugs(&response.items));
        assert_eq!(2, response.total);
        assert_eq!(
            vec![Some("/fruit/apples"), Some("/fruit/berries")],
            response
                .items
                .iter()
                .map(|i| i.url.as_deref())
                .collect::<Vec<_>>()
        );
        assert_eq!(vec![s!("fruit")], response.facets["tags"]);
        assert_eq!(
            Some("a1"),
            response.items[0].fields["_authors"][0]["_id"].as_str()
        );
    }

    #[tokio::test]
    async fn ordered_ids_paginate_after_reordering() {
        let keeper = make_test_keeper();
        let config = Config::default();
        let engine = Engine::new(&keeper, &config, &NoJoins);

        let response = query(
            &engine,
            Args {
                kind: s!("blogPost"),
                filter: json!({ "ids": ["4", "missing", "1", "3"], "perPage": 2, "page": 2 }),
                ..Args::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(3, response.total);
        assert_eq!(vec!["cherries"], slugs(&response.items));
        assert!(response.facets.is_empty());
    }

    #[tokio::test]
    async fn best_page_permalinks_on_request() {
        let keeper = make_test_keeper();
        let config = make_test_config();
        let engine = Engine::new(&keeper, &config, &NoJoins);

        let response = query(
            &engine,
            Args {
                kind: s!("blogPost"),
                filter: json!({ "tags": ["brown"], "permalink": true, "facets": {} }),
                ..Args::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(vec!["dates"], slugs(&response.items));
        assert_eq!(Some("/fruit/dates"), response.items[0].url.as_deref());
    }

    #[tokio::test]
    async fn invalid_filters_never_reach_the_store() {
        let store = FailingStore::default();
        let config = Config::default();
        let engine = Engine::new(&store, &config, &NoJoins);

        let err = query(
            &engine,
            Args {
                kind: s!("blogPost"),
                filter: json!({ "tags": "red" }),
                ..Args::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidCriteria { .. }));
        assert_eq!(0, store.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let keeper = make_test_keeper();
        let config = Config::default();
        let engine = Engine::new(&keeper, &config, &NoJoins);

        let err = query(
            &engine,
            Args {
                kind: s!("blogPost"),
                page: Some(s!("/nowhere")),
                ..Args::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[derive(Default)]
    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Store for FailingStore {
        async fn query(&self, _: &Criteria, _: &StoreOptions) -> Result<QueryResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::store("connection reset"))
        }

        async fn distinct(&self, _: &Criteria, _: &str) -> Result<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::store("connection reset"))
        }
    }

    struct FailingJoiner;

    #[async_trait]
    impl Joiner for FailingJoiner {
        async fn join(
            &self,
            _: &RequestContext,
            _: &[SchemaField],
            items: &mut [Item],
            _: &Joins,
        ) -> Result<()> {
            for item in items.iter_mut() {
                item.url = Some(s!("half-done"));
            }
            Err(Error::store("join target unavailable"))
        }
    }

    #[tokio::test]
    async fn join_failure_aborts_the_listing() {
        let keeper = make_test_keeper();
        let config = make_test_config();
        let engine = Engine::new(&keeper, &config, &FailingJoiner);

        let err = query(
            &engine,
            Args {
                kind: s!("blogPost"),
                ..Args::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Store { .. }));
    }
}
