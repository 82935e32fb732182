use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, MatchRule};
use crate::context::{Audience, RequestContext};
use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::executor::{compose, execute, navigable_pages, without_heavy_fields, Found};
use crate::options::{ListOptions, Sort, StoreOptions, Tristate};
use crate::record::{ContainerPage, Item};
use crate::store::Store;
use crate::Engine;

/// How an item is compared against a page's declared values.
pub trait PageMatcher: Send + Sync {
    /// The page settings key holding the page's declared values.
    fn property(&self) -> &str;

    fn item_values(&self, item: &Item) -> Vec<String>;
}

/// Overlap between the item's values for a property and the page's.
pub struct ByProperty(pub String);

impl PageMatcher for ByProperty {
    fn property(&self) -> &str {
        &self.0
    }

    fn item_values(&self, item: &Item) -> Vec<String> {
        item.values(&self.0)
    }
}

/// Pages list their members by id; the item's own id is its only value.
pub struct ById(pub String);

impl PageMatcher for ById {
    fn property(&self) -> &str {
        &self.0
    }

    fn item_values(&self, item: &Item) -> Vec<String> {
        vec![item.id.clone()]
    }
}

#[must_use]
pub fn matcher(rule: &MatchRule) -> Box<dyn PageMatcher> {
    match rule {
        MatchRule::Tags => Box::new(ByProperty("tags".to_owned())),
        MatchRule::Property { property } => Box::new(ByProperty(property.clone())),
        MatchRule::Id { property } => Box::new(ById(property.clone())),
    }
}

/// Two points per shared value, minus one per item value the page lacks.
/// A page declaring nothing starts at one.
#[must_use]
pub fn score(item_values: &[String], page_values: &[String]) -> i64 {
    let base = i64::from(page_values.is_empty());
    let shared = item_values
        .iter()
        .filter(|v| page_values.contains(v))
        .count();
    let missing = item_values.len() - shared;
    base + 2 * shared as i64 - missing as i64
}

/// The highest-scoring page; the first one wins a tie.
#[must_use]
pub fn best_page<'a>(
    pages: &'a [ContainerPage],
    matcher: &dyn PageMatcher,
    item: &Item,
    min_score: Option<i64>,
) -> Option<&'a ContainerPage> {
    let values = matcher.item_values(item);
    let mut best: Option<(&ContainerPage, i64)> = None;

    for page in pages {
        let page_score = score(&values, &page.setting_values(matcher.property()));
        if best.map_or(true, |(_, best_score)| page_score > best_score) {
            best = Some((page, page_score));
        }
    }

    best.filter(|(_, best_score)| min_score.map_or(true, |min| *best_score >= min))
        .map(|(page, _)| page)
}

pub struct BestPageResolver<'a, S: ?Sized> {
    store: &'a S,
    config: &'a Config,
}

impl<'a, S: Store + ?Sized> BestPageResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a Config) -> Self {
        Self { store, config }
    }

    async fn candidates<'c>(
        &self,
        ctx: &'c mut RequestContext,
        kind: &str,
    ) -> Result<&'c [ContainerPage]> {
        if ctx.best_pages.get(kind).is_some() {
            debug!("Best-page candidates for {kind} served from request cache");
        } else {
            let page_types = self.config.page_types(kind);
            let pages = if page_types.is_empty() {
                vec![]
            } else {
                let options = StoreOptions {
                    sort: Sort::by_title(),
                    projection: without_heavy_fields(),
                    ..StoreOptions::default()
                };
                let found: Found<ContainerPage> =
                    execute(self.store, &navigable_pages(page_types), &options).await?;
                found.items
            };
            debug!("Cached {} best-page candidates for {kind}", pages.len());
            ctx.best_pages.populate(kind, pages);
        }
        Ok(ctx.best_pages.get(kind).unwrap_or_default())
    }

    /// The most relevant container page for `item`, or `None` when nothing fits.
    pub async fn find_best_page(
        &self,
        ctx: &mut RequestContext,
        item: &Item,
    ) -> Result<Option<ContainerPage>> {
        let rule = self
            .config
            .type_config(&item.kind)
            .map(|t| t.matching.clone())
            .unwrap_or_default();
        let matcher = matcher(&rule);
        let min_score = self.config.min_page_score;

        let pages = self.candidates(ctx, &item.kind).await?;
        Ok(best_page(pages, matcher.as_ref(), item, min_score).cloned())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Args {
    #[serde(rename = "type")]
    pub kind: String,
    pub slug: String,
    pub params: BTreeMap<String, String>,
    pub admin: bool,
}

/// Best page for the item of `kind` at `slug`; the item itself must exist.
pub async fn lookup<S: Store + ?Sized>(
    engine: &Engine<'_, S>,
    args: Args,
) -> Result<Option<ContainerPage>> {
    let audience = if args.admin {
        Audience::Admin
    } else {
        Audience::Public
    };
    let mut ctx = RequestContext::new(audience, args.params);

    let options = ListOptions {
        slugs: Some(vec![args.slug.clone()]),
        published: match audience {
            Audience::Public => Tristate::Yes,
            Audience::Admin => Tristate::Any,
        },
        ..ListOptions::default()
    };
    let criteria = compose(&args.kind, &Criteria::All, &options);
    let store_options = StoreOptions {
        limit: Some(1),
        ..options.store_options()
    };
    let found: Found = execute(engine.store, &criteria, &store_options).await?;
    let item = found
        .items
        .first()
        .ok_or_else(|| Error::not_found(format!("No {} at {}", args.kind, args.slug)))?;

    engine.best_pages().find_best_page(&mut ctx, item).await
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::{best_page, score, BestPageResolver, ById, ByProperty};
    use crate::config::{Config, MatchRule, TypeConfig};
    use crate::context::RequestContext;
    use crate::criteria::Criteria;
    use crate::error::{Error, Result};
    use crate::frontmatter_file::Keeper;
    use crate::options::StoreOptions;
    use crate::record::{ContainerPage, Document, Item};
    use crate::store::{QueryResult, Store};

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

    fn page(id: &str, tags: &[&str]) -> ContainerPage {
        deserial!({
            "_id": id,
            "type": "blog",
            "slug": format!("/{id}"),
            "settings": { "tags": tags }
        })
    }

    fn item(tags: &[&str]) -> Item {
        deserial!({ "_id": "i1", "type": "blogPost", "slug": "post", "tags": tags })
    }

    #[test]
    fn scoring() {
        assert_eq!(0, score(&[s!("red")], &[]));
        assert_eq!(1, score(&[], &[]));
        assert_eq!(2, score(&[s!("red")], &[s!("red")]));
        assert_eq!(-1, score(&[s!("green")], &[s!("red")]));
        assert_eq!(1, score(&[s!("red"), s!("blue")], &[s!("red")]));
    }

    #[test]
    fn full_overlap_beats_half_overlap() {
        let pages = [page("half", &["red", "round"]), page("full", &["red", "blue"])];
        let matcher = ByProperty(s!("tags"));

        let best = best_page(&pages, &matcher, &item(&["red", "blue"]), None).unwrap();

        assert_eq!("full", best.id);
    }

    #[test]
    fn ties_keep_the_first_page() {
        let pages = [page("first", &["red"]), page("second", &["red"])];
        let matcher = ByProperty(s!("tags"));

        for _ in 0..3 {
            let best = best_page(&pages, &matcher, &item(&["red"]), None).unwrap();
            assert_eq!("first", best.id);
        }
    }

    #[test]
    fn no_pages_is_not_an_error() {
        let matcher = ByProperty(s!("tags"));
        assert!(best_page(&[], &matcher, &item(&["red"]), None).is_none());
    }

    #[test]
    fn minimum_score_rejects_weak_matches() {
        let pages = [page("other", &["blue"])];
        let matcher = ByProperty(s!("tags"));
        assert!(best_page(&pages, &matcher, &item(&["red"]), Some(0)).is_none());
        assert!(best_page(&pages, &matcher, &item(&["red"]), None).is_some());
    }

    #[test]
    fn membership_by_id() {
        let mut members: ContainerPage = deserial!({
            "_id": "team",
            "type": "people",
            "slug": "/team",
            "settings": { "memberIds": ["i1", "i9"] }
        });
        let everyone = page("everyone", &[]);
        let matcher = ById(s!("memberIds"));

        let pages = [everyone.clone(), members.clone()];
        let best = best_page(&pages, &matcher, &item(&["red"]), None).unwrap();
        assert_eq!("team", best.id);

        members.settings.insert(s!("memberIds"), json!(["i9"]));
        let pages = [everyone, members];
        let best = best_page(&pages, &matcher, &item(&[]), None).unwrap();
        assert_eq!("everyone", best.id);
    }

    struct CountingStore {
        keeper: Keeper,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn query(&self, criteria: &Criteria, options: &StoreOptions) -> Result<QueryResult> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.keeper.query(criteria, options).await
        }

        async fn distinct(&self, _: &Criteria, _: &str) -> Result<Vec<Value>> {
            Err(Error::store("unused"))
        }
    }

    fn blog_config() -> Config {
        let mut config = Config::default();
        config.types.insert(
            s!("blogPost"),
            TypeConfig {
                pages: vec![s!("blog")],
                matching: MatchRule::Tags,
                ..TypeConfig::default()
            },
        );
        config
    }

    #[tokio::test]
    async fn candidates_are_fetched_once_per_type() {
        let store = CountingStore {
            keeper: Keeper::from_documents([
                doc!({ "_id": "p1", "type": "blog", "slug": "/red", "settings": { "tags": ["red"] }, "body": "heavy" }),
                doc!({ "_id": "p2", "type": "blog", "slug": "draft-without-path" }),
                doc!({ "_id": "p3", "type": "shop", "slug": "/shop" }),
            ]),
            queries: AtomicUsize::new(0),
        };
        let config = blog_config();
        let resolver = BestPageResolver::new(&store, &config);
        let mut ctx = RequestContext::public();

        let first = resolver
            .find_best_page(&mut ctx, &item(&["red"]))
            .await
            .unwrap()
            .unwrap();
        let second = resolver
            .find_best_page(&mut ctx, &item(&["blue"]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!("p1", first.id);
        assert_eq!("p1", second.id);
        assert_eq!(1, store.queries.load(Ordering::SeqCst));
        assert_eq!(1, ctx.best_pages.get("blogPost").unwrap().len());

        let unconfigured: Item =
            deserial!({ "_id": "e1", "type": "event", "slug": "party", "tags": ["red"] });
        assert!(resolver
            .find_best_page(&mut ctx, &unconfigured)
            .await
            .unwrap()
            .is_none());
        assert_eq!(1, store.queries.load(Ordering::SeqCst));
        assert_eq!(vec!["blogPost", "event"], ctx.best_pages.kinds().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn fresh_request_starts_with_an_empty_cache() {
        let store = CountingStore {
            keeper: Keeper::from_documents([Document::new()]),
            queries: AtomicUsize::new(0),
        };
        let config = blog_config();
        let resolver = BestPageResolver::new(&store, &config);

        for _ in 0..2 {
            let mut ctx = RequestContext::public();
            assert!(resolver
                .find_best_page(&mut ctx, &item(&["red"]))
                .await
                .unwrap()
                .is_none());
        }
        assert_eq!(2, store.queries.load(Ordering::SeqCst));
    }
}
