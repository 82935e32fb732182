use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::build;
use crate::context::{Audience, RequestContext};
use crate::error::{Error, Result};
use crate::executor::{compose, execute, Found};
use crate::filter::Filter;
use crate::list::retrieve;
use crate::options::{Permalink, Projection, StoreOptions};
use crate::record::{Document, Item};
use crate::store::Store;
use crate::Engine;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Args {
    #[serde(rename = "type")]
    pub kind: String,
    pub slug: String,
    /// The listing the neighbors are taken from.
    pub filter: Value,
    pub page: Option<String>,
    pub params: BTreeMap<String, String>,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub item: Item,
    pub prev_slug: Option<String>,
    pub next_slug: Option<String>,
}

fn find_slug_and_index(slugs: &[&str], slug: &str) -> Option<usize> {
    slugs.iter().position(|s| *s == slug)
}

fn get_prev_and_next_slugs(slugs: &[&str], i: usize) -> (Option<String>, Option<String>) {
    let prev_slug = i
        .checked_sub(1)
        .and_then(|p| slugs.get(p))
        .map(|s| (*s).to_owned());
    let next_slug = slugs.get(i + 1).map(|s| (*s).to_owned());
    (prev_slug, next_slug)
}

/// The item of `kind` at `slug`, its permalink, and its neighbors in the listing.
pub async fn one<S: Store + ?Sized>(engine: &Engine<'_, S>, args: Args) -> Result<Response> {
    let audience = if args.admin {
        Audience::Admin
    } else {
        Audience::Public
    };
    let mut ctx = RequestContext::new(audience, args.params);
    let filter = Filter::from_value(args.filter)?;
    let (scope, page) = engine.page_scope(args.page.as_deref()).await?;

    let listing = build(engine.config, &ctx, &args.kind, &filter, &scope)?;
    let listing_options = StoreOptions {
        sort: listing.options.sort.clone(),
        projection: Projection::Include(vec!["slug".to_owned()]),
        ..StoreOptions::default()
    };
    let listed: Found<Document> = execute(
        engine.store,
        &compose(&listing.kind, &listing.criteria, &listing.options),
        &listing_options,
    )
    .await?;
    let slugs = listed
        .items
        .iter()
        .filter_map(|doc| doc.get("slug").and_then(Value::as_str))
        .collect::<Vec<_>>();

    let lookup = Filter {
        slugs: Some(vec![args.slug.clone()]),
        joins: filter.joins.clone(),
        ..Filter::default()
    };
    let mut selection = build(engine.config, &ctx, &args.kind, &lookup, &scope)?;
    selection.options.facets.clear();
    selection.options.permalink = match page {
        Some(page) => Permalink::Under(page),
        None => Permalink::BestPage,
    };

    let item = retrieve(engine, &mut ctx, &selection)
        .await?
        .items
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("No {} at {}", args.kind, args.slug)))?;

    let (prev_slug, next_slug) = find_slug_and_index(&slugs, &item.slug)
        .map(|i| get_prev_and_next_slugs(&slugs, i))
        .unwrap_or_default();

    Ok(Response {
        item,
        prev_slug,
        next_slug,
    })
}
