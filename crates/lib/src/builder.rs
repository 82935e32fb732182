use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::context::{Audience, RequestContext};
use crate::criteria::{Condition, Criteria};
use crate::error::Result;
use crate::filter::Filter;
use crate::options::{Joins, ListOptions, Permalink, Sort, Tristate};
use crate::record::ContainerPage;

pub const TAGS: &str = "tags";
/// Request parameter carrying the caller's active tag choice.
pub const TAG_PARAM: &str = "tag";

/// Tag restrictions a container page places on the items listed under it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScope {
    pub tags: Vec<String>,
    pub not_tags: Vec<String>,
}

impl PageScope {
    #[must_use]
    pub fn from_page(page: &ContainerPage) -> Self {
        Self {
            tags: page.setting_values("tags"),
            not_tags: page.setting_values("notTags"),
        }
    }
}

/// Stored criteria plus the options a listing runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub kind: String,
    pub criteria: Criteria,
    pub options: ListOptions,
}

fn tag_values(tags: &[String]) -> Vec<Value> {
    tags.iter().cloned().map(Value::String).collect()
}

fn union(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for tag in b {
        if !out.contains(tag) {
            out.push(tag.clone());
        }
    }
    out
}

/// Translates a caller's filter and the page's restrictions into criteria and options.
pub fn build(
    config: &Config,
    ctx: &RequestContext,
    kind: &str,
    filter: &Filter,
    scope: &PageScope,
) -> Result<Selection> {
    filter.validate()?;

    let mut criteria = Criteria::All;
    let mut options = ListOptions::default();
    let active_tag = ctx.param(TAG_PARAM).map(str::to_owned);

    if filter.is_explicit() {
        debug!("Explicit lookup for {kind}; tag scoping suppressed");
        options.slugs = filter.slugs.clone();
        options.ids = filter.ids.clone();
    } else {
        let chosen = match &active_tag {
            Some(tag) => vec![tag.clone()],
            None if !filter.tags.is_empty() => filter.tags.clone(),
            None => scope.tags.clone(),
        };
        let within_scope = chosen.iter().all(|tag| scope.tags.contains(tag));
        if !scope.tags.is_empty() && !within_scope {
            criteria = Criteria::field(TAGS, Condition::In(tag_values(&scope.tags)));
        }
        if !chosen.is_empty() {
            options.any_of.insert(TAGS.to_owned(), tag_values(&chosen));
        }

        let excluded = union(&scope.not_tags, &filter.not_tags);
        if !excluded.is_empty() {
            options.none_of.insert(TAGS.to_owned(), tag_values(&excluded));
        }
    }

    match ctx.audience {
        Audience::Public => {
            if filter.published.is_some() || filter.trash.is_some() {
                debug!("Ignoring publication/trash filters on public retrieval");
            }
        }
        Audience::Admin => {
            options.published = filter.published.unwrap_or(Tristate::Any);
            options.trash = filter.trash.unwrap_or(Tristate::No);
        }
    }

    options.search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    if filter.feed {
        options.skip = 0;
        options.limit = Some(config.feed_limit);
    } else {
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter.per_page.unwrap_or(config.per_page);
        options.skip = (page - 1).saturating_mul(per_page);
        options.limit = Some(per_page);
    }

    match &filter.sort {
        Some(sort) => options.sort = sort.clone(),
        None if filter.ids.is_some() => {
            options.sort = Sort::default();
            options.order_by_ids = true;
        }
        None => options.sort = Sort::by_title(),
    }

    let facet_names = match &filter.facets {
        Some(facets) => facets.clone(),
        None => config
            .type_config(kind)
            .map(|t| {
                t.facets
                    .iter()
                    .map(|name| (name.clone(), Default::default()))
                    .collect()
            })
            .unwrap_or_default(),
    };
    for (name, mut spec) in facet_names {
        if name == TAGS {
            if spec.only.is_empty() {
                spec.only = scope.tags.clone();
            }
            spec.restrict = scope.tags.clone();
            spec.except = union(&spec.except, &scope.not_tags);
            if spec.param.is_none() {
                spec.param = Some(TAG_PARAM.to_owned());
            }
            if spec.always.is_none() {
                spec.always = active_tag.clone();
            }
        }
        options.facets.insert(name, spec);
    }

    options.joins = match &filter.joins {
        None => Joins::All,
        Some(names) if names.is_empty() => Joins::Skip,
        Some(names) => Joins::Only(names.clone()),
    };
    if filter.permalink {
        options.permalink = Permalink::BestPage;
    }

    Ok(Selection {
        kind: kind.to_owned(),
        criteria,
        options,
    })
}
