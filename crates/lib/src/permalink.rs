use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use crate::best_page::BestPageResolver;
use crate::config::PermalinkStyle;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::record::{ContainerPage, Item, PATH_SEPARATOR};
use crate::store::Store;

/// Composes an item's URL under a container page.
#[async_trait]
pub trait Permalinker: Send + Sync {
    async fn permalink(&self, page: &ContainerPage, item: &Item) -> Result<String>;
}

/// `<page path>/<slug>`
pub struct SlugPermalink;

#[async_trait]
impl Permalinker for SlugPermalink {
    async fn permalink(&self, page: &ContainerPage, item: &Item) -> Result<String> {
        Ok(format!("{}{PATH_SEPARATOR}{}", page.base_path(), item.slug))
    }
}

/// `<page path>/YYYY/MM/DD/<slug>`, dated by publication, else creation.
pub struct DatedPermalink;

#[async_trait]
impl Permalinker for DatedPermalink {
    async fn permalink(&self, page: &ContainerPage, item: &Item) -> Result<String> {
        let date = item
            .published_at
            .or(item.created_at)
            .ok_or_else(|| Error::store(format!("Item {} has no date for its permalink", item.id)))?;
        Ok(format!(
            "{}{PATH_SEPARATOR}{}{PATH_SEPARATOR}{}",
            page.base_path(),
            date.format("%Y/%m/%d"),
            item.slug
        ))
    }
}

#[must_use]
pub fn for_style(style: PermalinkStyle) -> Box<dyn Permalinker> {
    match style {
        PermalinkStyle::Slug => Box::new(SlugPermalink),
        PermalinkStyle::Dated => Box::new(DatedPermalink),
    }
}

/// Places every item under `page`. Items are assembled concurrently; each one
/// completes even if another fails, and the first failure is reported afterwards.
pub async fn apply_to_page(
    permalinker: &dyn Permalinker,
    items: &mut [Item],
    page: &ContainerPage,
) -> Result<()> {
    let outcomes = join_all(items.iter_mut().map(|item| async move {
        let url = permalinker.permalink(page, item).await?;
        item.url = Some(url);
        Ok::<_, Error>(())
    }))
    .await;

    outcomes.into_iter().collect()
}

/// Resolves a best page for each item in turn and places it there. Items
/// with no suitable page keep no URL.
pub async fn apply_best<S: Store + ?Sized>(
    resolver: &BestPageResolver<'_, S>,
    permalinker: &dyn Permalinker,
    ctx: &mut RequestContext,
    items: &mut [Item],
) -> Result<()> {
    for item in items.iter_mut() {
        match resolver.find_best_page(ctx, item).await? {
            Some(page) => item.url = Some(permalinker.permalink(&page, item).await?),
            None => debug!("No best page for {} {}", item.kind, item.id),
        }
    }
    Ok(())
}
