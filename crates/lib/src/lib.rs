#![allow(clippy::missing_errors_doc)]

pub mod best_page;
pub mod builder;
pub mod config;
pub mod context;
pub mod criteria;
mod error;
pub mod executor;
pub mod facet;
pub mod filter;
pub mod frontmatter_file;
pub mod join;
pub mod list;
mod markup;
pub mod options;
pub mod permalink;
pub mod record;
pub mod reorder;
pub mod single;
pub mod store;

pub use error::{Error, Result};

use best_page::BestPageResolver;
use builder::PageScope;
use config::Config;
use join::Joiner;
use permalink::Permalinker;
use record::ContainerPage;
use store::Store;

/// The collaborators one retrieval runs against.
pub struct Engine<'a, S: ?Sized> {
    pub store: &'a S,
    pub config: &'a Config,
    pub joiner: &'a dyn Joiner,
}

impl<'a, S: Store + ?Sized> Engine<'a, S> {
    pub fn new(store: &'a S, config: &'a Config, joiner: &'a dyn Joiner) -> Self {
        Self {
            store,
            config,
            joiner,
        }
    }

    #[must_use]
    pub fn best_pages(&self) -> BestPageResolver<'a, S> {
        BestPageResolver::new(self.store, self.config)
    }

    #[must_use]
    pub fn permalinker(&self, kind: &str) -> Box<dyn Permalinker> {
        let style = self
            .config
            .type_config(kind)
            .map(|t| t.permalink)
            .unwrap_or_default();
        permalink::for_style(style)
    }

    /// The container page at `slug` with the restrictions it places on its listing.
    pub async fn page_scope(&self, slug: Option<&str>) -> Result<(PageScope, Option<ContainerPage>)> {
        let Some(slug) = slug else {
            return Ok((PageScope::default(), None));
        };
        let page = executor::find_page(self.store, slug).await?;
        Ok((PageScope::from_page(&page), Some(page)))
    }
}
