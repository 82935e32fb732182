use std::collections::BTreeMap;

use crate::record::ContainerPage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Audience {
    #[default]
    Public,
    Admin,
}

/// Candidate container pages per item type, filled once per type and never refreshed.
#[derive(Debug, Default)]
pub struct BestPageCache {
    entries: Vec<(String, Vec<ContainerPage>)>,
}

impl BestPageCache {
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&[ContainerPage]> {
        self.entries
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, pages)| pages.as_slice())
    }

    /// Stores the candidates for `kind` unless it is already populated.
    pub fn populate(&mut self, kind: &str, pages: Vec<ContainerPage>) -> &[ContainerPage] {
        let index = match self.entries.iter().position(|(k, _)| k == kind) {
            Some(index) => index,
            None => {
                self.entries.push((kind.to_owned(), pages));
                self.entries.len() - 1
            }
        };
        &self.entries[index].1
    }

    /// Item types in the order they were populated.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

/// State scoped to one incoming request. Create one per request and drop it with the response.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub audience: Audience,
    params: BTreeMap<String, String>,
    pub best_pages: BestPageCache,
}

impl RequestContext {
    #[must_use]
    pub fn new(audience: Audience, params: BTreeMap<String, String>) -> Self {
        Self {
            audience,
            params,
            best_pages: BestPageCache::default(),
        }
    }

    #[must_use]
    pub fn public() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn admin() -> Self {
        Self::new(Audience::Admin, BTreeMap::new())
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// A request parameter, treating blank values as absent.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
