use async_trait::async_trait;
use serde_json::Value;

use crate::criteria::Criteria;
use crate::error::Result;
use crate::options::StoreOptions;
use crate::record::Document;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub records: Vec<Document>,
    /// Matches before skip/limit were applied.
    pub total: usize,
}

/// The shared document collection. Implementations own their own retry policy.
#[async_trait]
pub trait Store: Send + Sync {
    async fn query(&self, criteria: &Criteria, options: &StoreOptions) -> Result<QueryResult>;

    /// Deduplicated values of `field` across every match; array fields contribute each element.
    async fn distinct(&self, criteria: &Criteria, field: &str) -> Result<Vec<Value>>;
}
