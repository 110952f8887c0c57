use crate::models::{CostGroup, Granularity, TimeRange};
use async_trait::async_trait;
use thiserror::Error;

pub mod aws;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cost query failed: {0}")]
    Request(String),

    #[error("invalid time range {0}")]
    InvalidRange(String),
}

#[async_trait]
pub trait CostSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns every group for `range`, across all result pages, in the order
    /// the backend produced them. Groups are not validated here.
    async fn fetch(
        &self,
        range: &TimeRange,
        granularity: Granularity,
    ) -> Result<Vec<CostGroup>, FetchError>;
}
