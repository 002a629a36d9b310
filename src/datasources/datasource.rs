use async_trait::async_trait;

use crate::{error::Result, snapshot::SnapshotSet};

#[async_trait]
pub trait PriceDataSource: Sync + Send {
    async fn fetch_prices(&self, coins: &[String], currency: &str) -> Result<SnapshotSet>;

    /// Transport and status failures count as unhealthy.
    async fn is_healthy(&self) -> bool;
}
