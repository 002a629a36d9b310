use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    cache::{CacheKey, SnapshotCache},
    clock::Clock,
    datasources::PriceDataSource,
    error::Result,
    snapshot::SnapshotSet,
};

/// Fetches from an upstream source and records every success in the cache.
pub struct PriceFetcher {
    source: Arc<dyn PriceDataSource>,
    cache: Arc<SnapshotCache>,
    clock: Arc<dyn Clock>,
}

impl PriceFetcher {
    pub fn new(
        source: Arc<dyn PriceDataSource>,
        cache: Arc<SnapshotCache>,
        clock: Arc<dyn Clock>,
    ) -> PriceFetcher {
        PriceFetcher {
            source,
            cache,
            clock,
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[async_trait]
impl PriceDataSource for PriceFetcher {
    async fn fetch_prices(&self, coins: &[String], currency: &str) -> Result<SnapshotSet> {
        let data = self.source.fetch_prices(coins, currency).await?;
        self.cache
            .write(CacheKey::new(coins, currency), data.clone(), self.clock.now());
        Ok(data)
    }

    async fn is_healthy(&self) -> bool {
        self.source.is_healthy().await
    }
}
