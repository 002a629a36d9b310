use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;

use super::datasource::PriceDataSource;
use crate::{
    api::{HealthResponse, PriceResponse},
    error::{Error, Result},
    snapshot::SnapshotSet,
};

/// Reads snapshots from another instance's read API.
pub struct RemoteApiDataSource {
    client: Arc<Client>,
    base_url: String,
}

impl RemoteApiDataSource {
    pub fn new(client: Arc<Client>, base_url: String) -> RemoteApiDataSource {
        RemoteApiDataSource {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    async fn run_query(&self, coins: &[String], currency: &str) -> Result<PriceResponse> {
        let resp_payload = self
            .client
            .get(&format!("{}/api/crypto", self.base_url))
            .query(&[("coins", coins.join(",").as_str()), ("currency", currency)])
            .send()
            .await?;
        let status = resp_payload.status();
        if !status.is_success() {
            let detail = resp_payload
                .json::<PriceResponse>()
                .await
                .ok()
                .and_then(|body| body.error);
            return Err(Error::Upstream(match detail {
                Some(message) => format!("API error: {} ({})", status, message),
                None => format!("API error: {}", status),
            }));
        }
        Ok(resp_payload.json().await?)
    }
}

#[async_trait]
impl PriceDataSource for RemoteApiDataSource {
    async fn fetch_prices(&self, coins: &[String], currency: &str) -> Result<SnapshotSet> {
        let response = self.run_query(coins, currency).await?;
        if !response.success {
            return Err(Error::Upstream(
                response
                    .error
                    .unwrap_or_else(|| "API request failed".to_owned()),
            ));
        }
        info!(
            "Read API answered from {:?} at {}",
            response.source, response.timestamp
        );
        response
            .data
            .ok_or_else(|| Error::Parse("successful response without data".to_owned()))
    }

    async fn is_healthy(&self) -> bool {
        let resp = match self
            .client
            .get(&format!("{}/api/health", self.base_url))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("Health check returned {}", resp.status());
                return false;
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                return false;
            }
        };
        match resp.json::<HealthResponse>().await {
            Ok(health) => health.is_ok(),
            Err(e) => {
                warn!("Health check body unreadable: {}", e);
                false
            }
        }
    }
}
