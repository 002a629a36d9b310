use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde_json::Value as JsonValue;

use super::datasource::PriceDataSource;
use crate::{
    error::{Error, Result},
    format::format_volume,
    snapshot::{AssetSnapshot, SnapshotSet},
};

pub const DEFAULT_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

const API_KEY_HEADER: &str = "x-cg-pro-api-key";

pub struct CoinGeckoDataSource {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoDataSource {
    pub fn new(client: Arc<Client>, base_url: String, api_key: Option<String>) -> CoinGeckoDataSource {
        CoinGeckoDataSource {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    async fn run_query(&self, coins: &[String], currency: &str) -> Result<JsonValue> {
        info!("Fetching prices for {} in {}", coins.join(","), currency);
        let mut request = self
            .client
            .get(&format!("{}/simple/price", self.base_url))
            .query(&[
                ("ids", coins.join(",").as_str()),
                ("vs_currencies", currency),
                ("include_market_cap", "true"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
                ("include_last_updated_at", "true"),
            ]);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let resp_payload = request.send().await?;
        let status = resp_payload.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("CoinGecko API error: {}", status)));
        }
        let response: JsonValue = resp_payload.json().await?;
        debug!("CoinGecko raw response: {}", response);
        Ok(response)
    }
}

#[async_trait]
impl PriceDataSource for CoinGeckoDataSource {
    async fn fetch_prices(&self, coins: &[String], currency: &str) -> Result<SnapshotSet> {
        let currency = currency.to_ascii_lowercase();
        let response = self.run_query(coins, &currency).await?;
        transform(&response, &currency)
    }

    async fn is_healthy(&self) -> bool {
        let mut request = self.client.get(&format!("{}/ping", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("CoinGecko ping failed: {}", e);
                false
            }
        }
    }
}

/// Turns a `/simple/price` payload into a snapshot set.
///
/// A missing price, 24h change or volume defaults to zero. A price that is
/// not a number, or a missing `last_updated_at`, is a parse error.
pub fn transform(response: &JsonValue, currency: &str) -> Result<SnapshotSet> {
    let coins = response
        .as_object()
        .ok_or_else(|| Error::Parse("result is not an object".to_owned()))?;
    let change_key = format!("{}_24h_change", currency);
    let volume_key = format!("{}_24h_vol", currency);

    let mut snapshots = SnapshotSet::new();
    for (coin, details) in coins {
        if !details.is_object() {
            return Err(Error::Parse(format!("entry for {} is not an object", coin)));
        }
        let price = match &details[currency] {
            JsonValue::Null => Decimal::ZERO,
            value => value
                .as_f64()
                .and_then(Decimal::from_f64)
                .ok_or_else(|| Error::Parse(format!("bad {} price for {}: {}", currency, coin, value)))?,
        };
        let change = details[&change_key].as_f64().unwrap_or(0.0);
        let volume = details[&volume_key].as_f64().unwrap_or(0.0);
        let last_updated = details["last_updated_at"]
            .as_i64()
            .and_then(|secs| secs.checked_mul(1000))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| Error::Parse(format!("missing last_updated_at for {}", coin)))?;
        snapshots.insert(
            coin.to_uppercase(),
            AssetSnapshot {
                price,
                change,
                volume: format_volume(volume),
                last_updated,
                raw_volume: Some(volume),
            },
        );
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transforms_bitcoin_payload() {
        let raw = json!({
            "bitcoin": {
                "usd": 50000,
                "usd_24h_change": 2.1,
                "usd_24h_vol": 2.3e9,
                "last_updated_at": 1700000000u64,
            }
        });
        let snapshots = transform(&raw, "usd").unwrap();
        assert_eq!(snapshots.len(), 1);
        let btc = &snapshots["BITCOIN"];
        assert_eq!(btc.price, Decimal::from(50_000));
        assert_eq!(btc.change, 2.1);
        assert_eq!(btc.volume, "2.3B");
        assert_eq!(btc.raw_volume, Some(2.3e9));
        assert_eq!(btc.last_updated.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(
            serde_json::to_value(btc).unwrap()["last_updated"],
            "2023-11-14T22:13:20.000Z"
        );
    }

    #[test]
    fn missing_change_and_volume_default_to_zero() {
        let raw = json!({
            "cardano": { "usd": 0.37, "usd_24h_change": null, "last_updated_at": 1700000000 }
        });
        let ada = &transform(&raw, "usd").unwrap()["CARDANO"];
        assert_eq!(ada.change, 0.0);
        assert_eq!(ada.volume, "0");
        assert_eq!(ada.raw_volume, Some(0.0));
    }

    #[test]
    fn missing_price_defaults_to_zero_without_dropping_other_coins() {
        let raw = json!({
            "bitcoin": { "usd": 50000, "usd_24h_change": 2.1, "last_updated_at": 1700000000 },
            "newcoin": { "usd_24h_change": 1.0, "last_updated_at": 1700000000 },
            "solana": { "usd": null, "last_updated_at": 1700000000 }
        });
        let snapshots = transform(&raw, "usd").unwrap();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots["BITCOIN"].price, Decimal::from(50_000));
        assert_eq!(snapshots["NEWCOIN"].price, Decimal::ZERO);
        assert_eq!(snapshots["NEWCOIN"].change, 1.0);
        assert_eq!(snapshots["SOLANA"].price, Decimal::ZERO);
    }

    #[test]
    fn non_numeric_price_is_parse_error() {
        let raw = json!({ "solana": { "usd": "cheap", "last_updated_at": 1700000000 } });
        assert!(matches!(transform(&raw, "usd"), Err(Error::Parse(_))));
    }

    #[test]
    fn missing_timestamp_is_parse_error() {
        let raw = json!({ "solana": { "usd": 55.0 } });
        assert!(matches!(transform(&raw, "usd"), Err(Error::Parse(_))));
    }

    #[test]
    fn non_object_body_is_parse_error() {
        assert!(matches!(transform(&json!([1, 2]), "usd"), Err(Error::Parse(_))));
        assert!(matches!(
            transform(&json!({ "bitcoin": 5 }), "usd"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn empty_body_is_empty_set() {
        assert!(transform(&json!({}), "usd").unwrap().is_empty());
    }
}
