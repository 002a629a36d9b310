use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use log::{error, info};
use pretty_duration::pretty_duration;
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::{
    api::{HealthResponse, PriceResponse, Source},
    cache::CacheKey,
    clock::Clock,
    datasources::PriceDataSource,
    fetcher::PriceFetcher,
};

#[derive(Debug, Clone)]
pub struct ReadConfig {
    pub default_coins: Vec<String>,
    pub default_currency: String,
    /// How long a cached snapshot may be served before refetching.
    pub cache_duration: Duration,
}

#[derive(Clone)]
pub struct AppState {
    fetcher: Arc<PriceFetcher>,
    config: Arc<ReadConfig>,
}

impl AppState {
    pub fn new(fetcher: Arc<PriceFetcher>, config: ReadConfig) -> AppState {
        AppState {
            fetcher,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub coins: Option<String>,
    pub currency: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/crypto", get(get_prices))
        .route("/api/health", get(health))
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Read API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> (StatusCode, Json<PriceResponse>) {
    let response = latest_snapshot(&state, &query).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Serves the cached snapshot while it is fresh, otherwise fetches a new one.
///
/// Fetch failures become a failure body; nothing is propagated.
pub async fn latest_snapshot(state: &AppState, query: &PriceQuery) -> PriceResponse {
    let coins = parse_coins(query.coins.as_deref())
        .unwrap_or_else(|| state.config.default_coins.clone());
    let currency = query
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| state.config.default_currency.clone());
    let key = CacheKey::new(&coins, &currency);
    let clock = state.fetcher.clock();

    let now = clock.now();
    if let Some(entry) = state
        .fetcher
        .cache()
        .read_fresh(&key, now, state.config.cache_duration)
    {
        let age = entry.age(now).to_std().unwrap_or_default();
        info!("Serving cached prices fetched {} ago", pretty_duration(&age, None));
        return PriceResponse::ok(
            Source::Cache,
            entry.fetched_at.timestamp_millis(),
            entry.data.clone(),
        );
    }

    match state.fetcher.fetch_prices(&coins, &currency).await {
        Ok(data) => PriceResponse::ok(Source::Api, clock.now().timestamp_millis(), data),
        Err(e) => {
            error!("Error fetching crypto prices: {}", e);
            PriceResponse::failure(e.to_string(), clock.now().timestamp_millis())
        }
    }
}

fn parse_coins(coins: Option<&str>) -> Option<Vec<String>> {
    let coins: Vec<String> = coins?
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect();
    if coins.is_empty() {
        None
    } else {
        Some(coins)
    }
}
