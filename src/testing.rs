use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::{
    datasources::PriceDataSource,
    error::{Error, Result},
    snapshot::{AssetSnapshot, SnapshotSet},
};

pub(crate) fn asset(price: Decimal, change: f64, raw_volume: f64) -> AssetSnapshot {
    AssetSnapshot {
        price,
        change,
        volume: crate::format::format_volume(raw_volume),
        last_updated: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        raw_volume: Some(raw_volume),
    }
}

pub(crate) fn prices(entries: &[(&str, i64)]) -> SnapshotSet {
    entries
        .iter()
        .map(|(coin, price)| (coin.to_string(), asset(Decimal::from(*price), 0.0, 0.0)))
        .collect()
}

/// Data source that replays queued results.
pub(crate) struct StubSource {
    healthy: AtomicBool,
    responses: Mutex<VecDeque<Result<SnapshotSet>>>,
    calls: AtomicUsize,
}

impl StubSource {
    pub(crate) fn new() -> StubSource {
        StubSource {
            healthy: AtomicBool::new(true),
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub(crate) fn push_prices(&self, entries: &[(&str, i64)]) {
        self.push_set(prices(entries));
    }

    pub(crate) fn push_set(&self, set: SnapshotSet) {
        self.responses.lock().push_back(Ok(set));
    }

    pub(crate) fn push_error(&self, error: Error) {
        self.responses.lock().push_back(Err(error));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceDataSource for StubSource {
    async fn fetch_prices(&self, _coins: &[String], _currency: &str) -> Result<SnapshotSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Upstream("no response queued".to_owned())))
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
