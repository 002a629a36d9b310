use std::{sync::Arc, time::Duration};

use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::{
    alerts::{evaluate, AlertEvent, Thresholds},
    datasources::PriceDataSource,
    error::{Error, Result},
    format::{format_change, format_price},
    snapshot::SnapshotSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub coins: Vec<String>,
    pub currency: String,
    pub error_retry_delay: Duration,
    pub thresholds: Thresholds,
}

/// Polls a data source on a fixed interval and reports alert conditions.
pub struct Poller {
    source: Arc<dyn PriceDataSource>,
    config: PollerConfig,
    state: Mutex<PollerState>,
    cancel: CancellationToken,
    alerts: Option<UnboundedSender<AlertEvent>>,
}

impl Poller {
    pub fn new(source: Arc<dyn PriceDataSource>, config: PollerConfig) -> Poller {
        Poller {
            source,
            config,
            state: Mutex::new(PollerState::Idle),
            cancel: CancellationToken::new(),
            alerts: None,
        }
    }

    /// Also forward every alert to `sender`.
    pub fn with_alert_channel(mut self, sender: UnboundedSender<AlertEvent>) -> Poller {
        self.alerts = Some(sender);
        self
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock()
    }

    /// Runs until [`Poller::stop`] is called.
    ///
    /// Only the initial health check can fail this; errors inside a cycle are
    /// logged and followed by the longer retry delay.
    pub async fn start(&self, interval: Duration) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != PollerState::Idle {
                return Err(Error::AlreadyStarted);
            }
            *state = PollerState::Running;
        }
        info!("Bot starting...");

        if !self.source.is_healthy().await {
            *self.state.lock() = PollerState::Stopped;
            return Err(Error::HealthCheckFailed);
        }
        info!("API connected");

        let mut previous: Option<SnapshotSet> = None;
        while !self.cancel.is_cancelled() {
            let delay = match self.run_cycle(previous.as_ref()).await {
                Ok(prices) => {
                    previous = Some(prices);
                    interval
                }
                Err(e) => {
                    error!("Bot error: {}", Error::Cycle(Box::new(e)));
                    self.config.error_retry_delay
                }
            };
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(())
    }

    pub fn stop(&self) {
        *self.state.lock() = PollerState::Stopped;
        self.cancel.cancel();
        info!("Bot stopped");
    }

    async fn run_cycle(&self, previous: Option<&SnapshotSet>) -> Result<SnapshotSet> {
        let prices = self
            .source
            .fetch_prices(&self.config.coins, &self.config.currency)
            .await?;

        info!("Current prices:");
        for (coin, data) in &prices {
            info!(
                "{}: {} ({})",
                coin,
                format_price(data.price),
                format_change(data.change)
            );
        }

        for event in evaluate(&prices, previous, &self.config.thresholds) {
            warn!("{}", event);
            if let Some(sender) = &self.alerts {
                // A dropped receiver only means nobody is listening any more.
                let _ = sender.send(event);
            }
        }
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubSource;
    use tokio::sync::mpsc;

    const INTERVAL: Duration = Duration::from_secs(15);

    fn config() -> PollerConfig {
        PollerConfig {
            coins: vec!["bitcoin".to_owned()],
            currency: "usd".to_owned(),
            error_retry_delay: Duration::from_secs(5),
            thresholds: Thresholds::default(),
        }
    }

    fn spawn(poller: &Arc<Poller>, interval: Duration) -> tokio::task::JoinHandle<Result<()>> {
        let poller = poller.clone();
        tokio::spawn(async move { poller.start(interval).await })
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_source_aborts_start() {
        let source = Arc::new(StubSource::new());
        source.set_healthy(false);
        source.push_prices(&[("BITCOIN", 100)]);
        let poller = Poller::new(source.clone(), config());

        let result = poller.start(INTERVAL).await;

        assert!(matches!(result, Err(Error::HealthCheckFailed)));
        assert_eq!(source.calls(), 0);
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_once_per_interval() {
        let source = Arc::new(StubSource::new());
        for price in [100, 100, 100] {
            source.push_prices(&[("BITCOIN", price)]);
        }
        let poller = Arc::new(Poller::new(source.clone(), config()));
        let handle = spawn(&poller, INTERVAL);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(poller.state(), PollerState::Running);
        assert_eq!(source.calls(), 3);

        poller.stop();
        handle.await.unwrap().unwrap();
        assert_eq!(poller.state(), PollerState::Stopped);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn error_cycle_uses_retry_delay() {
        let source = Arc::new(StubSource::new());
        source.push_error(Error::Upstream("502 Bad Gateway".to_owned()));
        source.push_prices(&[("BITCOIN", 100)]);
        let poller = Arc::new(Poller::new(source.clone(), config()));
        let handle = spawn(&poller, INTERVAL);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(source.calls(), 2);

        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(source.calls(), 2);

        poller.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_compare_against_previous_cycle() {
        let source = Arc::new(StubSource::new());
        source.push_prices(&[("BITCOIN", 100)]);
        source.push_prices(&[("BITCOIN", 102)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = Arc::new(Poller::new(source.clone(), config()).with_alert_channel(tx));
        let handle = spawn(&poller, INTERVAL);

        tokio::time::sleep(Duration::from_secs(16)).await;
        poller.stop();
        handle.await.unwrap().unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            AlertEvent::ShortTermMove {
                asset: "BITCOIN".to_owned(),
                change_pct: 2.0
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_keeps_previous_snapshot() {
        let source = Arc::new(StubSource::new());
        source.push_prices(&[("BITCOIN", 100)]);
        source.push_error(Error::Parse("truncated body".to_owned()));
        source.push_prices(&[("BITCOIN", 105)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = Arc::new(Poller::new(source.clone(), config()).with_alert_channel(tx));
        let handle = spawn(&poller, INTERVAL);

        // cycles at 0s, 15s (error), 20s
        tokio::time::sleep(Duration::from_secs(21)).await;
        poller.stop();
        handle.await.unwrap().unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(
            rx.try_recv().unwrap(),
            AlertEvent::ShortTermMove {
                asset: "BITCOIN".to_owned(),
                change_pct: 5.0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cuts_sleep_short() {
        let source = Arc::new(StubSource::new());
        source.push_prices(&[("BITCOIN", 100)]);
        let poller = Arc::new(Poller::new(source.clone(), config()));
        let started = tokio::time::Instant::now();
        let handle = spawn(&poller, Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.stop();
        handle.await.unwrap().unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_start_twice() {
        let source = Arc::new(StubSource::new());
        let poller = Arc::new(Poller::new(source, config()));
        let handle = spawn(&poller, INTERVAL);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(poller.start(INTERVAL).await, Err(Error::AlreadyStarted)));

        poller.stop();
        handle.await.unwrap().unwrap();
        assert!(matches!(poller.start(INTERVAL).await, Err(Error::AlreadyStarted)));
    }
}
