use std::{net::SocketAddr, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use reqwest::Client;

use crate::{
    alerts::Thresholds,
    datasources::DEFAULT_BASE_URL,
    poller::PollerConfig,
    server::ReadConfig,
};

#[derive(Parser, Debug)]
#[command(name = "coinwatch")]
#[command(about = "Polls crypto prices, caches them briefly and raises threshold alerts")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the latest-snapshot read API
    Serve {
        /// Address to listen on
        #[arg(long, env = "COINWATCH_LISTEN", default_value = "0.0.0.0:3000")]
        listen: SocketAddr,

        /// Also run a poller over the same cache
        #[arg(long)]
        poll: bool,
    },
    /// Poll a running read API and log alerts
    Bot {
        /// Base URL of the read API
        #[arg(long, env = "COINWATCH_API_URL", default_value = "http://127.0.0.1:3000")]
        api_url: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the upstream price provider
    #[arg(long, env = "COINWATCH_UPSTREAM_URL", default_value = DEFAULT_BASE_URL)]
    pub upstream_url: String,

    #[arg(long, env = "COINGECKO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Comma-separated coin ids
    #[arg(
        long,
        env = "COINWATCH_COINS",
        default_value = "bitcoin,ethereum,solana,cardano",
        value_delimiter = ','
    )]
    pub coins: Vec<String>,

    #[arg(long, env = "COINWATCH_CURRENCY", default_value = "usd")]
    pub currency: String,

    #[arg(long, env = "COINWATCH_POLL_INTERVAL_MS", default_value_t = 15_000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "COINWATCH_ERROR_RETRY_DELAY_MS", default_value_t = 5_000)]
    pub error_retry_delay_ms: u64,

    /// How long the read API serves a cached snapshot
    #[arg(long, env = "COINWATCH_CACHE_DURATION_MS", default_value_t = 15_000)]
    pub cache_duration_ms: u64,

    #[arg(long, env = "COINWATCH_REQUEST_TIMEOUT_MS", default_value_t = 15_000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = "COINWATCH_PRICE_CHANGE_PCT", default_value_t = 5.0)]
    pub price_change_threshold_pct: f64,

    #[arg(long, env = "COINWATCH_VOLUME_USD", default_value_t = 1e9)]
    pub volume_threshold_usd: f64,

    #[arg(long, env = "COINWATCH_SHORT_TERM_CHANGE_PCT", default_value_t = 1.0)]
    pub short_term_change_threshold_pct: f64,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.poll_interval_ms > 0, "poll interval must be positive");
        ensure!(self.request_timeout_ms > 0, "request timeout must be positive");
        ensure!(
            self.coins.iter().any(|c| !c.trim().is_empty()),
            "at least one coin must be configured"
        );
        Ok(())
    }

    pub fn coin_list(&self) -> Vec<String> {
        self.coins
            .iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            price_change_pct: self.price_change_threshold_pct,
            volume_usd: self.volume_threshold_usd,
            short_term_change_pct: self.short_term_change_threshold_pct,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            coins: self.coin_list(),
            currency: self.currency.to_ascii_lowercase(),
            error_retry_delay: Duration::from_millis(self.error_retry_delay_ms),
            thresholds: self.thresholds(),
        }
    }

    pub fn read_config(&self) -> ReadConfig {
        ReadConfig {
            default_coins: self.coin_list(),
            default_currency: self.currency.to_ascii_lowercase(),
            cache_duration: Duration::from_millis(self.cache_duration_ms),
        }
    }

    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(concat!("coinwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")
    }
}
