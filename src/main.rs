use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use coinwatch::{
    cache::SnapshotCache,
    clock::SystemClock,
    config::{Cli, Command, Settings},
    datasources::{CoinGeckoDataSource, RemoteApiDataSource},
    fetcher::PriceFetcher,
    poller::Poller,
    server::{self, AppState},
};
use log::{error, info};
use reqwest::Client;
use tokio::net::TcpListener;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn run_serve(
    settings: Settings,
    client: Arc<Client>,
    listen: SocketAddr,
    poll: bool,
) -> Result<()> {
    let source = Arc::new(CoinGeckoDataSource::new(
        client,
        settings.upstream_url.clone(),
        settings.api_key.clone(),
    ));
    let fetcher = Arc::new(PriceFetcher::new(
        source,
        Arc::new(SnapshotCache::new()),
        Arc::new(SystemClock),
    ));
    let state = AppState::new(fetcher.clone(), settings.read_config());
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;

    if !poll {
        return server::serve(listener, state, shutdown_signal())
            .await
            .context("read API server failed");
    }

    let poller = Arc::new(Poller::new(fetcher, settings.poller_config()));
    let mut poll_task = tokio::spawn({
        let poller = poller.clone();
        let interval = settings.poll_interval();
        async move { poller.start(interval).await }
    });
    let server = server::serve(listener, state, async move {
        shutdown_signal().await;
        poller.stop();
    });

    // The poller only finishes first when its startup health check fails.
    let served = tokio::select! {
        res = server => Some(res),
        res = &mut poll_task => {
            res??;
            None
        }
    };
    if let Some(res) = served {
        res.context("read API server failed")?;
        poll_task.await??;
    }
    Ok(())
}

async fn run_bot(settings: Settings, client: Arc<Client>, api_url: String) -> Result<()> {
    info!("Polling read API at {}", api_url);
    let source = Arc::new(RemoteApiDataSource::new(client, api_url));
    let poller = Arc::new(Poller::new(source, settings.poller_config()));
    tokio::spawn({
        let poller = poller.clone();
        async move {
            shutdown_signal().await;
            poller.stop();
        }
    });
    poller
        .start(settings.poll_interval())
        .await
        .context("bot failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    cli.settings.validate()?;
    let client = Arc::new(cli.settings.http_client()?);

    match cli.command {
        Command::Serve { listen, poll } => run_serve(cli.settings, client, listen, poll).await,
        Command::Bot { api_url } => run_bot(cli.settings, client, api_url).await,
    }
}
