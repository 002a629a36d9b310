//! Polls a price provider for a set of coins, keeps the latest snapshot in a
//! short-lived cache and reports threshold alerts.

pub mod alerts;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod datasources;
mod error;
pub mod fetcher;
pub mod format;
pub mod poller;
pub mod server;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
