mod coingecko;
mod datasource;
mod remote;

pub use coingecko::{transform, CoinGeckoDataSource, DEFAULT_BASE_URL};
pub use datasource::PriceDataSource;
pub use remote::RemoteApiDataSource;
