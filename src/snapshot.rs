use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::format::parse_volume;

/// Latest known market data for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub change: f64,
    pub volume: String,
    #[serde(with = "iso_millis")]
    pub last_updated: DateTime<Utc>,
    /// Unformatted 24h volume, present when built from an upstream payload.
    #[serde(skip)]
    pub raw_volume: Option<f64>,
}

impl AssetSnapshot {
    /// Numeric 24h volume, falling back to the formatted string's magnitude.
    pub fn volume_value(&self) -> Option<f64> {
        self.raw_volume.or_else(|| parse_volume(&self.volume))
    }
}

/// One fetch worth of snapshots keyed by uppercased coin id.
pub type SnapshotSet = BTreeMap<String, AssetSnapshot>;

/// Instants are rendered as `2023-11-14T22:13:20.000Z`.
pub(crate) mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
