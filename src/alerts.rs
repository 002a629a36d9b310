use std::fmt;

use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::snapshot::SnapshotSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Absolute 24h change, in percent.
    pub price_change_pct: f64,
    /// 24h volume in quote currency.
    pub volume_usd: f64,
    /// Absolute change since the previous snapshot, in percent.
    pub short_term_change_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            price_change_pct: 5.0,
            volume_usd: 1e9,
            short_term_change_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    PriceMove { asset: String, change_pct: f64 },
    HighVolume { asset: String, volume: f64 },
    ShortTermMove { asset: String, change_pct: f64 },
}

impl AlertEvent {
    pub fn asset(&self) -> &str {
        match self {
            AlertEvent::PriceMove { asset, .. }
            | AlertEvent::HighVolume { asset, .. }
            | AlertEvent::ShortTermMove { asset, .. } => asset,
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertEvent::PriceMove { asset, change_pct } => {
                write!(f, "{} moved {:.2}% in 24h", asset, change_pct)
            }
            AlertEvent::HighVolume { asset, volume } => {
                write!(f, "High volume: {} at {}", asset, crate::format::format_volume(*volume))
            }
            AlertEvent::ShortTermMove { asset, change_pct } => write!(
                f,
                "{}: {} {:.2}% in last check",
                asset,
                if *change_pct > 0.0 { "up" } else { "down" },
                change_pct.abs()
            ),
        }
    }
}

/// Compares `current` against thresholds and, where available, `previous`.
pub fn evaluate(
    current: &SnapshotSet,
    previous: Option<&SnapshotSet>,
    thresholds: &Thresholds,
) -> Vec<AlertEvent> {
    let mut events = vec![];
    for (asset, snapshot) in current {
        if snapshot.change.abs() > thresholds.price_change_pct {
            events.push(AlertEvent::PriceMove {
                asset: asset.clone(),
                change_pct: snapshot.change,
            });
        }

        if let Some(volume) = snapshot.volume_value() {
            if volume > thresholds.volume_usd {
                events.push(AlertEvent::HighVolume {
                    asset: asset.clone(),
                    volume,
                });
            }
        }

        let short_term = previous
            .and_then(|prev| prev.get(asset))
            .and_then(|prev| short_term_change(prev.price, snapshot.price));
        if let Some(change_pct) = short_term {
            if change_pct.abs() > thresholds.short_term_change_pct {
                events.push(AlertEvent::ShortTermMove {
                    asset: asset.clone(),
                    change_pct,
                });
            }
        }
    }
    events
}

/// `None` when the previous price is zero or the ratio overflows `Decimal`.
fn short_term_change(previous: Decimal, current: Decimal) -> Option<f64> {
    if previous.is_zero() {
        return None;
    }
    current
        .checked_sub(previous)?
        .checked_div(previous)?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_f64()
}
