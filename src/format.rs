//! Display formatting for prices, percentages and volumes.

use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};

const MAGNITUDES: [(f64, char); 3] = [(1e9, 'B'), (1e6, 'M'), (1e3, 'K')];

/// Renders a volume with a single-letter magnitude suffix, e.g. `1.5B`.
///
/// The first of 1e9/1e6/1e3 that `volume` reaches picks the suffix and the
/// scaled value keeps one decimal, with ties rounded away from zero. Anything
/// below 1e3 is printed as is.
pub fn format_volume(volume: f64) -> String {
    for (scale, suffix) in MAGNITUDES {
        if volume >= scale {
            let scaled = volume / scale;
            return match Decimal::from_f64(scaled) {
                Some(d) => format!(
                    "{:.1}{}",
                    d.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
                    suffix
                ),
                None => format!("{:.1}{}", scaled, suffix),
            };
        }
    }
    volume.to_string()
}

/// Recovers a numeric magnitude from a string produced by [`format_volume`].
///
/// This is lossy: `"2.3B"` only carries one decimal of the unformatted value.
pub fn parse_volume(volume: &str) -> Option<f64> {
    let volume = volume.trim();
    let (number, multiplier) = match volume.chars().last()? {
        'B' => (&volume[..volume.len() - 1], 1e9),
        'M' => (&volume[..volume.len() - 1], 1e6),
        'K' => (&volume[..volume.len() - 1], 1e3),
        _ => (volume, 1.0),
    };
    number.parse::<f64>().ok().map(|n| n * multiplier)
}

/// US dollar rendering with thousands separators, e.g. `$50,000.00`.
pub fn format_price(price: Decimal) -> String {
    let rounded = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    format!("{}${}.{}", sign, group_thousands(whole), frac)
}

/// Signed percentage with two decimals, e.g. `+2.10%`.
pub fn format_change(change: f64) -> String {
    format!("{}{:.2}%", if change >= 0.0 { "+" } else { "" }, change)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
