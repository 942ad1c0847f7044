//! Text rendering for prices, dates and the payment button.
//!
//! Amounts are rounded to whole units here and only here; everything
//! upstream keeps the unrounded `f64`.

use crate::types::PriceRange;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

/// French short month names, uppercased
const MONTHS: [&str; 12] = [
    "JANV.", "FÉVR.", "MARS", "AVR.", "MAI", "JUIN", "JUIL.", "AOÛT", "SEPT.", "OCT.", "NOV.", "DÉC.",
];

/// Label of an event without a start date
pub const UNSCHEDULED_LABEL: &str = "Date à confirmer";

/// Label of the payment button with nothing selected
pub const SELECT_PROMPT: &str = "Sélectionner un billet";

/// Round and group digits by thousands: `60000.4` → `"60 000"`
#[must_use]
#[allow(clippy::cast_possible_truncation)] // display amounts fit in i64
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    if rounded < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

/// Amount with its currency: `"60 000 FCFA"`
#[must_use]
pub fn format_price(amount: f64, currency: &str) -> String {
    format!("{} {currency}", format_amount(amount))
}

/// Payment button text for a total
///
/// A zero total means nothing payable is selected.
#[must_use]
pub fn button_label(total: f64, currency: &str) -> String {
    if total > 0.0 {
        format!("Payer {}", format_price(total, currency))
    } else {
        SELECT_PROMPT.to_string()
    }
}

/// Event date line: `"12 MARS | 20H00"` or `"12 & 13 MARS | 20H00"`
///
/// Dates are shown in `offset`. Only the day of month is compared, so an
/// event ending on the same day number of another month shows one day.
#[must_use]
pub fn event_date_label(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    offset: FixedOffset,
) -> String {
    let Some(start) = start.map(|s| s.with_timezone(&offset)) else {
        return UNSCHEDULED_LABEL.to_string();
    };

    let month = MONTHS[start.month0() as usize];
    let time = format!("{:02}H{:02}", start.hour(), start.minute());

    match end.map(|e| e.with_timezone(&offset).day()) {
        Some(end_day) if end_day != start.day() => {
            format!("{} & {end_day} {month} | {time}", start.day())
        },
        _ => format!("{} {month} | {time}", start.day()),
    }
}

/// Price summary line for event cards
#[must_use]
pub fn price_range_label(range: &PriceRange, currency: &str) -> String {
    match *range {
        PriceRange::Unknown => "Prix à confirmer".to_string(),
        PriceRange::Exact { price } if price <= 0.0 => "Gratuit".to_string(),
        PriceRange::Exact { price } => format_price(price, currency),
        PriceRange::Fixed { min, max } => {
            format!("{} à {}", format_amount(min), format_price(max, currency))
        },
        PriceRange::From { min } => format!("Dès {}", format_price(min, currency)),
        PriceRange::UpTo { max } => format!("Jusqu'à {}", format_price(max, currency)),
    }
}
