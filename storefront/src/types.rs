//! Domain types for the storefront.
//!
//! Everything here is read-only data fetched from the backend. Loosely typed
//! backend fields (numeric strings, nullable dates, the several shapes of a
//! price range) are resolved once during deserialization so the rest of the
//! crate only sees strong types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Backend identifier of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw backend id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw backend id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::id(deserializer).map(Self)
    }
}

/// Backend identifier of a pass type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PassTypeId(u64);

impl PassTypeId {
    /// Wrap a raw backend id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw backend id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PassTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for PassTypeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::id(deserializer).map(Self)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// An event as listed by the catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event id
    pub id: EventId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Venue
    #[serde(default)]
    pub location: Option<String>,
    /// Start of the event, absent when not yet scheduled
    #[serde(default, deserialize_with = "de::lenient_datetime")]
    pub start_date: Option<DateTime<Utc>>,
    /// End of the event
    #[serde(default, deserialize_with = "de::lenient_datetime")]
    pub end_date: Option<DateTime<Utc>>,
    /// Banner image URL
    #[serde(default)]
    pub banner_url: Option<String>,
    /// Category label
    #[serde(default, deserialize_with = "de::string_or_name")]
    pub category: Option<String>,
    /// Price summary shown on cards
    #[serde(default)]
    pub price_range: PriceRange,
    /// Purchasable pass types, may be empty when the list endpoint omits them.
    /// Entries that fail to parse are dropped.
    #[serde(default, deserialize_with = "de::lenient_list")]
    pub pass_types: Vec<PassType>,
    /// Tags attached to the event
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub tags: Vec<Tag>,
}

/// A purchasable ticket category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassType {
    /// Pass type id
    pub id: PassTypeId,
    /// Owning event
    #[serde(default)]
    pub event_id: Option<EventId>,
    /// Display name (e.g. "VIP")
    #[serde(default)]
    pub name: String,
    /// Unit price in FCFA, never negative
    #[serde(deserialize_with = "de::price")]
    pub price: f64,
    /// Remaining quota; advisory only
    #[serde(default, alias = "quantity", deserialize_with = "de::lenient_count")]
    pub quota: Option<u32>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

/// Event tag used to group events by category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag id
    pub id: u64,
    /// Display name
    pub name: String,
    /// URL-friendly name
    #[serde(default)]
    pub slug: Option<String>,
}

/// Price summary of an event
///
/// The backend sends either a formatted string, a `{min, max}` object with
/// either side nullable, or nothing. Each shape maps to exactly one variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceRange {
    /// No usable price information
    #[default]
    Unknown,
    /// Single price
    Exact {
        /// The price
        price: f64,
    },
    /// Bounded range
    Fixed {
        /// Cheapest pass
        min: f64,
        /// Most expensive pass
        max: f64,
    },
    /// Only the lower bound is known
    From {
        /// Cheapest pass
        min: f64,
    },
    /// Only the upper bound is known
    UpTo {
        /// Most expensive pass
        max: f64,
    },
}

impl PriceRange {
    /// Build from optional bounds
    #[must_use]
    pub fn from_bounds(min: Option<f64>, max: Option<f64>) -> Self {
        match (min, max) {
            (Some(min), Some(max)) if (min - max).abs() < f64::EPSILON => Self::Exact { price: min },
            (Some(min), Some(max)) => Self::Fixed {
                min: min.min(max),
                max: min.max(max),
            },
            (Some(min), None) => Self::From { min },
            (None, Some(max)) => Self::UpTo { max },
            (None, None) => Self::Unknown,
        }
    }

    /// Summarize the prices of a pass type list
    #[must_use]
    pub fn from_pass_types(pass_types: &[PassType]) -> Self {
        let min = pass_types.iter().map(|p| p.price).reduce(f64::min);
        let max = pass_types.iter().map(|p| p.price).reduce(f64::max);
        Self::from_bounds(min, max)
    }

    /// Interpret a formatted string such as `"5000"`, `"5 000 - 20 000 FCFA"`
    fn parse_label(label: &str) -> Self {
        let numbers: Vec<f64> = label
            .split(['-', '–'])
            .filter_map(|part| {
                let digits: String = part
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                digits.parse().ok()
            })
            .collect();

        match numbers.as_slice() {
            [price] => Self::Exact { price: *price },
            [min, max] => Self::from_bounds(Some(*min), Some(*max)),
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for PriceRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(label) => Self::parse_label(&label),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map_or(Self::Unknown, |price| Self::Exact { price }),
            serde_json::Value::Object(map) => match map.get("price").and_then(de::number_like) {
                Some(price) => Self::Exact { price },
                None => Self::from_bounds(
                    map.get("min").and_then(de::number_like),
                    map.get("max").and_then(de::number_like),
                ),
            },
            _ => Self::Unknown,
        })
    }
}

// ============================================================================
// Users
// ============================================================================

/// Authenticated user profile, cached locally after login
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: u64,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// First name
    #[serde(default)]
    pub firstname: Option<String>,
    /// Last name
    #[serde(default)]
    pub lastname: Option<String>,
    /// Email address
    pub email: String,
    /// Phone number
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// `{ "data": T }` wrapper used by every catalog endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// List that skips entries failing to deserialize
///
/// One malformed record must not hide the rest of the catalog, so each entry
/// is parsed on its own and rejects are logged. `null` reads as empty.
#[derive(Debug)]
pub(crate) struct LenientList<T>(pub Vec<T>);

impl<'de, T: DeserializeOwned> Deserialize<'de> for LenientList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::lenient_list(deserializer).map(Self)
    }
}

/// Deserialization helpers for loosely typed backend fields
mod de {
    use chrono::{DateTime, Utc};
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn number_like(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(super) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().ok_or_else(|| D::Error::custom("id must be a positive integer")),
            Value::String(s) => s.trim().parse().map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("invalid id: {other}"))),
        }
    }

    pub(super) fn price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match number_like(&value) {
            Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
            Some(price) => Err(D::Error::custom(format!("price must be non-negative, got {price}"))),
            None => Err(D::Error::custom(format!("price is not a number: {value}"))),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u32 range
    pub(super) fn lenient_count<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(number_like(&value)
            .filter(|n| *n >= 0.0)
            .map(|n| n.min(f64::from(u32::MAX)) as u32))
    }

    pub(super) fn lenient_datetime<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().and_then(super::parse_timestamp))
    }

    pub(super) fn string_or_name<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        })
    }

    pub(super) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(error) => {
                    tracing::warn!(%error, item = std::any::type_name::<T>(), "Skipping malformed catalog entry");
                    None
                },
            })
            .collect())
    }

    pub(super) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Parse the timestamp formats the backend is known to emit
///
/// RFC 3339 first, then `YYYY-MM-DD HH:MM:SS` and bare dates (taken as UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
