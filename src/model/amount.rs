//! A yen amount that parses the many ways amounts show up in spreadsheets and exports.
//!
//! `Yen` wraps `Decimal` and accepts values with or without a `¥`/`￥` sign, thousands
//! separators, or a trailing `.0` as produced by spreadsheet exports.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// An amount of yen.
///
/// Display uses thousands separators and no currency sign. Serializes as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub(crate) struct Yen(Decimal);

impl Yen {
    pub(crate) const ZERO: Yen = Yen(Decimal::ZERO);

    pub(crate) fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub(crate) fn value(&self) -> Decimal {
        self.0
    }

    /// The whole-yen value, rounding half away from zero.
    pub(crate) fn to_i64(&self) -> Option<i64> {
        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// `floor(self * rate)`, used for consumption tax.
    pub(crate) fn floor_mul(&self, rate: Decimal) -> Yen {
        Yen((self.0 * rate).floor())
    }

    /// Reads an amount from a JSON number or numeric string. Anything else is `None`.
    pub(crate) fn from_json(value: &serde_json::Value) -> Option<Yen> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Decimal::from)
                .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))
                .map(Yen),
            serde_json::Value::String(s) => Yen::from_str(s).ok(),
            _ => None,
        }
    }
}

/// An error that can occur when parsing strings into `Yen` values.
pub(crate) struct YenError(rust_decimal::Error);

impl Debug for YenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for YenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for YenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Yen {
    type Err = YenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Yen::ZERO);
        }
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits = unsigned
            .trim_start_matches(['¥', '￥'])
            .trim_end_matches('円')
            .replace(',', "");
        let value = Decimal::from_str(&digits).map_err(YenError)?;
        Ok(Yen(if negative { -value } else { value }))
    }
}

impl Display for Yen {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = if self.0.fract().is_zero() {
            format_num::format_num!(",.0f", self.0.to_f64().unwrap_or_default())
        } else {
            format_num::format_num!(",.2f", self.0.to_f64().unwrap_or_default())
        };
        // Padding such as `{:>10}` applies to the whole formatted number.
        f.pad(&text)
    }
}

impl Serialize for Yen {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.to_i64() {
            Some(whole) if Decimal::from(whole) == self.0 => serializer.serialize_i64(whole),
            _ => serializer.serialize_f64(self.0.to_f64().unwrap_or_default()),
        }
    }
}

impl<'de> Deserialize<'de> for Yen {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Yen::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("'{value}' is not an amount")))
    }
}

impl From<i64> for Yen {
    fn from(value: i64) -> Self {
        Yen(Decimal::from(value))
    }
}

impl Add for Yen {
    type Output = Yen;

    fn add(self, rhs: Yen) -> Yen {
        Yen(self.0 + rhs.0)
    }
}

impl Sum for Yen {
    fn sum<I: Iterator<Item = Yen>>(iter: I) -> Yen {
        iter.fold(Yen::ZERO, Add::add)
    }
}
