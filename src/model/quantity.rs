//! Quantity type with calendar-duration unit normalization

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Quantity value with an optional unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quantity {
    /// Numeric value
    pub value: Decimal,
    /// Unit string (UCUM code), normalized from calendar words
    pub unit: Option<String>,
}

impl Quantity {
    /// Create a new quantity, normalizing the unit name
    pub fn new(value: Decimal, unit: Option<String>) -> Self {
        let unit = unit
            .filter(|u| !u.is_empty() && u != "1")
            .map(|u| Self::normalize_unit_name(&u));
        Self { value, unit }
    }

    /// Create a unitless quantity
    pub fn unitless(value: Decimal) -> Self {
        Self { value, unit: None }
    }

    /// Normalize calendar duration words to their UCUM equivalents
    fn normalize_unit_name(unit: &str) -> String {
        match unit {
            "year" | "years" => "a".to_string(),
            "month" | "months" => "mo".to_string(),
            "week" | "weeks" => "wk".to_string(),
            "day" | "days" => "d".to_string(),
            "hour" | "hours" => "h".to_string(),
            "minute" | "minutes" => "min".to_string(),
            "second" | "seconds" => "s".to_string(),
            "millisecond" | "milliseconds" => "ms".to_string(),
            _ => unit.to_string(),
        }
    }

    /// Parse the textual forms accepted by `toQuantity()`:
    /// `number`, `number unit` and `number 'unit'`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(s.len());
        let (num_s, unit_s) = s.split_at(split);
        let value = Decimal::from_str(num_s).ok()?;
        let unit_s = unit_s.trim();
        let unit = if unit_s.is_empty() {
            None
        } else {
            let unit_s = unit_s
                .strip_prefix('\'')
                .and_then(|u| u.strip_suffix('\''))
                .unwrap_or(unit_s);
            if unit_s.is_empty() || unit_s.contains(char::is_whitespace) {
                return None;
            }
            Some(unit_s.to_string())
        };
        Some(Self::new(value, unit))
    }

    /// Whether the two quantities carry the same (normalized) unit
    pub fn same_unit(&self, other: &Quantity) -> bool {
        self.unit == other.unit
    }

    /// Add two quantities; `None` when the units differ
    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        self.same_unit(other).then(|| Quantity {
            value: self.value + other.value,
            unit: self.unit.clone(),
        })
    }

    /// Subtract two quantities; `None` when the units differ
    pub fn checked_sub(&self, other: &Quantity) -> Option<Quantity> {
        self.same_unit(other).then(|| Quantity {
            value: self.value - other.value,
            unit: self.unit.clone(),
        })
    }

    /// Scale by a plain number
    pub fn scale(&self, factor: Decimal) -> Quantity {
        Quantity {
            value: self.value * factor,
            unit: self.unit.clone(),
        }
    }

    /// Divide by a plain number; `None` for a zero divisor
    pub fn checked_div(&self, divisor: Decimal) -> Option<Quantity> {
        self.value.checked_div(divisor).map(|value| Quantity {
            value,
            unit: self.unit.clone(),
        })
    }

    /// Order two quantities; `None` when the units differ
    pub fn partial_cmp_fhir(&self, other: &Quantity) -> Option<Ordering> {
        self.same_unit(other).then(|| self.value.cmp(&other.value))
    }

    /// JSON rendering as a FHIR Quantity element
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "value".to_string(),
            serde_json::Value::String(self.value.to_string()),
        );
        if let Some(unit) = &self.unit {
            obj.insert("unit".to_string(), serde_json::Value::String(unit.clone()));
        }
        serde_json::Value::Object(obj)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.same_unit(other) && self.value == other.value
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} '{}'", self.value, unit),
            None => write!(f, "{}", self.value),
        }
    }
}
