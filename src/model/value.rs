//! Core value types for FHIRPath expressions
//!
//! Every FHIRPath result is a collection: an ordered, flat sequence of
//! items. Flatness is enforced by construction: an item can never itself be
//! a collection, and JSON arrays are spliced on ingress. JSON nulls are
//! dropped on ingress so `empty()` tests absence, never nullity.
//!
//! Numbers are exact: integers are `i64`, decimals are
//! `rust_decimal::Decimal`. Integer and decimal values equal to the same
//! number compare equal.

use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::quantity::Quantity;
use super::resource::FhirResource;
use super::temporal::{Date, DateTime, Time};

/// A single item in a FHIRPath collection
#[derive(Clone)]
pub enum FhirPathValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value (64-bit signed)
    Integer(i64),
    /// Exact decimal value
    Decimal(Decimal),
    /// String value
    String(String),
    /// Date value, possibly partial precision
    Date(Date),
    /// DateTime value, possibly partial precision
    DateTime(DateTime),
    /// Time value, possibly partial precision
    Time(Time),
    /// Quantity with an optional unit
    Quantity(Quantity),
    /// Reference into the input document (an object node)
    Resource(FhirResource),
}

impl FhirPathValue {
    /// Convert a JSON leaf into a typed value; `None` drops JSON null.
    /// Arrays never reach this point; callers splice them.
    fn from_json_leaf(value: &Value) -> Option<FhirPathValue> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) if !n.is_f64() => Self::Integer(i),
                _ => {
                    let text = n.to_string();
                    match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
                        Ok(d) => Self::Decimal(d),
                        Err(_) => Self::String(text),
                    }
                }
            }),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Object(_) => Some(Self::Resource(FhirResource::from_json(value.clone()))),
            Value::Array(_) => None,
        }
    }

    /// The FHIRPath type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Quantity(_) => "Quantity",
            Self::Resource(_) => "Resource",
        }
    }

    /// Numeric view as a decimal, for mixed integer/decimal arithmetic
    pub fn as_numeric(&self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// The integer value, when this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The boolean value, when this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The string value, when this is a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The resource, when this is one
    pub fn as_resource(&self) -> Option<&FhirResource> {
        match self {
            Self::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// String rendering used by `toString()` and `&` concatenation;
    /// `None` for complex values
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::Date(d) => Some(d.to_string()),
            Self::DateTime(dt) => Some(dt.to_string()),
            Self::Time(t) => Some(t.to_string()),
            Self::Quantity(q) => Some(q.to_string()),
            Self::Resource(_) => None,
        }
    }

    /// Equivalence (`~`): like equality except strings fold case and
    /// collapse whitespace, and temporals require matching precision
    pub fn equivalent(&self, other: &FhirPathValue) -> bool {
        use FhirPathValue::*;
        match (self, other) {
            (String(a), String(b)) => fold_for_equivalence(a) == fold_for_equivalence(b),
            (Date(a), Date(b)) => a.equivalent(b),
            (DateTime(a), DateTime(b)) => a.equivalent(b),
            (Time(a), Time(b)) => a.equivalent(b),
            _ => self == other,
        }
    }

    /// JSON rendering of this value
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Decimal(d) => match serde_json::Number::from_str(&d.to_string()) {
                Ok(n) => Value::Number(n),
                Err(_) => Value::String(d.to_string()),
            },
            Self::String(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(d.to_string()),
            Self::DateTime(dt) => Value::String(dt.to_string()),
            Self::Time(t) => Value::String(t.to_string()),
            Self::Quantity(q) => q.to_json(),
            Self::Resource(r) => r.to_json(),
        }
    }
}

/// Parse a decimal from its lexical form, accepting scientific notation
/// and a bare leading dot
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let normalized: std::borrow::Cow<'_, str> = if s.starts_with('.') {
        format!("0{s}").into()
    } else {
        s.into()
    };
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Lowercase and collapse runs of whitespace to a single space
fn fold_for_equivalence(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            for folded in ch.to_lowercase() {
                out.push(folded);
            }
            last_was_space = false;
        }
    }
    out
}

impl PartialEq for FhirPathValue {
    fn eq(&self, other: &Self) -> bool {
        use FhirPathValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            // Numbers compare by numeric value across representations
            (Integer(a), Decimal(b)) | (Decimal(b), Integer(a)) => {
                rust_decimal::Decimal::from(*a) == *b
            }
            (String(a), String(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (Quantity(a), Quantity(b)) => a == b,
            (Resource(a), Resource(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "String({s})"),
            Self::Boolean(b) => write!(f, "Boolean({b})"),
            Self::Integer(i) => write!(f, "Integer({i})"),
            Self::Decimal(d) => write!(f, "Decimal({d})"),
            Self::Date(d) => write!(f, "Date({d})"),
            Self::DateTime(dt) => write!(f, "DateTime({dt})"),
            Self::Time(t) => write!(f, "Time({t})"),
            Self::Quantity(q) => write!(f, "Quantity({q})"),
            Self::Resource(r) => write!(f, "{r:?}"),
        }
    }
}

impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(r) => write!(f, "{r}"),
            other => match other.to_string_value() {
                Some(s) => f.write_str(&s),
                None => Ok(()),
            },
        }
    }
}

/// An ordered, flat sequence of values, the universal FHIRPath result type
///
/// Backed by an `Arc` slice: clones are cheap and collections are safely
/// shared across concurrent evaluations.
#[derive(Clone)]
pub struct Collection(Arc<[FhirPathValue]>);

impl Collection {
    /// The empty collection
    pub fn empty() -> Self {
        Self(Arc::from([]))
    }

    /// Build from a vector of items
    pub fn from_vec(values: Vec<FhirPathValue>) -> Self {
        Self(values.into())
    }

    /// A one-element collection
    pub fn singleton_of(value: FhirPathValue) -> Self {
        Self(Arc::from([value]))
    }

    /// Ingest a JSON value: arrays splice, nulls drop, objects become
    /// resources, scalars become typed values
    pub fn from_json(value: &Value) -> Self {
        let mut out = Vec::new();
        Self::splice_json(value, &mut out);
        Self::from_vec(out)
    }

    /// Splice a JSON value into an item buffer, flattening nested arrays
    pub fn splice_json(value: &Value, out: &mut Vec<FhirPathValue>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    Self::splice_json(item, out);
                }
            }
            other => {
                if let Some(item) = FhirPathValue::from_json_leaf(other) {
                    out.push(item);
                }
            }
        }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection has no items
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the items
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    /// Item by 0-based index
    pub fn get(&self, index: usize) -> Option<&FhirPathValue> {
        self.0.get(index)
    }

    /// First item
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.0.first()
    }

    /// Last item
    pub fn last(&self) -> Option<&FhirPathValue> {
        self.0.last()
    }

    /// Copy out the items
    pub fn to_vec(&self) -> Vec<FhirPathValue> {
        self.0.to_vec()
    }

    /// Borrow the items as a slice
    pub fn as_slice(&self) -> &[FhirPathValue] {
        &self.0
    }

    /// Membership by structural equality
    pub fn contains_value(&self, value: &FhirPathValue) -> bool {
        self.0.iter().any(|item| item == value)
    }

    /// The single item, when there is exactly one
    pub fn singleton(&self) -> Option<&FhirPathValue> {
        match self.0.len() {
            1 => self.0.first(),
            _ => None,
        }
    }

    /// Concatenate, preserving order and duplicates
    pub fn concat(&self, other: &Collection) -> Collection {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut vec = self.to_vec();
        vec.extend(other.iter().cloned());
        Collection::from_vec(vec)
    }

    /// Deduplicate by structural equality, keeping first occurrences
    pub fn distinct(&self) -> Collection {
        let mut seen: Vec<&FhirPathValue> = Vec::with_capacity(self.len());
        let mut out = Vec::with_capacity(self.len());
        for item in self.iter() {
            if !seen.iter().any(|s| *s == item) {
                seen.push(item);
                out.push(item.clone());
            }
        }
        Collection::from_vec(out)
    }

    /// Union: concatenation deduplicated in first-occurrence order
    pub fn union(&self, other: &Collection) -> Collection {
        self.concat(other).distinct()
    }

    /// JSON rendering as an array of items
    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(FhirPathValue::to_json).collect())
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl From<Vec<FhirPathValue>> for Collection {
    fn from(values: Vec<FhirPathValue>) -> Self {
        Self::from_vec(values)
    }
}

impl From<FhirPathValue> for Collection {
    fn from(value: FhirPathValue) -> Self {
        Self::singleton_of(value)
    }
}

impl FromIterator<FhirPathValue> for Collection {
    fn from_iter<T: IntoIterator<Item = FhirPathValue>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathValue;
    type IntoIter = std::vec::IntoIter<FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.to_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a FhirPathValue;
    type IntoIter = std::slice::Iter<'a, FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.0.iter().map(|item| format!("{item:?}")).collect();
        write!(f, "[{}]", items.join(", "))
    }
}
