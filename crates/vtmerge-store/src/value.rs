//! Cell values and column types.
//!
//! [`Value`] is a tagged sum type over the storage types a column may
//! declare. Comparison is total and explicit per tag: values of the same tag
//! compare naturally (floats by IEEE total order), values of different tags
//! compare by tag rank. Equality is derived from that ordering, so `NaN`
//! equals itself and the merge engine never sees a value unequal to itself.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::StoreError;
use crate::hash::ContentHasher;

// ---------------------------------------------------------------------------
// Decimal
// ---------------------------------------------------------------------------

/// Fixed-point decimal: `units * 10^-scale`, normalized so that trailing
/// fractional zeros are stripped (`1.50` and `1.5` are the same value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    units: i128,
    scale: u32,
}

impl Decimal {
    /// Create a normalized decimal.
    #[must_use]
    pub const fn new(mut units: i128, mut scale: u32) -> Self {
        while scale > 0 && units % 10 == 0 {
            units /= 10;
            scale -= 1;
        }
        Self { units, scale }
    }

    /// Unscaled integer value.
    #[must_use]
    pub const fn units(&self) -> i128 {
        self.units
    }

    /// Number of fractional digits after normalization.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    fn to_f64(self) -> f64 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
        let v = self.units as f64 / 10f64.powi(self.scale as i32);
        v
    }

    fn aligned_units(self, scale: u32) -> Option<i128> {
        10i128
            .checked_pow(scale - self.scale)
            .and_then(|m| self.units.checked_mul(m))
    }
}

impl FromStr for Decimal {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidRow {
            message: format!("invalid decimal literal {s:?}"),
        };
        let (negative, digits) = s
            .strip_prefix('-')
            .map_or((false, s), |rest| (true, rest));
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let joined = format!("{int_part}{frac_part}");
        let mut units: i128 = joined.parse().map_err(|_| invalid())?;
        if negative {
            units = -units;
        }
        let scale = u32::try_from(frac_part.len()).map_err(|_| invalid())?;
        Ok(Self::new(units, scale))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            return self.units.cmp(&other.units);
        }
        let scale = self.scale.max(other.scale);
        match (self.aligned_units(scale), other.aligned_units(scale)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let sign = if self.units < 0 { "-" } else { "" };
        let digits = self.units.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale - digits.len() + 1))
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single cell value.
#[derive(Clone, Debug)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned 64-bit integer.
    Uint(u64),
    /// 64-bit float.
    Float(f64),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Uint(_) => 3,
            Self::Float(_) => 4,
            Self::Decimal(_) => 5,
            Self::Text(_) => 6,
            Self::Blob(_) => 7,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's tag, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Feed the canonical encoding of this value into a hasher.
    pub fn hash_into(&self, h: &mut ContentHasher) {
        h.write_tag(self.rank());
        match self {
            Self::Null => {}
            Self::Bool(b) => h.write_tag(u8::from(*b)),
            Self::Int(i) => h.write_bytes(&i.to_be_bytes()),
            Self::Uint(u) => h.write_u64(*u),
            Self::Float(x) => h.write_u64(x.to_bits()),
            Self::Decimal(d) => {
                h.write_bytes(&d.units().to_be_bytes());
                h.write_u64(u64::from(d.scale()));
            }
            Self::Text(s) => h.write_str(s),
            Self::Blob(b) => h.write_bytes(b),
        }
    }

    /// Plain JSON rendering (blobs as lowercase hex, decimals as strings).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Uint(u) => serde_json::Value::from(*u),
            Self::Float(x) => serde_json::Number::from_f64(*x)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Decimal(d) => serde_json::Value::String(d.to_string()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Blob(b) => serde_json::Value::String(encode_hex(b)),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Uint(a), Self::Uint(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Uint(u) => u.hash(state),
            Self::Float(x) => x.to_bits().hash(state),
            Self::Decimal(d) => d.hash(state),
            Self::Text(s) => s.hash(state),
            Self::Blob(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Blob(b) => write!(f, "x'{}'", encode_hex(b)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

// ---------------------------------------------------------------------------
// ColumnType
// ---------------------------------------------------------------------------

/// The declared storage type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `bool`
    Bool,
    /// `int` (signed 64-bit)
    Int,
    /// `uint` (unsigned 64-bit)
    Uint,
    /// `float` (64-bit)
    Float,
    /// `decimal(precision,scale)`
    Decimal {
        /// Total significant digits.
        precision: u8,
        /// Fractional digits.
        scale: u8,
    },
    /// `text` (unbounded)
    Text,
    /// `varchar(n)`
    Varchar(u32),
    /// `blob`
    Blob,
}

impl ColumnType {
    /// Returns `true` if `value` can be stored in a column of this type.
    ///
    /// `NULL` is accepted by every type; nullability is a column property.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null)
            | (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_))
            | (Self::Uint, Value::Uint(_))
            | (Self::Float, Value::Float(_))
            | (Self::Text, Value::Text(_))
            | (Self::Blob, Value::Blob(_)) => true,
            (Self::Decimal { scale, .. }, Value::Decimal(d)) => d.scale() <= u32::from(*scale),
            (Self::Varchar(n), Value::Text(s)) => s.chars().count() <= *n as usize,
            _ => false,
        }
    }

    /// Convert a plain JSON value (as written in fixtures) into a typed cell.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidRow`] if the JSON value cannot represent
    /// this type.
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<Value, StoreError> {
        let mismatch = || StoreError::InvalidRow {
            message: format!("cannot store {json} in a {self} column"),
        };
        if json.is_null() {
            return Ok(Value::Null);
        }
        let value = match self {
            Self::Bool => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
            Self::Int => Value::Int(json.as_i64().ok_or_else(mismatch)?),
            Self::Uint => Value::Uint(json.as_u64().ok_or_else(mismatch)?),
            Self::Float => Value::Float(json.as_f64().ok_or_else(mismatch)?),
            Self::Decimal { .. } => {
                let literal = match json {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => return Err(mismatch()),
                };
                Value::Decimal(literal.parse()?)
            }
            Self::Text | Self::Varchar(_) => {
                Value::Text(json.as_str().ok_or_else(mismatch)?.to_owned())
            }
            Self::Blob => {
                let hex = json.as_str().ok_or_else(mismatch)?;
                Value::Blob(decode_hex(hex).ok_or_else(mismatch)?)
            }
        };
        if self.accepts(&value) {
            Ok(value)
        } else {
            Err(mismatch())
        }
    }

    /// Feed the canonical encoding of this type into a hasher.
    pub fn hash_into(&self, h: &mut ContentHasher) {
        h.write_str(&self.to_string());
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Float => f.write_str("float"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Text => f.write_str("text"),
            Self::Varchar(n) => write!(f, "varchar({n})"),
            Self::Blob => f.write_str("blob"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidSchema {
            message: format!("unknown column type {s:?}"),
        };
        let lower = s.trim().to_ascii_lowercase();
        let args = |prefix: &str| -> Option<Vec<u32>> {
            lower
                .strip_prefix(prefix)?
                .strip_prefix('(')?
                .strip_suffix(')')?
                .split(',')
                .map(|part| part.trim().parse().ok())
                .collect()
        };
        match lower.as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "bigint" | "integer" => Ok(Self::Int),
            "uint" => Ok(Self::Uint),
            "float" | "double" => Ok(Self::Float),
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            _ if lower.starts_with("varchar") => match args("varchar").as_deref() {
                Some([n]) => Ok(Self::Varchar(*n)),
                _ => Err(invalid()),
            },
            _ if lower.starts_with("decimal") => match args("decimal").as_deref() {
                Some([p, s]) => Ok(Self::Decimal {
                    precision: u8::try_from(*p).map_err(|_| invalid())?,
                    scale: u8::try_from(*s).map_err(|_| invalid())?,
                }),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

fn encode_hex(bytes: &[u8]) -> String {
    use fmt::Write as _;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_normalizes_trailing_zeros() {
        let a: Decimal = "1.50".parse().unwrap();
        let b: Decimal = "1.5".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1.5");
    }

    #[test]
    fn decimal_orders_across_scales() {
        let a: Decimal = "1.25".parse().unwrap();
        let b: Decimal = "1.3".parse().unwrap();
        let c: Decimal = "-0.001".parse().unwrap();
        assert!(a < b);
        assert!(c < a);
        assert_eq!(c.to_string(), "-0.001");
    }

    #[test]
    fn float_nan_equals_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn different_tags_order_by_rank() {
        assert!(Value::Null < Value::Int(-5));
        assert!(Value::Int(100) < Value::Text("a".into()));
        assert_ne!(Value::Int(1), Value::Uint(1));
    }

    #[test]
    fn column_type_parses_parameterized_types() {
        assert_eq!("varchar(10)".parse::<ColumnType>().unwrap(), ColumnType::Varchar(10));
        assert_eq!(
            "DECIMAL(10, 2)".parse::<ColumnType>().unwrap(),
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert!("varchar".parse::<ColumnType>().is_err());
        assert!("uuid".parse::<ColumnType>().is_err());
    }

    #[test]
    fn varchar_enforces_length() {
        let ty = ColumnType::Varchar(3);
        assert!(ty.accepts(&Value::from("abc")));
        assert!(!ty.accepts(&Value::from("abcd")));
        assert!(ty.value_from_json(&serde_json::json!("abcd")).is_err());
    }

    #[test]
    fn blob_json_is_hex() {
        let v = ColumnType::Blob.value_from_json(&serde_json::json!("00ff")).unwrap();
        assert_eq!(v, Value::Blob(vec![0, 255]));
        assert_eq!(v.to_json(), serde_json::json!("00ff"));
    }
}
