//! Store-native wire values.
//!
//! Every bound tag carries a [`WireValue`]. The set of wire types is small and closed:
//! 64-bit integers and floats, fixed-point numerics, strings, bytes, JSON, dates,
//! timestamps, homogeneous arrays and structs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Wire type of a column or a bound value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool,
    Int64,
    Float64,
    Numeric,
    String,
    Bytes,
    Json,
    Date,
    Timestamp,
    /// Homogeneous array of the element type
    Array(Box<WireType>),
    Struct,
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::Bool => write!(f, "BOOL"),
            WireType::Int64 => write!(f, "INT64"),
            WireType::Float64 => write!(f, "FLOAT64"),
            WireType::Numeric => write!(f, "NUMERIC"),
            WireType::String => write!(f, "STRING"),
            WireType::Bytes => write!(f, "BYTES"),
            WireType::Json => write!(f, "JSON"),
            WireType::Date => write!(f, "DATE"),
            WireType::Timestamp => write!(f, "TIMESTAMP"),
            WireType::Array(elem) => write!(f, "ARRAY<{elem}>"),
            WireType::Struct => write!(f, "STRUCT"),
        }
    }
}

/// A value in the store's native representation
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Typed SQL NULL
    Null(WireType),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Numeric(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// Array whose elements all have the `element` wire type
    Array {
        element: WireType,
        values: Vec<WireValue>,
    },
    /// Ordered named fields
    Struct(Vec<(String, WireValue)>),
}

impl WireValue {
    /// The wire type of this value.
    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Null(ty) => ty.clone(),
            WireValue::Bool(_) => WireType::Bool,
            WireValue::Int64(_) => WireType::Int64,
            WireValue::Float64(_) => WireType::Float64,
            WireValue::Numeric(_) => WireType::Numeric,
            WireValue::String(_) => WireType::String,
            WireValue::Bytes(_) => WireType::Bytes,
            WireValue::Json(_) => WireType::Json,
            WireValue::Date(_) => WireType::Date,
            WireValue::Timestamp(_) => WireType::Timestamp,
            WireValue::Array { element, .. } => WireType::Array(Box::new(element.clone())),
            WireValue::Struct(_) => WireType::Struct,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<Decimal> {
        match self {
            WireValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Elements of an array value, regardless of element type.
    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Array { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Elements of an `ARRAY<INT64>`; `None` for any other value or a null element.
    pub fn as_i64_array(&self) -> Option<Vec<i64>> {
        match self {
            WireValue::Array {
                element: WireType::Int64,
                values,
            } => values.iter().map(WireValue::as_i64).collect(),
            _ => None,
        }
    }

    /// Elements of an `ARRAY<STRING>`; `None` for any other value or a null element.
    pub fn as_string_array(&self) -> Option<Vec<&str>> {
        match self {
            WireValue::Array {
                element: WireType::String,
                values,
            } => values.iter().map(WireValue::as_str).collect(),
            _ => None,
        }
    }

    /// Field lookup on a struct value.
    pub fn field(&self, name: &str) -> Option<&WireValue> {
        match self {
            WireValue::Struct(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}
