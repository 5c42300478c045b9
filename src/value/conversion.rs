//! Coercion of call-time arguments into wire values.
//!
//! Scalars are converted natively, variant by variant, from `sea_query::Value`.
//! Enumerations become their variant name, collections become homogeneous arrays and
//! composite domain values go through a [`ValueConverter`] registered for their type
//! name. Anything else is rejected with
//! [`PartQueryError::UnsupportedParameterType`].

use crate::error::{PartQueryError, Result};
use crate::value::argument::{Argument, ParamType};
use crate::value::wire::{WireType, WireValue};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_query::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Converts a domain value into its wire representation.
///
/// Closures of the right shape implement this trait, so most converters are
/// registered inline:
///
/// ```
/// use partquery::value::{ConverterRegistry, WireValue, Argument};
///
/// let mut registry = ConverterRegistry::new();
/// registry.register("Money", |arg: &Argument| match arg {
///     Argument::Object { fields, .. } => Ok(WireValue::Int64(fields.len() as i64)),
///     _ => Ok(WireValue::Int64(0)),
/// });
/// assert!(registry.get("Money").is_some());
/// ```
pub trait ValueConverter: Send + Sync {
    fn to_wire(&self, argument: &Argument) -> Result<WireValue>;
}

impl<F> ValueConverter for F
where
    F: Fn(&Argument) -> Result<WireValue> + Send + Sync,
{
    fn to_wire(&self, argument: &Argument) -> Result<WireValue> {
        self(argument)
    }
}

/// Converters keyed by domain type name
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn ValueConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the converter for `type_name`.
    pub fn register<C>(&mut self, type_name: impl Into<String>, converter: C)
    where
        C: ValueConverter + 'static,
    {
        self.converters.insert(type_name.into(), Arc::new(converter));
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn ValueConverter>> {
        self.converters.get(type_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.converters.keys().collect();
        names.sort();
        f.debug_struct("ConverterRegistry")
            .field("types", &names)
            .finish()
    }
}

/// Convert one scalar `sea_query::Value` to its wire value.
///
/// # Errors
///
/// Returns `UnsupportedParameterType` for variants with no wire representation and for
/// unsigned values above `i64::MAX`.
pub fn scalar_to_wire(tag: &str, value: &Value) -> Result<WireValue> {
    let wire = match value {
        Value::Bool(Some(b)) => WireValue::Bool(*b),
        Value::TinyInt(Some(i)) => WireValue::Int64(i64::from(*i)),
        Value::SmallInt(Some(i)) => WireValue::Int64(i64::from(*i)),
        Value::Int(Some(i)) => WireValue::Int64(i64::from(*i)),
        Value::BigInt(Some(i)) => WireValue::Int64(*i),
        Value::TinyUnsigned(Some(u)) => WireValue::Int64(i64::from(*u)),
        Value::SmallUnsigned(Some(u)) => WireValue::Int64(i64::from(*u)),
        Value::Unsigned(Some(u)) => WireValue::Int64(i64::from(*u)),
        Value::BigUnsigned(Some(u)) => {
            let v = i64::try_from(*u).map_err(|_| PartQueryError::UnsupportedParameterType {
                tag: tag.to_string(),
                type_name: format!("BigUnsigned({u}) exceeds INT64"),
            })?;
            WireValue::Int64(v)
        }
        Value::Float(Some(f)) => WireValue::Float64(f64::from(*f)),
        Value::Double(Some(d)) => WireValue::Float64(*d),
        Value::String(Some(s)) => WireValue::String(String::clone(s)),
        Value::Char(Some(c)) => WireValue::String(c.to_string()),
        Value::Bytes(Some(b)) => WireValue::Bytes(Vec::clone(b)),
        Value::Json(Some(j)) => WireValue::Json(serde_json::Value::clone(j)),
        Value::Decimal(Some(d)) => WireValue::Numeric(Decimal::clone(d)),
        Value::Uuid(Some(u)) => WireValue::String(u.to_string()),
        Value::ChronoDate(Some(d)) => WireValue::Date(NaiveDate::clone(d)),
        Value::ChronoDateTimeUtc(Some(t)) => WireValue::Timestamp(DateTime::<Utc>::clone(t)),
        Value::Bool(None) => WireValue::Null(WireType::Bool),
        Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None) => WireValue::Null(WireType::Int64),
        Value::Float(None) | Value::Double(None) => WireValue::Null(WireType::Float64),
        Value::String(None) | Value::Char(None) | Value::Uuid(None) => {
            WireValue::Null(WireType::String)
        }
        Value::Bytes(None) => WireValue::Null(WireType::Bytes),
        Value::Json(None) => WireValue::Null(WireType::Json),
        Value::Decimal(None) => WireValue::Null(WireType::Numeric),
        Value::ChronoDate(None) => WireValue::Null(WireType::Date),
        Value::ChronoDateTimeUtc(None) => WireValue::Null(WireType::Timestamp),
        _ => {
            return Err(PartQueryError::UnsupportedParameterType {
                tag: tag.to_string(),
                type_name: format!("{value:?}"),
            })
        }
    };
    Ok(wire)
}

/// Wire type a declared parameter type binds as, when it is known statically.
pub fn declared_wire_type(ty: &ParamType) -> Option<WireType> {
    match ty {
        ParamType::Bool => Some(WireType::Bool),
        ParamType::Int => Some(WireType::Int64),
        ParamType::Float => Some(WireType::Float64),
        ParamType::Decimal => Some(WireType::Numeric),
        ParamType::String | ParamType::Uuid | ParamType::Enum(_) => Some(WireType::String),
        ParamType::Bytes => Some(WireType::Bytes),
        ParamType::Json => Some(WireType::Json),
        ParamType::Date => Some(WireType::Date),
        ParamType::Timestamp => Some(WireType::Timestamp),
        ParamType::List(elem) => declared_wire_type(elem).map(|e| WireType::Array(Box::new(e))),
        ParamType::Object(_) => Some(WireType::Struct),
        ParamType::Any | ParamType::Pageable | ParamType::Sort => None,
    }
}

/// Coerce one call-time argument into the wire value bound to `tag`.
///
/// `declared` is the static parameter type; it decides the element type of empty
/// collections and the type of untyped nulls. `lookup` resolves converters for
/// composite domain values.
///
/// # Errors
///
/// Returns `UnsupportedParameterType` naming the offending type when no wire
/// representation exists.
pub fn coerce_argument<L>(
    tag: &str,
    argument: &Argument,
    declared: &ParamType,
    lookup: L,
) -> Result<WireValue>
where
    L: Fn(&str) -> Option<Arc<dyn ValueConverter>>,
{
    coerce(tag, argument, declared, &lookup)
}

type ConverterLookup<'a> = &'a dyn Fn(&str) -> Option<Arc<dyn ValueConverter>>;

fn coerce(tag: &str, argument: &Argument, declared: &ParamType, lookup: ConverterLookup<'_>) -> Result<WireValue> {
    match argument {
        Argument::Value(value) => scalar_to_wire(tag, value),
        Argument::Enum { variant, .. } => Ok(WireValue::String(variant.clone())),
        Argument::Null => Ok(WireValue::Null(
            declared_wire_type(declared).unwrap_or(WireType::String),
        )),
        Argument::List(items) => list_to_wire(tag, items, declared, lookup),
        Argument::Object { type_name, .. } => match lookup(type_name.as_str()) {
            Some(converter) => converter.to_wire(argument),
            None => Err(PartQueryError::UnsupportedParameterType {
                tag: tag.to_string(),
                type_name: type_name.clone(),
            }),
        },
        Argument::Pageable(_) | Argument::Sort(_) => {
            Err(PartQueryError::UnsupportedParameterType {
                tag: tag.to_string(),
                type_name: argument.kind_name(),
            })
        }
    }
}

fn list_to_wire(
    tag: &str,
    items: &[Argument],
    declared: &ParamType,
    lookup: ConverterLookup<'_>,
) -> Result<WireValue> {
    let declared_elem = match declared {
        ParamType::List(elem) => elem.as_ref().clone(),
        _ => ParamType::Any,
    };

    let values = items
        .iter()
        .map(|item| match item {
            Argument::List(_) => Err(PartQueryError::UnsupportedParameterType {
                tag: tag.to_string(),
                type_name: "nested List".to_string(),
            }),
            item => coerce(tag, item, &declared_elem, lookup),
        })
        .collect::<Result<Vec<_>>>()?;

    let element = match values.iter().find(|v| !v.is_null()).or(values.first()) {
        Some(first) => first.wire_type(),
        None => declared_wire_type(&declared_elem).unwrap_or(WireType::String),
    };

    if let Some(mismatch) = values
        .iter()
        .find(|v| v.wire_type() != element && !v.is_null())
    {
        return Err(PartQueryError::UnsupportedParameterType {
            tag: tag.to_string(),
            type_name: format!(
                "mixed array of {element} and {}",
                mismatch.wire_type()
            ),
        });
    }

    let values = values
        .into_iter()
        .map(|v| if v.is_null() { WireValue::Null(element.clone()) } else { v })
        .collect();

    Ok(WireValue::Array { element, values })
}

/// Structural conversion of a composite value's fields, for converters that only need
/// to turn each field into a struct member.
pub fn object_fields_to_struct(tag: &str, fields: &[(String, Value)]) -> Result<WireValue> {
    let converted = fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), scalar_to_wire(tag, value)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(WireValue::Struct(converted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_converters(_: &str) -> Option<Arc<dyn ValueConverter>> {
        None
    }

    #[test]
    fn test_boxed_numerics_widen_to_64_bit() {
        assert_eq!(scalar_to_wire("tag0", &Value::Int(Some(8))).unwrap(), WireValue::Int64(8));
        assert_eq!(
            scalar_to_wire("tag0", &Value::Float(Some(1.5))).unwrap(),
            WireValue::Float64(1.5)
        );
        assert_eq!(
            scalar_to_wire("tag0", &Value::SmallUnsigned(Some(7))).unwrap(),
            WireValue::Int64(7)
        );
    }

    #[test]
    fn test_big_unsigned_overflow_is_rejected() {
        let err = scalar_to_wire("tag3", &Value::BigUnsigned(Some(u64::MAX))).unwrap_err();
        assert!(matches!(err, PartQueryError::UnsupportedParameterType { ref tag, .. } if tag == "tag3"));
    }

    #[test]
    fn test_decimal_and_typed_null() {
        assert_eq!(
            scalar_to_wire("tag0", &Value::from(Decimal::ONE)).unwrap(),
            WireValue::Numeric(Decimal::ONE)
        );
        assert_eq!(
            scalar_to_wire("tag0", &Value::Int(None)).unwrap(),
            WireValue::Null(WireType::Int64)
        );
    }

    #[test]
    fn test_enum_binds_as_variant_name() {
        let arg = Argument::enumeration("Action", "BUY");
        let wire = coerce_argument("tag0", &arg, &ParamType::Any, no_converters).unwrap();
        assert_eq!(wire, WireValue::String("BUY".into()));
    }

    #[test]
    fn test_list_elements_are_coerced_individually() {
        let arg = Argument::list([1i32, 2]);
        let wire = coerce_argument(
            "tag12",
            &arg,
            &ParamType::List(Box::new(ParamType::Int)),
            no_converters,
        )
        .unwrap();
        assert_eq!(wire.as_i64_array(), Some(vec![1, 2]));
    }

    #[test]
    fn test_list_of_enums_binds_as_string_array() {
        let arg = Argument::list([
            Argument::enumeration("Action", "BUY"),
            Argument::enumeration("Action", "SELL"),
        ]);
        let wire = coerce_argument(
            "tag0",
            &arg,
            &ParamType::List(Box::new(ParamType::Enum("Action".into()))),
            no_converters,
        )
        .unwrap();
        assert_eq!(wire.wire_type(), WireType::Array(Box::new(WireType::String)));
        assert_eq!(wire.as_string_array(), Some(vec!["BUY", "SELL"]));
    }

    #[test]
    fn test_list_of_composites_uses_converter() {
        let mut registry = ConverterRegistry::new();
        registry.register("Lot", |arg: &Argument| match arg {
            Argument::Object { fields, .. } => Ok(WireValue::Int64(fields.len() as i64)),
            other => Err(PartQueryError::Other(other.kind_name())),
        });
        let arg = Argument::list([
            Argument::object("Lot", vec![("size".to_string(), Value::from(1i64))]),
            Argument::object("Lot", vec![]),
        ]);
        let wire = coerce_argument("tag0", &arg, &ParamType::Any, |name: &str| registry.get(name)).unwrap();
        assert_eq!(wire.as_i64_array(), Some(vec![1, 0]));
    }

    #[test]
    fn test_list_element_without_converter_is_rejected() {
        let arg = Argument::list([Argument::object("Trade", vec![])]);
        let err = coerce_argument("tag3", &arg, &ParamType::Any, no_converters).unwrap_err();
        assert_eq!(err.to_string(), "tag3 is not a supported type: Trade");
    }

    #[test]
    fn test_nested_list_is_rejected() {
        let arg = Argument::list([Argument::list([1i64])]);
        let err = coerce_argument("tag0", &arg, &ParamType::Any, no_converters).unwrap_err();
        assert!(err.to_string().contains("nested List"));
    }

    #[test]
    fn test_empty_list_takes_declared_element_type() {
        let arg = Argument::List(vec![]);
        let wire = coerce_argument(
            "tag0",
            &arg,
            &ParamType::List(Box::new(ParamType::Float)),
            no_converters,
        )
        .unwrap();
        assert_eq!(wire.wire_type(), WireType::Array(Box::new(WireType::Float64)));
    }

    #[test]
    fn test_mixed_list_is_rejected() {
        let arg = Argument::list([Value::from(1i64), Value::from("x")]);
        let err = coerce_argument("tag0", &arg, &ParamType::Any, no_converters).unwrap_err();
        assert!(err.to_string().contains("mixed array"));
    }

    #[test]
    fn test_object_without_converter_names_the_type() {
        let arg = Argument::object("Trade", vec![]);
        let err = coerce_argument("tag5", &arg, &ParamType::Object("Trade".into()), no_converters)
            .unwrap_err();
        assert_eq!(err.to_string(), "tag5 is not a supported type: Trade");
    }

    #[test]
    fn test_object_with_registered_converter() {
        let mut registry = ConverterRegistry::new();
        registry.register("SymbolAction", |arg: &Argument| match arg {
            Argument::Object { fields, .. } => object_fields_to_struct("tag0", fields),
            other => Err(PartQueryError::Other(format!("unexpected {}", other.kind_name()))),
        });
        let arg = Argument::object(
            "SymbolAction",
            vec![
                ("symbol".to_string(), Value::from("ABCD")),
                ("action".to_string(), Value::from("BUY")),
            ],
        );
        let wire = coerce_argument("tag0", &arg, &ParamType::Any, |name| registry.get(name)).unwrap();
        assert_eq!(wire.field("symbol").and_then(WireValue::as_str), Some("ABCD"));
    }

    #[test]
    fn test_untyped_null_uses_declared_type() {
        let wire = coerce_argument("tag0", &Argument::Null, &ParamType::Int, no_converters).unwrap();
        assert_eq!(wire, WireValue::Null(WireType::Int64));
    }
}
