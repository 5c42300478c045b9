//! Call-time arguments and declared parameter types.
//!
//! A repository method is described statically by a list of [`ParamType`]s and invoked
//! with a slice of [`Argument`]s. Scalar arguments carry a `sea_query::Value`, so any
//! type that converts into a `Value` can be passed with `.into()`.

use crate::query::sort::{Pageable, Sort};
use sea_query::Value;

/// Declared (static) type of a query-method parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Untyped parameter; the runtime value decides the wire type
    Any,
    Bool,
    Int,
    Float,
    Decimal,
    String,
    Bytes,
    Json,
    Date,
    Timestamp,
    Uuid,
    /// Enumerated type, bound by variant name
    Enum(String),
    /// Collection of the element type, bound as an array
    List(Box<ParamType>),
    /// Domain composite type, bound through a registered converter
    Object(String),
    /// Paging marker; never bound to a tag
    Pageable,
    /// Sorting marker; never bound to a tag
    Sort,
}

impl ParamType {
    /// Paging and sorting parameters are skipped by the binder wherever they appear.
    pub fn is_paging_or_sort(&self) -> bool {
        matches!(self, ParamType::Pageable | ParamType::Sort)
    }

    /// Name used in signatures and error messages.
    pub fn type_name(&self) -> String {
        match self {
            ParamType::Any => "Any".to_string(),
            ParamType::Bool => "Bool".to_string(),
            ParamType::Int => "Int".to_string(),
            ParamType::Float => "Float".to_string(),
            ParamType::Decimal => "Decimal".to_string(),
            ParamType::String => "String".to_string(),
            ParamType::Bytes => "Bytes".to_string(),
            ParamType::Json => "Json".to_string(),
            ParamType::Date => "Date".to_string(),
            ParamType::Timestamp => "Timestamp".to_string(),
            ParamType::Uuid => "Uuid".to_string(),
            ParamType::Enum(name) | ParamType::Object(name) => name.clone(),
            ParamType::List(elem) => format!("List<{}>", elem.type_name()),
            ParamType::Pageable => "Pageable".to_string(),
            ParamType::Sort => "Sort".to_string(),
        }
    }
}

/// Static metadata of one method parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamMeta {
    pub name: Option<String>,
    pub ty: ParamType,
}

impl ParamMeta {
    pub fn new(ty: ParamType) -> Self {
        Self { name: None, ty }
    }

    pub fn named(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }
}

/// One call-time argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Scalar value (numbers, strings, decimals, dates, JSON, ...)
    Value(Value),
    /// Collection value for `In`/`NotIn` clauses; each element is coerced on its own
    List(Vec<Argument>),
    /// Enumerated value, bound as its variant name
    Enum { type_name: String, variant: String },
    /// Composite domain value; needs a registered converter
    Object {
        type_name: String,
        fields: Vec<(String, Value)>,
    },
    /// Untyped null
    Null,
    Pageable(Pageable),
    Sort(Sort),
}

impl Argument {
    /// Build a list argument from scalars, enum variants or composite values.
    pub fn list<T, I>(items: I) -> Self
    where
        T: Into<Argument>,
        I: IntoIterator<Item = T>,
    {
        Argument::List(items.into_iter().map(Into::into).collect())
    }

    pub fn enumeration(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Argument::Enum {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }

    pub fn object(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Argument::Object {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Short description of the runtime kind, used in error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Argument::Value(value) => format!("{value:?}"),
            Argument::List(_) => "List".to_string(),
            Argument::Enum { type_name, .. } | Argument::Object { type_name, .. } => {
                type_name.clone()
            }
            Argument::Null => "Null".to_string(),
            Argument::Pageable(_) => "Pageable".to_string(),
            Argument::Sort(_) => "Sort".to_string(),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<Pageable> for Argument {
    fn from(pageable: Pageable) -> Self {
        Argument::Pageable(pageable)
    }
}

impl From<Sort> for Argument {
    fn from(sort: Sort) -> Self {
        Argument::Sort(sort)
    }
}

macro_rules! scalar_argument {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Argument::Value(Value::from(value))
                }
            }
        )*
    };
}

scalar_argument!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    rust_decimal::Decimal,
    uuid::Uuid,
    serde_json::Value,
    chrono::NaiveDate,
    chrono::DateTime<chrono::Utc>,
);
