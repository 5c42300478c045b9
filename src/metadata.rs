//! Entity metadata consumed by the compiler and the binder.
//!
//! The engine never discovers entity structure on its own. It asks an
//! [`EntityMetadata`] implementation for the table name, the ordered persistent
//! columns, the primary key and the converters of composite types. Property paths
//! derived from method names are resolved here, the first time a plan is compiled.
//!
//! [`EntityDescriptor`] is a builder-style implementation suitable for hand-written
//! descriptors and tests:
//!
//! ```
//! use partquery::metadata::{EntityDescriptor, EntityMetadata, PropertyPath};
//! use partquery::value::WireType;
//!
//! let trades = EntityDescriptor::new("trades")
//!     .primary_key("id", "id", WireType::String)
//!     .column_named("symbol", "ticker", WireType::String);
//!
//! let column = trades.resolve(&PropertyPath::parse("symbol")).unwrap();
//! assert_eq!(column.column, "ticker");
//! ```

use crate::value::{ConverterRegistry, ValueConverter, WireType};
use std::fmt;
use std::sync::Arc;

/// Errors reported by an entity metadata provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The property path does not name a persistent field of the entity
    UnknownProperty { table: String, path: String },
    /// The entity declares no primary key column
    NoPrimaryKey { table: String },
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::UnknownProperty { table, path } => {
                write!(f, "No property '{path}' found on entity mapped to table '{table}'")
            }
            MetadataError::NoPrimaryKey { table } => {
                write!(f, "Entity mapped to table '{table}' declares no primary key")
            }
        }
    }
}

impl std::error::Error for MetadataError {}

/// Ordered field names leading from the entity to a persistent property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parse a dotted path such as `address.city`.
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Dotted form, e.g. `address.city`.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// A persistent column of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Field (property) name; embedded fields use a dotted path
    pub field: String,
    /// Column name in the statement text
    pub column: String,
    pub wire_type: WireType,
    pub primary_key: bool,
}

/// Metadata provider for one entity type
pub trait EntityMetadata: Send + Sync {
    fn table_name(&self) -> &str;

    /// Persistent columns in projection order.
    fn columns(&self) -> &[ColumnMetadata];

    /// Primary key column names, in key order.
    fn primary_key_columns(&self) -> Vec<&str> {
        self.columns()
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.column.as_str())
            .collect()
    }

    /// Resolve a property path to its column.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::UnknownProperty` if no persistent field matches.
    fn resolve(&self, path: &PropertyPath) -> Result<&ColumnMetadata, MetadataError> {
        let dotted = path.dotted();
        self.columns()
            .iter()
            .find(|c| c.field == dotted)
            .ok_or_else(|| MetadataError::UnknownProperty {
                table: self.table_name().to_string(),
                path: dotted,
            })
    }

    /// Converter for a composite domain type, if one is registered.
    fn converter(&self, type_name: &str) -> Option<Arc<dyn ValueConverter>>;
}

/// Builder-style [`EntityMetadata`] implementation
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    table: String,
    columns: Vec<ColumnMetadata>,
    converters: ConverterRegistry,
}

impl EntityDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            converters: ConverterRegistry::new(),
        }
    }

    /// Add a column whose name is the snake_case form of the field name.
    pub fn column(self, field: &str, wire_type: WireType) -> Self {
        let column = snake_case(field);
        self.push(field, column, wire_type, false)
    }

    /// Add a column with an explicit column name.
    pub fn column_named(self, field: &str, column: &str, wire_type: WireType) -> Self {
        self.push(field, column.to_string(), wire_type, false)
    }

    /// Add a primary key column with an explicit column name.
    pub fn primary_key(self, field: &str, column: &str, wire_type: WireType) -> Self {
        self.push(field, column.to_string(), wire_type, true)
    }

    /// Register a converter for a composite domain type bound as a parameter.
    pub fn with_converter<C>(mut self, type_name: &str, converter: C) -> Self
    where
        C: ValueConverter + 'static,
    {
        self.converters.register(type_name, converter);
        self
    }

    fn push(mut self, field: &str, column: String, wire_type: WireType, primary_key: bool) -> Self {
        self.columns.push(ColumnMetadata {
            field: field.to_string(),
            column,
            wire_type,
            primary_key,
        });
        self
    }
}

impl EntityMetadata for EntityDescriptor {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    fn converter(&self, type_name: &str) -> Option<Arc<dyn ValueConverter>> {
        self.converters.get(type_name)
    }
}

/// `traderId` -> `trader_id`, `address.city` -> `address_city`
pub(crate) fn snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, ch) in field.chars().enumerate() {
        if ch == '.' {
            out.push('_');
        } else if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
