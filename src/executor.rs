//! Statement transport.
//!
//! The engine never talks to a data store itself. It hands a [`Statement`] (SQL text
//! with `@tagN` parameters plus the values bound to those tags) to a
//! [`StatementExecutor`] and maps the returned [`Row`]s with [`FromRow`].

use crate::error::{PartQueryError, Result};
use crate::value::WireValue;
use std::sync::Arc;

/// Value bound to one parameter tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagBinding {
    /// Tag name without the `@` sigil, e.g. `tag0`
    pub tag: String,
    pub value: WireValue,
}

impl TagBinding {
    pub fn new(tag: impl Into<String>, value: WireValue) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }
}

/// Parameterized statement handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    /// Bindings in tag order
    pub bindings: Vec<TagBinding>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, bindings: Vec<TagBinding>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Value bound to `tag`, if any.
    pub fn param(&self, tag: &str) -> Option<&WireValue> {
        self.bindings.iter().find(|b| b.tag == tag).map(|b| &b.value)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.tag.as_str())
    }
}

/// One result row: ordered `(column, value)` pairs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, WireValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, WireValue)>) -> Self {
        Self { columns }
    }

    /// Append a column; handy when building rows by hand.
    pub fn with(mut self, column: impl Into<String>, value: WireValue) -> Self {
        self.columns.push((column.into(), value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&WireValue> {
        self.columns.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn get_index(&self, index: usize) -> Option<&WireValue> {
        self.columns.get(index).map(|(_, v)| v)
    }

    /// Value of `column`, or a `RowMapping` error naming it.
    pub fn try_get(&self, column: &str) -> Result<&WireValue> {
        self.get(column)
            .ok_or_else(|| PartQueryError::RowMapping(format!("column '{column}' not present in row")))
    }

    pub fn columns(&self) -> &[(String, WireValue)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Trait for executing compiled statements
///
/// Implementations own transport concerns: sessions, retries, timeouts and
/// cancellation. The engine calls them on the caller's thread.
pub trait StatementExecutor {
    /// Run a query and return all rows
    ///
    /// # Arguments
    ///
    /// * `statement` - SQL text with `@tagN` parameters and their bound values
    ///
    /// # Errors
    ///
    /// Returns `PartQueryError::Execution` if the transport fails.
    fn query_all(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run a data-modifying statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `PartQueryError::Execution` if the transport fails.
    fn execute_update(&self, statement: &Statement) -> Result<u64>;
}

impl<T: StatementExecutor + ?Sized> StatementExecutor for &T {
    fn query_all(&self, statement: &Statement) -> Result<Vec<Row>> {
        (**self).query_all(statement)
    }

    fn execute_update(&self, statement: &Statement) -> Result<u64> {
        (**self).execute_update(statement)
    }
}

impl<T: StatementExecutor + ?Sized> StatementExecutor for Arc<T> {
    fn query_all(&self, statement: &Statement) -> Result<Vec<Row>> {
        (**self).query_all(statement)
    }

    fn execute_update(&self, statement: &Statement) -> Result<u64> {
        (**self).execute_update(statement)
    }
}

/// Maps a result row to a domain type
///
/// ```
/// use partquery::executor::{FromRow, Row};
/// use partquery::value::WireValue;
/// use partquery::PartQueryError;
///
/// struct Ticker(String);
///
/// impl FromRow for Ticker {
///     fn from_row(row: &Row) -> Result<Self, PartQueryError> {
///         let symbol = row
///             .try_get("ticker")?
///             .as_str()
///             .ok_or_else(|| PartQueryError::RowMapping("ticker is not a string".into()))?;
///         Ok(Ticker(symbol.to_string()))
///     }
/// }
///
/// let row = Row::default().with("ticker", WireValue::String("ABCD".into()));
/// assert_eq!(Ticker::from_row(&row).unwrap().0, "ABCD");
/// ```
pub trait FromRow: Sized {
    /// # Errors
    ///
    /// Returns `PartQueryError::RowMapping` if the row does not have the expected shape.
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}
