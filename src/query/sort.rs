//! Runtime sorting and paging arguments.
//!
//! A `Sort` or `Pageable` passed to a query method is never bound to a tag. It
//! contributes `ORDER BY`, `LIMIT` and `OFFSET` clauses instead, and a non-empty
//! runtime sort replaces the ordering declared in the method name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

/// One sort key: a property path and its direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    /// Property name, dotted for nested properties
    pub property: String,
    #[serde(default)]
    pub direction: Direction,
    /// Compare case-insensitively (`LOWER(col)`)
    #[serde(default)]
    pub ignore_case: bool,
}

impl SortOrder {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
            ignore_case: false,
        }
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Asc)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Desc)
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

/// Ordered list of sort keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Sort {
    pub orders: Vec<SortOrder>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Ascending sort over the given properties, in order.
    pub fn by<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            orders: properties.into_iter().map(SortOrder::asc).collect(),
        }
    }

    pub fn by_orders(orders: Vec<SortOrder>) -> Self {
        Self { orders }
    }

    /// Append the orders of `other` after this sort's orders.
    pub fn and(mut self, other: Sort) -> Self {
        self.orders.extend(other.orders);
        self
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }
}

/// Page request: zero-based page number, page size and optional sort
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pageable {
    pub page: u64,
    pub size: u64,
    #[serde(default)]
    pub sort: Sort,
}

impl Pageable {
    pub fn of(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }
}
