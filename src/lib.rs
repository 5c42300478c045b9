//! # partquery
//!
//! Derived-query engine: repository method names such as
//! `findTop3DistinctByActionAndSymbolOrderByIdDesc` are parsed into a predicate tree,
//! compiled once into a parameterized statement plan (`@tag0`, `@tag1`, ...), bound to
//! the runtime arguments of each call and dispatched to a [`StatementExecutor`].
//!
//! The crate does not talk to a data store. Entity structure comes from an
//! [`EntityMetadata`] provider and statements are run by the caller's executor.
//!
//! ## Features
//!
//! - `metrics` (default): OpenTelemetry counters and histograms, Prometheus export
//! - `tracing` (default): a span around every statement handed to the executor

pub mod config;
pub mod error;
pub mod executor;
pub mod metadata;
#[cfg(any(feature = "metrics", feature = "tracing"))]
pub mod metrics;
pub mod query;
pub mod repository;
pub mod value;

pub use config::QueryConfig;
pub use error::{PartQueryError, Result};
pub use executor::{FromRow, Row, Statement, StatementExecutor, TagBinding};
pub use metadata::{ColumnMetadata, EntityDescriptor, EntityMetadata, MetadataError, PropertyPath};
pub use query::{
    Direction, OperationKind, Pageable, PartTree, QueryPlan, QueryResult, ReturnShape, Sort,
    SortOrder,
};
pub use repository::{PlanCache, QueryEngine, QueryMethod};
pub use value::{Argument, ConverterRegistry, ParamMeta, ParamType, ValueConverter, WireType, WireValue};
