//! Derived queries: from method name to shaped result.
//!
//! This module holds the pipeline behind every repository call.
//!
//! # Architecture
//!
//! - **Part**: operators and property conditions (`Operator`, `PropertyCondition`)
//! - **Tree**: method-name parser (`PartTree`)
//! - **Compiler**: immutable, reusable query plans (`QueryPlan`)
//! - **Binder**: runtime arguments to parameter tags (`bind`)
//! - **Dispatch**: execution path and result shaping (`dispatch`, `QueryResult`)
//! - **Sort**: runtime paging and sorting arguments (`Sort`, `Pageable`)
//!
//! # Examples
//!
//! ```
//! use partquery::query::{PartTree, QueryPlan, ReturnShape};
//! use partquery::metadata::EntityDescriptor;
//! use partquery::value::{ParamMeta, ParamType, WireType};
//!
//! let trades = EntityDescriptor::new("trades")
//!     .primary_key("id", "id", WireType::String)
//!     .column("price", WireType::Float64);
//!
//! let tree = PartTree::parse("findByPriceLessThan").unwrap();
//! let plan = QueryPlan::compile(
//!     &tree,
//!     &[ParamMeta::new(ParamType::Float)],
//!     ReturnShape::Many,
//!     &trades,
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     plan.render(None, None).unwrap(),
//!     "SELECT id, price FROM trades WHERE ( price<@tag0 )"
//! );
//! ```

// Operators and property conditions
pub mod part;
#[doc(inline)]
pub use part::{IgnoreCase, LikePattern, Operator, PropertyCondition};

// Method-name parser
pub mod tree;
#[doc(inline)]
pub use tree::{AndGroup, OperationKind, PartTree};

// Plan compilation and statement rendering
pub mod compiler;
#[doc(inline)]
pub use compiler::{CompiledLeaf, QueryPlan};

// Argument binding
pub mod binder;
#[doc(inline)]
pub use binder::{bind, BoundArguments};

// Execution and result shaping
pub mod dispatch;
#[doc(inline)]
pub use dispatch::{dispatch, QueryResult, ReturnShape};

// Paging and sorting
pub mod sort;
#[doc(inline)]
pub use sort::{Direction, Pageable, Sort, SortOrder};
