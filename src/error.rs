//! Error types for derived-query compilation, binding and execution.
//!
//! Errors fall into two families:
//!
//! - **Plan errors** are detectable once per method, when the method name is parsed and
//!   compiled into a [`QueryPlan`](crate::query::QueryPlan): an unknown prefix, an
//!   operator the compiler cannot render, a property the entity does not have, or an
//!   invalid signature. They are never cached, so every call reports them again.
//! - **Call errors** depend on the runtime arguments or the transport: argument count
//!   mismatches, unsupported parameter types, execution and row-mapping failures.
//!
//! Use [`PartQueryError::is_plan_error`] to tell them apart without inspecting messages.

use crate::metadata::MetadataError;
use std::fmt;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PartQueryError>;

/// Error type returned by every fallible operation in this crate
#[derive(Debug, Clone, PartialEq)]
pub enum PartQueryError {
    /// The method name does not follow the derived-query naming convention
    InvalidMethodName { name: String, reason: String },
    /// A clause maps to an operator the compiler does not render
    UnsupportedOperator {
        /// Upper-case operator type, e.g. `BETWEEN`
        operator: String,
        /// Number of arguments the operator would consume
        arity: usize,
        /// Keywords that select this operator in a method name
        keywords: Vec<String>,
    },
    /// The declared signature cannot be served by this engine
    InvalidSignature { method: String, reason: String },
    /// Bindable argument count differs from the number of tags in the plan
    ArgumentCountMismatch { tags: usize, params: usize },
    /// The runtime argument array does not match the declared parameter list
    SignatureMismatch { declared: usize, supplied: usize },
    /// A runtime argument does not fit its declared position
    InvalidArgument {
        position: usize,
        expected: String,
        found: String,
    },
    /// A bound value has no wire representation
    UnsupportedParameterType { tag: String, type_name: String },
    /// Entity metadata lookup failed
    Metadata(MetadataError),
    /// A single-result method matched more than one row (strict mode only)
    NonUniqueResult { rows: usize },
    /// Transport failure reported by the statement executor
    Execution(String),
    /// A returned row could not be mapped to the requested type
    RowMapping(String),
    /// Configuration could not be loaded
    Config(String),
    /// Internal state could not be accessed (poisoned lock, etc.)
    Other(String),
}

impl PartQueryError {
    /// `true` when the error is raised while building a plan, before any argument is looked at.
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            PartQueryError::InvalidMethodName { .. }
                | PartQueryError::UnsupportedOperator { .. }
                | PartQueryError::InvalidSignature { .. }
                | PartQueryError::Metadata(_)
        )
    }

    /// `true` when the error was produced by the binder, before anything was executed.
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            PartQueryError::ArgumentCountMismatch { .. }
                | PartQueryError::SignatureMismatch { .. }
                | PartQueryError::InvalidArgument { .. }
                | PartQueryError::UnsupportedParameterType { .. }
        )
    }
}

impl fmt::Display for PartQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartQueryError::InvalidMethodName { name, reason } => {
                write!(f, "Invalid query method name '{name}': {reason}")
            }
            PartQueryError::UnsupportedOperator {
                operator,
                arity,
                keywords,
            } => write!(
                f,
                "The statement type: {operator} ({arity}): [{}] is not supported.",
                keywords.join(", ")
            ),
            PartQueryError::InvalidSignature { method, reason } => {
                write!(f, "Invalid signature for query method '{method}': {reason}")
            }
            PartQueryError::ArgumentCountMismatch { tags, params } => write!(
                f,
                "The number of tags ({tags}) does not match the number of params ({params})."
            ),
            PartQueryError::SignatureMismatch { declared, supplied } => write!(
                f,
                "Query method declares {declared} parameter(s) but was called with {supplied} argument(s)"
            ),
            PartQueryError::InvalidArgument {
                position,
                expected,
                found,
            } => write!(
                f,
                "Argument at position {position} must be {expected}, found {found}"
            ),
            PartQueryError::UnsupportedParameterType { tag, type_name } => {
                write!(f, "{tag} is not a supported type: {type_name}")
            }
            PartQueryError::Metadata(e) => write!(f, "{e}"),
            PartQueryError::NonUniqueResult { rows } => write!(
                f,
                "Single-result query matched {rows} rows (strict_single_result is enabled)"
            ),
            PartQueryError::Execution(msg) => write!(f, "Execution error: {msg}"),
            PartQueryError::RowMapping(msg) => write!(f, "Row mapping error: {msg}"),
            PartQueryError::Config(msg) => write!(f, "Configuration error: {msg}"),
            PartQueryError::Other(msg) => write!(f, "Query engine error: {msg}"),
        }
    }
}

impl std::error::Error for PartQueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PartQueryError::Metadata(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MetadataError> for PartQueryError {
    fn from(error: MetadataError) -> Self {
        PartQueryError::Metadata(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_operator_message() {
        let err = PartQueryError::UnsupportedOperator {
            operator: "BETWEEN".to_string(),
            arity: 2,
            keywords: vec!["IsBetween".to_string(), "Between".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "The statement type: BETWEEN (2): [IsBetween, Between] is not supported."
        );
        assert!(err.is_plan_error());
        assert!(!err.is_binding_error());
    }

    #[test]
    fn test_count_mismatch_message_names_both_counts() {
        let err = PartQueryError::ArgumentCountMismatch { tags: 7, params: 3 };
        let display = err.to_string();
        assert!(display.contains("number of tags (7)"));
        assert!(display.contains("number of params (3)"));
        assert!(err.is_binding_error());
        assert!(!err.is_plan_error());
    }

    #[test]
    fn test_metadata_error_is_surfaced_verbatim() {
        let inner = MetadataError::UnknownProperty {
            table: "trades".to_string(),
            path: "nope".to_string(),
        };
        let err = PartQueryError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert!(err.is_plan_error());
    }
}
