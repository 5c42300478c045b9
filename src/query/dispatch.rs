//! Execution dispatcher.
//!
//! Picks the execution path for a bound call and shapes the result:
//!
//! | operation | returns | path |
//! |---|---|---|
//! | find | `Many` / `One` / `Values` | row query |
//! | count | `Count` | scalar row query |
//! | exists | `Exists` | scalar row query |
//! | delete | `Count` / `Unit` | bulk `DELETE` |
//! | delete | `Many`, or with a limit or page | select, then `DELETE` by primary key |

use crate::config::QueryConfig;
use crate::error::{PartQueryError, Result};
use crate::executor::{FromRow, Row, Statement, StatementExecutor, TagBinding};
use crate::query::binder::BoundArguments;
use crate::query::compiler::QueryPlan;
use crate::query::tree::OperationKind;
use crate::value::WireValue;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Declared result shape of a query method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// Sequence of mapped rows (also a page of rows)
    Many,
    /// At most one mapped row
    One,
    /// First column of every row
    Values,
    Count,
    Exists,
    /// Nothing
    Unit,
}

/// Shaped result of one call
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<M> {
    Many(Vec<M>),
    One(Option<M>),
    Values(Vec<WireValue>),
    Count(i64),
    Exists(bool),
    /// Rows removed by a delete
    Affected(u64),
    Unit,
}

impl<M> QueryResult<M> {
    pub fn into_many(self) -> Option<Vec<M>> {
        match self {
            QueryResult::Many(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_one(self) -> Option<M> {
        match self {
            QueryResult::One(item) => item,
            _ => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<WireValue>> {
        match self {
            QueryResult::Values(values) => Some(values),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<i64> {
        match self {
            QueryResult::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn exists(&self) -> Option<bool> {
        match self {
            QueryResult::Exists(b) => Some(*b),
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryResult::Affected(n) => Some(*n),
            _ => None,
        }
    }
}

/// Render, execute and shape one bound call of `plan`.
///
/// # Errors
///
/// Propagates executor and row-mapping errors; returns `NonUniqueResult` for a
/// single-result method matching several rows when `strict_single_result` is set.
pub fn dispatch<X, M>(
    plan: &QueryPlan,
    executor: &X,
    bound: BoundArguments,
    config: &QueryConfig,
) -> Result<QueryResult<M>>
where
    X: StatementExecutor + ?Sized,
    M: FromRow,
{
    let sql = plan.render(bound.sort.as_ref(), bound.pageable.as_ref())?;
    let statement = Statement::new(sql, bound.bindings);
    if config.log_statements {
        log::info!(
            "{}: {} [{} tags]",
            plan.method(),
            statement.sql,
            statement.bindings.len()
        );
    }

    let kind = plan.kind();
    match kind {
        OperationKind::Find => {
            let rows = run_query(executor, &statement, kind)?;
            shape_rows(plan, rows, config)
        }
        OperationKind::Count => {
            let rows = run_query(executor, &statement, kind)?;
            let count = match first_column(&rows) {
                Some(value) => value.as_i64().ok_or_else(|| {
                    PartQueryError::RowMapping(format!("count returned {}", value.wire_type()))
                })?,
                None => 0,
            };
            Ok(QueryResult::Count(count))
        }
        OperationKind::Exists => {
            let rows = run_query(executor, &statement, kind)?;
            let exists = match first_column(&rows) {
                Some(value) => value
                    .as_bool()
                    .or_else(|| value.as_i64().map(|n| n != 0))
                    .ok_or_else(|| {
                        PartQueryError::RowMapping(format!("exists returned {}", value.wire_type()))
                    })?,
                None => false,
            };
            Ok(QueryResult::Exists(exists))
        }
        OperationKind::Delete if plan.deletes_by_key() => {
            let rows = run_query(executor, &statement, kind)?;
            let affected = if rows.is_empty() {
                0
            } else {
                let delete = delete_by_key(plan, &rows)?;
                if config.log_statements {
                    log::info!("{}: {} [{} tags]", plan.method(), delete.sql, delete.bindings.len());
                }
                run_update(executor, &delete, kind)?
            };
            match plan.returns() {
                ReturnShape::Many => Ok(QueryResult::Many(map_rows(&rows)?)),
                ReturnShape::Unit => Ok(QueryResult::Unit),
                _ => Ok(QueryResult::Affected(affected)),
            }
        }
        OperationKind::Delete => {
            let affected = run_update(executor, &statement, kind)?;
            match plan.returns() {
                ReturnShape::Unit => Ok(QueryResult::Unit),
                _ => Ok(QueryResult::Affected(affected)),
            }
        }
    }
}

fn shape_rows<M: FromRow>(plan: &QueryPlan, rows: Vec<Row>, config: &QueryConfig) -> Result<QueryResult<M>> {
    match plan.returns() {
        ReturnShape::One => {
            if rows.len() > 1 {
                if config.strict_single_result {
                    return Err(PartQueryError::NonUniqueResult { rows: rows.len() });
                }
                log::debug!(
                    "{} matched {} rows for a single result, using the first",
                    plan.method(),
                    rows.len()
                );
            }
            rows.first().map(M::from_row).transpose().map(QueryResult::One)
        }
        ReturnShape::Values => rows
            .iter()
            .map(|row| {
                row.get_index(0)
                    .cloned()
                    .ok_or_else(|| PartQueryError::RowMapping("row has no columns".to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(QueryResult::Values),
        _ => map_rows(&rows).map(QueryResult::Many),
    }
}

fn map_rows<M: FromRow>(rows: &[Row]) -> Result<Vec<M>> {
    rows.iter().map(M::from_row).collect()
}

fn first_column(rows: &[Row]) -> Option<&WireValue> {
    rows.first().and_then(|row| row.get_index(0))
}

/// Key-based delete of the fetched rows.
fn delete_by_key(plan: &QueryPlan, rows: &[Row]) -> Result<Statement> {
    let mut bindings = Vec::with_capacity(rows.len() * plan.primary_key().len());
    for row in rows {
        for column in plan.primary_key() {
            let value = row.try_get(column)?.clone();
            bindings.push(TagBinding::new(format!("tag{}", bindings.len()), value));
        }
    }
    Ok(Statement::new(plan.delete_by_key_sql(rows.len()), bindings))
}

fn run_query<X>(executor: &X, statement: &Statement, kind: OperationKind) -> Result<Vec<Row>>
where
    X: StatementExecutor + ?Sized,
{
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(&statement.sql, kind.as_str()).entered();

    #[cfg(feature = "metrics")]
    let start = Instant::now();
    let result = executor.query_all(statement);
    record(&result, kind);
    #[cfg(feature = "metrics")]
    METRICS.record_query(kind.as_str(), start.elapsed());
    result
}

fn run_update<X>(executor: &X, statement: &Statement, kind: OperationKind) -> Result<u64>
where
    X: StatementExecutor + ?Sized,
{
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(&statement.sql, kind.as_str()).entered();

    #[cfg(feature = "metrics")]
    let start = Instant::now();
    let result = executor.execute_update(statement);
    record(&result, kind);
    #[cfg(feature = "metrics")]
    METRICS.record_query(kind.as_str(), start.elapsed());
    result
}

fn record<T>(result: &Result<T>, kind: OperationKind) {
    if let Err(e) = result {
        log::debug!("{kind} statement failed: {e}");
        #[cfg(feature = "metrics")]
        METRICS.record_query_error(kind.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntityDescriptor;
    use crate::query::binder::bind;
    use crate::query::tree::PartTree;
    use crate::value::{Argument, ParamMeta, ParamType, ValueConverter, WireType};
    use std::sync::{Arc, Mutex};

    /// Captures statements and answers queries with canned rows.
    #[derive(Default)]
    struct MockExecutor {
        captured: Arc<Mutex<Vec<Statement>>>,
        rows: Vec<Row>,
        affected: u64,
    }

    impl MockExecutor {
        fn returning(rows: Vec<Row>) -> Self {
            Self {
                rows,
                ..Self::default()
            }
        }

        fn captured_sql(&self) -> Vec<String> {
            self.captured.lock().unwrap().iter().map(|s| s.sql.clone()).collect()
        }
    }

    impl StatementExecutor for MockExecutor {
        fn query_all(&self, statement: &Statement) -> Result<Vec<Row>> {
            self.captured.lock().unwrap().push(statement.clone());
            Ok(self.rows.clone())
        }

        fn execute_update(&self, statement: &Statement) -> Result<u64> {
            self.captured.lock().unwrap().push(statement.clone());
            Ok(self.affected)
        }
    }

    fn trades() -> EntityDescriptor {
        EntityDescriptor::new("trades")
            .column_named("symbol", "ticker", WireType::String)
            .column("action", WireType::String)
            .primary_key("id", "id", WireType::String)
    }

    fn no_converters(_: &str) -> Option<Arc<dyn ValueConverter>> {
        None
    }

    fn run(
        name: &str,
        returns: ReturnShape,
        args: Vec<Argument>,
        executor: &MockExecutor,
        config: &QueryConfig,
    ) -> Result<QueryResult<Row>> {
        let params: Vec<ParamMeta> = args.iter().map(|_| ParamMeta::new(ParamType::Any)).collect();
        let tree = PartTree::parse(name)?;
        let plan = QueryPlan::compile(&tree, &params, returns, &trades())?;
        let bound = bind(&plan, &args, no_converters)?;
        dispatch(&plan, executor, bound, config)
    }

    fn trade_row(id: &str) -> Row {
        Row::default()
            .with("ticker", WireValue::String("ABCD".into()))
            .with("action", WireValue::String("BUY".into()))
            .with("id", WireValue::String(id.into()))
    }

    #[test]
    fn test_single_result_first_wins() {
        let executor = MockExecutor::returning(vec![trade_row("t1"), trade_row("t2")]);
        let result = run(
            "findByAction",
            ReturnShape::One,
            vec![Argument::from("BUY")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        let row = result.into_one().unwrap();
        assert_eq!(row.get("id").and_then(WireValue::as_str), Some("t1"));
    }

    #[test]
    fn test_single_result_strict() {
        let executor = MockExecutor::returning(vec![trade_row("t1"), trade_row("t2")]);
        let config = QueryConfig {
            strict_single_result: true,
            ..QueryConfig::default()
        };
        let err = run("findByAction", ReturnShape::One, vec![Argument::from("BUY")], &executor, &config)
            .unwrap_err();
        assert_eq!(err, PartQueryError::NonUniqueResult { rows: 2 });
    }

    #[test]
    fn test_single_result_absent() {
        let executor = MockExecutor::default();
        let result = run(
            "findByAction",
            ReturnShape::One,
            vec![Argument::from("BUY")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(result, QueryResult::One(None));
    }

    #[test]
    fn test_values_take_first_column() {
        let executor = MockExecutor::returning(vec![trade_row("t1"), trade_row("t2")]);
        let result = run(
            "findByAction",
            ReturnShape::Values,
            vec![Argument::from("BUY")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(
            result.into_values().unwrap(),
            vec![WireValue::String("ABCD".into()), WireValue::String("ABCD".into())]
        );
    }

    #[test]
    fn test_count_and_exists_read_scalars() {
        let executor = MockExecutor::returning(vec![Row::default().with("c", WireValue::Int64(4))]);
        let result = run(
            "countByAction",
            ReturnShape::Count,
            vec![Argument::from("BUY")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(result.count(), Some(4));

        let executor = MockExecutor::returning(vec![Row::default().with("e", WireValue::Bool(true))]);
        let result = run(
            "existsByAction",
            ReturnShape::Exists,
            vec![Argument::from("BUY")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(result.exists(), Some(true));
    }

    #[test]
    fn test_direct_delete_reports_affected_rows() {
        let executor = MockExecutor {
            affected: 3,
            ..MockExecutor::default()
        };
        let result = run(
            "deleteBySymbol",
            ReturnShape::Count,
            vec![Argument::from("ABCD")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(result.affected(), Some(3));
        assert_eq!(executor.captured_sql(), vec!["DELETE FROM trades WHERE ( ticker=@tag0 )"]);
    }

    #[test]
    fn test_delete_returning_rows_fetches_then_deletes_by_key() {
        let executor = MockExecutor {
            rows: vec![trade_row("t1"), trade_row("t2")],
            affected: 2,
            ..MockExecutor::default()
        };
        let result = run(
            "deleteBySymbol",
            ReturnShape::Many,
            vec![Argument::from("ABCD")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(result.into_many().unwrap().len(), 2);

        let captured = executor.captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(
            captured[0].sql,
            "SELECT ticker, action, id FROM trades WHERE ( ticker=@tag0 )"
        );
        assert_eq!(captured[1].sql, "DELETE FROM trades WHERE ( id=@tag0 ) OR ( id=@tag1 )");
        assert_eq!(captured[1].param("tag1").and_then(WireValue::as_str), Some("t2"));
    }

    #[test]
    fn test_delete_by_key_skips_delete_when_nothing_matches() {
        let executor = MockExecutor::default();
        let result = run(
            "deleteBySymbol",
            ReturnShape::Many,
            vec![Argument::from("ABCD")],
            &executor,
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(result, QueryResult::Many(vec![]));
        assert_eq!(executor.captured_sql().len(), 1);
    }
}
