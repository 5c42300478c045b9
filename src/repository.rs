//! Repository-facing entry point.
//!
//! A [`QueryEngine`] serves the derived-query methods of one repository: it owns the
//! statement executor, the entity metadata, the configuration and a [`PlanCache`] that
//! memoizes one compiled [`QueryPlan`] per method.
//!
//! # Examples
//!
//! ```
//! use partquery::{
//!     Argument, EntityDescriptor, ParamType, PartQueryError, QueryEngine, QueryMethod,
//!     ReturnShape, Row, Statement, StatementExecutor, WireType,
//! };
//! use std::sync::Arc;
//!
//! struct NoRows;
//!
//! impl StatementExecutor for NoRows {
//!     fn query_all(&self, _: &Statement) -> Result<Vec<Row>, PartQueryError> {
//!         Ok(vec![])
//!     }
//!     fn execute_update(&self, _: &Statement) -> Result<u64, PartQueryError> {
//!         Ok(0)
//!     }
//! }
//!
//! let trades = EntityDescriptor::new("trades")
//!     .primary_key("id", "id", WireType::String)
//!     .column("action", WireType::String);
//! let engine = QueryEngine::new(NoRows, Arc::new(trades));
//!
//! let method = QueryMethod::new("TradeRepository", "findByAction", ReturnShape::Many)
//!     .param(ParamType::String);
//! let rows = engine
//!     .execute::<Row>(&method, &[Argument::from("BUY")])
//!     .unwrap()
//!     .into_many()
//!     .unwrap();
//! assert!(rows.is_empty());
//! ```

use crate::config::QueryConfig;
use crate::error::{PartQueryError, Result};
use crate::executor::{FromRow, Statement, StatementExecutor};
use crate::metadata::EntityMetadata;
use crate::query::{bind, dispatch, PartTree, QueryPlan, QueryResult, ReturnShape};
use crate::value::{Argument, ParamMeta, ParamType};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Static description of one repository method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryMethod {
    /// Owning repository, part of the plan cache key
    pub repository: String,
    /// Method name following the derived-query convention
    pub name: String,
    pub params: Vec<ParamMeta>,
    pub returns: ReturnShape,
}

impl QueryMethod {
    pub fn new(repository: impl Into<String>, name: impl Into<String>, returns: ReturnShape) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
            params: Vec::new(),
            returns,
        }
    }

    /// Append an unnamed parameter.
    pub fn param(mut self, ty: ParamType) -> Self {
        self.params.push(ParamMeta::new(ty));
        self
    }

    pub fn named_param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamMeta::named(name, ty));
        self
    }

    /// Stable identity of the method: repository, name, parameter types and result
    /// shape. Overloads get distinct keys.
    pub fn key(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.type_name()).collect();
        format!(
            "{}::{}({}) -> {:?}",
            self.repository,
            self.name,
            params.join(", "),
            self.returns
        )
    }
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Memo of compiled plans keyed by [`QueryMethod::key`]
///
/// Compilation runs outside the lock; the first plan stored for a key wins. Failed
/// compilations are never stored.
pub struct PlanCache {
    plans: RwLock<HashMap<String, Arc<QueryPlan>>>,
    capacity: usize,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached plan for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `PartQueryError::Other` if the cache lock is poisoned.
    pub fn get(&self, key: &str) -> Result<Option<Arc<QueryPlan>>> {
        let plans = self
            .plans
            .read()
            .map_err(|e| PartQueryError::Other(format!("Failed to lock plan cache: {e}")))?;
        Ok(plans.get(key).cloned())
    }

    /// Return the plan cached for `key`, compiling and storing it on first use.
    ///
    /// When the cache is full the plan is compiled and returned but not stored.
    ///
    /// # Errors
    ///
    /// Returns the compilation error unchanged, or `PartQueryError::Other` if the
    /// cache lock is poisoned.
    pub fn get_or_compile<F>(&self, key: &str, compile: F) -> Result<Arc<QueryPlan>>
    where
        F: FnOnce() -> Result<QueryPlan>,
    {
        if let Some(plan) = self.get(key)? {
            #[cfg(feature = "metrics")]
            METRICS.record_plan_cache_hit();
            return Ok(plan);
        }

        let plan = Arc::new(compile()?);
        #[cfg(feature = "metrics")]
        METRICS.record_plan_compiled();

        let mut plans = self
            .plans
            .write()
            .map_err(|e| PartQueryError::Other(format!("Failed to lock plan cache: {e}")))?;

        if let Some(existing) = plans.get(key) {
            return Ok(Arc::clone(existing));
        }
        if plans.len() >= self.capacity {
            log::warn!(
                "Plan cache is full ({} plans), {key} will be recompiled on every call",
                self.capacity
            );
            return Ok(plan);
        }

        log::debug!("Compiled and cached plan for {key}");
        plans.insert(key.to_string(), Arc::clone(&plan));
        Ok(plan)
    }

    /// # Errors
    ///
    /// Returns `PartQueryError::Other` if the cache lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let plans = self
            .plans
            .read()
            .map_err(|e| PartQueryError::Other(format!("Failed to lock plan cache: {e}")))?;
        Ok(plans.len())
    }

    /// # Errors
    ///
    /// Returns `PartQueryError::Other` if the cache lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every cached plan.
    ///
    /// # Errors
    ///
    /// Returns `PartQueryError::Other` if the cache lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| PartQueryError::Other(format!("Failed to lock plan cache: {e}")))?;
        plans.clear();
        Ok(())
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(QueryConfig::default().plan_cache_capacity)
    }
}

impl fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.plans.read().map(|p| p.len()).unwrap_or(0);
        f.debug_struct("PlanCache")
            .field("cached", &cached)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Executes derived-query methods of one repository
pub struct QueryEngine<X> {
    executor: X,
    metadata: Arc<dyn EntityMetadata>,
    plans: PlanCache,
    config: QueryConfig,
}

impl<X: StatementExecutor> QueryEngine<X> {
    /// Engine with the default configuration.
    pub fn new(executor: X, metadata: Arc<dyn EntityMetadata>) -> Self {
        Self::with_config(executor, metadata, QueryConfig::default())
    }

    pub fn with_config(executor: X, metadata: Arc<dyn EntityMetadata>, config: QueryConfig) -> Self {
        Self {
            executor,
            metadata,
            plans: PlanCache::new(config.plan_cache_capacity),
            config,
        }
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn metadata(&self) -> &dyn EntityMetadata {
        self.metadata.as_ref()
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.plans
    }

    /// Compiled plan of `method`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns the plan errors of [`PartTree::parse`] and [`QueryPlan::compile`]; they
    /// are reported again on every call because failed plans are not cached.
    pub fn plan(&self, method: &QueryMethod) -> Result<Arc<QueryPlan>> {
        self.plans.get_or_compile(&method.key(), || {
            let tree = PartTree::parse(&method.name)?;
            QueryPlan::compile(&tree, &method.params, method.returns, self.metadata.as_ref())
        })
        .map_err(|e| {
            log::debug!("Could not build a plan for {method}: {e}");
            e
        })
    }

    /// Run `method` with `args` and shape the result.
    ///
    /// # Arguments
    ///
    /// * `method` - Method description; its plan is compiled on first use
    /// * `args` - Runtime arguments, one per declared parameter
    ///
    /// # Errors
    ///
    /// Plan errors (see [`QueryEngine::plan`]), binding errors raised before anything
    /// is executed, and executor or row-mapping errors.
    pub fn execute<M: FromRow>(&self, method: &QueryMethod, args: &[Argument]) -> Result<QueryResult<M>> {
        let plan = self.plan(method)?;
        let bound = bind(&plan, args, |type_name| self.metadata.converter(type_name))?;
        dispatch(&plan, &self.executor, bound, &self.config)
    }

    /// Statement `method` would run first for `args`, without executing it.
    ///
    /// # Errors
    ///
    /// Same plan and binding errors as [`QueryEngine::execute`].
    pub fn prepare(&self, method: &QueryMethod, args: &[Argument]) -> Result<Statement> {
        let plan = self.plan(method)?;
        let bound = bind(&plan, args, |type_name| self.metadata.converter(type_name))?;
        let sql = plan.render(bound.sort.as_ref(), bound.pageable.as_ref())?;
        Ok(Statement::new(sql, bound.bindings))
    }
}

impl<X> fmt::Debug for QueryEngine<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("table", &self.metadata.table_name())
            .field("plans", &self.plans)
            .field("config", &self.config)
            .finish()
    }
}
