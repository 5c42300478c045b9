//! Statement compiler.
//!
//! [`QueryPlan::compile`] resolves every leaf of a [`PartTree`] against the entity
//! metadata, rejects operators that cannot be rendered and validates the method
//! signature. The result is immutable: the projection and the WHERE text are rendered
//! once, and only ORDER BY / LIMIT / OFFSET are rendered per call, from the runtime
//! sort and paging arguments.
//!
//! Tags are numbered `tag0, tag1, ...` in leaf order. Every leaf owns a tag, including
//! zero-arity leaves such as `IsNull`, whose tag is bound but never referenced in the
//! statement text.

use crate::error::{PartQueryError, Result};
use crate::metadata::{ColumnMetadata, EntityMetadata, MetadataError, PropertyPath};
use crate::query::dispatch::ReturnShape;
use crate::query::part::{IgnoreCase, LikePattern, Operator, PropertyCondition};
use crate::query::sort::{Direction, Pageable, Sort, SortOrder};
use crate::query::tree::{OperationKind, PartTree};
use crate::value::{ParamMeta, ParamType, WireType};

/// One compiled leaf; its index in the plan is its tag number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledLeaf {
    pub tag: String,
    pub operator: Operator,
    pub column: String,
    pub ignore_case: bool,
}

impl CompiledLeaf {
    /// Whether the tag appears in the statement text.
    pub fn is_rendered(&self) -> bool {
        self.operator.arity() > 0
    }

    pub fn like_pattern(&self) -> Option<LikePattern> {
        self.operator.like_pattern()
    }

    /// `IN` / `NOT IN` leaves bind one array value.
    pub fn expects_array(&self) -> bool {
        matches!(self.operator, Operator::In | Operator::NotIn)
    }

    fn render(&self) -> Result<String> {
        let (lhs, rhs) = if self.ignore_case {
            (format!("LOWER({})", self.column), format!("LOWER(@{})", self.tag))
        } else {
            (self.column.clone(), format!("@{}", self.tag))
        };
        self.operator
            .render(&lhs, &rhs)
            .ok_or_else(|| unsupported(self.operator))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderColumn {
    column: String,
    direction: Direction,
    ignore_case: bool,
}

impl OrderColumn {
    fn render(&self) -> String {
        if self.ignore_case {
            format!("LOWER({}) {}", self.column, self.direction)
        } else {
            format!("{} {}", self.column, self.direction)
        }
    }
}

/// Compiled, reusable plan of one query method
#[derive(Debug, Clone)]
pub struct QueryPlan {
    method: String,
    kind: OperationKind,
    returns: ReturnShape,
    distinct: bool,
    limit: Option<u64>,
    table: String,
    projection: String,
    where_clause: Option<String>,
    static_orders: Vec<OrderColumn>,
    leaves: Vec<CompiledLeaf>,
    params: Vec<ParamType>,
    bindable: Vec<bool>,
    columns: Vec<ColumnMetadata>,
    primary_key: Vec<String>,
    delete_fetch_first: bool,
}

impl QueryPlan {
    /// Compile a parsed tree for one method signature.
    ///
    /// # Arguments
    ///
    /// * `tree` - Parsed method name
    /// * `params` - Declared parameters, in signature order
    /// * `returns` - Declared result shape
    /// * `metadata` - Entity the repository serves
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperator` for the first leaf whose operator cannot be
    /// rendered, `Metadata` for unknown properties (or a missing primary key when rows
    /// must be deleted by key) and `InvalidSignature` for incompatible parameters or
    /// result shapes.
    pub fn compile(
        tree: &PartTree,
        params: &[ParamMeta],
        returns: ReturnShape,
        metadata: &dyn EntityMetadata,
    ) -> Result<Self> {
        if let Some(leaf) = tree.leaves().find(|c| !c.operator.is_supported()) {
            return Err(unsupported(leaf.operator));
        }

        validate_signature(tree, params, returns)?;

        let mut leaves = Vec::with_capacity(tree.leaf_count());
        let mut groups = Vec::with_capacity(tree.groups.len());
        for group in &tree.groups {
            let mut rendered = Vec::with_capacity(group.conditions.len());
            for condition in &group.conditions {
                let leaf = compile_leaf(leaves.len(), condition, metadata)?;
                rendered.push(leaf.render()?);
                leaves.push(leaf);
            }
            groups.push(format!("( {} )", rendered.join(" AND ")));
        }
        let where_clause = (!groups.is_empty()).then(|| groups.join(" OR "));

        let static_orders = tree
            .order_by
            .orders
            .iter()
            .map(|order| resolve_order(metadata.columns(), metadata.table_name(), order))
            .collect::<Result<Vec<_>>>()?;

        let projection = metadata
            .columns()
            .iter()
            .map(|c| c.column.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let primary_key: Vec<String> = metadata
            .primary_key_columns()
            .into_iter()
            .map(str::to_string)
            .collect();

        let has_paging = params.iter().any(|p| p.ty == ParamType::Pageable);
        let delete_fetch_first = tree.kind == OperationKind::Delete
            && (returns == ReturnShape::Many || tree.limit.is_some() || has_paging);
        if delete_fetch_first && primary_key.is_empty() {
            return Err(MetadataError::NoPrimaryKey {
                table: metadata.table_name().to_string(),
            }
            .into());
        }

        Ok(Self {
            method: tree.method_name.clone(),
            kind: tree.kind,
            returns,
            distinct: tree.distinct,
            limit: tree.limit,
            table: metadata.table_name().to_string(),
            projection,
            where_clause,
            static_orders,
            leaves,
            params: params.iter().map(|p| p.ty.clone()).collect(),
            bindable: params.iter().map(|p| !p.ty.is_paging_or_sort()).collect(),
            columns: metadata.columns().to_vec(),
            primary_key,
            delete_fetch_first,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn returns(&self) -> ReturnShape {
        self.returns
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Leaves in tag order.
    pub fn leaves(&self) -> &[CompiledLeaf] {
        &self.leaves
    }

    pub fn tag_count(&self) -> usize {
        self.leaves.len()
    }

    /// Declared parameter types, in signature order.
    pub fn param_types(&self) -> &[ParamType] {
        &self.params
    }

    /// `true` at every position whose argument is bound to a tag.
    pub fn bindable_mask(&self) -> &[bool] {
        &self.bindable
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Static limit from `TopN` / `FirstN`.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// DELETE plans that select the rows first and delete them by primary key.
    pub fn deletes_by_key(&self) -> bool {
        self.delete_fetch_first
    }

    /// Render the statement for one call.
    ///
    /// DELETE plans that delete by key render their selecting statement here; the
    /// key-based delete is rendered by [`QueryPlan::delete_by_key_sql`] once the rows
    /// are known.
    ///
    /// # Errors
    ///
    /// Returns `Metadata(UnknownProperty)` if a runtime sort names an unknown property.
    pub fn render(&self, sort: Option<&Sort>, page: Option<&Pageable>) -> Result<String> {
        match self.kind {
            OperationKind::Find => self.select_sql(sort, page, false),
            OperationKind::Exists => Ok(format!("SELECT EXISTS({})", self.select_sql(sort, page, true)?)),
            OperationKind::Count => Ok(format!("SELECT COUNT(1) FROM ({})", self.select_sql(sort, page, false)?)),
            OperationKind::Delete if self.delete_fetch_first => self.select_sql(sort, page, false),
            OperationKind::Delete => Ok(format!(
                "DELETE FROM {} WHERE {}",
                self.table,
                self.where_clause.as_deref().unwrap_or("true")
            )),
        }
    }

    /// `DELETE` by primary key for `rows` fetched rows; tags are numbered from zero,
    /// key column by key column, row by row.
    pub fn delete_by_key_sql(&self, rows: usize) -> String {
        let mut tag = 0;
        let mut groups = Vec::with_capacity(rows);
        for _ in 0..rows {
            let mut clauses = Vec::with_capacity(self.primary_key.len());
            for column in &self.primary_key {
                clauses.push(format!("{column}=@tag{tag}"));
                tag += 1;
            }
            groups.push(format!("( {} )", clauses.join(" AND ")));
        }
        format!("DELETE FROM {} WHERE {}", self.table, groups.join(" OR "))
    }

    fn select_sql(&self, sort: Option<&Sort>, page: Option<&Pageable>, single_row: bool) -> Result<String> {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.projection);
        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }

        let orders = self.effective_orders(sort, page)?;
        if !orders.is_empty() {
            let rendered: Vec<String> = orders.iter().map(OrderColumn::render).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&rendered.join(" , "));
        }

        let (limit, offset) = self.window(page);
        let limit = if single_row { limit.or(Some(1)) } else { limit };
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(sql)
    }

    /// A runtime sort with at least one order replaces the static ordering.
    fn effective_orders(&self, sort: Option<&Sort>, page: Option<&Pageable>) -> Result<Vec<OrderColumn>> {
        let runtime = sort
            .filter(|s| s.is_sorted())
            .or_else(|| page.map(|p| &p.sort).filter(|s| s.is_sorted()));
        match runtime {
            Some(sort) => sort
                .orders
                .iter()
                .map(|order| resolve_order(&self.columns, &self.table, order))
                .collect(),
            None => Ok(self.static_orders.clone()),
        }
    }

    /// LIMIT and OFFSET from the static limit and the page request.
    fn window(&self, page: Option<&Pageable>) -> (Option<u64>, Option<u64>) {
        match (self.limit, page) {
            (limit, None) => (limit, None),
            (None, Some(page)) => (Some(page.size), Some(page.offset())),
            (Some(top), Some(page)) => {
                let offset = page.offset();
                (Some(page.size.min(top.saturating_sub(offset))), Some(offset))
            }
        }
    }
}

fn unsupported(operator: Operator) -> PartQueryError {
    PartQueryError::UnsupportedOperator {
        operator: operator.type_name().to_string(),
        arity: operator.arity(),
        keywords: operator.keywords().iter().map(|k| k.to_string()).collect(),
    }
}

fn compile_leaf(
    index: usize,
    condition: &PropertyCondition,
    metadata: &dyn EntityMetadata,
) -> Result<CompiledLeaf> {
    let column = metadata.resolve(&condition.path)?;
    let ignore_case = condition.operator.supports_ignore_case()
        && match condition.ignore_case {
            IgnoreCase::Never => false,
            IgnoreCase::Always => true,
            IgnoreCase::WhenPossible => column.wire_type == WireType::String,
        };
    Ok(CompiledLeaf {
        tag: format!("tag{index}"),
        operator: condition.operator,
        column: column.column.clone(),
        ignore_case,
    })
}

fn resolve_order(columns: &[ColumnMetadata], table: &str, order: &SortOrder) -> Result<OrderColumn> {
    let path = PropertyPath::parse(&order.property);
    let dotted = path.dotted();
    let column = columns
        .iter()
        .find(|c| c.field == dotted)
        .ok_or_else(|| MetadataError::UnknownProperty {
            table: table.to_string(),
            path: dotted,
        })?;
    Ok(OrderColumn {
        column: column.column.clone(),
        direction: order.direction,
        ignore_case: order.ignore_case,
    })
}

fn validate_signature(tree: &PartTree, params: &[ParamMeta], returns: ReturnShape) -> Result<()> {
    let invalid = |reason: String| PartQueryError::InvalidSignature {
        method: tree.method_name.clone(),
        reason,
    };

    let paging = params.iter().filter(|p| p.ty == ParamType::Pageable).count();
    let sorting = params.iter().filter(|p| p.ty == ParamType::Sort).count();
    if paging + sorting > 1 {
        return Err(invalid(format!(
            "at most one Pageable or Sort parameter is allowed, found {paging} Pageable and {sorting} Sort"
        )));
    }

    let compatible = match tree.kind {
        OperationKind::Find => matches!(returns, ReturnShape::Many | ReturnShape::One | ReturnShape::Values),
        OperationKind::Count => returns == ReturnShape::Count,
        OperationKind::Exists => returns == ReturnShape::Exists,
        OperationKind::Delete => matches!(returns, ReturnShape::Many | ReturnShape::Count | ReturnShape::Unit),
    };
    if !compatible {
        return Err(invalid(format!(
            "a {} query cannot return {returns:?}",
            tree.kind
        )));
    }
    Ok(())
}
