//! Criteria search and two-table joins.

use sql_agent_database_models::{ComparisonOperator, JoinType, ToolResponse};
use switchy_database::Database;

use crate::catalog::{self, TableCatalog};
use crate::statement::{Params, Statement};
use crate::{ToolError, identifier};

/// How one criteria entry compares its column.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// `col = value`
    Equal(serde_json::Value),
    /// `col IS NULL`
    IsNull,
    /// `col IS NOT NULL`
    IsNotNull,
    /// `col <op> value`
    Compare(ComparisonOperator, serde_json::Value),
}

/// A single `WHERE` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column being compared.
    pub column: String,
    /// Comparison applied to it.
    pub comparison: Comparison,
}

/// Parses search criteria into conditions, in declaration order.
///
/// A scalar value means equality and `null` means `IS NULL`. An object value
/// names an operator; if it names several, the first in
/// [`ComparisonOperator::ALL`] order wins. `{"$ne": null}` means
/// `IS NOT NULL`.
///
/// # Errors
///
/// Returns [`ToolError::UnsupportedOperator`] for arrays, objects without a
/// known operator, and operator operands that are not scalars.
pub fn parse_criteria(
    criteria: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<Condition>, ToolError> {
    criteria
        .iter()
        .map(|(column, value)| {
            let unsupported = || ToolError::UnsupportedOperator {
                column: column.clone(),
                operator: value.to_string(),
            };

            let comparison = match value {
                serde_json::Value::Null => Comparison::IsNull,
                serde_json::Value::Array(_) => return Err(unsupported()),
                serde_json::Value::Object(operators) => {
                    let (operator, operand) = ComparisonOperator::ALL
                        .iter()
                        .find_map(|op| operators.get(op.key()).map(|operand| (*op, operand)))
                        .ok_or_else(unsupported)?;

                    match (operator, operand) {
                        (ComparisonOperator::Ne, serde_json::Value::Null) => Comparison::IsNotNull,
                        (
                            _,
                            serde_json::Value::Null
                            | serde_json::Value::Array(_)
                            | serde_json::Value::Object(_),
                        ) => return Err(unsupported()),
                        (operator, operand) => Comparison::Compare(operator, operand.clone()),
                    }
                }
                scalar => Comparison::Equal(scalar.clone()),
            };

            Ok(Condition {
                column: column.clone(),
                comparison,
            })
        })
        .collect()
}

/// Builds the `SELECT` for a criteria search.
///
/// # Errors
///
/// Returns criteria, column, or value errors.
pub fn plan_search(
    catalog: &TableCatalog,
    criteria: &serde_json::Map<String, serde_json::Value>,
) -> Result<Statement, ToolError> {
    let conditions = parse_criteria(criteria)?;
    let mut params = Params::new();
    let mut clauses = Vec::with_capacity(conditions.len());

    for condition in &conditions {
        catalog.allow(&condition.column)?;
        let column = identifier::quote(&condition.column);

        clauses.push(match &condition.comparison {
            Comparison::IsNull => format!("{column} IS NULL"),
            Comparison::IsNotNull => format!("{column} IS NOT NULL"),
            Comparison::Equal(value) => {
                let placeholder = params.push(catalog.bind(&condition.column, value)?);
                format!("{column} = {placeholder}")
            }
            Comparison::Compare(operator, value) => {
                let placeholder = params.push(catalog.bind(&condition.column, value)?);
                format!("{column} {} {placeholder}", operator.sql())
            }
        });
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        catalog.select_list(),
        identifier::quote(&catalog.table)
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if catalog.has("id") {
        sql.push_str(" ORDER BY ");
        sql.push_str(&identifier::quote("id"));
    }

    Ok(params.into_statement(sql))
}

/// Returns the rows of `table` matching every criterion.
pub async fn search(
    db: &dyn Database,
    table: &str,
    criteria: &serde_json::Map<String, serde_json::Value>,
) -> ToolResponse {
    match search_rows(db, table, criteria).await {
        Ok(rows) => ToolResponse::data(serde_json::Value::Array(rows)),
        Err(e) => e.into_response("Failed to search rows"),
    }
}

async fn search_rows(
    db: &dyn Database,
    table: &str,
    criteria: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<serde_json::Value>, ToolError> {
    identifier::validate(table)?;
    // Reject malformed criteria before touching the catalog.
    parse_criteria(criteria)?;

    let catalog = catalog::load(db, table).await?;
    let statement = plan_search(&catalog, criteria)?;

    let rows = statement.fetch(db).await?;
    log::debug!("Search on {table} matched {} rows", rows.len());
    Ok(rows)
}

/// A validated join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    /// Left table name.
    pub left: String,
    /// Right table name.
    pub right: String,
    /// Join kind.
    pub join_type: JoinType,
    /// Join predicate, embedded as given.
    pub on_condition: String,
}

impl JoinPlan {
    /// Builds `SELECT <columns> FROM t1 <KIND> JOIN t2 ON <condition>`.
    #[must_use]
    pub fn statement(&self, columns: &str) -> Statement {
        Statement::raw(format!(
            "SELECT {columns} FROM {} {} JOIN {} ON {}",
            identifier::quote(&self.left),
            self.join_type,
            identifier::quote(&self.right),
            self.on_condition
        ))
    }
}

/// Validates a join request without touching the database.
///
/// # Errors
///
/// * [`ToolError::InvalidIdentifier`] for either table name
/// * [`ToolError::InvalidJoinType`] for a kind outside INNER, LEFT, RIGHT, FULL
/// * [`ToolError::InvalidInput`] for a missing or blank condition
pub fn plan_join(
    table1: &str,
    table2: &str,
    join_type: Option<&str>,
    on_condition: Option<&str>,
) -> Result<JoinPlan, ToolError> {
    identifier::validate(table1)?;
    identifier::validate(table2)?;

    let join_type = match join_type {
        None => JoinType::default(),
        Some(kind) => kind
            .trim()
            .parse::<JoinType>()
            .map_err(|_| ToolError::InvalidJoinType {
                join_type: kind.to_string(),
            })?,
    };

    let on_condition = on_condition
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ToolError::InvalidInput {
            message: "onCondition must be a non-empty string".to_string(),
        })?;

    Ok(JoinPlan {
        left: table1.to_string(),
        right: table2.to_string(),
        join_type,
        on_condition: on_condition.to_string(),
    })
}

/// Select list covering both sides of a join, left columns first.
///
/// Duplicate names resolve to the right-hand value once rows are converted.
#[must_use]
pub fn join_select_list(left: &TableCatalog, right: &TableCatalog) -> String {
    match (left.qualified_projection(), right.qualified_projection()) {
        (Some(left), Some(right)) => left.into_iter().chain(right).collect::<Vec<_>>().join(", "),
        _ => "*".to_string(),
    }
}

/// Joins two tables on a caller-supplied condition.
pub async fn join(
    db: &dyn Database,
    table1: &str,
    table2: &str,
    join_type: Option<&str>,
    on_condition: Option<&str>,
) -> ToolResponse {
    match join_rows(db, table1, table2, join_type, on_condition).await {
        Ok(rows) => {
            log::debug!("Join {table1} x {table2} returned {} rows", rows.len());
            ToolResponse::data(serde_json::Value::Array(rows))
        }
        Err(e) => e.into_response("Failed to join tables"),
    }
}

async fn join_rows(
    db: &dyn Database,
    table1: &str,
    table2: &str,
    join_type: Option<&str>,
    on_condition: Option<&str>,
) -> Result<Vec<serde_json::Value>, ToolError> {
    let plan = plan_join(table1, table2, join_type, on_condition)?;
    let left = catalog::load(db, &plan.left).await?;
    let right = catalog::load(db, &plan.right).await?;

    Ok(plan
        .statement(&join_select_list(&left, &right))
        .fetch(db)
        .await?)
}
