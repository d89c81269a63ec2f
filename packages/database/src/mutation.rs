//! Row insert, update, and delete.
//!
//! Each operation loads the target table's catalog first, so that every
//! column it touches is allow-listed and every value is bound with the
//! column's type. Update batches run inside a transaction: the per-row
//! statements are issued concurrently and either all commit or none do.

use sql_agent_database_models::{SchemaChange, ToolResponse, UpdateRequest};
use switchy_database::Database;

use crate::catalog::{self, TableCatalog};
use crate::statement::{Params, Statement};
use crate::{ToolError, identifier, schema};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Normalizes `data` (one row object or an array of them) into a list.
///
/// # Errors
///
/// * [`ToolError::EmptyInput`] for an empty array
/// * [`ToolError::InvalidInput`] if any row is not an object
pub fn normalize_rows(data: &serde_json::Value) -> Result<Vec<&JsonMap>, ToolError> {
    let rows: Vec<&serde_json::Value> = match data {
        serde_json::Value::Array(rows) => rows.iter().collect(),
        row => vec![row],
    };

    if rows.is_empty() {
        return Err(ToolError::EmptyInput {
            what: "rows".to_string(),
        });
    }

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            row.as_object().ok_or_else(|| ToolError::InvalidInput {
                message: format!("row {index} is not an object"),
            })
        })
        .collect()
}

/// Builds one multi-row `INSERT ... RETURNING ...`.
///
/// The column list comes from the first row; every other row must carry
/// exactly the same keys.
///
/// # Errors
///
/// Returns an error for an empty row list, mismatched rows, unknown
/// columns, or values that do not fit their columns.
pub fn plan_insert(catalog: &TableCatalog, rows: &[&JsonMap]) -> Result<Statement, ToolError> {
    let Some(first) = rows.first() else {
        return Err(ToolError::EmptyInput {
            what: "rows".to_string(),
        });
    };

    let columns: Vec<&String> = first.keys().collect();
    if columns.is_empty() {
        return Err(ToolError::InvalidInput {
            message: "rows must contain at least one column".to_string(),
        });
    }

    let column_list = columns
        .iter()
        .map(|column| {
            catalog.allow(column)?;
            Ok(identifier::quote(column))
        })
        .collect::<Result<Vec<_>, ToolError>>()?
        .join(", ");

    let mut params = Params::new();
    let mut tuples = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(*c)) {
            return Err(ToolError::InvalidInput {
                message: format!("row {index} does not have the same columns as row 0"),
            });
        }

        let placeholders = columns
            .iter()
            .map(|column| Ok(params.push(catalog.bind(column, &row[column.as_str()])?)))
            .collect::<Result<Vec<_>, ToolError>>()?;
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {} ({column_list}) VALUES {} RETURNING {}",
        identifier::quote(&catalog.table),
        tuples.join(", "),
        catalog.select_list()
    );
    Ok(params.into_statement(sql))
}

/// Inserts one row or a list of rows and returns the inserted rows.
pub async fn insert(db: &dyn Database, table: &str, data: &serde_json::Value) -> ToolResponse {
    match insert_rows(db, table, data).await {
        Ok(rows) => ToolResponse::data(serde_json::Value::Array(rows)),
        Err(e) => e.into_response("Failed to insert rows"),
    }
}

async fn insert_rows(
    db: &dyn Database,
    table: &str,
    data: &serde_json::Value,
) -> Result<Vec<serde_json::Value>, ToolError> {
    identifier::validate(table)?;
    let rows = normalize_rows(data)?;
    let catalog = catalog::load(db, table).await?;
    let statement = plan_insert(&catalog, &rows)?;

    let inserted = statement.fetch(db).await?;
    log::info!("Inserted {} rows into {table}", inserted.len());
    Ok(inserted)
}

/// JavaScript-style truthiness, used to decide whether an update carries an
/// id.
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// Builds the `UPDATE ... RETURNING ...` statement for one update entry.
///
/// Placeholders are numbered from `$1` within each statement. When the table
/// has an `updated_at` column it is set to `NOW()`, overriding any value the
/// caller supplied for it.
///
/// # Errors
///
/// * [`ToolError::InvalidUpdate`] without a truthy `id` or with empty `data`
/// * column and value errors from the catalog
pub fn plan_update(
    catalog: &TableCatalog,
    index: usize,
    update: &UpdateRequest,
) -> Result<Statement, ToolError> {
    let id = update
        .id
        .as_ref()
        .filter(|id| is_truthy(id))
        .ok_or_else(|| ToolError::InvalidUpdate {
            index,
            message: "missing id".to_string(),
        })?;
    let data = update
        .data
        .as_ref()
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ToolError::InvalidUpdate {
            index,
            message: "data must be a non-empty object".to_string(),
        })?;

    let touches_updated_at = catalog.has("updated_at");
    let mut params = Params::new();
    let mut assignments = Vec::with_capacity(data.len() + 1);

    for (column, value) in data {
        if touches_updated_at && column == "updated_at" {
            continue;
        }
        let placeholder = params.push(catalog.bind(column, value)?);
        assignments.push(format!("{} = {placeholder}", identifier::quote(column)));
    }

    if touches_updated_at {
        assignments.push(format!("{} = NOW()", identifier::quote("updated_at")));
    }

    let id_placeholder = params.push(catalog.bind("id", id)?);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {id_placeholder} RETURNING {}",
        identifier::quote(&catalog.table),
        assignments.join(", "),
        identifier::quote("id"),
        catalog.select_list()
    );
    Ok(params.into_statement(sql))
}

/// Runs a batch of update statements concurrently inside one transaction.
///
/// Returns the updated rows in statement order. If any statement fails the
/// transaction is rolled back.
///
/// # Errors
///
/// Returns [`ToolError::Store`] if the transaction cannot be opened, any
/// statement fails, or the commit fails.
pub async fn run_update_batch(
    db: &dyn Database,
    statements: &[Statement],
) -> Result<Vec<serde_json::Value>, ToolError> {
    let tx = db.begin_transaction().await?;

    let result =
        futures::future::try_join_all(statements.iter().map(|s| s.fetch(tx.as_ref()))).await;

    match result {
        Ok(batches) => {
            tx.commit().await?;
            Ok(batches.into_iter().flatten().collect())
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                log::error!("Failed to roll back update batch: {rollback}");
            }
            Err(e.into())
        }
    }
}

/// Applies row updates and schema changes to a table.
///
/// Every entry of both lists is validated before anything is sent. Row
/// updates then run as one transactional batch, followed by the schema
/// changes as a second, independent transactional batch. If the schema batch
/// fails, the already committed row updates stay in place.
pub async fn update(
    db: &dyn Database,
    table: &str,
    updates: &[UpdateRequest],
    schema_changes: &[SchemaChange],
) -> ToolResponse {
    match update_table(db, table, updates, schema_changes).await {
        Ok(data) => ToolResponse::data(data),
        Err(e) => e.into_response("Failed to update table"),
    }
}

async fn update_table(
    db: &dyn Database,
    table: &str,
    updates: &[UpdateRequest],
    schema_changes: &[SchemaChange],
) -> Result<serde_json::Value, ToolError> {
    identifier::validate(table)?;

    if updates.is_empty() && schema_changes.is_empty() {
        return Err(ToolError::EmptyInput {
            what: "updates or schema changes".to_string(),
        });
    }

    let catalog = catalog::load(db, table).await?;
    let schema_statements = schema::plan_schema_changes(&catalog, schema_changes)?;
    let update_statements = updates
        .iter()
        .enumerate()
        .map(|(index, update)| plan_update(&catalog, index, update))
        .collect::<Result<Vec<_>, _>>()?;

    let updated = if update_statements.is_empty() {
        Vec::new()
    } else {
        run_update_batch(db, &update_statements).await?
    };
    log::info!("Updated {} rows in {table}", updated.len());

    if !schema_statements.is_empty() {
        schema::apply_schema_changes(db, &schema_statements).await?;
        log::info!(
            "Applied {} schema changes to {table}",
            schema_changes.len()
        );
    }

    Ok(serde_json::json!({
        "updated": updated,
        "schemaChanges": schema_changes.len(),
    }))
}

/// Normalizes a single id or an array of ids into a list.
///
/// `null` is treated as no ids at all.
#[must_use]
pub fn normalize_ids(ids: &serde_json::Value) -> Vec<&serde_json::Value> {
    match ids {
        serde_json::Value::Array(ids) => ids.iter().collect(),
        serde_json::Value::Null => Vec::new(),
        id => vec![id],
    }
}

/// Builds `DELETE ... WHERE id IN (...) RETURNING ...`.
///
/// # Errors
///
/// * [`ToolError::EmptyInput`] if there are no ids
/// * value errors if an id does not fit the `id` column
pub fn plan_remove(
    catalog: &TableCatalog,
    ids: &[&serde_json::Value],
) -> Result<Statement, ToolError> {
    if ids.is_empty() {
        return Err(ToolError::EmptyInput {
            what: "ids".to_string(),
        });
    }

    let mut params = Params::new();
    let placeholders = ids
        .iter()
        .map(|id| Ok(params.push(catalog.bind("id", id)?)))
        .collect::<Result<Vec<_>, ToolError>>()?;

    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({}) RETURNING {}",
        identifier::quote(&catalog.table),
        identifier::quote("id"),
        placeholders.join(", "),
        catalog.select_list()
    );
    Ok(params.into_statement(sql))
}

/// Deletes rows by primary key and returns the deleted rows.
pub async fn remove(db: &dyn Database, table: &str, ids: &serde_json::Value) -> ToolResponse {
    match remove_rows(db, table, ids).await {
        Ok(rows) => ToolResponse::data(serde_json::Value::Array(rows)),
        Err(e) => e.into_response("Failed to delete rows"),
    }
}

async fn remove_rows(
    db: &dyn Database,
    table: &str,
    ids: &serde_json::Value,
) -> Result<Vec<serde_json::Value>, ToolError> {
    identifier::validate(table)?;
    let ids = normalize_ids(ids);
    if ids.is_empty() {
        return Err(ToolError::EmptyInput {
            what: "ids".to_string(),
        });
    }

    let catalog = catalog::load(db, table).await?;
    let statement = plan_remove(&catalog, &ids)?;

    let deleted = statement.fetch(db).await?;
    log::info!("Deleted {} rows from {table}", deleted.len());
    Ok(deleted)
}
