//! Table creation and introspection.

use std::collections::BTreeSet;

use sql_agent_database_models::{ColumnInfo, ColumnSpec, ColumnType, ToolResponse};
use switchy_database::Database;

use crate::statement::Statement;
use crate::{ToolError, catalog, identifier};

/// Columns every created table gets, as `(name, type, primary key)`.
///
/// Caller columns with one of these names are dropped.
pub const BASELINE_COLUMNS: [(&str, ColumnType, bool); 3] = [
    ("id", ColumnType::Integer, true),
    ("created_at", ColumnType::Timestamp, false),
    ("updated_at", ColumnType::Timestamp, false),
];

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for a table.
///
/// # Errors
///
/// * [`ToolError::InvalidIdentifier`] for a bad table or column name
/// * [`ToolError::InvalidInput`] if `columns` is empty
/// * [`ToolError::UnsupportedType`] for a column type outside the vocabulary
pub fn plan_create_table(table: &str, columns: &[ColumnSpec]) -> Result<Statement, ToolError> {
    let table_sql = identifier::checked(table)?;

    if columns.is_empty() {
        return Err(ToolError::InvalidInput {
            message: "columns must be a non-empty list".to_string(),
        });
    }

    let mut seen: BTreeSet<&str> = BASELINE_COLUMNS.iter().map(|(name, ..)| *name).collect();
    let mut definitions: Vec<String> = BASELINE_COLUMNS
        .iter()
        .map(|(name, column_type, primary_key)| {
            column_definition(&identifier::quote(name), *column_type, *primary_key)
        })
        .collect();

    for column in columns {
        if !seen.insert(column.name.as_str()) {
            log::debug!("Dropping duplicate or baseline column '{}'", column.name);
            continue;
        }

        let name = identifier::checked(&column.name)?;
        let column_type = column
            .column_type
            .parse::<ColumnType>()
            .map_err(|_| ToolError::UnsupportedType {
                type_name: column.column_type.clone(),
            })?;

        if column.primary_key {
            // `id` already holds the table's primary key.
            log::warn!(
                "Ignoring primaryKey on column '{}' of {table}: id is the primary key",
                column.name
            );
        }

        definitions.push(column_definition(&name, column_type, false));
    }

    Ok(Statement::raw(format!(
        "CREATE TABLE IF NOT EXISTS {table_sql} ({})",
        definitions.join(", ")
    )))
}

fn column_definition(name: &str, column_type: ColumnType, primary_key: bool) -> String {
    if primary_key {
        format!("{name} {} PRIMARY KEY", column_type.definition())
    } else {
        format!("{name} {}", column_type.definition())
    }
}

/// Creates a table with the baseline columns plus `columns`.
///
/// Creating a table that already exists is a no-op that still succeeds.
pub async fn create_table(db: &dyn Database, table: &str, columns: &[ColumnSpec]) -> ToolResponse {
    let statement = match plan_create_table(table, columns) {
        Ok(statement) => statement,
        Err(e) => return e.into_response("Failed to create table"),
    };

    match statement.execute(db).await {
        Ok(()) => {
            log::info!("Created table {table}");
            ToolResponse::ok_message(format!("Table {table} created successfully"))
        }
        Err(e) => ToolError::Store(e).into_response("Failed to create table"),
    }
}

/// Lists the columns of an existing table in catalog order.
pub async fn get_columns(db: &dyn Database, table: &str) -> ToolResponse {
    match describe(db, table).await {
        Ok(columns) => ToolResponse::columns(columns),
        Err(e) => e.into_response("Failed to get columns"),
    }
}

async fn describe(db: &dyn Database, table: &str) -> Result<Vec<ColumnInfo>, ToolError> {
    identifier::validate(table)?;

    if !catalog::table_exists(db, table).await? {
        return Err(ToolError::TableNotFound {
            table: table.to_string(),
        });
    }

    Ok(catalog::columns(db, table)
        .await?
        .into_iter()
        .map(ColumnInfo::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, column_type: &str) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            column_type: column_type.to_string(),
            primary_key: false,
        }
    }

    #[test]
    fn adds_baseline_columns() {
        let statement = plan_create_table("widgets", &[spec("title", "text")]).unwrap();
        assert_eq!(
            statement.sql,
            "CREATE TABLE IF NOT EXISTS \"widgets\" (\
             \"id\" SERIAL PRIMARY KEY, \
             \"created_at\" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP, \
             \"updated_at\" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP, \
             \"title\" TEXT NOT NULL)"
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn baseline_wins_over_caller_columns() {
        let statement = plan_create_table("widgets", &[spec("id", "text")]).unwrap();
        assert!(statement.sql.contains("\"id\" SERIAL PRIMARY KEY"));
        assert!(!statement.sql.contains("\"id\" TEXT"));
    }

    #[test]
    fn maps_every_supported_type() {
        let statement = plan_create_table(
            "things",
            &[
                spec("qty", "integer"),
                spec("due", "timestamp"),
                spec("active", "Boolean"),
                spec("price", "decimal"),
            ],
        )
        .unwrap();
        assert!(statement.sql.contains("\"qty\" SERIAL"));
        assert!(statement.sql.contains("\"due\" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP"));
        assert!(statement.sql.contains("\"active\" BOOLEAN DEFAULT FALSE"));
        assert!(statement.sql.contains("\"price\" DECIMAL(10,2)"));
    }

    #[test]
    fn unsupported_type_is_reported_verbatim() {
        let err = plan_create_table("widgets", &[spec("blob", "bytea")]).unwrap_err();
        assert!(
            matches!(err, ToolError::UnsupportedType { ref type_name } if type_name == "bytea")
        );
        assert_eq!(
            err.into_response("Failed to create table").message.as_deref(),
            Some("Unsupported column type: 'bytea'")
        );
    }

    #[test]
    fn rejects_empty_columns_and_bad_names() {
        assert!(matches!(
            plan_create_table("widgets", &[]),
            Err(ToolError::InvalidInput { .. })
        ));
        assert!(matches!(
            plan_create_table("2cool", &[spec("a", "text")]),
            Err(ToolError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            plan_create_table("widgets", &[spec("a b", "text")]),
            Err(ToolError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn first_duplicate_column_wins() {
        let statement =
            plan_create_table("widgets", &[spec("title", "text"), spec("title", "integer")])
                .unwrap();
        assert!(statement.sql.contains("\"title\" TEXT NOT NULL"));
        assert!(!statement.sql.contains("\"title\" SERIAL"));
    }
}
