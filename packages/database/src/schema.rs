//! Column type and constraint changes on existing tables.

use sql_agent_database_models::{ConstraintKind, SchemaChange};
use switchy_database::Database;

use crate::catalog::TableCatalog;
use crate::statement::Statement;
use crate::{ToolError, identifier};

/// Plans the DDL for a list of schema changes, in request order.
///
/// For each request the type change (if any) comes before the constraint
/// change. Nothing is executed, so a bad request anywhere in the list rejects
/// the whole batch.
///
/// # Errors
///
/// * [`ToolError::InvalidSchemaChange`] for a request without a column or
///   without any change
/// * [`ToolError::UnknownColumn`] / [`ToolError::InvalidIdentifier`] for the
///   column
/// * [`ToolError::UnsupportedType`] for a type that fails the type grammar
/// * [`ToolError::UnsupportedConstraint`] for an unknown constraint
pub fn plan_schema_changes(
    catalog: &TableCatalog,
    changes: &[SchemaChange],
) -> Result<Vec<Statement>, ToolError> {
    let table = identifier::quote(&catalog.table);
    let mut statements = Vec::new();

    for (index, change) in changes.iter().enumerate() {
        let invalid = |message: &str| ToolError::InvalidSchemaChange {
            index,
            message: message.to_string(),
        };

        let column_name = change
            .column
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| invalid("missing column"))?;
        if change.data_type.is_none() && change.constraint.is_none() {
            return Err(invalid("expected a type or a constraint"));
        }

        catalog.allow(column_name)?;
        let column = identifier::quote(column_name);

        if let Some(data_type) = &change.data_type {
            let data_type = identifier::validate_sql_type(data_type)?;
            statements.push(Statement::raw(format!(
                "ALTER TABLE {table} ALTER COLUMN {column} SET DATA TYPE {data_type} \
                 USING {column}::{data_type}"
            )));
        }

        if let Some(constraint) = &change.constraint {
            let kind = constraint
                .trim()
                .to_ascii_uppercase()
                .parse::<ConstraintKind>()
                .map_err(|_| ToolError::UnsupportedConstraint {
                    constraint: constraint.clone(),
                })?;

            match kind {
                ConstraintKind::Unique => {
                    let name = identifier::checked(&identifier::constraint_name(
                        &catalog.table,
                        column_name,
                    ))?;
                    statements.push(Statement::raw(format!(
                        "ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {name}"
                    )));
                    statements.push(Statement::raw(format!(
                        "ALTER TABLE {table} ADD CONSTRAINT {name} UNIQUE ({column})"
                    )));
                }
                ConstraintKind::NotNull => statements.push(Statement::raw(format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL"
                ))),
                ConstraintKind::Null => statements.push(Statement::raw(format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL"
                ))),
            }
        }
    }

    Ok(statements)
}

/// Executes planned schema statements one after another in a transaction.
///
/// # Errors
///
/// Returns [`ToolError::Store`] if any statement or the commit fails; the
/// transaction is rolled back in that case.
pub async fn apply_schema_changes(
    db: &dyn Database,
    statements: &[Statement],
) -> Result<(), ToolError> {
    let tx = db.begin_transaction().await?;

    for statement in statements {
        if let Err(e) = statement.execute(tx.as_ref()).await {
            if let Err(rollback) = tx.rollback().await {
                log::error!("Failed to roll back schema changes: {rollback}");
            }
            return Err(e.into());
        }
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::widgets;

    fn change(column: &str, data_type: Option<&str>, constraint: Option<&str>) -> SchemaChange {
        SchemaChange {
            column: Some(column.to_string()),
            data_type: data_type.map(str::to_string),
            constraint: constraint.map(str::to_string),
        }
    }

    fn sql(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(|s| s.sql.as_str()).collect()
    }

    #[test]
    fn type_change_precedes_constraint() {
        let statements = plan_schema_changes(
            &widgets(),
            &[change("title", Some("varchar(255)"), Some("unique"))],
        )
        .unwrap();

        assert_eq!(
            sql(&statements),
            [
                "ALTER TABLE \"widgets\" ALTER COLUMN \"title\" SET DATA TYPE varchar(255) \
                 USING \"title\"::varchar(255)",
                "ALTER TABLE \"widgets\" DROP CONSTRAINT IF EXISTS \"widgets_title_constraint\"",
                "ALTER TABLE \"widgets\" ADD CONSTRAINT \"widgets_title_constraint\" \
                 UNIQUE (\"title\")",
            ]
        );
    }

    #[test]
    fn nullability_changes() {
        let statements = plan_schema_changes(
            &widgets(),
            &[
                change("price", None, Some("NOT NULL")),
                change("views", None, Some(" null ")),
            ],
        )
        .unwrap();

        assert_eq!(
            sql(&statements),
            [
                "ALTER TABLE \"widgets\" ALTER COLUMN \"price\" SET NOT NULL",
                "ALTER TABLE \"widgets\" ALTER COLUMN \"views\" DROP NOT NULL",
            ]
        );
    }

    #[test]
    fn one_bad_request_rejects_the_batch() {
        let err = plan_schema_changes(
            &widgets(),
            &[
                change("price", None, Some("NOT NULL")),
                change("title", None, Some("PRIMARY KEY")),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ToolError::UnsupportedConstraint { ref constraint } if constraint == "PRIMARY KEY"
        ));
    }

    #[test]
    fn rejects_incomplete_requests() {
        let missing_column = SchemaChange {
            column: None,
            data_type: Some("text".to_string()),
            constraint: None,
        };
        assert!(matches!(
            plan_schema_changes(&widgets(), &[missing_column]),
            Err(ToolError::InvalidSchemaChange { index: 0, .. })
        ));
        assert!(matches!(
            plan_schema_changes(&widgets(), &[change("title", None, None)]),
            Err(ToolError::InvalidSchemaChange { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_unknown_columns_and_hostile_types() {
        assert!(matches!(
            plan_schema_changes(&widgets(), &[change("colour", Some("text"), None)]),
            Err(ToolError::UnknownColumn { .. })
        ));
        assert!(matches!(
            plan_schema_changes(
                &widgets(),
                &[change("title", Some("text; DROP TABLE widgets"), None)]
            ),
            Err(ToolError::UnsupportedType { .. })
        ));
    }
}
