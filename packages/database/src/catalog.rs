//! Table catalog lookups and column-typed value binding.
//!
//! The tool layer never knows a table's shape in advance. Before any data
//! statement is built, the target table's columns are read from
//! `information_schema`; the result allow-lists column names and decides how
//! each JSON value is bound.

use moosicbox_json_utils::database::ToValue as _;
use sql_agent_database_models::ColumnInfo;
use switchy_database::{Database, DatabaseValue, Row};

use crate::ToolError;
use crate::identifier;

/// How a value destined for a column is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// `int2` / `int4`.
    Int32,
    /// `int8`.
    Int64,
    /// `float8`.
    Float64,
    /// `bool`.
    Bool,
    /// `text`, `varchar`, `bpchar`, `name`.
    Text,
    /// Anything else, bound as text and cast server-side to the named type.
    Cast(String),
}

impl ValueKind {
    /// Classifies a column by its `udt_name`.
    #[must_use]
    pub fn from_udt_name(udt_name: &str) -> Self {
        match udt_name {
            "int2" | "int4" => Self::Int32,
            "int8" => Self::Int64,
            "float8" => Self::Float64,
            "bool" => Self::Bool,
            "text" | "varchar" | "bpchar" | "name" => Self::Text,
            other => Self::Cast(other.to_string()),
        }
    }
}

/// A column as read from `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    /// Column name.
    pub name: String,
    /// Declared type as reported by `data_type`.
    pub data_type: String,
    /// Underlying type name (`int4`, `timestamptz`, ...).
    pub udt_name: String,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
}

impl CatalogColumn {
    /// Binding strategy for values written to or compared with this column.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        ValueKind::from_udt_name(&self.udt_name)
    }

    /// Select expression that reads this column back as a value row
    /// conversion understands, aliased to the column's own name.
    ///
    /// `int2` and `float4` are widened; anything that is not natively decoded
    /// comes back as its text rendering.
    fn select_expr(&self, source: Option<&str>) -> String {
        let column = identifier::quote(&self.name);
        let reference = source.map_or_else(|| column.clone(), |s| format!("{s}.{column}"));
        match self.udt_name.as_str() {
            "int4" | "int8" | "float8" | "bool" | "text" | "varchar" => reference,
            "int2" => format!("{reference}::int4 AS {column}"),
            "float4" => format!("{reference}::float8 AS {column}"),
            _ => format!("{reference}::text AS {column}"),
        }
    }
}

impl From<CatalogColumn> for ColumnInfo {
    fn from(column: CatalogColumn) -> Self {
        Self {
            name: column.name,
            data_type: column.data_type,
            nullable: column.nullable,
        }
    }
}

/// A value ready to be bound, together with the placeholder cast it needs.
#[derive(Debug, Clone)]
pub struct BoundValue {
    /// Parameter value.
    pub value: DatabaseValue,
    /// Type to cast the (text) parameter to, if any.
    pub cast: Option<String>,
}

/// The columns of one table, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCatalog {
    /// Table name.
    pub table: String,
    /// Columns ordered by ordinal position.
    pub columns: Vec<CatalogColumn>,
}

impl TableCatalog {
    /// Looks up a column by exact name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Whether the table has a column with this exact name.
    #[must_use]
    pub fn has(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Validates a column name and checks it against the catalog.
    ///
    /// # Errors
    ///
    /// * [`ToolError::InvalidIdentifier`] if the name fails the grammar
    /// * [`ToolError::UnknownColumn`] if the table has no such column
    pub fn allow(&self, column: &str) -> Result<&CatalogColumn, ToolError> {
        identifier::validate(column)?;
        self.get(column).ok_or_else(|| ToolError::UnknownColumn {
            table: self.table.clone(),
            column: column.to_string(),
        })
    }

    /// Select list for rows read from or returned by this table.
    ///
    /// Falls back to `*` when a name cannot be quoted.
    #[must_use]
    pub fn select_list(&self) -> String {
        self.projection(None)
            .map_or_else(|| "*".to_string(), |columns| columns.join(", "))
    }

    /// Select expressions qualified with the table name, for queries that
    /// read several tables.
    #[must_use]
    pub fn qualified_projection(&self) -> Option<Vec<String>> {
        if !identifier::is_valid(&self.table) {
            return None;
        }
        self.projection(Some(identifier::quote(&self.table).as_str()))
    }

    fn projection(&self, source: Option<&str>) -> Option<Vec<String>> {
        if let Some(column) = self.columns.iter().find(|c| !identifier::is_valid(&c.name)) {
            log::warn!(
                "Column '{}' of {} cannot be quoted, selecting *",
                column.name,
                self.table
            );
            return None;
        }
        Some(self.columns.iter().map(|c| c.select_expr(source)).collect())
    }

    /// Binds a JSON value for `column`.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is not allowed or the value cannot be
    /// represented as the column's type.
    pub fn bind(&self, column: &str, value: &serde_json::Value) -> Result<BoundValue, ToolError> {
        let target = self.allow(column)?;
        bind_value(column, &target.kind(), value)
    }
}

/// Binds a JSON value according to `kind`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidValue`] if the value does not fit the kind.
pub fn bind_value(
    column: &str,
    kind: &ValueKind,
    value: &serde_json::Value,
) -> Result<BoundValue, ToolError> {
    use serde_json::Value;

    let invalid = |message: String| ToolError::InvalidValue {
        column: column.to_string(),
        message,
    };

    if value.is_null() {
        return Ok(BoundValue {
            value: DatabaseValue::Null,
            cast: None,
        });
    }

    let value = match kind {
        ValueKind::Int32 => {
            let n = as_integer(value)
                .ok_or_else(|| invalid(format!("expected integer, got {value}")))?;
            let n = i32::try_from(n).map_err(|_| invalid(format!("{n} is out of range")))?;
            DatabaseValue::Int32(n)
        }
        ValueKind::Int64 => DatabaseValue::Int64(
            as_integer(value).ok_or_else(|| invalid(format!("expected integer, got {value}")))?,
        ),
        ValueKind::Float64 => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            DatabaseValue::Real64(
                n.ok_or_else(|| invalid(format!("expected number, got {value}")))?,
            )
        }
        ValueKind::Bool => match value {
            Value::Bool(b) => DatabaseValue::Bool(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => DatabaseValue::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => DatabaseValue::Bool(false),
            _ => return Err(invalid(format!("expected boolean, got {value}"))),
        },
        ValueKind::Text => DatabaseValue::String(as_text(value)),
        ValueKind::Cast(udt_name) => {
            let cast = identifier::checked(udt_name)
                .map_err(|_| invalid(format!("column type '{udt_name}' cannot be bound")))?;
            return Ok(BoundValue {
                value: DatabaseValue::String(as_text(value)),
                cast: Some(cast),
            });
        }
    };

    Ok(BoundValue { value, cast: None })
}

/// Reads a whole number from a JSON number or numeric string.
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a JSON value as the text Postgres should parse.
fn as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns whether `table` exists in the current schema.
///
/// # Errors
///
/// Returns [`ToolError::CatalogQueryFailed`] if the catalog query fails.
pub async fn table_exists(db: &dyn Database, table: &str) -> Result<bool, ToolError> {
    let rows = db
        .query_raw_params(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name::text = $1
             ) AS table_exists",
            &[DatabaseValue::String(table.to_string())],
        )
        .await
        .map_err(ToolError::CatalogQueryFailed)?;

    Ok(rows
        .first()
        .and_then(|row| row.to_value::<bool>("table_exists").ok())
        .unwrap_or(false))
}

/// Reads the columns of `table` in ordinal order.
///
/// Returns an empty list for a table that does not exist.
///
/// # Errors
///
/// Returns [`ToolError::CatalogQueryFailed`] if the catalog query fails.
pub async fn columns(db: &dyn Database, table: &str) -> Result<Vec<CatalogColumn>, ToolError> {
    let rows = db
        .query_raw_params(
            "SELECT column_name::text AS column_name,
                    data_type::text AS data_type,
                    udt_name::text AS udt_name,
                    (is_nullable::text = 'YES') AS is_nullable
             FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name::text = $1
             ORDER BY ordinal_position",
            &[DatabaseValue::String(table.to_string())],
        )
        .await
        .map_err(ToolError::CatalogQueryFailed)?;

    Ok(rows
        .iter()
        .filter_map(|row| catalog_column(table, row))
        .collect())
}

/// Decodes one `information_schema.columns` row, skipping rows that do not
/// decode.
fn catalog_column(table: &str, row: &Row) -> Option<CatalogColumn> {
    match (
        row.to_value::<String>("column_name"),
        row.to_value::<String>("data_type"),
        row.to_value::<String>("udt_name"),
        row.to_value::<bool>("is_nullable"),
    ) {
        (Ok(name), Ok(data_type), Ok(udt_name), Ok(nullable)) => Some(CatalogColumn {
            name,
            data_type,
            udt_name,
            nullable,
        }),
        (name, data_type, udt_name, nullable) => {
            log::warn!(
                "Skipping undecodable catalog row for {table}: \
                 column_name={name:?} data_type={data_type:?} udt_name={udt_name:?} \
                 is_nullable={nullable:?}"
            );
            None
        }
    }
}

/// Loads the catalog for `table`.
///
/// # Errors
///
/// * [`ToolError::TableNotFound`] if the table has no columns in the current
///   schema
/// * [`ToolError::CatalogQueryFailed`] if the catalog query fails
pub async fn load(db: &dyn Database, table: &str) -> Result<TableCatalog, ToolError> {
    let columns = columns(db, table).await?;
    if columns.is_empty() {
        return Err(ToolError::TableNotFound {
            table: table.to_string(),
        });
    }
    Ok(TableCatalog {
        table: table.to_string(),
        columns,
    })
}
