#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Tool request and response types for the SQL agent.
//!
//! These types describe the loosely-structured action requests that the AI
//! agent (or an HTTP caller) sends to the CRUD tool layer in
//! `sql_agent_database`, the closed vocabularies those requests are checked
//! against, and the uniform response envelope every tool returns.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Logical column type accepted when creating a table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColumnType {
    /// Auto-incrementing integer.
    Integer,
    /// Required text.
    Text,
    /// Timestamp with time zone, defaulting to the creation time.
    Timestamp,
    /// Boolean, defaulting to `false`.
    Boolean,
    /// Fixed-precision decimal with two fractional digits.
    Decimal,
}

impl ColumnType {
    /// Returns the SQL column definition fragment for this type.
    #[must_use]
    pub const fn definition(self) -> &'static str {
        match self {
            Self::Integer => "SERIAL",
            Self::Text => "TEXT NOT NULL",
            Self::Timestamp => "TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP",
            Self::Boolean => "BOOLEAN DEFAULT FALSE",
            Self::Decimal => "DECIMAL(10,2)",
        }
    }
}

/// Kind of join between two tables.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum JoinType {
    /// `INNER JOIN`.
    #[default]
    Inner,
    /// `LEFT JOIN`.
    Left,
    /// `RIGHT JOIN`.
    Right,
    /// `FULL JOIN`.
    Full,
}

/// Column constraint that a schema change may apply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum ConstraintKind {
    /// Named `UNIQUE` constraint on the column.
    #[serde(rename = "UNIQUE")]
    #[strum(serialize = "UNIQUE")]
    Unique,
    /// `SET NOT NULL`.
    #[serde(rename = "NOT NULL")]
    #[strum(serialize = "NOT NULL")]
    NotNull,
    /// `DROP NOT NULL`.
    #[serde(rename = "NULL")]
    #[strum(serialize = "NULL")]
    Null,
}

/// Comparison operator usable in search criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// `$lt`
    #[serde(rename = "$lt")]
    Lt,
    /// `$gt`
    #[serde(rename = "$gt")]
    Gt,
    /// `$lte`
    #[serde(rename = "$lte")]
    Lte,
    /// `$gte`
    #[serde(rename = "$gte")]
    Gte,
    /// `$ne`
    #[serde(rename = "$ne")]
    Ne,
}

impl ComparisonOperator {
    /// All operators, in the order criteria values are probed.
    ///
    /// When a criteria value names several operators, the first one found in
    /// this order is used and the rest are ignored.
    pub const ALL: [Self; 5] = [Self::Lt, Self::Gt, Self::Lte, Self::Gte, Self::Ne];

    /// Returns the criteria key for this operator (e.g. `"$lt"`).
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Lt => "$lt",
            Self::Gt => "$gt",
            Self::Lte => "$lte",
            Self::Gte => "$gte",
            Self::Ne => "$ne",
        }
    }

    /// Returns the SQL comparison token for this operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Ne => "<>",
        }
    }
}

/// A column requested at table-creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Logical type name, checked against [`ColumnType`].
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether the column is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,
}

/// A single row update keyed by primary key.
///
/// Both fields are optional on the wire so that a malformed entry is reported
/// as an invalid update rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Primary key value of the row to update.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// New column values.
    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A single column alteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChange {
    /// Column to alter.
    #[serde(default)]
    pub column: Option<String>,
    /// New SQL data type (e.g. `varchar(255)`).
    #[serde(default, rename = "type")]
    pub data_type: Option<String>,
    /// Constraint to apply: `UNIQUE`, `NOT NULL`, or `NULL`.
    #[serde(default)]
    pub constraint: Option<String>,
}

/// A column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared SQL type (e.g. `integer`, `timestamp with time zone`).
    pub data_type: String,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
}

/// Uniform response envelope returned by every tool.
///
/// Callers branch on `success`. Successful responses carry `data`,
/// `columns`, or a human-readable `message`; failures always carry a
/// `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable message (failure reason, or creation confirmation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Result payload (rows, or an update summary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Column listing for `getColumns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnInfo>>,
}

impl ToolResponse {
    /// Successful response carrying a data payload.
    #[must_use]
    pub const fn data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            columns: None,
        }
    }

    /// Successful response carrying a column listing.
    #[must_use]
    pub const fn columns(columns: Vec<ColumnInfo>) -> Self {
        Self {
            success: true,
            message: None,
            data: None,
            columns: Some(columns),
        }
    }

    /// Successful response carrying only a message.
    #[must_use]
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            columns: None,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            columns: None,
        }
    }
}

/// Names of the actions the tool layer exposes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ToolAction {
    /// Create a table.
    #[strum(to_string = "createTable", serialize = "create_table")]
    CreateTable,
    /// List a table's columns.
    #[strum(to_string = "getColumns", serialize = "get_columns")]
    GetColumns,
    /// Insert one or more rows.
    Insert,
    /// Update rows and/or alter columns.
    Update,
    /// Search rows by criteria.
    Search,
    /// Delete rows by primary key.
    Remove,
    /// Join two tables.
    Join,
}

/// Parameters for `createTable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableParams {
    /// Name of the table to create.
    #[serde(alias = "schemaName", alias = "table")]
    pub table_name: String,
    /// Caller-supplied columns (baseline columns are added automatically).
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

/// Parameters for `getColumns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetColumnsParams {
    /// Table to describe.
    #[serde(alias = "table")]
    pub table_name: String,
}

/// Parameters for `insert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertParams {
    /// Target table.
    #[serde(alias = "table")]
    pub table_name: String,
    /// A single row object or an array of row objects.
    pub data: serde_json::Value,
}

/// Parameters for `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    /// Target table.
    #[serde(alias = "table")]
    pub table_name: String,
    /// Row updates keyed by primary key.
    #[serde(default)]
    pub updates: Vec<UpdateRequest>,
    /// Column alterations, applied in order.
    #[serde(default)]
    pub schema_changes: Vec<SchemaChange>,
}

/// Parameters for `search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Target table.
    #[serde(alias = "table")]
    pub table_name: String,
    /// Column criteria; empty (or `null`) returns every row.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub criteria: serde_json::Map<String, serde_json::Value>,
}

fn null_as_empty<'de, D>(
    deserializer: D,
) -> Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let criteria: Option<serde_json::Map<String, serde_json::Value>> =
        Option::deserialize(deserializer)?;
    Ok(criteria.unwrap_or_default())
}

/// Parameters for `remove`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParams {
    /// Target table.
    #[serde(alias = "table")]
    pub table_name: String,
    /// A single primary key or an array of primary keys.
    #[serde(alias = "id")]
    pub ids: serde_json::Value,
}

/// Parameters for `join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    /// Left-hand table.
    pub table1: String,
    /// Right-hand table.
    pub table2: String,
    /// Join kind; defaults to `INNER`.
    #[serde(default)]
    pub join_type: Option<String>,
    /// Raw join predicate, embedded verbatim.
    #[serde(default)]
    pub on_condition: Option<String>,
}

/// Returns the tool catalogue described to the LLM.
///
/// Each entry follows the `{name, description, parameters}` JSON Schema
/// layout.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn tool_definitions() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": "createTable",
            "description": "Create a table if it does not already exist. Every table automatically gets id (auto-incrementing primary key), created_at and updated_at columns.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tableName": { "type": "string", "description": "Table name (letters, digits, underscores; must not start with a digit)" },
                    "columns": {
                        "type": "array",
                        "description": "Columns to add besides the baseline ones",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "type": { "type": "string", "enum": ["integer", "text", "timestamp", "boolean", "decimal"] },
                                "primaryKey": { "type": "boolean" }
                            },
                            "required": ["name", "type"]
                        }
                    }
                },
                "required": ["tableName", "columns"]
            }
        }),
        serde_json::json!({
            "name": "getColumns",
            "description": "List the columns of an existing table with their SQL type and nullability. Use this before inserting or searching if you are unsure of a table's shape.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tableName": { "type": "string", "description": "Table to describe" }
                },
                "required": ["tableName"]
            }
        }),
        serde_json::json!({
            "name": "insert",
            "description": "Insert one row (object) or several rows (array of objects sharing the same keys). Returns the inserted rows.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tableName": { "type": "string" },
                    "data": { "description": "Row object or array of row objects", "oneOf": [{ "type": "object" }, { "type": "array", "items": { "type": "object" } }] }
                },
                "required": ["tableName", "data"]
            }
        }),
        serde_json::json!({
            "name": "update",
            "description": "Update rows by id and/or alter columns. Schema changes are applied in order; each may change a column's type and/or set a UNIQUE, NOT NULL or NULL constraint.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tableName": { "type": "string" },
                    "updates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "description": "Primary key of the row" },
                                "data": { "type": "object", "description": "Column values to set" }
                            },
                            "required": ["id", "data"]
                        }
                    },
                    "schemaChanges": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "column": { "type": "string" },
                                "type": { "type": "string", "description": "New SQL type, e.g. varchar(255)" },
                                "constraint": { "type": "string", "enum": ["UNIQUE", "NOT NULL", "NULL"] }
                            },
                            "required": ["column"]
                        }
                    }
                },
                "required": ["tableName"]
            }
        }),
        serde_json::json!({
            "name": "search",
            "description": "Find rows matching all criteria. A criteria value is either a literal (equality) or an object with one of $lt, $gt, $lte, $gte, $ne. Empty criteria returns every row.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tableName": { "type": "string" },
                    "criteria": { "type": "object", "description": "e.g. {\"status\": \"open\", \"price\": {\"$gt\": 10}}" }
                },
                "required": ["tableName"]
            }
        }),
        serde_json::json!({
            "name": "remove",
            "description": "Delete rows by primary key. Returns the deleted rows.",
            "parameters": {
                "type": "object",
                "properties": {
                    "tableName": { "type": "string" },
                    "ids": { "description": "A single id or an array of ids" }
                },
                "required": ["tableName", "ids"]
            }
        }),
        serde_json::json!({
            "name": "join",
            "description": "Join two tables and return all columns of the matching rows.",
            "parameters": {
                "type": "object",
                "properties": {
                    "table1": { "type": "string" },
                    "table2": { "type": "string" },
                    "joinType": { "type": "string", "enum": ["INNER", "LEFT", "RIGHT", "FULL"] },
                    "onCondition": {
                        "type": "string",
                        "description": "Join predicate, e.g. orders.customer_id = customers.id. \
                            Double-quote mixed-case table or column names, \
                            e.g. \"Orders\".id = \"Customers\".order_id"
                    }
                },
                "required": ["table1", "table2", "onCondition"]
            }
        }),
    ]
}
