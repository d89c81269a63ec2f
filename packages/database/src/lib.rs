#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Dynamic SQL CRUD tools for the SQL agent.
//!
//! Turns loosely-structured action requests (create a table, insert rows,
//! search with criteria, ...) into parameterized SQL against tables whose
//! schema is only known at runtime. Identifiers are checked against a
//! conservative grammar and always quoted; values are always bound through
//! placeholders, typed according to the target column's catalog entry.
//!
//! Every public operation returns a [`ToolResponse`] envelope instead of an
//! error. Locally detected problems are reported verbatim, store errors are
//! logged and replaced with a generic message.

pub mod catalog;
pub mod db;
pub mod dispatch;
pub mod identifier;
pub mod mutation;
pub mod query;
pub mod schema;
pub mod statement;
pub mod table;

pub use dispatch::execute_action;
pub use sql_agent_database_models::ToolResponse;

/// Errors raised inside the tool layer before they are folded into a
/// [`ToolResponse`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A table, column, or constraint name failed the identifier grammar.
    #[error("Invalid identifier: '{name}'")]
    InvalidIdentifier {
        /// The rejected name.
        name: String,
    },

    /// Structurally invalid request.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what is wrong.
        message: String,
    },

    /// A list that must contain at least one element was empty.
    #[error("No {what} provided")]
    EmptyInput {
        /// What was missing (e.g. "rows").
        what: String,
    },

    /// Column type outside the supported vocabulary.
    #[error("Unsupported column type: '{type_name}'")]
    UnsupportedType {
        /// The rejected type name.
        type_name: String,
    },

    /// Search criteria value that is neither a literal nor a known operator.
    #[error("Unsupported operator for column '{column}': {operator}")]
    UnsupportedOperator {
        /// Criteria key.
        column: String,
        /// The offending criteria value, rendered as JSON.
        operator: String,
    },

    /// Schema-change constraint outside `UNIQUE`, `NOT NULL`, `NULL`.
    #[error("Unsupported constraint: '{constraint}'")]
    UnsupportedConstraint {
        /// The rejected constraint.
        constraint: String,
    },

    /// Join kind outside `INNER`, `LEFT`, `RIGHT`, `FULL`.
    #[error("Invalid join type: '{join_type}'. Use INNER, LEFT, RIGHT, or FULL")]
    InvalidJoinType {
        /// The rejected join kind.
        join_type: String,
    },

    /// Update entry without a truthy `id` or with empty `data`.
    #[error("Invalid update at index {index}: {message}")]
    InvalidUpdate {
        /// Position of the entry in the request.
        index: usize,
        /// Description of what is wrong.
        message: String,
    },

    /// Schema-change entry without a column or without any change.
    #[error("Invalid schema change at index {index}: {message}")]
    InvalidSchemaChange {
        /// Position of the entry in the request.
        index: usize,
        /// Description of what is wrong.
        message: String,
    },

    /// The table does not exist in the current schema.
    #[error("Table {table} does not exist")]
    TableNotFound {
        /// Table name.
        table: String,
    },

    /// A column that the table catalog does not list.
    #[error("Unknown column '{column}' for table {table}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Rejected column name.
        column: String,
    },

    /// A value that cannot be bound to its target column's type.
    #[error("Invalid value for column '{column}': {message}")]
    InvalidValue {
        /// Target column.
        column: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The catalog lookup itself failed.
    #[error("Catalog query failed: {0}")]
    CatalogQueryFailed(#[source] switchy_database::DatabaseError),

    /// Any error reported by the underlying store.
    #[error("Database error: {0}")]
    Store(#[from] switchy_database::DatabaseError),
}

impl ToolError {
    /// Whether this error was raised by the database rather than detected
    /// locally.
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::CatalogQueryFailed(_))
    }

    /// Converts this error into a failure envelope.
    ///
    /// Store errors are logged and reported as `generic`, so that database
    /// internals never reach the caller.
    #[must_use]
    pub fn into_response(self, generic: &str) -> ToolResponse {
        if self.is_store_error() {
            log::error!("{generic}: {self}");
            ToolResponse::failure(generic)
        } else {
            log::warn!("Rejected tool request: {self}");
            ToolResponse::failure(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_errors_are_reported_verbatim() {
        let response = ToolError::UnsupportedType {
            type_name: "money".to_string(),
        }
        .into_response("Failed to create table");

        assert!(!response.success);
        assert_eq!(
            response.message.as_deref(),
            Some("Unsupported column type: 'money'")
        );
    }

    #[test]
    fn table_not_found_message_names_the_table() {
        let err = ToolError::TableNotFound {
            table: "widgets".to_string(),
        };
        assert_eq!(err.to_string(), "Table widgets does not exist");
        assert!(!err.is_store_error());
    }
}
