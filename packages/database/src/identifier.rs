//! Identifier and SQL type name validation.
//!
//! Identifiers cannot be bound as placeholders, so every table, column, and
//! constraint name that ends up in a statement must pass [`validate`] first.
//! Validated names are always emitted through [`quote`], which keeps their
//! case intact in the database.

use std::sync::LazyLock;

use regex::Regex;

use crate::ToolError;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Type names such as `integer`, `timestamp with time zone`, `varchar(255)`,
/// `numeric(12, 4)` or `text[]`: up to four words, an optional size, and an
/// optional array suffix.
static SQL_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z_][A-Za-z0-9_]*(\s+[A-Za-z_][A-Za-z0-9_]*){0,3}(\s*\([0-9]+(\s*,\s*[0-9]+)?\))?(\[\])?$",
    )
    .expect("valid regex")
});

/// Returns whether `name` matches the identifier grammar.
#[must_use]
pub fn is_valid(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Checks `name` against the identifier grammar.
///
/// # Errors
///
/// Returns [`ToolError::InvalidIdentifier`] if the name does not match
/// `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn validate(name: &str) -> Result<(), ToolError> {
    if is_valid(name) {
        Ok(())
    } else {
        Err(ToolError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Double-quotes an identifier that has already passed [`validate`].
#[must_use]
pub fn quote(name: &str) -> String {
    debug_assert!(is_valid(name), "quoting unvalidated identifier {name:?}");
    format!("\"{name}\"")
}

/// Validates and quotes an identifier in one step.
///
/// # Errors
///
/// Returns [`ToolError::InvalidIdentifier`] if the name is rejected.
pub fn checked(name: &str) -> Result<String, ToolError> {
    validate(name)?;
    Ok(quote(name))
}

/// Checks a raw SQL type name used by a schema change and returns it trimmed.
///
/// # Errors
///
/// Returns [`ToolError::UnsupportedType`] if the type does not look like a
/// plain (optionally parameterized or array) type name.
pub fn validate_sql_type(type_name: &str) -> Result<&str, ToolError> {
    let trimmed = type_name.trim();
    if SQL_TYPE.is_match(trimmed) {
        Ok(trimmed)
    } else {
        Err(ToolError::UnsupportedType {
            type_name: type_name.to_string(),
        })
    }
}

/// Name of the `UNIQUE` constraint managed for `column` of `table`.
#[must_use]
pub fn constraint_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_constraint")
}
