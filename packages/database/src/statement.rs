//! Parameterized statements and row conversion.
//!
//! A [`Statement`] is the only thing the tool layer sends to the database.
//! Its SQL text is assembled from quoted, validated identifiers and
//! positional placeholders handed out by [`Params`]; literal values only ever
//! travel in [`Statement::params`].

use switchy_database::{Database, DatabaseValue, Row};

use crate::catalog::BoundValue;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    /// SQL with `$n` placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<DatabaseValue>,
}

impl Statement {
    /// A statement without parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Runs the statement and returns its rows as JSON objects.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails.
    pub async fn fetch(
        &self,
        db: &dyn Database,
    ) -> Result<Vec<serde_json::Value>, switchy_database::DatabaseError> {
        log::debug!("query: {} ({} params)", self.sql, self.params.len());
        let rows = db.query_raw_params(&self.sql, &self.params).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Runs a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns the store error if the statement fails.
    pub async fn execute(&self, db: &dyn Database) -> Result<(), switchy_database::DatabaseError> {
        log::debug!("exec: {}", self.sql);
        if self.params.is_empty() {
            db.exec_raw(&self.sql).await
        } else {
            db.exec_raw_params(&self.sql, &self.params).await.map(|_| ())
        }
    }
}

/// Accumulates parameters and hands out their placeholders.
#[derive(Debug, Default)]
pub struct Params {
    values: Vec<DatabaseValue>,
}

impl Params {
    /// Creates an empty parameter list (first placeholder is `$1`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bound value and returns its placeholder expression.
    ///
    /// Values that need a server-side cast are sent as text and rendered as
    /// `$n::text::"type"`.
    pub fn push(&mut self, bound: BoundValue) -> String {
        self.values.push(bound.value);
        let index = self.values.len();
        match bound.cast {
            Some(cast) => format!("${index}::text::{cast}"),
            None => format!("${index}"),
        }
    }

    /// Number of parameters pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Finishes the statement.
    #[must_use]
    pub fn into_statement(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.values,
        }
    }
}

/// Converts a result row into a JSON object keyed by column name.
///
/// When several columns share a name (e.g. both sides of a join), the last
/// one wins.
#[must_use]
pub fn row_to_json(row: &Row) -> serde_json::Value {
    let map = row
        .columns
        .iter()
        .map(|(name, value)| (name.clone(), value_to_json(value)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

fn value_to_json(value: &DatabaseValue) -> serde_json::Value {
    match value {
        DatabaseValue::Null => serde_json::Value::Null,
        DatabaseValue::String(s) => serde_json::Value::String(s.clone()),
        DatabaseValue::Bool(b) => serde_json::Value::Bool(*b),
        DatabaseValue::Int32(n) => serde_json::Value::from(*n),
        DatabaseValue::Int64(n) => serde_json::Value::from(*n),
        DatabaseValue::Real64(n) => serde_json::Value::from(*n),
        DatabaseValue::DateTime(dt) => serde_json::Value::String(dt.and_utc().to_rfc3339()),
        other => {
            // Catalog projections only select the kinds above or text.
            log::warn!("Rendering unexpected column value {other:?} as text");
            serde_json::Value::String(format!("{other:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_in_push_order() {
        let mut params = Params::new();
        let a = params.push(BoundValue {
            value: DatabaseValue::Int32(1),
            cast: None,
        });
        let b = params.push(BoundValue {
            value: DatabaseValue::String("2024-01-01".to_string()),
            cast: Some("\"timestamptz\"".to_string()),
        });

        assert_eq!(a, "$1");
        assert_eq!(b, "$2::text::\"timestamptz\"");
        assert_eq!(params.len(), 2);

        let statement = params.into_statement(format!("SELECT {a}, {b}"));
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn rows_convert_to_json_objects() {
        let row = Row {
            columns: vec![
                ("id".to_string(), DatabaseValue::Int32(3)),
                ("title".to_string(), DatabaseValue::String("a".to_string())),
                ("done".to_string(), DatabaseValue::Bool(false)),
                ("note".to_string(), DatabaseValue::Null),
            ],
        };

        assert_eq!(
            row_to_json(&row),
            serde_json::json!({ "id": 3, "title": "a", "done": false, "note": null })
        );
    }

    #[test]
    fn duplicate_column_names_keep_the_last_value() {
        let row = Row {
            columns: vec![
                ("id".to_string(), DatabaseValue::Int32(1)),
                ("id".to_string(), DatabaseValue::Int32(2)),
            ],
        };
        assert_eq!(row_to_json(&row), serde_json::json!({ "id": 2 }));
    }
}
