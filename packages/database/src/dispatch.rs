//! Name-based dispatch of tool actions.
//!
//! The agent loop and the HTTP tool endpoint both hand over an action name
//! and a loosely-typed JSON input; this module turns them into a call on the
//! matching operation.

use serde::de::DeserializeOwned;
use sql_agent_database_models::{
    CreateTableParams, GetColumnsParams, InsertParams, JoinParams, RemoveParams, SearchParams,
    ToolAction, ToolResponse, UpdateParams,
};
use switchy_database::Database;

use crate::{mutation, query, table};

/// Runs the action named `name` with `input` and returns its envelope.
///
/// Accepts both the camelCase (`createTable`) and snake_case
/// (`create_table`) spellings. An unknown action or an input that does not
/// match the action's parameters yields a failure envelope.
pub async fn execute_action(
    db: &dyn Database,
    name: &str,
    input: &serde_json::Value,
) -> ToolResponse {
    let Ok(action) = name.parse::<ToolAction>() else {
        log::warn!("Unknown action requested: {name}");
        return ToolResponse::failure(format!("Unknown action: {name}"));
    };

    log::debug!("Executing {action} with input {input}");

    match action {
        ToolAction::CreateTable => match params::<CreateTableParams>(action, input) {
            Ok(p) => table::create_table(db, &p.table_name, &p.columns).await,
            Err(response) => response,
        },
        ToolAction::GetColumns => match params::<GetColumnsParams>(action, input) {
            Ok(p) => table::get_columns(db, &p.table_name).await,
            Err(response) => response,
        },
        ToolAction::Insert => match params::<InsertParams>(action, input) {
            Ok(p) => mutation::insert(db, &p.table_name, &p.data).await,
            Err(response) => response,
        },
        ToolAction::Update => match params::<UpdateParams>(action, input) {
            Ok(p) => mutation::update(db, &p.table_name, &p.updates, &p.schema_changes).await,
            Err(response) => response,
        },
        ToolAction::Search => match params::<SearchParams>(action, input) {
            Ok(p) => query::search(db, &p.table_name, &p.criteria).await,
            Err(response) => response,
        },
        ToolAction::Remove => match params::<RemoveParams>(action, input) {
            Ok(p) => mutation::remove(db, &p.table_name, &p.ids).await,
            Err(response) => response,
        },
        ToolAction::Join => match params::<JoinParams>(action, input) {
            Ok(p) => {
                query::join(
                    db,
                    &p.table1,
                    &p.table2,
                    p.join_type.as_deref(),
                    p.on_condition.as_deref(),
                )
                .await
            }
            Err(response) => response,
        },
    }
}

fn params<T: DeserializeOwned>(
    action: ToolAction,
    input: &serde_json::Value,
) -> Result<T, ToolResponse> {
    serde_json::from_value(input.clone()).map_err(|e| {
        log::warn!("Invalid input for {action}: {e}");
        ToolResponse::failure(format!("Invalid input for {action}: {e}"))
    })
}
