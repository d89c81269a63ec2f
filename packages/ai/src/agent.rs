//! Agent loop orchestration.
//!
//! The model answers every turn with one JSON object tagged by `type`:
//!
//! * `plan`: what it intends to do next
//! * `action`: a tool call (`function` + `input`)
//! * `output`: the final answer for the user
//!
//! Tool results go back to the model as `observation` objects, and the loop
//! ends when the model produces an `output`.

use serde::Deserialize;
use sql_agent_database::execute_action;
use sql_agent_database_models::{ToolResponse, tool_definitions};
use switchy_database::Database;
use tokio::sync::mpsc;

use crate::providers::{LlmProvider, Message};
use crate::{AgentEvent, AiError};

/// Maximum number of agent loop iterations to prevent infinite loops.
pub const MAX_ITERATIONS: u32 = 10;

/// Maximum size of an observation before truncation.
/// Prevents overwhelming the LLM context window.
const MAX_OBSERVATION_BYTES: usize = 8000;

/// Runs tool actions on behalf of the agent.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Executes the action named `function` with `input`.
    async fn execute(&self, function: &str, input: &serde_json::Value) -> ToolResponse;
}

/// Executes actions against a database through the CRUD tool layer.
pub struct DatabaseTools<'a> {
    db: &'a dyn Database,
}

impl<'a> DatabaseTools<'a> {
    /// Wraps a database handle.
    #[must_use]
    pub const fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ToolExecutor for DatabaseTools<'_> {
    async fn execute(&self, function: &str, input: &serde_json::Value) -> ToolResponse {
        execute_action(self.db, function, input).await
    }
}

/// One parsed model reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    /// The model is thinking out loud.
    Plan {
        /// Plan text.
        plan: String,
    },
    /// The model wants a tool to run.
    Action {
        /// Action name.
        function: String,
        /// Action input.
        #[serde(default)]
        input: serde_json::Value,
    },
    /// The model is done.
    Output {
        /// Final answer.
        output: String,
    },
}

/// System prompt describing the protocol and the available tools.
fn build_system_prompt() -> String {
    let tools = tool_definitions()
        .iter()
        .map(|tool| {
            format!(
                "- {}: {}\n  input schema: {}",
                tool["name"].as_str().unwrap_or_default(),
                tool["description"].as_str().unwrap_or_default(),
                tool["parameters"]
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a database assistant with access to a PostgreSQL database through a fixed set of tools. You can create tables, inspect them, and insert, update, search, delete and join rows.

## Protocol
You are in a loop of START, PLAN, ACTION, OBSERVATION and OUTPUT steps.
- The user's request arrives as {{"type": "user", "user": "..."}}.
- Reply with exactly ONE JSON object per turn and nothing else.
- To plan, reply {{"type": "plan", "plan": "..."}}.
- To call a tool, reply {{"type": "action", "function": "<tool name>", "input": {{ ... }}}} and wait.
- Each tool result comes back as {{"type": "observation", "observation": {{"success": ..., ...}}}}.
- When you are done, reply {{"type": "output", "output": "<answer for the user>"}}.

## Tools
{tools}

## Instructions
1. Table and column names must be letters, digits and underscores, and must not start with a digit.
2. Use getColumns when you are unsure of a table's columns. Do NOT guess column names.
3. Every table has id, created_at and updated_at columns that are maintained automatically.
4. Search criteria map a column to a value, null, or one operator object such as {{"$gt": 5}}. Supported operators: $lt, $gt, $lte, $gte, $ne.
5. If an observation has "success": false, read its message and fix the request instead of repeating it.
6. Today's date is {today}.

Example:
{{"type": "user", "user": "Add a todo to buy milk"}}
{{"type": "plan", "plan": "Check whether a todos table exists"}}
{{"type": "action", "function": "getColumns", "input": {{"tableName": "todos"}}}}
{{"type": "observation", "observation": {{"success": false, "message": "Table todos does not exist"}}}}
{{"type": "action", "function": "createTable", "input": {{"tableName": "todos", "columns": [{{"name": "title", "type": "text"}}, {{"name": "done", "type": "boolean"}}]}}}}
{{"type": "observation", "observation": {{"success": true, "message": "Table todos created successfully"}}}}
{{"type": "action", "function": "insert", "input": {{"tableName": "todos", "data": {{"title": "Buy milk"}}}}}}
{{"type": "observation", "observation": {{"success": true, "data": [{{"id": 1, "title": "Buy milk", "done": false}}]}}}}
{{"type": "output", "output": "Added \"Buy milk\" to your todos."}}"#,
        today = chrono::Utc::now().format("%Y-%m-%d"),
    )
}

/// Finds the JSON object in a model reply.
///
/// Tolerates a surrounding markdown code fence and leading prose.
fn extract_json(reply: &str) -> &str {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    unfenced
        .find('{')
        .map_or(unfenced, |start| &unfenced[start..])
        .trim()
}

/// Parses the first JSON object of a model reply into a [`Step`].
///
/// # Errors
///
/// Returns [`AiError::Json`] if the reply does not start with a valid step
/// object.
pub fn parse_step(reply: &str) -> Result<Step, AiError> {
    let json = extract_json(reply);
    let mut steps = serde_json::Deserializer::from_str(json).into_iter::<Step>();
    match steps.next() {
        Some(step) => Ok(step?),
        None => Err(AiError::Provider {
            message: "Empty reply from model".to_string(),
        }),
    }
}

/// Serializes an observation for the model, truncating large results.
fn observation_message(observation: &serde_json::Value) -> String {
    let raw = serde_json::json!({ "type": "observation", "observation": observation }).to_string();
    if raw.len() <= MAX_OBSERVATION_BYTES {
        return raw;
    }

    let mut cut = MAX_OBSERVATION_BYTES;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated, {} bytes total)", &raw[..cut], raw.len())
}

/// Runs the AI agent loop for a user request against a database.
///
/// Sends [`AgentEvent`]s through the provided channel as the agent works.
///
/// # Errors
///
/// Returns [`AiError`] if the provider fails or the loop does not finish
/// within [`MAX_ITERATIONS`].
pub async fn run_agent(
    provider: &dyn LlmProvider,
    db: &dyn Database,
    request: &str,
    tx: mpsc::Sender<AgentEvent>,
) -> Result<(), AiError> {
    run_agent_with(provider, &DatabaseTools::new(db), request, tx).await
}

/// Runs the AI agent loop with an arbitrary tool executor.
///
/// The final event will be `AgentEvent::Answer` on success.
///
/// # Errors
///
/// Returns [`AiError`] if the provider fails or the loop does not finish
/// within [`MAX_ITERATIONS`].
pub async fn run_agent_with(
    provider: &dyn LlmProvider,
    tools: &dyn ToolExecutor,
    request: &str,
    tx: mpsc::Sender<AgentEvent>,
) -> Result<(), AiError> {
    let system_prompt = build_system_prompt();

    let mut messages = vec![Message::user(
        serde_json::json!({ "type": "user", "user": request }).to_string(),
    )];

    for iteration in 0..MAX_ITERATIONS {
        log::info!("Agent iteration {iteration}");

        let reply = provider.complete(&system_prompt, &messages).await?;
        log::debug!("Model reply: {reply}");
        messages.push(Message::assistant(reply.clone()));

        let step = match parse_step(&reply) {
            Ok(step) => step,
            Err(e) => {
                log::warn!("Unparseable model reply: {e}");
                let error = format!(
                    "Reply was not a valid step object: {e}. Reply with exactly one JSON object."
                );
                messages.push(Message::user(observation_message(
                    &serde_json::json!({ "error": error }),
                )));
                continue;
            }
        };

        match step {
            Step::Plan { plan } => {
                let _ = tx.send(AgentEvent::Plan { text: plan }).await;
                messages.push(Message::user(observation_message(&serde_json::json!(
                    "Plan noted. Continue with the next step."
                ))));
            }
            Step::Action { function, input } => {
                let _ = tx
                    .send(AgentEvent::Action {
                        function: function.clone(),
                        input: input.clone(),
                    })
                    .await;

                let response = tools.execute(&function, &input).await;
                log::info!(
                    "Action {function} finished (success: {})",
                    response.success
                );

                let observation = serde_json::to_value(&response)?;
                let _ = tx
                    .send(AgentEvent::Observation { function, response })
                    .await;

                messages.push(Message::user(observation_message(&observation)));
            }
            Step::Output { output } => {
                let _ = tx.send(AgentEvent::Answer { text: output }).await;
                return Ok(());
            }
        }
    }

    Err(AiError::MaxIterations {
        max_iterations: MAX_ITERATIONS,
    })
}
