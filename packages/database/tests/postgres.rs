//! End-to-end tool behavior against a real Postgres instance.
//!
//! These tests only run when `TEST_DATABASE_URL` points at a scratch
//! database; otherwise each test returns immediately. Every test works on its
//! own uniquely named tables and drops them afterwards.

use std::time::{SystemTime, UNIX_EPOCH};

use moosicbox_json_utils::database::ToValue as _;
use serde_json::json;
use sql_agent_database::{db, execute_action, mutation, query, schema, table};
use sql_agent_database_models::{ColumnSpec, SchemaChange, ToolResponse, UpdateRequest};
use switchy_database::{Database, DatabaseValue};

async fn connect() -> Option<Box<dyn Database>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let _ = pretty_env_logger::try_init();
    Some(db::connect(&url).await.unwrap())
}

fn unique_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{prefix}_{}_{nanos}", std::process::id())
}

fn column(name: &str, column_type: &str) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        column_type: column_type.to_string(),
        primary_key: false,
    }
}

async fn create_widgets(db: &dyn Database) -> String {
    let name = unique_name("widgets");
    let response = table::create_table(
        db,
        &name,
        &[column("title", "text"), column("price", "decimal")],
    )
    .await;
    assert!(response.success, "{response:?}");
    name
}

async fn drop_table(db: &dyn Database, name: &str) {
    db.exec_raw(&format!("DROP TABLE IF EXISTS \"{name}\""))
        .await
        .unwrap();
}

fn rows(response: ToolResponse) -> Vec<serde_json::Value> {
    assert!(response.success, "{response:?}");
    response.data.unwrap().as_array().unwrap().clone()
}

fn id_of(row: &serde_json::Value) -> i64 {
    row["id"].as_i64().unwrap()
}

#[tokio::test]
async fn create_table_adds_baseline_columns_and_is_idempotent() {
    let Some(db) = connect().await else { return };
    let name = unique_name("widgets");

    let response = table::create_table(
        db.as_ref(),
        &name,
        &[column("id", "text"), column("title", "text")],
    )
    .await;
    assert_eq!(
        response.message.as_deref(),
        Some(format!("Table {name} created successfully").as_str())
    );

    let again = table::create_table(db.as_ref(), &name, &[column("title", "text")]).await;
    assert!(again.success);

    let columns = table::get_columns(db.as_ref(), &name).await.columns.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "created_at", "updated_at", "title"]);
    assert_eq!(columns[0].data_type, "integer");
    assert!(!columns[3].nullable);

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn get_columns_reports_missing_tables() {
    let Some(db) = connect().await else { return };
    let name = unique_name("missing");

    let response = table::get_columns(db.as_ref(), &name).await;
    assert!(!response.success);
    assert_eq!(
        response.message.as_deref(),
        Some(format!("Table {name} does not exist").as_str())
    );
}

#[tokio::test]
async fn insert_returns_rows_with_generated_columns() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let inserted = rows(
        mutation::insert(
            db.as_ref(),
            &name,
            &json!([{ "title": "a", "price": 1.5 }, { "title": "b", "price": "2.25" }]),
        )
        .await,
    );

    assert_eq!(inserted.len(), 2);
    assert_ne!(id_of(&inserted[0]), id_of(&inserted[1]));
    assert!(inserted.iter().all(|row| row["created_at"].is_string()));
    assert_eq!(inserted[0]["title"], "a");
    assert_eq!(inserted[0]["price"], "1.50");
    assert_eq!(inserted[1]["price"], "2.25");

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn update_refreshes_updated_at() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let inserted = rows(mutation::insert(db.as_ref(), &name, &json!({ "title": "a" })).await);
    let id = id_of(&inserted[0]);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let response = mutation::update(
        db.as_ref(),
        &name,
        &[UpdateRequest {
            id: Some(json!(id)),
            data: Some(json!({ "title": "renamed" }).as_object().unwrap().clone()),
        }],
        &[],
    )
    .await;
    assert!(response.success, "{response:?}");
    let data = response.data.unwrap();
    assert_eq!(data["updated"][0]["title"], "renamed");
    assert_eq!(data["schemaChanges"], 0);

    let check = db
        .query_raw_params(
            &format!("SELECT (updated_at > created_at) AS later FROM \"{name}\" WHERE id = $1"),
            &[DatabaseValue::Int32(i32::try_from(id).unwrap())],
        )
        .await
        .unwrap();
    assert!((&check[0]).to_value::<bool>("later").unwrap());

    drop_table(db.as_ref(), &name).await;
}

fn title_update(id: &serde_json::Value, title: &str) -> UpdateRequest {
    UpdateRequest {
        id: Some(id.clone()),
        data: Some(json!({ "title": title }).as_object().unwrap().clone()),
    }
}

#[tokio::test]
async fn concurrent_updates_return_rows_in_request_order() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let inserted = rows(
        mutation::insert(
            db.as_ref(),
            &name,
            &json!([{ "title": "a" }, { "title": "b" }, { "title": "c" }, { "title": "d" }]),
        )
        .await,
    );

    let order = [2, 0, 3, 1];
    let updates: Vec<UpdateRequest> = order
        .iter()
        .map(|&i| title_update(&inserted[i]["id"], &format!("new-{i}")))
        .collect();

    let response = mutation::update(db.as_ref(), &name, &updates, &[]).await;
    assert!(response.success, "{response:?}");
    let data = response.data.unwrap();
    let updated = data["updated"].as_array().unwrap();

    assert_eq!(updated.len(), order.len());
    for (row, &i) in updated.iter().zip(&order) {
        assert_eq!(row["id"], inserted[i]["id"]);
        assert_eq!(row["title"], format!("new-{i}"));
    }

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn failed_schema_batch_keeps_committed_row_updates() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    // `price` stays NULL, so SET NOT NULL fails inside the database.
    let inserted = rows(mutation::insert(db.as_ref(), &name, &json!({ "title": "before" })).await);

    let response = mutation::update(
        db.as_ref(),
        &name,
        &[title_update(&inserted[0]["id"], "after")],
        &[SchemaChange {
            column: Some("price".to_string()),
            data_type: None,
            constraint: Some("NOT NULL".to_string()),
        }],
    )
    .await;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("Failed to update table"));

    let criteria = json!({ "id": inserted[0]["id"] });
    let found = rows(query::search(db.as_ref(), &name, criteria.as_object().unwrap()).await);
    assert_eq!(found[0]["title"], "after");

    let columns = table::get_columns(db.as_ref(), &name).await.columns.unwrap();
    let price = columns.iter().find(|c| c.name == "price").unwrap();
    assert!(price.nullable);

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn invalid_update_entry_leaves_valid_rows_unchanged() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let inserted = rows(mutation::insert(db.as_ref(), &name, &json!({ "title": "keep" })).await);
    let id = id_of(&inserted[0]);

    let response = mutation::update(
        db.as_ref(),
        &name,
        &[
            UpdateRequest {
                id: Some(json!(id)),
                data: Some(json!({ "title": "changed" }).as_object().unwrap().clone()),
            },
            UpdateRequest {
                id: None,
                data: Some(json!({ "title": "orphan" }).as_object().unwrap().clone()),
            },
        ],
        &[],
    )
    .await;
    assert!(!response.success);
    assert!(response.message.unwrap().contains("index 1"));

    let criteria = json!({ "id": id });
    let found = rows(query::search(db.as_ref(), &name, criteria.as_object().unwrap()).await);
    assert_eq!(found[0]["title"], "keep");

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn failed_statement_rolls_back_the_whole_batch() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let inserted = rows(
        mutation::insert(
            db.as_ref(),
            &name,
            &json!([{ "title": "one" }, { "title": "two" }]),
        )
        .await,
    );

    // `title` is NOT NULL, so the second statement fails inside the database.
    let response = mutation::update(
        db.as_ref(),
        &name,
        &[
            UpdateRequest {
                id: Some(inserted[0]["id"].clone()),
                data: Some(json!({ "title": "changed" }).as_object().unwrap().clone()),
            },
            UpdateRequest {
                id: Some(inserted[1]["id"].clone()),
                data: Some(json!({ "title": null }).as_object().unwrap().clone()),
            },
        ],
        &[],
    )
    .await;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("Failed to update table"));

    let all = rows(query::search(db.as_ref(), &name, &serde_json::Map::new()).await);
    assert_eq!(all[0]["title"], "one");
    assert_eq!(all[1]["title"], "two");

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn search_operators_and_remove() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let inserted = rows(
        mutation::insert(
            db.as_ref(),
            &name,
            &json!([{ "title": "a" }, { "title": "b" }, { "title": "c" }]),
        )
        .await,
    );
    let first = id_of(&inserted[0]);

    let newer = rows(
        query::search(db.as_ref(), &name, json!({ "id": { "$gt": first } }).as_object().unwrap())
            .await,
    );
    assert_eq!(newer.len(), 2);
    assert!(newer.iter().all(|row| id_of(row) > first));

    let removed = rows(
        mutation::remove(db.as_ref(), &name, &json!([first, id_of(&inserted[1])])).await,
    );
    assert_eq!(removed.len(), 2);

    let remaining = rows(query::search(db.as_ref(), &name, &serde_json::Map::new()).await);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["title"], "c");

    let criteria = json!({ "id": first });
    let none = rows(query::search(db.as_ref(), &name, criteria.as_object().unwrap()).await);
    assert!(none.is_empty());

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn unique_constraint_is_enforced_after_schema_change() {
    let Some(db) = connect().await else { return };
    let name = create_widgets(db.as_ref()).await;

    let response = mutation::update(
        db.as_ref(),
        &name,
        &[],
        &[SchemaChange {
            column: Some("title".to_string()),
            data_type: Some("varchar(64)".to_string()),
            constraint: Some("unique".to_string()),
        }],
    )
    .await;
    assert!(response.success, "{response:?}");
    assert_eq!(response.data.unwrap()["schemaChanges"], 1);

    let catalog = sql_agent_database::catalog::load(db.as_ref(), &name).await.unwrap();
    assert_eq!(catalog.get("title").unwrap().udt_name, "varchar");

    // Re-applying replaces the constraint instead of failing.
    let statements = schema::plan_schema_changes(
        &catalog,
        &[SchemaChange {
            column: Some("title".to_string()),
            data_type: None,
            constraint: Some("UNIQUE".to_string()),
        }],
    )
    .unwrap();
    schema::apply_schema_changes(db.as_ref(), &statements).await.unwrap();

    assert!(mutation::insert(db.as_ref(), &name, &json!({ "title": "dup" })).await.success);
    let second = mutation::insert(db.as_ref(), &name, &json!({ "title": "dup" })).await;
    assert!(!second.success);
    assert_eq!(second.message.as_deref(), Some("Failed to insert rows"));

    drop_table(db.as_ref(), &name).await;
}

#[tokio::test]
async fn join_validates_kind_before_querying() {
    let Some(db) = connect().await else { return };
    let orders = create_widgets(db.as_ref()).await;
    let customers = create_widgets(db.as_ref()).await;

    let bogus = query::join(db.as_ref(), &orders, &customers, Some("bogus"), Some("true")).await;
    assert!(!bogus.success);
    assert!(bogus.message.unwrap().starts_with("Invalid join type"));

    mutation::insert(db.as_ref(), &orders, &json!({ "title": "o" })).await;
    mutation::insert(db.as_ref(), &customers, &json!({ "title": "c" })).await;
    let on = format!("\"{orders}\".id = \"{customers}\".id");
    let joined = rows(query::join(db.as_ref(), &orders, &customers, Some("left"), Some(&on)).await);
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0]["title"], "c");
    assert!(joined[0]["created_at"].is_string());

    let missing = unique_name("missing");
    let absent = query::join(db.as_ref(), &orders, &missing, None, Some("true")).await;
    assert_eq!(
        absent.message.as_deref(),
        Some(format!("Table {missing} does not exist").as_str())
    );

    drop_table(db.as_ref(), &orders).await;
    drop_table(db.as_ref(), &customers).await;
}

#[tokio::test]
async fn dispatch_routes_by_action_name() {
    let Some(db) = connect().await else { return };
    let name = unique_name("dispatch");

    let created = execute_action(
        db.as_ref(),
        "create_table",
        &json!({ "tableName": name, "columns": [{ "name": "label", "type": "text" }] }),
    )
    .await;
    assert!(created.success, "{created:?}");

    let inserted = execute_action(
        db.as_ref(),
        "insert",
        &json!({ "tableName": name, "data": { "label": "x" } }),
    )
    .await;
    assert!(inserted.success, "{inserted:?}");

    let unknown = execute_action(db.as_ref(), "truncate", &json!({})).await;
    assert_eq!(unknown.message.as_deref(), Some("Unknown action: truncate"));

    drop_table(db.as_ref(), &name).await;
}
