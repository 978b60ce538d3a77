//! Integration tests for the tool registry against a mocked workspace.

mod common;

use common::*;
use databricks_mcp_server::error::DbxError;
use databricks_mcp_server::history::InteractionStatus;
use databricks_mcp_server::mcp::resources::read_resource;
use databricks_mcp_server::tools::SCHEMA_RESOURCE_URI;
use mockito::Matcher;
use rmcp::model::ResourceContents;
use serde_json::json;

/// A refused statement never reaches the workspace and is recorded as a failure.
#[tokio::test]
async fn test_drop_is_refused_without_network() {
    let mut server = mockito::Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let any_post = server
        .mock("POST", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let tools = tools(&server);
    for sql in ["DROP TABLE foo", "  delete from foo", "SELECT 1; DROP TABLE foo", ""] {
        let output = tools.run_sql_query(sql).await;
        assert!(output.text.starts_with("Error: "), "{}", output.text);
        assert!(!output.is_success());
    }

    any.assert_async().await;
    any_post.assert_async().await;
    let records = tools.history().snapshot();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.status == InteractionStatus::Failure));
    assert_eq!(
        records[0].output,
        "Error: Only SELECT, SHOW, and DESCRIBE statements are allowed. Detected: DROP"
    );
}

/// Every call appends exactly one record, success or failure.
#[tokio::test]
async fn test_every_call_records_once() {
    let mut server = mockito::Server::new_async().await;
    let _warehouse = mock_warehouse(&mut server).await;
    let _statement = mock_statement(
        &mut server,
        succeeded("s-db", &[("databaseName", "STRING")], vec![json!(["default"]), json!(["sales"])]),
    )
    .await;
    let _clusters = server
        .mock("GET", "/api/2.0/clusters/list")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(json!({ "error_code": "PERMISSION_DENIED", "message": "no access" }).to_string())
        .create_async()
        .await;

    let tools = tools(&server);
    let databases = tools.list_databases().await;
    let clusters = tools.get_cluster_info().await;
    let refused = tools.run_sql_query("UPDATE t SET x = 1").await;
    let invalid = tools.get_job_details(-1).await;

    assert_eq!(databases.text, "## Available Databases\n\n- default\n- sales\n");
    assert_eq!(
        clusters.text,
        "Error getting cluster information: Databricks API error (403): no access. \
         Verify DATABRICKS_TOKEN is valid and has access to this workspace"
    );
    assert!(!refused.is_success());
    assert!(invalid.text.starts_with("Error getting job details: Invalid input"));

    let records = tools.history().snapshot();
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.sequence, r.tool.as_str(), r.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, "list_databases", InteractionStatus::Success),
            (2, "get_cluster_info", InteractionStatus::Failure),
            (3, "run_sql_query", InteractionStatus::Failure),
            (4, "get_job_details", InteractionStatus::Failure),
        ]
    );

    let history = tools.get_interaction_history().await;
    assert!(history.text.starts_with("## Interaction History\n\n"));
    assert!(history.text.contains("### 1. list_databases (success, "));
    assert!(history.text.contains("**Input:** `UPDATE t SET x = 1`"));
    assert_eq!(tools.history().len(), 5);
}

#[tokio::test]
async fn test_list_jobs_follows_pages() {
    let mut server = mockito::Server::new_async().await;
    let _page1 = server
        .mock("GET", "/api/2.1/jobs/list")
        .match_query(Matcher::Regex(r"^limit=\d+$".into()))
        .with_status(200)
        .with_body(
            json!({
                "jobs": [{
                    "job_id": 11,
                    "creator_user_name": "ana@example.com",
                    "created_time": 1700000000000i64,
                    "settings": { "name": "nightly-etl" }
                }],
                "has_more": true,
                "next_page_token": "p2"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _page2 = server
        .mock("GET", "/api/2.1/jobs/list")
        .match_query(Matcher::UrlEncoded("page_token".into(), "p2".into()))
        .with_status(200)
        .with_body(
            json!({
                "jobs": [{ "job_id": 12, "settings": {} }],
                "has_more": false
            })
            .to_string(),
        )
        .create_async()
        .await;

    let tools = tools(&server);
    let output = tools.list_jobs().await;

    assert_eq!(
        output.text,
        "| Job ID | Job Name | Created By |\n\
         | --- | --- | --- |\n\
         | 11 | nightly-etl | ana@example.com |\n\
         | 12 | N/A | N/A |\n"
    );
    assert_eq!(tools.history().snapshot()[0].input, "list_jobs()");
}

/// A workspace with more jobs than the row cap gets a capped, disclosed table.
#[tokio::test]
async fn test_list_jobs_is_capped_with_notice() {
    let mut server = mockito::Server::new_async().await;
    let page: Vec<_> = (0..100)
        .map(|i| json!({ "job_id": i, "settings": { "name": format!("job-{}", i) } }))
        .collect();
    let pages = server
        .mock("GET", "/api/2.1/jobs/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "jobs": page, "has_more": true, "next_page_token": "more" }).to_string())
        .expect(10)
        .create_async()
        .await;

    let output = tools(&server).list_jobs().await;

    pages.assert_async().await;
    assert!(output.is_success());
    assert_eq!(output.text.matches("| job-").count(), 1000);
    assert!(
        output.text.ends_with("\n*Note: Results limited to 1000 rows.*\n"),
        "{}",
        &output.text[output.text.len() - 80..]
    );
}

#[tokio::test]
async fn test_cluster_listing_is_capped_with_notice() {
    let mut server = mockito::Server::new_async().await;
    let clusters: Vec<_> = (0..1001)
        .map(|i| json!({ "cluster_id": format!("c-{}", i), "state": "RUNNING" }))
        .collect();
    let _clusters = server
        .mock("GET", "/api/2.0/clusters/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "clusters": clusters }).to_string())
        .create_async()
        .await;

    let output = tools(&server).get_cluster_info().await;

    assert_eq!(output.text.matches("| c-").count(), 1000);
    assert!(!output.text.contains("| c-1000 |"));
    assert!(output.text.contains("*Note: Results limited to 1000 rows.*"));
}

#[tokio::test]
async fn test_get_job_status_renders_runs() {
    let mut server = mockito::Server::new_async().await;
    let runs = server
        .mock("GET", "/api/2.1/jobs/runs/list")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("job_id".into(), "42".into()),
            Matcher::UrlEncoded("limit".into(), "25".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "runs": [
                    {
                        "run_id": 7,
                        "state": { "life_cycle_state": "TERMINATED", "result_state": "SUCCESS" },
                        "start_time": 1700000000000i64,
                        "end_time": 1700000090500i64
                    },
                    {
                        "run_id": 8,
                        "state": { "life_cycle_state": "RUNNING" },
                        "start_time": 1700000100000i64,
                        "end_time": 0
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let tools = tools(&server);
    let output = tools.get_job_status(42).await;

    runs.assert_async().await;
    assert!(
        output
            .text
            .contains("| 7 | SUCCESS | 2023-11-14 22:13:20 | 2023-11-14 22:14:50 | 90.50s |"),
        "{}",
        output.text
    );
    assert!(output.text.contains("| 8 | RUNNING | 2023-11-14 22:15:00 | N/A | N/A |"));
    assert_eq!(tools.history().snapshot()[0].input, "get_job_status(42)");
}

#[tokio::test]
async fn test_get_job_status_without_runs() {
    let mut server = mockito::Server::new_async().await;
    let _runs = server
        .mock("GET", "/api/2.1/jobs/runs/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let output = tools(&server).get_job_status(5).await;
    assert_eq!(output.text, "No runs found for job ID 5.");
}

#[tokio::test]
async fn test_get_job_details_renders_settings_and_tasks() {
    let mut server = mockito::Server::new_async().await;
    let _job = server
        .mock("GET", "/api/2.1/jobs/get")
        .match_query(Matcher::UrlEncoded("job_id".into(), "42".into()))
        .with_status(200)
        .with_body(
            json!({
                "job_id": 42,
                "creator_user_name": "ana@example.com",
                "created_time": 1700000000000i64,
                "settings": {
                    "name": "nightly-etl",
                    "max_concurrent_runs": 1,
                    "timeout_seconds": 3600,
                    "schedule": {
                        "quartz_cron_expression": "0 0 2 * * ?",
                        "timezone_id": "UTC",
                        "pause_status": "UNPAUSED"
                    },
                    "tasks": [
                        { "task_key": "ingest", "notebook_task": { "notebook_path": "/etl/ingest" } },
                        { "task_key": "publish", "description": "Publish | report", "sql_task": {} }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let output = tools(&server).get_job_details(42).await;

    assert!(output.is_success(), "{}", output.text);
    assert!(output.text.starts_with("## Job Details: nightly-etl\n\n"));
    assert!(output.text.contains("- **Job ID:** 42\n"));
    assert!(output.text.contains("- **Created:** 2023-11-14 22:13:20\n"));
    assert!(output.text.contains("- **Schedule:** 0 0 2 * * ? (UTC, UNPAUSED)\n"));
    assert!(output.text.contains("- **Timeout:** 3600s\n"));
    assert!(output.text.contains("### Tasks:\n\n"));
    assert!(output.text.contains("| ingest | notebook_task | N/A |"));
    assert!(output.text.contains("| publish | sql_task | Publish \\| report |"));
}

#[tokio::test]
async fn test_get_job_details_not_found() {
    let mut server = mockito::Server::new_async().await;
    let _job = server
        .mock("GET", "/api/2.1/jobs/get")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(
            json!({
                "error_code": "INVALID_PARAMETER_VALUE",
                "message": "Job 999 does not exist."
            })
            .to_string(),
        )
        .create_async()
        .await;

    let output = tools(&server).get_job_details(999).await;
    assert_eq!(
        output.text,
        "Error getting job details: Databricks API error (400): Job 999 does not exist."
    );
}

#[tokio::test]
async fn test_get_cluster_info() {
    let mut server = mockito::Server::new_async().await;
    let _clusters = server
        .mock("GET", "/api/2.0/clusters/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "clusters": [
                    {
                        "cluster_id": "0101-abc",
                        "cluster_name": "shared",
                        "state": "RUNNING",
                        "node_type_id": "Standard_DS3_v2",
                        "spark_version": "14.3.x-scala2.12",
                        "autoscale": { "min_workers": 2, "max_workers": 8 }
                    },
                    { "cluster_id": "0102-def", "state": "TERMINATED", "num_workers": 0 }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let output = tools(&server).get_cluster_info().await;

    assert!(output.text.starts_with("## Available Clusters\n\n"));
    assert!(output.text.contains(
        "| 0101-abc | shared | RUNNING | Standard_DS3_v2 | 2-8 | 14.3.x-scala2.12 |"
    ));
    assert!(output.text.contains("| 0102-def | N/A | TERMINATED | N/A | 0 | N/A |"));
}

#[tokio::test]
async fn test_describe_table() {
    let mut server = mockito::Server::new_async().await;
    let _warehouse = mock_warehouse(&mut server).await;
    let statement = server
        .mock("POST", "/api/2.0/sql/statements")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "statement": "DESCRIBE TABLE EXTENDED main.default.sales"
        })))
        .with_status(200)
        .with_body(
            succeeded(
                "s-desc",
                &[("col_name", "STRING"), ("data_type", "STRING"), ("comment", "STRING")],
                vec![
                    json!(["order_id", "bigint", "Primary key"]),
                    json!(["amount", "decimal(10,2)", null]),
                    json!(["", "", ""]),
                    json!(["# Detailed Table Information", "", ""]),
                    json!(["Catalog", "main", ""]),
                    json!(["Type", "MANAGED", ""]),
                ],
            )
            .to_string(),
        )
        .create_async()
        .await;

    let tools = tools(&server);
    let output = tools.describe_table("main.default.sales").await;

    statement.assert_async().await;
    assert!(output.text.starts_with("## Schema for table: main.default.sales\n\n"));
    assert!(output.text.contains("| order_id | bigint | Primary key |"));
    assert!(output.text.contains("| amount | decimal(10,2) |  |"));
    assert!(output.text.contains("### Table Details\n\n- **Catalog:** main\n- **Type:** MANAGED\n"));
    assert_eq!(
        tools.history().snapshot()[0].input,
        "describe_table(main.default.sales)"
    );
}

#[tokio::test]
async fn test_schema_resource_lists_tables_without_recording() {
    let mut server = mockito::Server::new_async().await;
    let _warehouse = mock_warehouse(&mut server).await;
    let _statement = mock_statement(
        &mut server,
        succeeded(
            "s-tables",
            &[("table_catalog", "STRING"), ("table_schema", "STRING"), ("table_name", "STRING")],
            vec![
                json!(["main", "default", "sales"]),
                json!(["main", "iot", "building_sensor_readings"]),
            ],
        ),
    )
    .await;

    let tools = tools(&server);
    let result = read_resource(&tools, SCHEMA_RESOURCE_URI).await.unwrap();

    let ResourceContents::TextResourceContents { text, uri, .. } = &result.contents[0] else {
        panic!("expected text contents");
    };
    assert_eq!(uri, SCHEMA_RESOURCE_URI);
    assert_eq!(
        text,
        "Database: main, Schema: default, Table: sales\n\
         Database: main, Schema: iot, Table: building_sensor_readings"
    );
    assert!(tools.history().is_empty());
}

#[tokio::test]
async fn test_unknown_resource_is_rejected() {
    let server = mockito::Server::new_async().await;
    let err = read_resource(&tools(&server), "schema://views").await.unwrap_err();
    assert!(
        matches!(err, DbxError::ResourceNotFound { ref uri } if uri == "schema://views"),
        "{:?}",
        err
    );
    assert_eq!(err.to_string(), "Unknown resource: schema://views");
}
