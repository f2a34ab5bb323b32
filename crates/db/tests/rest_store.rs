//! Integration tests for the REST table store.
//!
//! A mock HTTP server stands in for the managed backend.

use std::time::Duration;

use db::{
    DBService, Query, RestStore, RestStoreConfig, RetryConfig, StoreError, TableStore,
    models::project::Project,
};
use secrecy::SecretString;
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, query_param},
};

const KEY: &str = "service-key";

fn config(server: &MockServer) -> RestStoreConfig {
    RestStoreConfig {
        base_url: format!("{}/", server.uri()),
        service_key: SecretString::from(KEY),
        timeout: Duration::from_secs(5),
    }
}

fn project_row(id: Uuid, owner: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Home",
        "description": null,
        "owner": owner,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z",
    })
}

#[tokio::test]
async fn test_select_sends_filters_and_credentials() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/projects"))
        .and(query_param("owner", format!("eq.{owner}")))
        .and(query_param("order", "created_at.asc.nullslast"))
        .and(query_param("select", "*"))
        .and(header("apikey", KEY))
        .and(header("authorization", format!("Bearer {KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_row(id, owner)])))
        .expect(1)
        .mount(&server)
        .await;

    let db = DBService::rest(config(&server)).unwrap();
    let projects = Project::find_by_owner(&db, owner).await.unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, id);
    assert_eq!(projects[0].owner, owner);
}

#[tokio::test]
async fn test_insert_asks_for_the_stored_row() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let project = Project::new(owner, "Home".into(), None);

    Mock::given(method("POST"))
        .and(path("/rest/v1/projects"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({"name": "Home", "owner": owner})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([project_row(project.id, owner)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = DBService::rest(config(&server)).unwrap();
    let saved = Project::insert(&db, &project).await.unwrap();
    assert_eq!(saved.id, project.id);
}

#[tokio::test]
async fn test_upsert_merges_duplicates_on_conflict_column() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("on_conflict", "id"))
        .and(header(
            "prefer",
            "return=representation,resolution=merge-duplicates",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "u1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(config(&server)).unwrap();
    let row = store
        .upsert("profiles", json!({"id": "u1"}), "id")
        .await
        .unwrap();
    assert_eq!(row["id"], "u1");
}

#[tokio::test]
async fn test_delete_counts_returned_rows() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("column_id", "eq.c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "a"}, {"id": "b"}])))
        .mount(&server)
        .await;

    let store = RestStore::new(config(&server)).unwrap();
    let deleted = store
        .delete("tasks", &Query::new().eq("column_id", "c1"))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn test_remote_errors_carry_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;

    let store = RestStore::new(config(&server)).unwrap();
    let err = store
        .update("tasks", &Query::new().eq("id", "a"), json!({"position": 1}))
        .await
        .unwrap_err();

    match err {
        StoreError::Remote { status, body } => {
            assert_eq!(status, 409);
            assert_eq!(body, "duplicate key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_reads_retry_transient_failures() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/projects"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_row(id, owner)])))
        .expect(1)
        .mount(&server)
        .await;

    let db = DBService::rest(config(&server))
        .unwrap()
        .with_retry_config(RetryConfig::new(3, 1, 5));
    let found = Project::find_by_id(&db, id).await.unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn test_writes_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/projects"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let db = DBService::rest(config(&server))
        .unwrap()
        .with_retry_config(RetryConfig::new(3, 1, 5));
    let err = Project::insert(&db, &Project::new(Uuid::new_v4(), "Home".into(), None))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_health_hits_rest_root() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let db = DBService::rest(config(&server)).unwrap();
    assert!(db.is_healthy().await);
}
