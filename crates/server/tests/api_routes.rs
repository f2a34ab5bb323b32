//! Drives the HTTP router end to end against an in-memory deployment.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use db::{MemoryStore, models::notification::Notification};
use deployment::Deployment;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::{Value, json};
use server::{DeploymentImpl, routes};
use services::services::auth::{AUTHENTICATED_AUDIENCE, AccessTokenClaims};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "router-test-secret-with-enough-length";

struct TestApp {
    deployment: DeploymentImpl,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let deployment =
            DeploymentImpl::with_store(MemoryStore::new(), SecretString::from(SECRET));
        let router = routes::router(deployment.clone());
        Self { deployment, router }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

fn mint_token(user: Uuid) -> String {
    let now = Utc::now();
    let claims = AccessTokenClaims {
        sub: user,
        aud: AUTHENTICATED_AUDIENCE.to_string(),
        exp: (now + Duration::hours(1)).timestamp(),
        iat: Some(now.timestamp()),
        email: Some("me@example.com".to_string()),
        role: Some("authenticated".to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn data(body: &Value) -> &Value {
    assert_eq!(body["success"], true, "unexpected failure: {body}");
    &body["data"]
}

#[tokio::test]
async fn test_health_and_providers_need_no_token() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend_ready"], true);

    let (status, body) = app
        .call(Method::GET, "/api/email/providers", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let providers = data(&body).as_array().unwrap();
    assert_eq!(providers.len(), 4);
    assert!(providers.iter().any(|p| p["provider"] == "gmail"));
}

#[tokio::test]
async fn test_user_routes_reject_missing_or_forged_tokens() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let forged = {
        let claims = AccessTokenClaims {
            sub: Uuid::new_v4(),
            aud: AUTHENTICATED_AUDIENCE.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iat: None,
            email: None,
            role: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap()
    };
    let (status, _) = app
        .call(Method::GET, "/api/projects", Some(&forged), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_board_flow_through_the_api() {
    let app = TestApp::new();
    let token = mint_token(Uuid::new_v4());
    let token = Some(token.as_str());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects",
            token,
            Some(json!({ "name": "  Website  ", "description": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let project = data(&body).clone();
    assert_eq!(project["name"], "Website");
    let project_id = project["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/projects/{project_id}/board"),
            token,
            None,
        )
        .await;
    let columns = data(&body)["columns"].as_array().unwrap().clone();
    let titles: Vec<_> = columns.iter().map(|c| c["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["To Do", "In Progress", "Done"]);
    let done_id = columns[2]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/tasks",
            token,
            Some(json!({
                "project_id": project_id,
                "column_id": null,
                "title": "Write copy",
                "description": null,
                "priority": "high",
                "due_date": null,
                "attachment_url": null,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let task = data(&body).clone();
    assert_eq!(task["status"], "To Do");
    assert_eq!(task["priority"], "high");
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/tasks/{task_id}/move"),
            token,
            Some(json!({ "column_id": done_id, "index": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["status"], "Done");
    assert_eq!(data(&body)["column_id"], done_id.as_str());

    let (_, body) = app
        .call(
            Method::POST,
            &format!("/api/tasks/{task_id}/toggle-complete"),
            token,
            None,
        )
        .await;
    assert_eq!(data(&body)["completed"], true);

    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/tasks?project_id={project_id}"),
            token,
            None,
        )
        .await;
    assert_eq!(data(&body).as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/projects/{project_id}"),
            token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::GET, &format!("/api/tasks/{task_id}"), token, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_records_of_other_users_are_not_found() {
    let app = TestApp::new();
    let owner = mint_token(Uuid::new_v4());
    let stranger = mint_token(Uuid::new_v4());

    let (_, body) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&owner),
            Some(json!({ "name": "Private", "description": null })),
        )
        .await;
    let project_id = data(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/projects/{project_id}"),
            Some(&stranger),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Project not found");

    let (_, body) = app
        .call(Method::GET, "/api/projects", Some(&stranger), None)
        .await;
    assert!(data(&body).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_is_a_bad_request() {
    let app = TestApp::new();
    let token = mint_token(Uuid::new_v4());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&token),
            Some(json!({ "name": "   ", "description": null })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let start = Utc::now() + Duration::days(1);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/events",
            Some(&token),
            Some(json!({
                "title": "Standup",
                "start": start,
                "end": start - Duration::hours(1),
                "location": null,
                "description": null,
                "is_reminder": false,
                "reminder_time": null,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_column_delete_can_reassign_tasks() {
    let app = TestApp::new();
    let token = mint_token(Uuid::new_v4());
    let token = Some(token.as_str());

    let (_, body) = app
        .call(
            Method::POST,
            "/api/projects",
            token,
            Some(json!({ "name": "Moves", "description": null })),
        )
        .await;
    let project_id = data(&body)["id"].as_str().unwrap().to_string();
    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/projects/{project_id}/board"),
            token,
            None,
        )
        .await;
    let columns = data(&body)["columns"].as_array().unwrap().clone();
    let todo = columns[0]["id"].as_str().unwrap().to_string();
    let doing = columns[1]["id"].as_str().unwrap().to_string();

    app.call(
        Method::POST,
        "/api/tasks",
        token,
        Some(json!({
            "project_id": project_id,
            "column_id": todo,
            "title": "Carry me",
            "description": null,
            "priority": null,
            "due_date": null,
            "attachment_url": null,
        })),
    )
    .await;

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/columns/{todo}?reassign_to={doing}"),
            token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/projects/{project_id}/board"),
            token,
            None,
        )
        .await;
    let board = data(&body);
    assert_eq!(board["columns"].as_array().unwrap().len(), 2);
    assert_eq!(board["columns"][0]["title"], "In Progress");
    assert_eq!(board["columns"][0]["position"], 0);
    assert_eq!(board["tasks"][0]["status"], "In Progress");
}

#[tokio::test]
async fn test_notification_feed_endpoints() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let token = mint_token(user);
    let token = Some(token.as_str());

    let first = app
        .deployment
        .notifications()
        .push(user, Notification::info("Hello", "first"));
    app.deployment
        .notifications()
        .push(user, Notification::warning("Careful", "second"));

    let (_, body) = app.call(Method::GET, "/api/notifications", token, None).await;
    assert_eq!(data(&body)["unread_count"], 2);
    assert_eq!(data(&body)["notifications"][0]["title"], "Careful");
    assert_eq!(data(&body)["notifications"][0]["type"], "warning");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/notifications/{}/read", first.id),
            token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["read"], true);

    let (_, body) = app
        .call(Method::POST, "/api/notifications/read-all", token, None)
        .await;
    assert_eq!(data(&body)["marked"], 1);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/notifications/{}", Uuid::new_v4()),
            token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.call(Method::DELETE, "/api/notifications", token, None)
        .await;
    let (_, body) = app.call(Method::GET, "/api/notifications", token, None).await;
    assert!(data(&body)["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sending_without_mail_functions_is_unavailable_and_notified() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let token = mint_token(user);
    let token = Some(token.as_str());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/email/accounts",
            token,
            Some(json!({
                "email": "me@example.com",
                "provider": "gmail",
                "username": null,
                "password": "app-password",
                "imap_host": null,
                "imap_port": null,
                "smtp_host": null,
                "smtp_port": null,
                "use_ssl": null,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let account = data(&body).clone();
    assert!(account.get("password").is_none());
    assert_eq!(account["imap_host"], "imap.gmail.com");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/email/send",
            token,
            Some(json!({
                "account_id": account["id"],
                "to": ["friend@example.com"],
                "subject": "Hi",
                "body": "Long time no see",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let feed = app.deployment.notifications().list(user);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].title, "Sending failed");
}

#[tokio::test]
async fn test_preferences_round_trip_and_validate() {
    let app = TestApp::new();
    let token = mint_token(Uuid::new_v4());
    let token = Some(token.as_str());

    let (_, body) = app.call(Method::GET, "/api/config", token, None).await;
    let mut config = data(&body).clone();
    assert_eq!(config["config_version"], "v2");

    config["calendar"]["week_starts_on"] = json!("sunday");
    let (status, body) = app
        .call(Method::PUT, "/api/config", token, Some(config.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["calendar"]["week_starts_on"], "sunday");

    config["calendar"]["reminder_interval_secs"] = json!(0);
    let (status, _) = app
        .call(Method::PUT, "/api/config", token, Some(config))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_sync_is_a_bad_gateway_and_lands_in_the_feed() {
    use services::services::email::functions::FunctionsClient;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/fetch-emails"))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({ "error": "IMAP login failed" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let functions =
        FunctionsClient::new(server.uri(), SecretString::from("service-key")).unwrap();
    let deployment = DeploymentImpl::with_functions(
        MemoryStore::new(),
        functions,
        SecretString::from(SECRET),
    );
    let app = TestApp {
        router: routes::router(deployment.clone()),
        deployment,
    };
    let user = Uuid::new_v4();
    let token = mint_token(user);
    let token = Some(token.as_str());

    let (_, body) = app
        .call(
            Method::POST,
            "/api/email/accounts",
            token,
            Some(json!({
                "email": "me@example.com",
                "provider": "outlook",
                "username": null,
                "password": "app-password",
                "imap_host": null,
                "imap_port": null,
                "smtp_host": null,
                "smtp_port": null,
                "use_ssl": null,
            })),
        )
        .await;
    let account_id = data(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/email/accounts/{account_id}/sync"),
            token,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);

    let feed = app.deployment.notifications().list(user);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].title, "Sync failed");
}
