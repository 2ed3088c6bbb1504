use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use studyhub_backend::api::router;
use studyhub_backend::gemini::CannedGenerativeClient;
use studyhub_backend::state::AppState;

async fn test_app(with_gemini: bool) -> Router {
    // One connection so the in-memory database is shared across requests.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let gemini = with_gemini.then(|| {
        Arc::new(CannedGenerativeClient {
            reply: "Here is a study tip.".to_string(),
        }) as Arc<dyn studyhub_backend::gemini::GenerativeClient>
    });

    router(AppState { db: pool, gemini })
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response was not JSON")
}

#[tokio::test]
async fn test_health() {
    let app = test_app(false).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_signup_and_login_flow() {
    let app = test_app(false).await;

    let signup = json!({
        "mode": "signup",
        "email": "alice@example.com",
        "password": "secret",
        "name": "Alice",
        "userType": "student"
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth", signup.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["userType"], "student");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());

    // Duplicate signup is rejected with 400, as in the original.
    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth", signup))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User already exists");

    let login = json!({
        "mode": "login",
        "email": "alice@example.com",
        "password": "secret"
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth", login))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Login successful");
}

#[tokio::test]
async fn test_login_failures_share_one_response() {
    let app = test_app(false).await;

    let signup = json!({
        "mode": "signup",
        "email": "alice@example.com",
        "password": "secret",
        "name": "Alice"
    });
    app.clone()
        .oneshot(json_request("POST", "/auth", signup))
        .await
        .unwrap();

    let wrong_password = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth",
            json!({"mode": "login", "email": "alice@example.com", "password": "nope"}),
        ))
        .await
        .unwrap();
    let unknown_email = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth",
            json!({"mode": "login", "email": "bob@example.com", "password": "secret"}),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    let first = body_json(wrong_password).await;
    let second = body_json(unknown_email).await;
    assert_eq!(first["message"], second["message"]);
}

#[tokio::test]
async fn test_auth_unknown_mode() {
    let app = test_app(false).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth",
            json!({"mode": "reset", "email": "a@b.c", "password": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_missing_message() {
    let app = test_app(true).await;

    let response = app
        .oneshot(json_request("POST", "/chat", json!({"message": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "No message provided");
}

#[tokio::test]
async fn test_chat_without_api_key() {
    let app = test_app(false).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/chat",
            json!({"message": "How do I study for finals?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Gemini API key is not configured");
}

#[tokio::test]
async fn test_chat_relays_generated_text() {
    let app = test_app(true).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/chat",
            json!({"message": "How do I study for finals?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Here is a study tip.");
}

#[tokio::test]
async fn test_study_plan_crud_flow() {
    let app = test_app(false).await;

    // Create.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/study-plans",
            json!({
                "userId": "u1",
                "title": "Midterms",
                "subject": "Math",
                "startDate": "2024-01-01",
                "endDate": "2024-01-10",
                "tasks": []
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["progress"], 0);
    assert_eq!(created["tasks"], json!([]));
    let id = created["id"].as_str().unwrap().to_string();

    // List is newest-first, scoped to the user.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/study-plans?userId=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let plans = body_json(response).await;
    assert_eq!(plans[0]["id"].as_str().unwrap(), id);

    // Update replaces the task list wholesale.
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/study-plans?id={}", id),
            json!({"tasks": [{"title": "Review ch.1", "status": "pending"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(updated["tasks"][0]["status"], "pending");
    assert_eq!(updated["tasks"][0]["priority"], "medium");

    // Delete, then further mutations miss.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/study-plans?id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Study plan deleted successfully");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/study-plans?id={}", id),
            json!({"title": "Renamed"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/study-plans?id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_study_plan_missing_params() {
    let app = test_app(false).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/study-plans")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User ID is required");

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/study-plans", json!({"title": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/study-plans")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_update_conflicts() {
    let app = test_app(false).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/study-plans",
            json!({
                "userId": "u1",
                "title": "Finals",
                "subject": "History",
                "startDate": "2024-05-01",
                "endDate": "2024-05-20"
            }),
        ))
        .await
        .unwrap();
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // First writer succeeds against version 0.
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/study-plans?id={}", id),
            json!({"progress": 40, "version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Second writer holds the stale snapshot and loses.
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/study-plans?id={}", id),
            json!({"progress": 90, "version": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/study-plans?userId=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let plans = body_json(response).await;
    assert_eq!(plans[0]["progress"], 40);
}

#[tokio::test]
async fn test_reminders_round_trip() {
    let app = test_app(false).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/study-plans",
            json!({
                "userId": "u1",
                "title": "Midterms",
                "subject": "Math",
                "startDate": "2024-01-01",
                "endDate": "2024-01-10",
                "reminders": [{"message": "Start early", "date": "2024-01-02"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["reminders"][0]["message"], "Start early");
    assert_eq!(created["reminders"][0]["isCompleted"], false);
}
