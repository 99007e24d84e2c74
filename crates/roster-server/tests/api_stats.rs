use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use roster_db::{run_migrations, Database, DbRuntimeSettings};
use roster_server::{app, AppState};
use serde_json::Value;
use tower::ServiceExt;

fn setup_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    let db = Database::open(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    {
        let conn = db.acquire().unwrap();
        run_migrations(&conn).unwrap();
    }

    let state = AppState {
        db,
        admin_token: None,
        admin_page: dir.path().join("admin.html"),
    };
    (app(state), dir)
}

async fn request(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_stats_on_empty_table() {
    let (app, _dir) = setup_app();

    let (status, body) = request(&app, "GET", "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total_users"], 0);
    assert_eq!(body["data"]["active_users"], 0);
    assert_eq!(body["data"]["inactive_users"], 0);
    assert_eq!(body["data"]["by_role"], serde_json::json!({}));
}

#[tokio::test]
async fn test_stats_reflect_created_users() {
    let (app, _dir) = setup_app();
    let n = 8;

    for i in 0..n {
        let mut uri = format!("/api/users?name=user{i}&email=user{i}@example.com");
        if i < 3 {
            uri.push_str("&status=inactive");
        }
        if i % 2 == 0 {
            uri.push_str("&role=admin");
        }
        let (status, _) = request(&app, "POST", &uri).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = request(&app, "GET", "/api/stats").await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["total_users"], n);
    assert_eq!(data["inactive_users"], 3);
    assert_eq!(data["active_users"], n - 3);
    assert_eq!(data["by_role"]["admin"], 4);
    assert_eq!(data["by_role"]["user"], 4);

    let role_sum: i64 = data["by_role"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_i64().unwrap())
        .sum();
    assert_eq!(role_sum, n);
}
