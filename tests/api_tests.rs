//! End-to-end tests through the full router: auth middleware, rule and issue
//! endpoints, public reports.

#[path = "test_utils/mod.rs"]
mod test_utils;

use axum::http::StatusCode;
use serde_json::json;
use test_utils::{TestApp, insert_grid, insert_reservoir, insert_seismic};

fn shimen_rule() -> serde_json::Value {
    json!({
        "name": "Shimen low",
        "position": "SHIMEN_RESERVOIR",
        "resource": "PERCENT",
        "operator": "LESS_THAN",
        "value": 30.0
    })
}

#[tokio::test]
async fn root_and_health_are_public() {
    let app = TestApp::new().await.unwrap();

    let info = app.json("GET", "/", None, None, StatusCode::OK).await;
    assert_eq!(info["service"], "meter");

    let health = app.json("GET", "/healthz", None, None, StatusCode::OK).await;
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = TestApp::new().await.unwrap();

    for (method, uri) in [
        ("GET", "/rule"),
        ("GET", "/issue"),
        ("GET", "/user/me"),
        ("PUT", "/rule/1/trigger"),
    ] {
        let body = app
            .json(method, uri, None, None, StatusCode::UNAUTHORIZED)
            .await;
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    app.json("GET", "/rule", Some("garbage"), None, StatusCode::UNAUTHORIZED)
        .await;
}

#[tokio::test]
async fn responses_carry_trace_id() {
    let app = TestApp::new().await.unwrap();
    let response = app.request("GET", "/", None, None).await;
    assert!(response.headers().contains_key("x-trace-id"));
}

#[tokio::test]
async fn signup_validates_and_rejects_duplicates() {
    let app = TestApp::new().await.unwrap();

    app.json(
        "POST",
        "/user/signup",
        None,
        Some(json!({"name": "a", "email": "a@example.com", "password": "pw"})),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.json(
        "POST",
        "/user/signup",
        None,
        Some(json!({"name": "alice", "email": "no-at-sign", "password": "pw"})),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let token = app.register("alice").await;
    let me = app
        .json("GET", "/user/me", Some(&token), None, StatusCode::OK)
        .await;
    assert_eq!(me["name"], "alice");
    assert!(me.get("password_digest").is_none());

    app.json(
        "POST",
        "/user/signup",
        None,
        Some(json!({"name": "alice2", "email": "ALICE@example.com", "password": "pw"})),
        StatusCode::CONFLICT,
    )
    .await;

    app.json(
        "POST",
        "/user/login",
        None,
        Some(json!({"name": "alice", "password": "nope"})),
        StatusCode::UNAUTHORIZED,
    )
    .await;
}

#[tokio::test]
async fn rule_crud_round() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("alice").await;

    let created = app
        .json("POST", "/rule", Some(&token), Some(shimen_rule()), StatusCode::CREATED)
        .await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["is_enable"], true);
    assert!(created["last_triggered_by"].is_null());

    let mismatched = app
        .json(
            "PATCH",
            &format!("/rule/{id}"),
            Some(&token),
            Some(json!({"resource": "INTENSITY"})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(mismatched["code"], "VALIDATION_FAILED");

    let updated = app
        .json(
            "PATCH",
            &format!("/rule/{id}"),
            Some(&token),
            Some(json!({"operator": "LESS_THAN_OR_EQUAL_TO", "value": 25.5})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["operator"], "LESS_THAN_OR_EQUAL_TO");
    assert_eq!(updated["value"], 25.5);
    assert_eq!(updated["name"], "Shimen low");

    app.json(
        "PUT",
        &format!("/rule/{id}/disable"),
        Some(&token),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
    let fetched = app
        .json("GET", &format!("/rule/{id}"), Some(&token), None, StatusCode::OK)
        .await;
    assert_eq!(fetched["is_enable"], false);

    app.json(
        "PUT",
        &format!("/rule/{id}/enable"),
        Some(&token),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;

    let listed = app
        .json("GET", "/rule", Some(&token), None, StatusCode::OK)
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    app.json(
        "DELETE",
        &format!("/rule/{id}"),
        Some(&token),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
    app.json(
        "GET",
        &format!("/rule/{id}"),
        Some(&token),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    app.json(
        "DELETE",
        &format!("/rule/{id}"),
        Some(&token),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn other_users_rules_look_missing() {
    let app = TestApp::new().await.unwrap();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let created = app
        .json("POST", "/rule", Some(&alice), Some(shimen_rule()), StatusCode::CREATED)
        .await;
    let id = created["id"].as_i64().unwrap();

    for (method, uri) in [
        ("GET", format!("/rule/{id}")),
        ("DELETE", format!("/rule/{id}")),
        ("PUT", format!("/rule/{id}/enable")),
        ("PUT", format!("/rule/{id}/trigger")),
    ] {
        app.json(method, &uri, Some(&bob), None, StatusCode::NOT_FOUND)
            .await;
    }
}

#[tokio::test]
async fn manual_trigger_opens_issue_and_notifies_owner() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("alice").await;
    insert_reservoir(app.db(), "石門水庫", 1_700_000_000, 5000.0, 21.5)
        .await
        .unwrap();

    let created = app
        .json("POST", "/rule", Some(&token), Some(shimen_rule()), StatusCode::CREATED)
        .await;
    let id = created["id"].as_i64().unwrap();

    let outcome = app
        .json(
            "PUT",
            &format!("/rule/{id}/trigger"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(outcome["triggered"], true);
    assert_eq!(outcome["timestamp"], 1_700_000_000);
    let issue_id = outcome["issue_id"].as_i64().unwrap();

    let repeat = app
        .json(
            "PUT",
            &format!("/rule/{id}/trigger"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(repeat["triggered"], false);
    assert!(repeat.get("issue_id").is_none());

    assert_eq!(app.notifier.subjects(), ["Rule Shimen low triggered"]);
    let sent = app.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent[0].0, ["alice@example.com"]);

    let detail = app
        .json(
            "GET",
            &format!("/issue/{issue_id}"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(detail["status"], "CREATED");
    assert_eq!(detail["rule"]["id"], id);
    assert!(detail["content"].as_str().unwrap().contains("21.5"));

    // Deleting the rule keeps the issue.
    app.json(
        "DELETE",
        &format!("/rule/{id}"),
        Some(&token),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
    let orphan = app
        .json(
            "GET",
            &format!("/issue/{issue_id}"),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(orphan["rule"].is_null());
}

#[tokio::test]
async fn issue_lifecycle_and_filters() {
    let app = TestApp::new().await.unwrap();
    let token = app.register("alice").await;
    insert_grid(app.db(), 1_000, 100.0, 105.0).await.unwrap();
    insert_seismic(app.db(), 2_000, [3, 1, 0]).await.unwrap();

    let grid_rule = app
        .json(
            "POST",
            "/rule",
            Some(&token),
            Some(json!({
                "position": "NORTH_ELECTRICITY",
                "resource": "RECV_RATE",
                "operator": "LESS_THAN",
                "value": 6.0
            })),
            StatusCode::CREATED,
        )
        .await;
    let quake_rule = app
        .json(
            "POST",
            "/rule",
            Some(&token),
            Some(json!({
                "position": "HSINCHU_EARTHQUAKE",
                "resource": "INTENSITY",
                "operator": "GREATER_THAN_OR_EQUAL_TO",
                "value": 3.0
            })),
            StatusCode::CREATED,
        )
        .await;

    let mut issue_ids = Vec::new();
    for rule in [&grid_rule, &quake_rule] {
        let outcome = app
            .json(
                "PUT",
                &format!("/rule/{}/trigger", rule["id"]),
                Some(&token),
                None,
                StatusCode::OK,
            )
            .await;
        assert_eq!(outcome["triggered"], true, "rule {}", rule["id"]);
        issue_ids.push(outcome["issue_id"].as_i64().unwrap());
    }

    let all = app
        .json("GET", "/issue", Some(&token), None, StatusCode::OK)
        .await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["id"], issue_ids[1]);

    let by_rule = app
        .json(
            "GET",
            &format!("/issue?rule_id={}", grid_rule["id"]),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(by_rule.as_array().unwrap().len(), 1);
    assert_eq!(by_rule[0]["id"], issue_ids[0]);

    let processing = app
        .json(
            "PATCH",
            &format!("/issue/{}", issue_ids[0]),
            Some(&token),
            Some(json!({"status": "PROCESSING", "title": "Looking into it"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(processing["title"], "Looking into it");
    assert!(!processing["processing_at"].is_null());
    assert!(processing["solved_at"].is_null());

    app.json(
        "PATCH",
        &format!("/issue/{}", issue_ids[0]),
        Some(&token),
        Some(json!({"status": "CREATED"})),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let filtered = app
        .json(
            "GET",
            "/issue?status=PROCESSING",
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let bob = app.register("bob").await;
    app.json(
        "GET",
        &format!("/issue/{}", issue_ids[0]),
        Some(&bob),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    let none = app
        .json("GET", "/issue", Some(&bob), None, StatusCode::OK)
        .await;
    assert!(none.as_array().unwrap().is_empty());

    app.json(
        "DELETE",
        &format!("/issue/{}", issue_ids[0]),
        Some(&token),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
}

#[tokio::test]
async fn report_endpoints_are_public() {
    let app = TestApp::new().await.unwrap();
    insert_reservoir(app.db(), "德基水庫", 50, 100.0, 25.0)
        .await
        .unwrap();
    insert_reservoir(app.db(), "鯉魚潭水庫", 50, 300.0, 50.0)
        .await
        .unwrap();
    insert_grid(app.db(), 10, 100.0, 110.0).await.unwrap();
    insert_grid(app.db(), 20, 50.0, 50.0).await.unwrap();
    insert_seismic(app.db(), 30, [1, 2, 3]).await.unwrap();

    let dams = app
        .json("GET", "/report/dam", None, None, StatusCode::OK)
        .await;
    let dams = dams.as_array().unwrap();
    assert_eq!(dams.len(), 5);
    let central = &dams[3];
    assert_eq!(central["name"], "中");
    assert_eq!(central["storage"], 400.0);
    assert_eq!(central["timestamp"], 0);
    assert_eq!(central["percent"], 40.0);

    let power = app
        .json("GET", "/report/power", None, None, StatusCode::OK)
        .await;
    assert_eq!(power[0]["timestamp"], 20);
    assert_eq!(power[1]["whole"]["load"], 400.0);
    assert_eq!(power[1]["whole"]["max_supply"], 440.0);
    assert_eq!(power[0]["whole"]["recv_rate"], 0.0);

    let quakes = app
        .json("GET", "/report/eq", None, None, StatusCode::OK)
        .await;
    assert_eq!(quakes[0]["intensity"], json!([1, 2, 3]));
    assert_eq!(quakes[0]["geometry"]["type"], "Point");
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let app = TestApp::new().await.unwrap();
    let doc = app
        .json("GET", "/openapi.json", None, None, StatusCode::OK)
        .await;
    assert!(doc["paths"]["/rule/{id}/trigger"]["put"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
}
