use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{BroadcastSink, Engine};
use migration::MigratorTrait;
use server::{ServerState, router};

async fn app() -> (Router, BroadcastSink) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let events = BroadcastSink::new(64);
    let engine = Engine::builder()
        .database(db)
        .notifications(Arc::new(events.clone()))
        .build()
        .await
        .unwrap();
    let state = ServerState {
        engine: Arc::new(engine),
        events: events.clone(),
    };
    (router(state), events)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn group_abc(app: &Router) -> String {
    let (status, group) = send(
        app,
        "POST",
        "/groups",
        Some(json!({
            "name": "Trip",
            "creator": { "member_id": "a", "display_name": "Alice" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(group["category"], "NONE");
    let group_id = group["id"].as_str().unwrap().to_string();

    for (id, name) in [("b", "Bob"), ("c", "Carol")] {
        let (status, _) = send(
            app,
            "POST",
            &format!("/groups/{group_id}/members"),
            Some(json!({ "member_id": id, "display_name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    group_id
}

fn expense(payer: &str, participants: &[&str], amount: i64) -> Value {
    json!({
        "payer_id": payer,
        "participants": participants,
        "amount_minor": amount,
        "title": "Dinner",
        "occurred_at": "2026-10-01T20:00:00+02:00"
    })
}

#[tokio::test]
async fn record_and_reverse_through_http() {
    let (app, events) = app().await;
    let mut rx = events.subscribe();
    let group_id = group_abc(&app).await;

    let (status, first) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/expenses"),
        Some(expense("a", &["a", "b", "c"], 9000)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["group_total_minor"], 9000);
    assert_eq!(first["affected_balances"].as_array().unwrap().len(), 2);
    assert_eq!(rx.try_recv().unwrap().new_group_total_minor, 9000);

    let (status, second) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/expenses"),
        Some(expense("b", &["a", "b"], 3000)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["affected_balances"][0]["change"], "updated");
    assert_eq!(second["affected_balances"][0]["previous_amount_minor"], 3000);

    let (status, balances) = send(&app, "GET", &format!("/groups/{group_id}/balances"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balances["total_expense_minor"], 12000);
    assert_eq!(
        balances["balances"],
        json!([
            {
                "debtor_id": "b", "debtor_name": "Bob",
                "creditor_id": "a", "creditor_name": "Alice",
                "amount_minor": 1500
            },
            {
                "debtor_id": "c", "debtor_name": "Carol",
                "creditor_id": "a", "creditor_name": "Alice",
                "amount_minor": 3000
            }
        ])
    );

    let (status, mine) = send(
        &app,
        "GET",
        &format!("/groups/{group_id}/members/a/balances"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["net_position_minor"], 4500);

    let expense_id = second["expense_id"].as_str().unwrap();
    let (status, undo) = send(&app, "POST", &format!("/expenses/{expense_id}/reverse"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undo["group_total_minor"], 9000);

    let (status, again) = send(&app, "POST", &format!("/expenses/{expense_id}/reverse"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(again["error"].as_str().unwrap().contains("already reversed"));

    let (status, history) = send(
        &app,
        "GET",
        &format!("/groups/{group_id}/expenses?include_reversed=true&limit=1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["expenses"][0]["id"], expense_id);
    assert_eq!(history["expenses"][0]["reversed"], true);
    assert!(history["next_cursor"].is_string());
}

#[tokio::test]
async fn amend_and_settle_through_http() {
    let (app, _events) = app().await;
    let group_id = group_abc(&app).await;

    let (_, recorded) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/expenses"),
        Some(expense("a", &["a", "b"], 2000)),
    )
    .await;
    let expense_id = recorded["expense_id"].as_str().unwrap();

    let (status, amended) = send(
        &app,
        "PATCH",
        &format!("/expenses/{expense_id}"),
        Some(json!({ "amount_minor": 4000, "participants": ["a", "b", "c"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(amended["expense_id"], recorded["expense_id"]);
    assert_eq!(amended["group_total_minor"], 4000);

    let (status, original) = send(&app, "GET", &format!("/expenses/{expense_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(original["reversed"], true);
    assert_eq!(original["amended_by"], amended["expense_id"]);

    let (status, groups) = send(&app, "GET", "/members/c/groups", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(groups[0]["id"], group_id.as_str());

    // c owes a 1334 (last participant absorbs the remainder).
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/groups/{group_id}/members/c"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, settled) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/settlements"),
        Some(json!({ "from_id": "c", "to_id": "a", "amount_minor": 1334 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(settled["group_total_minor"], 4000);
    assert_eq!(settled["affected_balances"][0]["change"], "deleted");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/groups/{group_id}/members/c"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, group) = send(&app, "GET", &format!("/groups/{group_id}"), None).await;
    assert_eq!(group["members"].as_array().unwrap().len(), 2);

    let (_, history) = send(
        &app,
        "GET",
        &format!("/groups/{group_id}/expenses?include_settlements=false"),
        None,
    )
    .await;
    let kinds: Vec<&str> = history["expenses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["expense"]);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let (app, events) = app().await;
    let mut rx = events.subscribe();
    let group_id = group_abc(&app).await;

    let (status, _) = send(&app, "GET", "/groups/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/expenses"),
        Some(expense("a", &["a", "b"], 0)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/expenses"),
        Some(expense("a", &["a", "zed"], 1000)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(rx.try_recv().is_err());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/groups/{group_id}/members"),
        Some(json!({ "member_id": "b", "display_name": "Bobby" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/expenses/not-a-uuid/reverse", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/groups/{group_id}/expenses?limit=0"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/groups/{group_id}/expenses?cursor=garbage"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
