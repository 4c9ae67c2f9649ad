use serde_json::json;
use serde_json::Value;

use crate::helpers::spawn_app;

#[tokio::test]
async fn no_pending_changes() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;
    assert_eq!(app.get_changes(id).await.status().as_u16(), 204);
}

#[tokio::test]
async fn request_then_read_changes() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;
    let changes = json!([
        {"newsletter_id": 1, "action": "subscribe"},
        {"newsletter_id": 2, "action": "unsubscribe"},
    ]);

    let resp = app.put_changes(id, &changes).await;
    assert_eq!(resp.status().as_u16(), 204);

    let resp = app.get_changes(id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let stored: Value = resp.json().await.unwrap();
    assert_eq!(stored, changes);

    // pending changes are not part of the public record
    let voter: Value = app.get_voter(id).await.json().await.unwrap();
    assert!(voter.get("changes").is_none());

    // an empty list clears them
    app.put_changes(id, &json!([])).await;
    assert_eq!(app.get_changes(id).await.status().as_u16(), 204);
}

#[tokio::test]
async fn confirm_applies_and_clears_changes() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;
    app.post_subscription(id, &json!({"newsletter_id": 2})).await;
    app.put_changes(
        id,
        &json!([
            {"newsletter_id": 1, "action": "subscribe"},
            {"newsletter_id": 2, "action": "unsubscribe"},
        ]),
    )
    .await;

    let resp = app.confirm_changes(id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["applied"], 2);

    assert_eq!(app.subscribed_ids(id).await, vec![1]);
    assert_eq!(app.get_changes(id).await.status().as_u16(), 204);

    let voter: Value = app.get_voter(id).await.json().await.unwrap();
    for entry in voter["subscriptions"].as_array().unwrap() {
        assert_eq!(entry["source"], "confirmation");
    }

    // nothing left to apply
    let body: Value = app.confirm_changes(id).await.json().await.unwrap();
    assert_eq!(body["applied"], 0);
}

#[tokio::test]
async fn invalid_change_requests() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    let resp = app
        .put_changes(id, &json!([{"newsletter_id": 1, "action": "maybe"}]))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(app.put_changes(999, &json!([])).await.status().as_u16(), 404);
}

#[tokio::test]
async fn repeated_newsletter_is_applied_once() {
    let app = spawn_app().await;
    let mut rx = app.events.subscribe();
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    app.put_changes(
        id,
        &json!([
            {"newsletter_id": 1, "action": "subscribe"},
            {"newsletter_id": 1, "action": "unsubscribe"},
        ]),
    )
    .await;
    let stored: Value = app.get_changes(id).await.json().await.unwrap();
    assert_eq!(stored, json!([{"newsletter_id": 1, "action": "unsubscribe"}]));

    let body: Value = app.confirm_changes(id).await.json().await.unwrap();
    assert_eq!(body["applied"], 1);
    assert_eq!(rx.try_recv().unwrap().name(), "unsubscribed");
    assert!(rx.try_recv().is_err());
}
