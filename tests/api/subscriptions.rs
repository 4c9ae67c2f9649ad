use serde_json::json;
use serde_json::Value;
use slvoters::domain::NewsletterId;
use slvoters::domain::VoterId;

use crate::helpers::spawn_app;

#[tokio::test]
async fn subscribe_then_unsubscribe() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    let resp = app
        .post_subscription(id, &json!({"newsletter_id": 3, "source": "form"}))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let entry: Value = resp.json().await.unwrap();
    assert_eq!(entry["newsletter_id"], 3);
    assert_eq!(entry["status"], "subscribed");
    assert_eq!(entry["source"], "form");
    assert_eq!(app.subscribed_ids(id).await, vec![3]);

    let resp = app.delete_subscription(id, 3, Some("link")).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(app.subscribed_ids(id).await, Vec::<i64>::new());

    // the entry is kept, not removed
    let voter: Value = app.get_voter(id).await.json().await.unwrap();
    let subscriptions = voter["subscriptions"].as_array().unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["status"], "unsubscribed");
    assert_eq!(subscriptions[0]["source"], "link");
}

#[tokio::test]
async fn subscribed_ids_keep_insertion_order() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    for n in [7, 2, 5] {
        app.post_subscription(id, &json!({"newsletter_id": n})).await;
    }
    app.post_subscription(id, &json!({"newsletter_id": 9, "status": "pending"}))
        .await;
    // overwriting an entry keeps its position
    app.delete_subscription(id, 2, None).await;
    app.post_subscription(id, &json!({"newsletter_id": 2})).await;

    assert_eq!(app.subscribed_ids(id).await, vec![7, 2, 5]);
}

#[tokio::test]
async fn unsubscribe_without_prior_subscription() {
    let app = spawn_app().await;
    let mut rx = app.events.subscribe();
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;
    app.spool.enqueue(VoterId(id), NewsletterId(4)).await;
    app.spool.enqueue(VoterId(id), NewsletterId(5)).await;

    let resp = app.delete_subscription(id, 4, None).await;
    assert_eq!(resp.status().as_u16(), 200);
    let entry: Value = resp.json().await.unwrap();
    assert_eq!(entry["status"], "unsubscribed");
    assert_eq!(entry["source"], "unknown");

    assert_eq!(
        app.spool.queued().await,
        vec![(VoterId(id), NewsletterId(5))]
    );
    let event = rx.try_recv().unwrap();
    assert_eq!(event.name(), "unsubscribed");
    assert_eq!(event.newsletter_id(), NewsletterId(4));
}

#[tokio::test]
async fn subscribe_publishes_event() {
    let app = spawn_app().await;
    let mut rx = app.events.subscribe();
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    app.post_subscription(id, &json!({"newsletter_id": 1, "status": "pending"}))
        .await;
    assert!(rx.try_recv().is_err());

    app.post_subscription(id, &json!({"newsletter_id": 1})).await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event.name(), "subscribed");
    assert_eq!(event.voter().subscribed_newsletter_ids(), vec![NewsletterId(1)]);
}

#[tokio::test]
async fn resubscribe_overwrites_source() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    app.post_subscription(id, &json!({"newsletter_id": 1, "source": "form"}))
        .await;
    let entry: Value = app
        .post_subscription(id, &json!({"newsletter_id": 1, "source": "import"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(entry["source"], "import");
}

#[tokio::test]
async fn invalid_subscription_requests() {
    let app = spawn_app().await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    for (body, msg) in [
        (json!({"newsletter_id": 1, "source": ""}), "empty source"),
        (json!({"newsletter_id": 1, "source": "a\nb"}), "control character"),
        (json!({"newsletter_id": 1, "source": "x".repeat(65)}), "long source"),
        (json!({"newsletter_id": 1, "status": "maybe"}), "unknown status"),
        (json!({"source": "form"}), "missing newsletter"),
    ] {
        let resp = app.post_subscription(id, &body).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
    }
    assert_eq!(app.delete_subscription(id, 1, Some("")).await.status().as_u16(), 400);

    assert_eq!(
        app.post_subscription(999, &json!({"newsletter_id": 1}))
            .await
            .status()
            .as_u16(),
        404
    );
}
