use serde_json::json;
use serde_json::Value;
use slvoters::domain::UserId;
use slvoters::domain::UserRecord;

use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;

fn user(
    id: i64,
    email: &str,
) -> UserRecord {
    let mut user = UserRecord::new(UserId::new(id).unwrap(), email);
    user.set_field("field_first_name", json!("Ada"));
    user.set_field("field_last_name", json!("Lovelace"));
    user
}

#[tokio::test]
async fn create_voter_ok() {
    let app = spawn_app().await;
    let resp = app
        .post_voter(&json!({"email": "john@foo.com", "langcode": "et"}))
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let voter: Value = resp.json().await.unwrap();
    assert!(voter["id"].is_i64());
    assert!(voter["uuid"].is_string());
    assert!(voter["created_at"].is_string());
    assert_eq!(voter["email"], "john@foo.com");
    assert_eq!(voter["status"], true);
    assert_eq!(voter["langcode"], "et");
    assert_eq!(voter["user_id"], Value::Null);
    assert_eq!(voter["subscriptions"], json!([]));

    let id = voter["id"].as_i64().unwrap();
    let loaded: Value = app.get_voter(id).await.json().await.unwrap();
    assert_eq!(loaded, voter);
}

/// A voter created with the email of an existing user is linked to that user
/// and picks up its shared fields
#[tokio::test]
async fn create_voter_links_existing_user() {
    let app = spawn_app().await;
    app.users.insert(user(42, "a@x.com")).await;

    let resp = app
        .post_voter(&json!({
            "email": "a@x.com",
            "fields": {"field_city": "Tartu", "field_first_name": "Augusta"}
        }))
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let voter: Value = resp.json().await.unwrap();
    assert_eq!(voter["user_id"], 42);
    // the user's value wins for shared fields
    assert_eq!(voter["fields"]["field_first_name"], "Ada");
    assert_eq!(voter["fields"]["field_last_name"], "Lovelace");
    assert_eq!(voter["fields"]["field_city"], "Tartu");
}

#[tokio::test]
async fn create_voter_invalid() {
    let app = spawn_app().await;
    for (body, msg) in [
        (json!({}), "missing email"),
        (json!({"email": ""}), "empty email"),
        (json!({"email": "not-an-email"}), "invalid email"),
        (json!({"email": "a@x.com", "fields": {"field_unknown": "x"}}), "unknown field"),
        (json!({"email": "a@x.com", "fields": {"field_city": 3}}), "wrong field type"),
    ] {
        let resp = app.post_voter(&body).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
    }
}

#[tokio::test]
async fn create_voter_twice_conflicts() {
    let app = spawn_app().await;
    app.create_voter(&json!({"email": "a@x.com"})).await;
    let resp = app.post_voter(&json!({"email": "a@x.com"})).await;
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn get_unknown_voter() {
    let app = spawn_app().await;
    assert_eq!(app.get_voter(1234).await.status().as_u16(), 404);
}

#[tokio::test]
async fn update_pushes_shared_fields_to_user() {
    let app = spawn_app().await;
    app.users.insert(user(42, "a@x.com")).await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    let resp = app
        .put_voter(
            id,
            &json!({"fields": {"field_first_name": "Grace", "field_city": "Narva"}}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let user = app.users.get(UserId::new(42).unwrap()).await.unwrap();
    assert_eq!(user.field("field_first_name"), Some(&json!("Grace")));
    assert_eq!(user.field("field_last_name"), Some(&json!("Lovelace")));
    // voter-only field
    assert_eq!(user.field("field_city"), None);
}

#[tokio::test]
async fn update_without_sync_leaves_user_alone() {
    let app = spawn_app_with(false).await;
    app.users.insert(user(42, "a@x.com")).await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    let voter: Value = app
        .put_voter(id, &json!({"fields": {"field_first_name": "Grace"}}))
        .await
        .json()
        .await
        .unwrap();
    // linking does not depend on the sync switch
    assert_eq!(voter["user_id"], 42);

    let user = app.users.get(UserId::new(42).unwrap()).await.unwrap();
    assert_eq!(user.field("field_first_name"), Some(&json!("Ada")));
}

#[tokio::test]
async fn update_can_unlink_and_deactivate() {
    let app = spawn_app().await;
    app.users.insert(user(42, "a@x.com")).await;
    let id = app.create_voter(&json!({"email": "a@x.com"})).await;

    let voter: Value = app
        .put_voter(id, &json!({"user_id": 0, "status": false}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(voter["user_id"], Value::Null);
    assert_eq!(voter["status"], false);

    let resp = app.put_voter(id, &json!({"email": "nope"})).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn update_to_taken_email_conflicts() {
    let app = spawn_app().await;
    app.create_voter(&json!({"email": "a@x.com"})).await;
    let id = app.create_voter(&json!({"email": "b@x.com"})).await;

    let resp = app.put_voter(id, &json!({"email": "a@x.com"})).await;
    assert_eq!(resp.status().as_u16(), 409);

    let voter: Value = app.get_voter(id).await.json().await.unwrap();
    assert_eq!(voter["email"], "b@x.com");
}
