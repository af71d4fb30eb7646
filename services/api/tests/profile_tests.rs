//! services/api/tests/profile_tests.rs
//!
//! Profile CRUD, reader search, onboarding preferences, and the dashboard.

mod support;

use reqwest::Method;
use serde_json::json;
use support::spawn_app;

#[tokio::test]
async fn get_profile_returns_the_bootstrapped_profile() {
    let app = spawn_app().await;
    let session = app.signup("ursula@example.com").await;

    let response = app
        .request(Method::GET, "/api/profile", &session)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], session.user_id.to_string());
    assert_eq!(body["username"], "ursula");
    assert_eq!(body["books_read"], 0);
    assert_eq!(body["current_streak"], 0);
}

#[tokio::test]
async fn patch_profile_updates_username_and_bio() {
    let app = spawn_app().await;
    let session = app.signup("ursula@example.com").await;

    let response = app
        .request(Method::PATCH, "/api/profile", &session)
        .json(&json!({ "username": "  wizard_of_earthsea  ", "bio": "Reads mostly at night." }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "wizard_of_earthsea");
    assert_eq!(body["bio"], "Reads mostly at night.");
    // Untouched fields survive the patch.
    assert!(body["avatar_url"].is_null());
}

#[tokio::test]
async fn patch_profile_rejects_an_empty_username() {
    let app = spawn_app().await;
    let session = app.signup("ursula@example.com").await;

    let response = app
        .request(Method::PATCH, "/api/profile", &session)
        .json(&json!({ "username": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Username cannot be empty");
}

#[tokio::test]
async fn patch_profile_rejects_a_taken_username() {
    let app = spawn_app().await;
    let session = app.signup("first@example.com").await;
    app.signup("bookworm@example.com").await;

    let response = app
        .request(Method::PATCH, "/api/profile", &session)
        .json(&json!({ "username": "bookworm" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "That username is taken");
}

#[tokio::test]
async fn users_search_rejects_an_empty_query() {
    let app = spawn_app().await;
    let session = app.signup("reader@example.com").await;

    let response = app
        .request(Method::GET, "/api/users/search?q=%20", &session)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Search query cannot be empty");
}

#[tokio::test]
async fn users_search_finds_readers_but_never_the_caller() {
    let app = spawn_app().await;
    let caller = app.signup("ann@example.com").await;
    app.signup("anna@example.com").await;
    app.signup("annabel@example.com").await;
    app.signup("boris@example.com").await;

    let response = app
        .request(Method::GET, "/api/users/search?q=ann", &caller)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Vec<serde_json::Value> = response.json().await.unwrap();
    let usernames: Vec<&str> = body
        .iter()
        .map(|p| p["username"].as_str().unwrap())
        .collect();
    assert_eq!(usernames, vec!["anna", "annabel"]);
}

#[tokio::test]
async fn users_search_matches_full_names_too() {
    let app = spawn_app().await;
    let caller = app.signup("reader@example.com").await;
    let novelist = app.signup("dl@example.com").await;
    app.request(Method::PATCH, "/api/profile", &novelist)
        .json(&json!({ "full_name": "Doris Lessing" }))
        .send()
        .await
        .unwrap();

    let response = app
        .request(Method::GET, "/api/users/search?q=lessing", &caller)
        .send()
        .await
        .unwrap();

    let body: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["full_name"], "Doris Lessing");
}

#[tokio::test]
async fn preferences_are_null_before_onboarding() {
    let app = spawn_app().await;
    let session = app.signup("reader@example.com").await;

    let response = app
        .request(Method::GET, "/api/preferences", &session)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn saving_preferences_completes_onboarding() {
    let app = spawn_app().await;
    let session = app.signup("reader@example.com").await;

    let response = app
        .request(Method::PUT, "/api/preferences", &session)
        .json(&json!({
            "favorite_genres": ["Fantasy", "History"],
            "books_read_count": "10-25",
            "pages_per_day": 30,
            "yearly_goal": 24,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let saved: serde_json::Value = response.json().await.unwrap();
    assert_eq!(saved["onboarding_completed"], true);
    assert_eq!(saved["yearly_goal"], 24);

    let fetched: serde_json::Value = app
        .request(Method::GET, "/api/preferences", &session)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["favorite_genres"], json!(["Fantasy", "History"]));
    assert_eq!(fetched["pages_per_day"], 30);
}

#[tokio::test]
async fn preferences_reject_nonpositive_goals() {
    let app = spawn_app().await;
    let session = app.signup("reader@example.com").await;

    let response = app
        .request(Method::PUT, "/api/preferences", &session)
        .json(&json!({ "pages_per_day": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "pages_per_day must be positive");

    let response = app
        .request(Method::PUT, "/api/preferences", &session)
        .json(&json!({ "yearly_goal": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "yearly_goal must be positive");
}

#[tokio::test]
async fn dashboard_uses_default_goals_before_onboarding() {
    let app = spawn_app().await;
    let session = app.signup("reader@example.com").await;

    let response = app
        .request(Method::GET, "/api/dashboard", &session)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["goals"]["yearly_goal"], 12);
    assert_eq!(body["goals"]["pages_per_day"], 20);
    assert_eq!(body["goals"]["completed_this_year"], 0);
    assert_eq!(body["goals"]["progress_percent"], 0);
    assert_eq!(body["stats"]["books_read"], 0);
    assert_eq!(body["recently_completed"], json!([]));
}

#[tokio::test]
async fn dashboard_counts_this_years_finishes_against_the_goal() {
    let app = spawn_app().await;
    let session = app.signup("reader@example.com").await;
    app.request(Method::PUT, "/api/preferences", &session)
        .json(&json!({ "yearly_goal": 4, "pages_per_day": 25 }))
        .send()
        .await
        .unwrap();

    for title in ["One", "Two"] {
        let entry = app
            .add_manual_book(&session, title, Some(100), "reading")
            .await;
        let path = format!("/api/shelf/{}", entry["id"].as_str().unwrap());
        app.request(Method::PATCH, &path, &session)
            .json(&json!({ "status": "completed" }))
            .send()
            .await
            .unwrap();
    }

    let body: serde_json::Value = app
        .request(Method::GET, "/api/dashboard", &session)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["goals"]["yearly_goal"], 4);
    assert_eq!(body["goals"]["completed_this_year"], 2);
    assert_eq!(body["goals"]["progress_percent"], 50);
    assert_eq!(body["recently_completed"].as_array().unwrap().len(), 2);
    assert_eq!(body["profile"]["username"], "reader");
}
