//! Integration tests for auth: register, login, and the authenticated
//! profile endpoint.

mod common;

use common::{register_user, spawn_app, test_app_state};
use serde_json::Value;

#[tokio::test]
async fn register_returns_201_with_token_and_starting_balance() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "secret123",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 201);
    let json: Value = res.json().await.unwrap();
    assert!(json.get("token").and_then(|v| v.as_str()).is_some());
    assert!(json.get("user_id").and_then(|v| v.as_str()).is_some());
    assert_eq!(json["email"].as_str(), Some("alice@example.com"));
    assert_eq!(
        common::dec_field(&json["wallet_balance"]),
        rust_decimal::Decimal::from(100_000)
    );
}

#[tokio::test]
async fn register_missing_fields_returns_400() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({ "name": "", "email": "a@b.com", "password": "pw" }),
        serde_json::json!({ "name": "Al", "email": "", "password": "pw" }),
        serde_json::json!({ "name": "Al", "email": "a@b.com", "password": "" }),
    ] {
        let res = client
            .post(format!("{}/auth/register", base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 400);
        let json: Value = res.json().await.unwrap();
        assert!(json["error"].as_str().unwrap().contains("required"));
    }
}

#[tokio::test]
async fn register_invalid_email_returns_400() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "name": "Bob",
            "email": "not-an-email",
            "password": "secret123",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_email_returns_400() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    register_user(&client, &base_url, "Bob", "bob@example.com").await;

    let res = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "name": "Bob Again",
            "email": "bob@example.com",
            "password": "another",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let json: Value = res.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn register_then_login_returns_token() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    register_user(&client, &base_url, "Carol", "carol@example.com").await;

    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "carol@example.com", "password": "secret123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let json: Value = res.json().await.unwrap();
    assert!(json.get("token").and_then(|v| v.as_str()).is_some());
    assert_eq!(json["name"].as_str(), Some("Carol"));
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    register_user(&client, &base_url, "Dana", "Dana@Example.com").await;

    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "dana@example.com", "password": "secret123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
}

#[tokio::test]
async fn login_wrong_password_returns_401() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    register_user(&client, &base_url, "Dave", "dave@example.com").await;

    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "dave@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 401);
}

#[tokio::test]
async fn login_unknown_user_returns_401() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({ "email": "nobody@example.com", "password": "any" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 401);
}

#[tokio::test]
async fn me_returns_profile_with_wallet_balance() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let (token, user_id) = register_user(&client, &base_url, "Erin", "erin@example.com").await;

    let res = client
        .get(format!("{}/auth/me", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["user_id"].as_str(), Some(user_id.as_str()));
    assert_eq!(json["email"].as_str(), Some("erin@example.com"));
    assert_eq!(
        common::dec_field(&json["wallet_balance"]),
        rust_decimal::Decimal::from(100_000)
    );
}

#[tokio::test]
async fn me_without_token_returns_401() {
    let (base_url, _handle) = spawn_app(test_app_state()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/auth/me", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let res = client
        .get(format!("{}/auth/me", base_url))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);
}
