#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, unreachable_pub)]
use push_relay::domain::push::{DeliveryStatus, ProviderReceipt, PushErrorDetails};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
mod common;

use common::{RecordingProvider, TestApp};

fn error_receipt(message: &str, code: Option<&str>) -> ProviderReceipt {
    ProviderReceipt {
        status: DeliveryStatus::Error,
        message: Some(message.to_string()),
        details: code.map(|c| PushErrorDetails { error: Some(c.to_string()), ..PushErrorDetails::default() }),
    }
}

#[tokio::test]
async fn test_tickets_without_id_are_not_looked_up() {
    let app = TestApp::spawn_with_provider(RecordingProvider {
        receipts: HashMap::from([("r1".to_string(), ProviderReceipt::default())]),
        ..RecordingProvider::default()
    })
    .await;

    let resp = app
        .post_json(
            "/v1/push/receipts",
            &json!({ "tickets": [{ "id": "r1" }, { "status": "error", "message": "device not registered" }] }),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(*app.provider.looked_up.lock().unwrap(), vec![vec!["r1".to_string()]]);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["receipts"], json!([{ "id": "r1", "status": "ok" }]));
}

#[tokio::test]
async fn test_error_receipts_are_returned_with_details() {
    let app = TestApp::spawn_with_provider(RecordingProvider {
        receipts: HashMap::from([
            ("r1".to_string(), ProviderReceipt::default()),
            ("r2".to_string(), error_receipt("The device is gone", Some("DeviceNotRegistered"))),
            ("r3".to_string(), error_receipt("Something odd", None)),
        ]),
        ..RecordingProvider::default()
    })
    .await;

    let resp = app
        .post_json("/v1/push/receipts", &json!({ "tickets": [{ "id": "r1" }, { "id": "r2" }, { "id": "r3" }] }))
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["receipts"],
        json!([
            { "id": "r1", "status": "ok" },
            { "id": "r2", "status": "error", "message": "The device is gone", "details": { "error": "DeviceNotRegistered" } },
            { "id": "r3", "status": "error", "message": "Something odd" }
        ])
    );
}

#[tokio::test]
async fn test_all_receipt_chunks_are_queried() {
    let receipts = (0..5).map(|n| (format!("r{n}"), ProviderReceipt::default())).collect();
    let app =
        TestApp::spawn_with_provider(RecordingProvider { chunk_limit: Some(2), receipts, ..RecordingProvider::default() })
            .await;

    let tickets: Vec<Value> = (0..5).map(|n| json!({ "id": format!("r{n}"), "status": "ok" })).collect();
    let resp = app.post_json("/v1/push/receipts", &json!({ "tickets": tickets })).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.provider.looked_up.lock().unwrap().len(), 3);
    let body: Value = resp.json().await.unwrap();
    let ids: Vec<&str> = body["receipts"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["r0", "r1", "r2", "r3", "r4"]);
}

#[tokio::test]
async fn test_no_receipt_ids_returns_empty_list() {
    let app = TestApp::spawn().await;

    let resp = app.post_json("/v1/push/receipts", &json!({ "tickets": [{ "status": "error", "message": "nope" }] })).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["receipts"], json!([]));
    assert!(app.provider.looked_up.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_every_lookup_failing_returns_bad_gateway() {
    let app = TestApp::spawn_with_provider(RecordingProvider {
        failing_calls: HashSet::from([0]),
        ..RecordingProvider::default()
    })
    .await;

    let resp = app.post_json("/v1/push/receipts", &json!({ "tickets": [{ "id": "r1" }] })).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No receipts could be queried");
    assert_eq!(body["failures"][0]["error"], "Rate limit exceeded");
}
