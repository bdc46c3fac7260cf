// tests/api.rs
//! Router-level checks: protocol errors surface as the right HTTP
//! statuses and happy paths answer 200.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use branchchain::address::Address;
use branchchain::api;
use common::two_chain_net;
use tower::ServiceExt;

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn branch_listing_and_lookup() {
    let net = two_chain_net();
    let app = api::router(net.main.clone());

    let resp = app.clone().oneshot(get("/branches")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(get(&format!("/branches/{}", net.branch_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Unknown id: valid txid shape, no registration behind it.
    let resp = app
        .oneshot(get(&format!("/branches/{}", "11".repeat(32))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_round_trip_over_the_router() {
    let net = two_chain_net();
    let app = api::router(net.main.clone());

    let resp = app
        .clone()
        .oneshot(post_json(
            "/transfers",
            serde_json::json!({
                "dest_chain": net.branch_id.to_string(),
                "dest_address": Address::new_key().to_string(),
                "amount": 1000,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // An unregistered destination is a validation failure.
    let resp = app
        .clone()
        .oneshot(post_json(
            "/transfers",
            serde_json::json!({
                "dest_chain": "22".repeat(32),
                "dest_address": Address::new_key().to_string(),
                "amount": 1,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protocol_errors_keep_their_status_classes() {
    let net = two_chain_net();
    let main_app = api::router(net.main.clone());
    let branch_app = api::router(net.branch.clone());

    // Malformed raw hex at the destination boundary.
    let resp = branch_app
        .oneshot(post_json(
            "/step2",
            serde_json::json!({ "raw_step_one": "zz-not-hex" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Contract payout for a mortgage is an authorization failure.
    let contract = Address::new_contract(b"code").to_string();
    let resp = main_app
        .clone()
        .oneshot(post_json(
            "/mortgages",
            serde_json::json!({
                "branch_id": net.branch_id.to_string(),
                "amount": 500,
                "payout": contract,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Rebroadcasting an unknown transfer: no send-info record.
    let resp = main_app
        .oneshot(post_json(
            &format!("/transfers/{}/rebroadcast", "33".repeat(32)),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
