/// End-to-end payment flows: the wallet side signs through the library
/// into the mock chain, the service reads back through the indexer API.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{json, Value};
use stackpay::Amount;

#[tokio::test]
async fn test_transfer_to_username() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(50), Amount::ZERO);

    // Prepare resolves @bob and runs the guards
    let response = env
        .server
        .post("/api/prepare/transfer")
        .json(&json!({ "sender": ALICE, "recipient": "@bob", "amount": "12.5" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["recipient"], BOB);
    assert_eq!(body["call"]["functionName"], "transfer");
    assert_eq!(body["call"]["postConditions"][0]["amount"], 12_500_000u64);

    // The wallet signs and broadcasts
    let txid = env
        .transfers_as(ALICE)
        .await
        .send(BOB, "12.5".parse().unwrap())
        .await
        .unwrap();

    let body: Value = env.server.get(&format!("/api/balance/{}", BOB)).await.json();
    assert_eq!(body["balance"], "12.5");

    let body: Value = env.server.get(&format!("/api/history/{}", ALICE)).await.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["txId"], txid.as_str());
    assert_eq!(items[0]["type"], "sent");
    assert_eq!(items[0]["status"], "completed");

    let body: Value = env
        .server
        .get(&format!("/api/history/{}", BOB))
        .add_query_param("filter", "received")
        .await
        .json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_transfer_guards() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(5), Amount::ZERO);

    let over = env
        .server
        .post("/api/prepare/transfer")
        .json(&json!({ "sender": ALICE, "recipient": "@bob", "amount": "10" }))
        .await;
    assert_eq!(over.status_code(), StatusCode::BAD_REQUEST);

    let to_self = env
        .server
        .post("/api/prepare/transfer")
        .json(&json!({ "sender": ALICE, "recipient": "@alice", "amount": "1" }))
        .await;
    assert_eq!(to_self.status_code(), StatusCode::BAD_REQUEST);

    let bad_amount = env
        .server
        .post("/api/prepare/transfer")
        .json(&json!({ "sender": ALICE, "recipient": "@bob", "amount": "ten" }))
        .await;
    assert_eq!(bad_amount.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_escrow_claim_lifecycle() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(50), Amount::ZERO);

    let response = env
        .server
        .post("/api/prepare/escrow")
        .json(&json!({ "creator": ALICE, "recipient": "@bob", "amount": "20", "id": "req-1" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["requestId"], "req-1");
    assert_eq!(body["paymentUrl"], "http://localhost:5173/pay/req-1");
    assert_eq!(body["call"]["functionName"], "create-payment-request");

    env.requests_as(ALICE)
        .await
        .create_escrow("req-1", BOB, Amount::from_whole(20), "")
        .await
        .unwrap();
    assert_eq!(env.chain.balance_of(ALICE), 30_000_000);

    let body: Value = env.server.get("/pay/req-1").await.json();
    assert_eq!(body["request"]["status"], "pending");
    assert_eq!(body["request"]["kind"], "escrow");
    assert_eq!(body["request"]["memo"], "Payment Request");

    // Only the recipient may claim
    let response = env
        .server
        .post("/api/prepare/claim")
        .json(&json!({ "id": "req-1", "caller": ALICE }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = env
        .server
        .post("/api/prepare/claim")
        .json(&json!({ "id": "req-1", "caller": BOB }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["action"], "claim");
    assert_eq!(body["call"]["functionName"], "claim-payment");

    env.requests_as(BOB)
        .await
        .claim("req-1", Amount::from_whole(20))
        .await
        .unwrap();
    assert_eq!(env.chain.balance_of(BOB), 20_000_000);

    let body: Value = env.server.get("/api/requests/req-1").await.json();
    assert_eq!(body["request"]["status"], "completed");

    // Creator sees the request as completed
    let body: Value = env.server.get(&format!("/api/history/{}", ALICE)).await.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "req-1");
    assert_eq!(items[0]["status"], "completed");

    // Claimer sees the incoming request and the claim
    let body: Value = env.server.get(&format!("/api/history/{}", BOB)).await.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|i| i["type"] == "received" && i["amount"] == 20_000_000u64));
    assert!(items.iter().any(|i| i["type"] == "request" && i["status"] == "completed"));

    // A settled request cannot be claimed again
    let response = env
        .server
        .post("/api/prepare/claim")
        .json(&json!({ "id": "req-1", "caller": BOB }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invoice_is_paid_not_claimed() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(10), Amount::ZERO);

    env.requests_as(BOB)
        .await
        .create_invoice("inv-1", ALICE, Amount::from_whole(4), "rent share")
        .await
        .unwrap();

    let response = env
        .server
        .post("/api/prepare/claim")
        .json(&json!({ "id": "inv-1", "caller": ALICE }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["action"], "pay-invoice");
    assert_eq!(body["call"]["functionName"], "pay-invoice");

    env.requests_as(ALICE)
        .await
        .pay_invoice("inv-1", Amount::from_whole(4))
        .await
        .unwrap();
    assert_eq!(env.chain.balance_of(BOB), 4_000_000);

    let body: Value = env.server.get("/api/requests/inv-1").await.json();
    assert_eq!(body["request"]["status"], "paid");

    let body: Value = env.server.get(&format!("/api/history/{}", BOB)).await.json();
    let items = body["items"].as_array().unwrap();
    assert!(items.iter().any(|i| i["id"] == "inv-1" && i["status"] == "paid"));
}

#[tokio::test]
async fn test_pending_creation_shows_as_pending() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(10), Amount::ZERO);

    env.pending_requests_as(ALICE)
        .await
        .create_escrow("req-9", BOB, Amount::from_whole(3), "coffee")
        .await
        .unwrap();

    let body: Value = env
        .server
        .get(&format!("/api/history/{}", ALICE))
        .add_query_param("filter", "pending")
        .await
        .json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "req-9");
    assert_eq!(items[0]["memo"], "coffee");

    env.chain.confirm_pending();
    let body: Value = env
        .server
        .get(&format!("/api/history/{}", ALICE))
        .add_query_param("filter", "pending")
        .await
        .json();
    // Confirmed but unclaimed is still pending
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["stats"]["pending"], 1);
}

#[tokio::test]
async fn test_cancel_only_by_creator() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(10), Amount::ZERO);

    env.requests_as(ALICE)
        .await
        .create_escrow("req-5", BOB, Amount::from_whole(5), "")
        .await
        .unwrap();

    let response = env
        .server
        .post("/api/prepare/cancel")
        .json(&json!({ "id": "req-5", "caller": BOB }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = env
        .server
        .post("/api/prepare/cancel")
        .json(&json!({ "id": "req-5", "caller": ALICE }))
        .await;
    response.assert_status_ok();

    env.requests_as(ALICE).await.cancel("req-5").await.unwrap();
    assert_eq!(env.chain.balance_of(ALICE), 10_000_000);

    let body: Value = env.server.get("/api/requests/req-5").await.json();
    assert_eq!(body["request"]["status"], "cancelled");

    let response = env.server.get("/api/requests/missing").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_labels_and_pending_claims() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(30), Amount::ZERO);

    env.mirrored_requests_as(ALICE)
        .await
        .create_escrow("req-7", BOB, Amount::from_whole(6), "tickets")
        .await
        .unwrap();

    let body: Value = env.server.get(&format!("/api/history/{}", BOB)).await.json();
    assert_eq!(body["labels"][ALICE], "alice");
    assert!(body["labels"].get(BOB).is_none());
    let claims = body["pendingClaims"].as_array().unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0]["requestId"], "req-7");
    assert_eq!(claims[0]["creator"], ALICE);

    // The creator has nothing to claim
    let body: Value = env.server.get(&format!("/api/history/{}", ALICE)).await.json();
    assert!(body["pendingClaims"].as_array().unwrap().is_empty());
    assert_eq!(body["labels"][BOB], "bob");

    env.mirrored_requests_as(BOB)
        .await
        .claim("req-7", Amount::from_whole(6))
        .await
        .unwrap();
    let body: Value = env.server.get(&format!("/api/history/{}", BOB)).await.json();
    assert!(body["pendingClaims"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_settled_request_hidden_from_pending_claims() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(30), Amount::ZERO);

    // Mirrored at creation, but the claim bypasses the mirror
    env.mirrored_requests_as(ALICE)
        .await
        .create_escrow("req-8", BOB, Amount::from_whole(2), "")
        .await
        .unwrap();
    env.requests_as(BOB)
        .await
        .claim("req-8", Amount::from_whole(2))
        .await
        .unwrap();

    // The mirror still says pending; the chain log says completed
    let body: Value = env.server.get("/api/requests/req-8").await.json();
    assert_eq!(body["request"]["status"], "pending");

    let body: Value = env.server.get(&format!("/api/history/{}", BOB)).await.json();
    assert!(body["pendingClaims"].as_array().unwrap().is_empty());
    assert!(body["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["id"] == "req-8" && i["status"] == "completed"));
}

#[tokio::test]
async fn test_dot_segment_request_ids_rejected() {
    let env = TestEnvironment::new().await.unwrap();
    env.seed_users(Amount::from_whole(50), Amount::ZERO);

    for id in [".", ".."] {
        let response = env
            .server
            .post("/api/prepare/escrow")
            .json(&json!({ "creator": ALICE, "recipient": "@bob", "amount": "1", "id": id }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "id {:?}", id);

        let response = env
            .server
            .post("/api/prepare/invoice")
            .json(&json!({ "creator": ALICE, "recipient": "@bob", "amount": "1", "id": id }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "id {:?}", id);
    }
}
