//! History Reconciliation Integration Tests
//!
//! Feeds raw indexer-shaped records through parsing, status derivation and
//! item assembly, and checks what each party sees.
//!
//! These tests are self-contained and do not require an indexer.
//!
//! Run with: cargo test --test history_test -- --nocapture

use serde_json::{json, Value};
use stackpay::api::FunctionArg;
use stackpay::history::parse_transactions;
use stackpay::{
    build_history, derive_request_statuses, Amount, ClarityValue, Direction, HistoryContracts,
    HistoryFilter, HistoryItem, HistoryStats, RequestKind, RequestStatus, StackPayConfig,
};

const CREATOR: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";
const RECIPIENT: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

// ============================================================================
// Helper Functions
// ============================================================================

fn contracts() -> HistoryContracts {
    HistoryContracts::from_config(&StackPayConfig::default())
}

fn args(values: &[ClarityValue]) -> Vec<FunctionArg> {
    values.iter().map(|v| FunctionArg::from_value("", v)).collect()
}

/// Indexer record for a contract call on the payment contract
fn payment_record(
    tx_id: &str,
    status: &str,
    sender: &str,
    function: &str,
    values: &[ClarityValue],
    time: i64,
) -> Value {
    let config = StackPayConfig::default();
    json!({
        "tx_id": tx_id,
        "tx_status": status,
        "sender_address": sender,
        "tx_type": "contract_call",
        "block_time": time,
        "contract_call": {
            "contract_id": config.payment_contract.to_string(),
            "function_name": function,
            "function_args": args(values),
        },
        "ft_transfers": [],
    })
}

fn with_token_movement(mut record: Value, from: &str, to: &str, amount: u64) -> Value {
    let asset = StackPayConfig::default().asset_identifier();
    record["ft_transfers"] = json!([{
        "asset_identifier": asset,
        "amount": amount.to_string(),
        "sender": from,
        "recipient": to,
    }]);
    record
}

fn create_escrow(tx_id: &str, status: &str, id: &str, amount: u64, time: i64) -> Value {
    payment_record(
        tx_id,
        status,
        CREATOR,
        "create-payment-request",
        &[
            ClarityValue::ascii(id).unwrap(),
            ClarityValue::principal(RECIPIENT).unwrap(),
            ClarityValue::uint(amount),
            ClarityValue::utf8("dinner"),
        ],
        time,
    )
}

fn settle(tx_id: &str, status: &str, sender: &str, function: &str, id: &str, time: i64) -> Value {
    payment_record(tx_id, status, sender, function, &[ClarityValue::ascii(id).unwrap()], time)
}

fn statuses_of(records: Vec<Value>) -> std::collections::BTreeMap<String, RequestStatus> {
    let txs = parse_transactions(records);
    derive_request_statuses(&txs, &contracts().payment_contract)
}

/// Parse, derive statuses and assemble items the way `HistoryService` does
fn history_of(address: &str, records: Vec<Value>) -> Vec<HistoryItem> {
    let txs = parse_transactions(records);
    let contracts = contracts();
    let statuses = derive_request_statuses(&txs, &contracts.payment_contract);
    build_history(address, &txs, &contracts, &statuses)
}

// ============================================================================
// Status derivation
// ============================================================================

#[test]
fn test_earliest_settlement_wins() {
    let statuses = statuses_of(vec![
        settle("0x3", "success", CREATOR, "cancel-payment-request", "r1", 30),
        settle("0x2", "success", RECIPIENT, "claim-payment", "r1", 20),
        create_escrow("0x1", "success", "r1", 5_000_000, 10),
    ]);
    assert_eq!(statuses["r1"], RequestStatus::Completed);
}

#[test]
fn test_creation_outcomes() {
    let statuses = statuses_of(vec![
        create_escrow("0x1", "pending", "mempool", 1_000_000, 0),
        create_escrow("0x2", "abort_by_response", "aborted", 1_000_000, 10),
        create_escrow("0x3", "success", "open", 1_000_000, 20),
    ]);
    assert_eq!(statuses["mempool"], RequestStatus::Pending);
    assert_eq!(statuses["aborted"], RequestStatus::Failed);
    assert_eq!(statuses["open"], RequestStatus::Pending);
}

#[test]
fn test_pending_creation_ignores_settlement() {
    let statuses = statuses_of(vec![
        settle("0x2", "success", RECIPIENT, "claim-payment", "r1", 20),
        create_escrow("0x1", "pending", "r1", 1_000_000, 0),
    ]);
    assert_eq!(statuses["r1"], RequestStatus::Pending);
}

#[test]
fn test_retried_creation_replaces_failed_attempt() {
    // Newest first, as the indexer returns them
    let statuses = statuses_of(vec![
        create_escrow("0x2", "success", "r1", 1_000_000, 20),
        create_escrow("0x1", "abort_by_post_condition", "r1", 1_000_000, 10),
    ]);
    assert_eq!(statuses["r1"], RequestStatus::Pending);

    let statuses = statuses_of(vec![
        create_escrow("0x1", "abort_by_post_condition", "r1", 1_000_000, 10),
        create_escrow("0x2", "success", "r1", 1_000_000, 20),
    ]);
    assert_eq!(statuses["r1"], RequestStatus::Pending);
}

#[test]
fn test_retried_creation_keeps_failed_attempt_item() {
    let items = history_of(
        CREATOR,
        vec![
            create_escrow("0x2", "success", "r1", 1_000_000, 20),
            create_escrow("0x1", "abort_by_post_condition", "r1", 1_000_000, 10),
        ],
    );
    assert_eq!(items.len(), 2);

    let retry = items.iter().find(|i| i.tx_id == "0x2").unwrap();
    let failed = items.iter().find(|i| i.tx_id == "0x1").unwrap();
    assert_eq!(retry.status, RequestStatus::Pending);
    assert_eq!(failed.status, RequestStatus::Failed);
    assert_eq!(failed.id, "r1");
}

#[test]
fn test_failed_attempt_item_after_settled_retry() {
    let mut records = escrow_claimed_log();
    records.push(create_escrow("0x0", "abort_by_response", "r1", 5_000_000, 5));

    let items = history_of(CREATOR, records);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].tx_id, "0x1");
    assert_eq!(items[0].status, RequestStatus::Completed);
    assert_eq!(items[1].tx_id, "0x0");
    assert_eq!(items[1].status, RequestStatus::Failed);

    let stats = HistoryStats::from_items(&items);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_invoice_payment_marks_paid() {
    let invoice = payment_record(
        "0x1",
        "success",
        CREATOR,
        "create-invoice-request",
        &[
            ClarityValue::ascii("inv").unwrap(),
            ClarityValue::principal(RECIPIENT).unwrap(),
            ClarityValue::uint(2_000_000u64),
            ClarityValue::utf8(""),
        ],
        10,
    );
    let paid = settle("0x2", "success", RECIPIENT, "pay-invoice", "inv", 20);

    let statuses = statuses_of(vec![paid, invoice]);
    assert_eq!(statuses["inv"], RequestStatus::Paid);
}

// ============================================================================
// Item assembly
// ============================================================================

fn escrow_claimed_log() -> Vec<Value> {
    vec![
        with_token_movement(
            settle("0x2", "success", RECIPIENT, "claim-payment", "r1", 20),
            &contracts().payment_contract,
            RECIPIENT,
            5_000_000,
        ),
        with_token_movement(
            create_escrow("0x1", "success", "r1", 5_000_000, 10),
            CREATOR,
            &contracts().payment_contract,
            5_000_000,
        ),
    ]
}

#[test]
fn test_creator_sees_completed_request_only() {
    let items = history_of(CREATOR, escrow_claimed_log());

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.id, "r1");
    assert_eq!(item.direction, Direction::Sent);
    assert_eq!(item.status, RequestStatus::Completed);
    assert_eq!(item.memo, "dinner");
    assert_eq!(item.request_kind, Some(RequestKind::Escrow));
}

#[test]
fn test_claimer_sees_request_and_claim() {
    let items = history_of(RECIPIENT, escrow_claimed_log());

    assert_eq!(items.len(), 2);
    // Newest first
    assert_eq!(items[0].direction, Direction::Received);
    assert_eq!(items[0].amount, Amount::from_whole(5));
    assert_eq!(items[0].memo, "Payment Claimed");
    assert_eq!(items[1].direction, Direction::Request);
    assert_eq!(items[1].status, RequestStatus::Completed);

    let requests = HistoryFilter::Requests.apply(&items, RECIPIENT);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sender, CREATOR);

    let stats = HistoryStats::from_items(&items);
    assert_eq!(stats.received, Amount::from_whole(5));
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.count, 2);
}

#[test]
fn test_direct_transfer_and_residual_movement() {
    let config = StackPayConfig::default();
    let transfer = json!({
        "tx_id": "0xt1",
        "tx_status": "success",
        "sender_address": CREATOR,
        "block_time": 50,
        "contract_call": {
            "contract_id": config.token_contract.to_string(),
            "function_name": "transfer",
            "function_args": args(&[
                ClarityValue::uint(1_500_000u64),
                ClarityValue::principal(CREATOR).unwrap(),
                ClarityValue::principal(RECIPIENT).unwrap(),
                ClarityValue::OptionalNone,
            ]),
        },
    });
    // A token movement through some other contract
    let residual = with_token_movement(
        json!({
            "tx_id": "0xt2",
            "tx_status": "success",
            "sender_address": RECIPIENT,
            "block_time": 60,
            "contract_call": {
                "contract_id": "ST000000000000000000002AMW42H.router",
                "function_name": "swap",
            },
        }),
        RECIPIENT,
        CREATOR,
        700_000,
    );

    let items = history_of(CREATOR, vec![residual, transfer]);
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].tx_id, "0xt2");
    assert_eq!(items[0].direction, Direction::Received);
    assert_eq!(items[0].amount, Amount::from_base_units(700_000));

    assert_eq!(items[1].tx_id, "0xt1");
    assert_eq!(items[1].direction, Direction::Sent);
    assert_eq!(items[1].memo, "Direct Transfer");
    assert!(items[1].request_kind.is_none());

    let sent = HistoryFilter::Sent.apply(&items, CREATOR);
    assert_eq!(sent.len(), 1);
}

#[test]
fn test_uninterpretable_call_is_skipped() {
    // Recipient argument is not a principal
    let broken = payment_record(
        "0xbad",
        "success",
        CREATOR,
        "create-payment-request",
        &[
            ClarityValue::ascii("r9").unwrap(),
            ClarityValue::uint(1u32),
            ClarityValue::uint(1u32),
        ],
        5,
    );
    let mut records = escrow_claimed_log();
    records.push(broken);

    let items = history_of(CREATOR, records);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "r1");
}

#[test]
fn test_history_item_wire_shape() {
    let items = history_of(CREATOR, escrow_claimed_log());
    let json = serde_json::to_value(&items[0]).unwrap();

    assert_eq!(json["type"], "sent");
    assert_eq!(json["txId"], "0x1");
    assert_eq!(json["amount"], 5_000_000u64);
    assert_eq!(json["requestKind"], "escrow");
}
