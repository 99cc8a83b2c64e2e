//! Transaction-history reconciliation
//!
//! Request status is not a field the indexer exposes; it is derived from the
//! address's own transaction log by correlating contract calls on the request
//! id. Everything here except [`HistoryService`] is a pure function of the
//! transaction list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use crate::amount::Amount;
use crate::api::{ContractCallInfo, StacksApiClient, Transaction};
use crate::c32::looks_like_address;
use crate::config::StackPayConfig;
use crate::error::StackPayError;
use crate::mirror::{self, MirroredRequest, NoMirror, RequestMirror};
use crate::requests::{RequestKind, RequestStatus};
use crate::resolver::Resolver;

const FN_CREATE_ESCROW: &str = "create-payment-request";
const FN_CREATE_INVOICE: &str = "create-invoice-request";
const FN_CLAIM: &str = "claim-payment";
const FN_PAY_INVOICE: &str = "pay-invoice";
const FN_CANCEL: &str = "cancel-payment-request";
const FN_TRANSFER: &str = "transfer";

/// Contracts whose calls are interpreted
#[derive(Clone, Debug)]
pub struct HistoryContracts {
    /// `addr.name` of the payment contract
    pub payment_contract: String,
    /// `addr.name` of the token contract
    pub token_contract: String,
}

impl HistoryContracts {
    pub fn from_config(config: &StackPayConfig) -> Self {
        Self {
            payment_contract: config.payment_contract.to_string(),
            token_contract: config.token_contract.to_string(),
        }
    }

    fn is_token_asset(&self, asset_identifier: &str) -> bool {
        asset_identifier
            .split_once("::")
            .map(|(contract, _)| contract == self.token_contract)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
    /// A request created by someone else that names this address
    Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// Request id, or the tx id for plain transfers
    pub id: String,
    pub tx_id: String,
    pub amount: Amount,
    pub recipient: String,
    pub sender: String,
    pub memo: String,
    pub status: RequestStatus,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_kind: Option<RequestKind>,
}

// ============================================================================
// Record parsing and merging
// ============================================================================

/// Parse raw indexer records, skipping (and logging) malformed ones
pub fn parse_transactions(records: Vec<Value>) -> Vec<Transaction> {
    records
        .into_iter()
        .filter_map(|record| {
            let tx_id = record
                .get("tx_id")
                .and_then(Value::as_str)
                .unwrap_or("<unknown>")
                .to_string();
            match serde_json::from_value::<Transaction>(record) {
                Ok(tx) => Some(tx),
                Err(e) => {
                    log::warn!("Skipping malformed transaction {}: {}", tx_id, e);
                    None
                }
            }
        })
        .collect()
}

/// Union by `tx_id`: mempool entries first, a confirmed entry wins over a
/// mempool entry with the same id
pub fn merge_transactions(confirmed: Vec<Transaction>, mempool: Vec<Transaction>) -> Vec<Transaction> {
    let confirmed_ids: HashSet<String> = confirmed.iter().map(|tx| tx.tx_id.clone()).collect();
    let mut seen = HashSet::new();

    mempool
        .into_iter()
        .filter(|tx| !confirmed_ids.contains(&tx.tx_id))
        .chain(confirmed)
        .filter(|tx| seen.insert(tx.tx_id.clone()))
        .collect()
}

// ============================================================================
// Status derivation
// ============================================================================

fn request_id(call: &ContractCallInfo) -> Option<String> {
    call.arg(0)
        .and_then(|arg| arg.as_string())
        .filter(|id| !id.is_empty())
}

/// Derive the status of every request created in `txs`
///
/// Pass 1 collects the outcome of successful claim/pay/cancel calls per
/// request id. Pass 2 walks the creations: `pending` by default, the pass-1
/// outcome if any, `failed` if the creation did not succeed, and `pending`
/// while the creation itself is unconfirmed.
///
/// When several creations share an id, a confirmed one decides the status,
/// then an unconfirmed one, then a failed one.
pub fn derive_request_statuses(
    txs: &[Transaction],
    payment_contract: &str,
) -> BTreeMap<String, RequestStatus> {
    // Pass 1: earliest successful settlement per id
    let mut outcomes: BTreeMap<String, (RequestStatus, i64)> = BTreeMap::new();
    for tx in txs.iter().filter(|tx| tx.is_success()) {
        let Some(call) = tx.call_to(payment_contract) else {
            continue;
        };
        let outcome = match call.function_name.as_str() {
            FN_CLAIM => RequestStatus::Completed,
            FN_PAY_INVOICE => RequestStatus::Paid,
            FN_CANCEL => RequestStatus::Cancelled,
            _ => continue,
        };
        let Some(id) = request_id(call) else {
            log::warn!("Skipping {} without request id in {}", call.function_name, tx.tx_id);
            continue;
        };

        let timestamp = tx.timestamp();
        outcomes
            .entry(id)
            .and_modify(|existing| {
                if timestamp < existing.1 {
                    *existing = (outcome, timestamp);
                }
            })
            .or_insert((outcome, timestamp));
    }

    // Pass 2: creations
    let mut statuses: BTreeMap<String, (RequestStatus, u8)> = BTreeMap::new();
    for tx in txs {
        let Some(call) = tx.call_to(payment_contract) else {
            continue;
        };
        if call.function_name != FN_CREATE_ESCROW && call.function_name != FN_CREATE_INVOICE {
            continue;
        }
        let Some(id) = request_id(call) else {
            log::warn!("Skipping {} without request id in {}", call.function_name, tx.tx_id);
            continue;
        };

        let settled = outcomes.get(&id).map(|(status, _)| *status);
        let status = creation_status(tx, settled);
        let rank = creation_rank(tx);

        match statuses.get(&id) {
            Some((_, existing)) if *existing >= rank => {}
            _ => {
                statuses.insert(id, (status, rank));
            }
        }
    }

    statuses
        .into_iter()
        .map(|(id, (status, _))| (id, status))
        .collect()
}

/// Status of one creation transaction given its request's settlement
fn creation_status(tx: &Transaction, settled: Option<RequestStatus>) -> RequestStatus {
    if tx.is_pending() {
        RequestStatus::Pending
    } else if !tx.is_success() {
        RequestStatus::Failed
    } else {
        settled.unwrap_or(RequestStatus::Pending)
    }
}

fn creation_rank(tx: &Transaction) -> u8 {
    if tx.is_success() {
        2
    } else if tx.is_pending() {
        1
    } else {
        0
    }
}

// ============================================================================
// Item assembly
// ============================================================================

fn tx_outcome(tx: &Transaction) -> RequestStatus {
    if tx.is_success() {
        RequestStatus::Completed
    } else if tx.is_pending() {
        RequestStatus::Pending
    } else {
        RequestStatus::Failed
    }
}

fn amount_arg(call: &ContractCallInfo, index: usize) -> Result<Amount, String> {
    call.arg(index)
        .and_then(|arg| arg.as_uint())
        .and_then(|v| u64::try_from(v).ok())
        .map(Amount::from_base_units)
        .ok_or_else(|| format!("argument {} is not an amount", index))
}

fn principal_arg(call: &ContractCallInfo, index: usize) -> Result<String, String> {
    call.arg(index)
        .and_then(|arg| arg.as_principal())
        .ok_or_else(|| format!("argument {} is not a principal", index))
}

struct Assembler<'a> {
    address: &'a str,
    contracts: &'a HistoryContracts,
    statuses: &'a BTreeMap<String, RequestStatus>,
}

impl Assembler<'_> {
    /// Items contributed by one transaction's contract call
    fn call_items(&self, tx: &Transaction) -> Result<Vec<HistoryItem>, String> {
        let Some(call) = &tx.contract_call else {
            return Ok(Vec::new());
        };

        if call.contract_id == self.contracts.payment_contract {
            return self.payment_items(tx, call);
        }
        if call.contract_id == self.contracts.token_contract && call.function_name == FN_TRANSFER {
            return self.transfer_item(tx, call);
        }
        Ok(Vec::new())
    }

    fn payment_items(&self, tx: &Transaction, call: &ContractCallInfo) -> Result<Vec<HistoryItem>, String> {
        let kind = match call.function_name.as_str() {
            FN_CREATE_ESCROW => Some(RequestKind::Escrow),
            FN_CREATE_INVOICE => Some(RequestKind::Invoice),
            FN_CLAIM | FN_PAY_INVOICE => None,
            _ => return Ok(Vec::new()),
        };
        let id = request_id(call).ok_or("missing request id")?;

        if let Some(kind) = kind {
            let recipient = principal_arg(call, 1)?;
            let amount = amount_arg(call, 2)?;
            let memo = call
                .arg(3)
                .and_then(|arg| arg.as_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| kind.default_memo().to_string());

            // Each attempt keeps its own outcome; only a confirmed creation
            // carries the settled status of the request
            let status = creation_status(tx, self.statuses.get(&id).copied());

            return Ok(vec![HistoryItem {
                id,
                tx_id: tx.tx_id.clone(),
                amount,
                recipient,
                sender: tx.sender_address.clone(),
                memo,
                status,
                timestamp: tx.timestamp(),
                direction: if tx.sender_address == self.address {
                    Direction::Sent
                } else {
                    Direction::Request
                },
                request_kind: Some(kind),
            }]);
        }

        let transfer = tx
            .ft_transfers
            .iter()
            .find(|ft| self.contracts.is_token_asset(&ft.asset_identifier));
        let amount = match transfer {
            Some(ft) => Amount::parse_base_units(&ft.amount).map_err(|e| e.to_string())?,
            None => Amount::ZERO,
        };

        if call.function_name == FN_CLAIM {
            // The creator sees the claim through the request's status
            if tx.sender_address != self.address {
                return Ok(Vec::new());
            }
            let sender = transfer
                .and_then(|ft| ft.sender.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            return Ok(vec![HistoryItem {
                id,
                tx_id: tx.tx_id.clone(),
                amount,
                recipient: tx.sender_address.clone(),
                sender,
                memo: "Payment Claimed".to_string(),
                status: tx_outcome(tx),
                timestamp: tx.timestamp(),
                direction: Direction::Received,
                request_kind: Some(RequestKind::Escrow),
            }]);
        }

        let recipient = transfer
            .and_then(|ft| ft.recipient.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        if tx.sender_address != self.address && recipient != self.address {
            return Ok(Vec::new());
        }
        Ok(vec![HistoryItem {
            id,
            tx_id: tx.tx_id.clone(),
            amount,
            recipient,
            sender: tx.sender_address.clone(),
            memo: "Invoice Paid".to_string(),
            status: tx_outcome(tx),
            timestamp: tx.timestamp(),
            direction: if tx.sender_address == self.address {
                Direction::Sent
            } else {
                Direction::Received
            },
            request_kind: Some(RequestKind::Invoice),
        }])
    }

    fn transfer_item(&self, tx: &Transaction, call: &ContractCallInfo) -> Result<Vec<HistoryItem>, String> {
        let amount = amount_arg(call, 0)?;
        let sender = principal_arg(call, 1)?;
        let recipient = principal_arg(call, 2)?;

        if sender != self.address && recipient != self.address {
            return Ok(Vec::new());
        }
        let direction = if sender == self.address {
            Direction::Sent
        } else {
            Direction::Received
        };

        Ok(vec![HistoryItem {
            id: tx.tx_id.clone(),
            tx_id: tx.tx_id.clone(),
            amount,
            recipient,
            sender,
            memo: "Direct Transfer".to_string(),
            status: tx_outcome(tx),
            timestamp: tx.timestamp(),
            direction,
            request_kind: None,
        }])
    }

    /// Token movements not explained by an interpreted contract call
    fn residual_transfer_items(&self, tx: &Transaction) -> Vec<HistoryItem> {
        let mut items = Vec::new();
        for ft in &tx.ft_transfers {
            if !self.contracts.is_token_asset(&ft.asset_identifier) {
                continue;
            }
            let sender = ft.sender.clone().unwrap_or_default();
            let recipient = ft.recipient.clone().unwrap_or_default();
            if sender != self.address && recipient != self.address {
                continue;
            }
            let amount = match Amount::parse_base_units(&ft.amount) {
                Ok(amount) => amount,
                Err(e) => {
                    log::warn!("Skipping token transfer in {}: {}", tx.tx_id, e);
                    continue;
                }
            };
            let direction = if sender == self.address {
                Direction::Sent
            } else {
                Direction::Received
            };
            items.push(HistoryItem {
                id: tx.tx_id.clone(),
                tx_id: tx.tx_id.clone(),
                amount,
                recipient,
                sender,
                memo: "Token Transfer".to_string(),
                status: tx_outcome(tx),
                timestamp: tx.timestamp(),
                direction,
                request_kind: None,
            });
            // One residual item per transaction
            break;
        }
        items
    }
}

/// Assemble the history view of `address`, newest first
///
/// `statuses` is the output of [`derive_request_statuses`] over the same
/// `txs`, so every status is known before any item is assembled. A
/// transaction that cannot be interpreted is skipped with a warning.
pub fn build_history(
    address: &str,
    txs: &[Transaction],
    contracts: &HistoryContracts,
    statuses: &BTreeMap<String, RequestStatus>,
) -> Vec<HistoryItem> {
    let assembler = Assembler {
        address,
        contracts,
        statuses,
    };

    let mut items: Vec<HistoryItem> = Vec::new();
    let mut covered: HashSet<String> = HashSet::new();

    for tx in txs {
        match assembler.call_items(tx) {
            Ok(call_items) => {
                for item in call_items {
                    covered.insert(item.tx_id.clone());
                    items.push(item);
                }
            }
            Err(reason) => {
                log::warn!("Skipping transaction {}: {}", tx.tx_id, reason);
                continue;
            }
        }

        if !covered.contains(&tx.tx_id) {
            for item in assembler.residual_transfer_items(tx) {
                covered.insert(item.tx_id.clone());
                items.push(item);
            }
        }
    }

    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items
}

// ============================================================================
// Filters and summary
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    #[default]
    All,
    Sent,
    Received,
    Pending,
    /// Incoming asks created by other addresses
    Requests,
}

impl HistoryFilter {
    pub fn matches(&self, item: &HistoryItem, address: &str) -> bool {
        match self {
            Self::All => true,
            Self::Sent => item.direction == Direction::Sent,
            Self::Received => item.direction == Direction::Received,
            Self::Pending => item.status == RequestStatus::Pending,
            Self::Requests => item.direction == Direction::Request && item.sender != address,
        }
    }

    pub fn apply<'a>(&self, items: &'a [HistoryItem], address: &str) -> Vec<&'a HistoryItem> {
        items.iter().filter(|item| self.matches(item, address)).collect()
    }
}

impl FromStr for HistoryFilter {
    type Err = StackPayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            "pending" => Ok(Self::Pending),
            "requests" => Ok(Self::Requests),
            other => Err(StackPayError::InvalidInput(format!("unknown filter '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Outgoing volume, including requests naming this address
    pub sent: Amount,
    pub received: Amount,
    pub pending: usize,
    pub completed: usize,
    pub count: usize,
}

impl HistoryStats {
    pub fn from_items(items: &[HistoryItem]) -> Self {
        Self {
            sent: items
                .iter()
                .filter(|i| matches!(i.direction, Direction::Sent | Direction::Request))
                .map(|i| i.amount)
                .sum(),
            received: items
                .iter()
                .filter(|i| i.direction == Direction::Received)
                .map(|i| i.amount)
                .sum(),
            pending: items.iter().filter(|i| i.status == RequestStatus::Pending).count(),
            completed: items.iter().filter(|i| i.status == RequestStatus::Completed).count(),
            count: items.len(),
        }
    }
}

/// Reconciled view of one address
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub items: Vec<HistoryItem>,
    pub statuses: BTreeMap<String, RequestStatus>,
    pub stats: HistoryStats,
    /// Registered usernames of counterparties, by address
    pub labels: BTreeMap<String, String>,
    /// Mirrored requests still waiting on this address to claim or pay
    pub pending_claims: Vec<MirroredRequest>,
}

impl HistoryView {
    /// Addresses worth labelling: every counterparty except `address` itself
    pub fn counterparties<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .flat_map(|item| [item.sender.as_str(), item.recipient.as_str()])
            .chain(self.pending_claims.iter().map(|claim| claim.creator.as_str()))
            .filter(move |a| *a != address && looks_like_address(a))
    }
}

// ============================================================================
// Loading
// ============================================================================

#[derive(Clone)]
pub struct HistoryService {
    api: StacksApiClient,
    contracts: HistoryContracts,
    limit: u32,
    resolver: Resolver,
    mirror: Arc<dyn RequestMirror>,
}

impl HistoryService {
    pub fn new(api: StacksApiClient, config: &StackPayConfig) -> Self {
        Self {
            resolver: Resolver::new(api.clone(), config.username_contract.clone()),
            api,
            contracts: HistoryContracts::from_config(config),
            limit: config.history_limit,
            mirror: Arc::new(NoMirror),
        }
    }

    /// Source of the pending-claims list
    pub fn with_mirror(mut self, mirror: Arc<dyn RequestMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    /// Confirmed and mempool transactions of `address`, merged
    ///
    /// A failed read degrades to an empty list for that source.
    pub async fn transactions(&self, address: &str) -> Vec<Transaction> {
        let (confirmed, mempool) = tokio::join!(
            self.api.get_transactions(address, self.limit),
            self.api.get_mempool_transactions(address, self.limit)
        );

        let confirmed = confirmed.unwrap_or_else(|e| {
            log::warn!("Failed to fetch transactions for {}: {}", address, e);
            Vec::new()
        });
        let mempool = mempool.unwrap_or_else(|e| {
            log::warn!("Failed to fetch mempool for {}: {}", address, e);
            Vec::new()
        });

        merge_transactions(parse_transactions(confirmed), parse_transactions(mempool))
    }

    /// Mirrored requests addressed to `address` that the chain does not
    /// already show as settled
    async fn pending_claims(
        &self,
        address: &str,
        statuses: &BTreeMap<String, RequestStatus>,
    ) -> Vec<MirroredRequest> {
        match self.mirror.pending_for_recipient(address).await {
            Ok(claims) => claims
                .into_iter()
                .filter(|claim| {
                    statuses
                        .get(&claim.request_id)
                        .map_or(true, |status| *status == RequestStatus::Pending)
                })
                .collect(),
            Err(e) => {
                mirror::report("query", &e);
                Vec::new()
            }
        }
    }

    pub async fn load(&self, address: &str) -> HistoryView {
        let txs = self.transactions(address).await;
        let statuses = derive_request_statuses(&txs, &self.contracts.payment_contract);
        let items = build_history(address, &txs, &self.contracts, &statuses);
        let stats = HistoryStats::from_items(&items);
        let pending_claims = self.pending_claims(address, &statuses).await;

        let mut view = HistoryView {
            items,
            statuses,
            stats,
            labels: BTreeMap::new(),
            pending_claims,
        };
        let labels = self.resolver.resolve_labels(view.counterparties(address)).await;
        view.labels = labels;

        log::debug!(
            "History for {}: {} transactions, {} items, {} labels, {} pending claims",
            address,
            txs.len(),
            view.items.len(),
            view.labels.len(),
            view.pending_claims.len()
        );
        view
    }
}
