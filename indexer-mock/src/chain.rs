/// In-memory ledger behind the mock indexer
///
/// Executes the slice of token, payment-request and username-registry
/// behaviour the client depends on, and records every submitted call as an
/// indexer transaction so history reconciliation sees realistic records.

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use stackpay::api::{
    BalancesResponse, ContractCallInfo, ContractSource, FtTransfer, FunctionArg,
    FungibleTokenBalance, ReadOnlyResponse, StxBalance, Transaction,
};
use stackpay::signer::{ContractCall, FungibleConditionCode, FungiblePostCondition};
use stackpay::{ClarityValue, StackPayConfig};

const GENESIS_TIME: i64 = 1_700_000_000;
const BLOCK_SECONDS: i64 = 10;

/// Contract identifiers the mock executes calls for
#[derive(Debug, Clone)]
pub struct MockContracts {
    /// `addr.name` of the token contract
    pub token: String,
    /// `addr.name::asset` key used in balances and transfer events
    pub asset_identifier: String,
    pub payment: String,
    pub registry: String,
}

impl MockContracts {
    pub fn from_config(config: &StackPayConfig) -> Self {
        Self {
            token: config.token_contract.to_string(),
            asset_identifier: config.asset_identifier(),
            payment: config.payment_contract.to_string(),
            registry: config.username_contract.to_string(),
        }
    }
}

/// A contract call as broadcast by a wallet
#[derive(Debug, Clone)]
pub struct SubmittedCall {
    pub sender: String,
    pub contract_id: String,
    pub function_name: String,
    pub args: Vec<ClarityValue>,
    pub post_conditions: Vec<FungiblePostCondition>,
}

impl SubmittedCall {
    pub fn from_contract_call(sender: &str, call: &ContractCall) -> Self {
        Self {
            sender: sender.to_string(),
            contract_id: call.contract_id(),
            function_name: call.function_name.clone(),
            args: call.function_args.clone(),
            post_conditions: call.post_conditions.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct RequestEntry {
    creator: String,
    recipient: String,
    amount: u64,
    memo: String,
    invoice: bool,
    status: &'static str,
}

#[derive(Debug, Default)]
struct ChainState {
    balances: HashMap<String, u64>,
    /// username -> address
    usernames: BTreeMap<String, String>,
    requests: HashMap<String, RequestEntry>,
    /// Oldest first
    confirmed: Vec<Transaction>,
    mempool: Vec<(SubmittedCall, Transaction)>,
    tx_counter: u64,
    clock: i64,
}

impl ChainState {
    fn tick(&mut self) -> i64 {
        self.clock += BLOCK_SECONDS;
        GENESIS_TIME + self.clock
    }

    fn next_tx_id(&mut self) -> String {
        self.tx_counter += 1;
        format!("0x{:064x}", self.tx_counter)
    }
}

/// State changes of a call that passed validation
#[derive(Default)]
struct Effects {
    /// (from, to, amount)
    transfers: Vec<(String, String, u64)>,
    request: Option<(String, RequestEntry)>,
    username: Option<(String, String)>,
}

pub struct MockChain {
    contracts: MockContracts,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(contracts: MockContracts) -> Self {
        Self {
            contracts,
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn from_config(config: &StackPayConfig) -> Self {
        Self::new(MockContracts::from_config(config))
    }

    pub fn contracts(&self) -> &MockContracts {
        &self.contracts
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Register a username directly, bypassing the registry call
    pub fn register_username(&self, username: &str, address: &str) {
        log::info!("Seeding @{} -> {}", username, address);
        self.lock()
            .usernames
            .insert(username.to_string(), address.to_string());
    }

    /// Credit token base units; returns the new balance
    pub fn fund(&self, address: &str, amount: u64) -> u64 {
        let mut state = self.lock();
        let balance = state.balances.entry(address.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
        log::info!("Funded {} with {} (balance {})", address, amount, balance);
        *balance
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.lock().balances.get(address).copied().unwrap_or(0)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Execute and confirm a call; failed calls are recorded as aborted
    pub fn submit(&self, call: SubmittedCall) -> Transaction {
        let mut state = self.lock();
        let tx_id = state.next_tx_id();
        let tx = self.apply(&mut state, tx_id, &call);
        state.confirmed.push(tx.clone());
        tx
    }

    /// Queue a call in the mempool without executing it
    pub fn submit_pending(&self, call: SubmittedCall) -> Transaction {
        let mut state = self.lock();
        let tx_id = state.next_tx_id();
        let time = state.tick();
        let tx = self.transaction(&call, tx_id, "pending", Vec::new(), None, Some(time));
        state.mempool.push((call, tx.clone()));
        tx
    }

    /// Execute and confirm every queued call in submission order
    pub fn confirm_pending(&self) -> usize {
        let mut state = self.lock();
        let queued = std::mem::take(&mut state.mempool);
        let count = queued.len();
        for (call, pending) in queued {
            let tx = self.apply(&mut state, pending.tx_id, &call);
            state.confirmed.push(tx);
        }
        count
    }

    fn apply(&self, state: &mut ChainState, tx_id: String, call: &SubmittedCall) -> Transaction {
        let time = state.tick();
        match self.execute(state, call) {
            Ok(effects) => {
                let events = effects.transfers.clone();
                self.commit(state, effects);
                log::info!("{} {} -> success", call.contract_id, call.function_name);
                self.transaction(call, tx_id, "success", events, Some(time), None)
            }
            Err(reason) => {
                log::info!(
                    "{} {} -> abort_by_response ({})",
                    call.contract_id,
                    call.function_name,
                    reason
                );
                self.transaction(call, tx_id, "abort_by_response", Vec::new(), Some(time), None)
            }
        }
    }

    fn execute(&self, state: &ChainState, call: &SubmittedCall) -> Result<Effects, String> {
        let contracts = &self.contracts;
        let mut effects = Effects::default();

        if call.contract_id == contracts.token {
            if call.function_name != "transfer" {
                return Err(format!("unknown token function {}", call.function_name));
            }
            let amount = arg_uint(&call.args, 0)?;
            let from = arg_principal(&call.args, 1)?;
            let to = arg_principal(&call.args, 2)?;
            if from != call.sender {
                return Err("(err u4) sender is not the token owner".to_string());
            }
            if amount == 0 {
                return Err("(err u3) zero amount".to_string());
            }
            effects.transfers.push((from, to, amount));
        } else if call.contract_id == contracts.payment {
            let id = arg_string(&call.args, 0)?;
            let existing = state.requests.get(&id);

            match call.function_name.as_str() {
                "create-payment-request" | "create-invoice-request" => {
                    if existing.is_some() {
                        return Err(format!("(err u100) request {} exists", id));
                    }
                    let recipient = arg_principal(&call.args, 1)?;
                    let amount = arg_uint(&call.args, 2)?;
                    if amount == 0 {
                        return Err("(err u101) zero amount".to_string());
                    }
                    let invoice = call.function_name == "create-invoice-request";
                    if !invoice {
                        effects
                            .transfers
                            .push((call.sender.clone(), contracts.payment.clone(), amount));
                    }
                    let entry = RequestEntry {
                        creator: call.sender.clone(),
                        recipient,
                        amount,
                        memo: arg_string(&call.args, 3).unwrap_or_default(),
                        invoice,
                        status: "pending",
                    };
                    effects.request = Some((id, entry));
                }
                "claim-payment" => {
                    let mut entry = pending_request(existing, &id)?;
                    if entry.invoice {
                        return Err("(err u104) invoices are paid, not claimed".to_string());
                    }
                    if entry.recipient != call.sender {
                        return Err("(err u105) only the recipient can claim".to_string());
                    }
                    effects
                        .transfers
                        .push((contracts.payment.clone(), call.sender.clone(), entry.amount));
                    entry.status = "claimed";
                    effects.request = Some((id, entry));
                }
                "pay-invoice" => {
                    let mut entry = pending_request(existing, &id)?;
                    if !entry.invoice {
                        return Err("(err u106) not an invoice".to_string());
                    }
                    effects
                        .transfers
                        .push((call.sender.clone(), entry.creator.clone(), entry.amount));
                    entry.status = "paid";
                    effects.request = Some((id, entry));
                }
                "cancel-payment-request" => {
                    let mut entry = pending_request(existing, &id)?;
                    if entry.creator != call.sender {
                        return Err("(err u107) only the creator can cancel".to_string());
                    }
                    if !entry.invoice {
                        effects
                            .transfers
                            .push((contracts.payment.clone(), entry.creator.clone(), entry.amount));
                    }
                    entry.status = "cancelled";
                    effects.request = Some((id, entry));
                }
                other => return Err(format!("unknown payment function {}", other)),
            }
        } else if call.contract_id == contracts.registry {
            if call.function_name != "register-username" {
                return Err(format!("unknown registry function {}", call.function_name));
            }
            let name = arg_string(&call.args, 0)?;
            if state.usernames.contains_key(&name) {
                return Err(format!("(err u200) @{} is taken", name));
            }
            if state.usernames.values().any(|a| *a == call.sender) {
                return Err("(err u201) address already has a username".to_string());
            }
            effects.username = Some((name, call.sender.clone()));
        } else {
            return Err(format!("unknown contract {}", call.contract_id));
        }

        self.check_post_conditions(call, &effects.transfers)?;
        self.check_balances(state, &effects.transfers)?;
        Ok(effects)
    }

    fn check_post_conditions(
        &self,
        call: &SubmittedCall,
        transfers: &[(String, String, u64)],
    ) -> Result<(), String> {
        for condition in &call.post_conditions {
            let sent: u64 = if condition.asset == self.contracts.asset_identifier {
                transfers
                    .iter()
                    .filter(|(from, _, _)| *from == condition.address)
                    .map(|(_, _, amount)| amount)
                    .sum()
            } else {
                0
            };
            let expected = condition.amount.base_units();
            let holds = match condition.condition {
                FungibleConditionCode::Eq => sent == expected,
                FungibleConditionCode::Gt => sent > expected,
                FungibleConditionCode::Gte => sent >= expected,
                FungibleConditionCode::Lt => sent < expected,
                FungibleConditionCode::Lte => sent <= expected,
            };
            if !holds {
                return Err(format!(
                    "post-condition failed: {} sent {} (expected {:?} {})",
                    condition.address, sent, condition.condition, expected
                ));
            }
        }
        Ok(())
    }

    fn check_balances(&self, state: &ChainState, transfers: &[(String, String, u64)]) -> Result<(), String> {
        let mut scratch: HashMap<&str, u64> = HashMap::new();
        for (from, to, amount) in transfers {
            let available = *scratch
                .entry(from.as_str())
                .or_insert_with(|| state.balances.get(from).copied().unwrap_or(0));
            if available < *amount {
                return Err(format!("(err u1) insufficient balance for {}", from));
            }
            scratch.insert(from.as_str(), available - amount);
            let credited = *scratch
                .entry(to.as_str())
                .or_insert_with(|| state.balances.get(to).copied().unwrap_or(0));
            scratch.insert(to.as_str(), credited.saturating_add(*amount));
        }
        Ok(())
    }

    fn commit(&self, state: &mut ChainState, effects: Effects) {
        for (from, to, amount) in effects.transfers {
            let debit = state.balances.entry(from).or_insert(0);
            *debit = debit.saturating_sub(amount);
            let credit = state.balances.entry(to).or_insert(0);
            *credit = credit.saturating_add(amount);
        }
        if let Some((id, entry)) = effects.request {
            state.requests.insert(id, entry);
        }
        if let Some((name, address)) = effects.username {
            state.usernames.insert(name, address);
        }
    }

    fn transaction(
        &self,
        call: &SubmittedCall,
        tx_id: String,
        status: &str,
        transfers: Vec<(String, String, u64)>,
        block_time: Option<i64>,
        receipt_time: Option<i64>,
    ) -> Transaction {
        let names = arg_names(&call.function_name);
        let function_args = call
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| FunctionArg::from_value(names.get(i).copied().unwrap_or(""), arg))
            .collect();

        Transaction {
            tx_id,
            tx_status: status.to_string(),
            sender_address: call.sender.clone(),
            tx_type: Some("contract_call".to_string()),
            block_time,
            burn_block_time: block_time,
            receipt_time,
            contract_call: Some(ContractCallInfo {
                contract_id: call.contract_id.clone(),
                function_name: call.function_name.clone(),
                function_args,
            }),
            ft_transfers: transfers
                .into_iter()
                .map(|(from, to, amount)| FtTransfer {
                    asset_identifier: self.contracts.asset_identifier.clone(),
                    amount: amount.to_string(),
                    sender: Some(from),
                    recipient: Some(to),
                })
                .collect(),
        }
    }

    // ========================================================================
    // Indexer reads
    // ========================================================================

    /// Evaluate a read-only function
    pub fn read_only(&self, contract_id: &str, function: &str, args: &[ClarityValue]) -> ReadOnlyResponse {
        match self.evaluate(contract_id, function, args) {
            Ok(value) => ReadOnlyResponse {
                okay: true,
                result: Some(value.to_hex()),
                cause: None,
            },
            Err(cause) => ReadOnlyResponse {
                okay: false,
                result: None,
                cause: Some(cause),
            },
        }
    }

    fn evaluate(&self, contract_id: &str, function: &str, args: &[ClarityValue]) -> Result<ClarityValue, String> {
        let state = self.lock();
        let contracts = &self.contracts;

        if contract_id == contracts.registry {
            match function {
                "get-address" => {
                    let name = arg_string(args, 0)?;
                    return match state.usernames.get(&name) {
                        Some(address) => Ok(ClarityValue::some(principal(address)?)),
                        None => Ok(ClarityValue::OptionalNone),
                    };
                }
                "get-username" => {
                    let address = arg_principal(args, 0)?;
                    let name = state
                        .usernames
                        .iter()
                        .find(|(_, a)| **a == address)
                        .map(|(n, _)| n.clone());
                    return match name {
                        Some(name) => Ok(ClarityValue::some(ClarityValue::StringAscii(name))),
                        None => Ok(ClarityValue::OptionalNone),
                    };
                }
                _ => {}
            }
        } else if contract_id == contracts.payment && function == "get-payment-request" {
            let id = arg_string(args, 0)?;
            return match state.requests.get(&id) {
                Some(entry) => Ok(ClarityValue::some(request_tuple(entry)?)),
                None => Ok(ClarityValue::OptionalNone),
            };
        } else if contract_id == contracts.token && function == "get-balance" {
            let address = arg_principal(args, 0)?;
            let balance = state.balances.get(&address).copied().unwrap_or(0);
            return Ok(ClarityValue::ResponseOk(Box::new(ClarityValue::uint(balance))));
        }

        Err(format!(
            "Unchecked(NoSuchPublicFunction(\"{}\", \"{}\"))",
            contract_id, function
        ))
    }

    /// Data variable value, `None` for unknown variables
    pub fn data_var(&self, contract_id: &str, var: &str) -> Option<ClarityValue> {
        let state = self.lock();
        let contracts = &self.contracts;
        match var {
            "request-count" if contract_id == contracts.payment => {
                Some(ClarityValue::uint(state.requests.len() as u64))
            }
            "username-count" if contract_id == contracts.registry => {
                Some(ClarityValue::uint(state.usernames.len() as u64))
            }
            _ => None,
        }
    }

    /// Map lookup wrapped in an optional, `Err` for unknown maps or keys of
    /// the wrong type
    pub fn map_entry(&self, contract_id: &str, map: &str, key: &ClarityValue) -> Result<ClarityValue, String> {
        let state = self.lock();
        let contracts = &self.contracts;
        let found = if contract_id == contracts.payment && map == "payment-requests" {
            let id = key.as_str().ok_or("request key must be a string")?;
            state.requests.get(id).map(request_tuple).transpose()?
        } else if contract_id == contracts.registry && map == "usernames" {
            let name = key.as_str().ok_or("username key must be a string")?;
            state.usernames.get(name).map(|a| principal(a)).transpose()?
        } else {
            return Err(format!("no map {} in {}", map, contract_id));
        };
        Ok(match found {
            Some(value) => ClarityValue::some(value),
            None => ClarityValue::OptionalNone,
        })
    }

    pub fn balances(&self, address: &str) -> BalancesResponse {
        let state = self.lock();
        let mut response = BalancesResponse {
            stx: Some(StxBalance {
                balance: "0".to_string(),
            }),
            ..Default::default()
        };
        if let Some(balance) = state.balances.get(address) {
            response.fungible_tokens.insert(
                self.contracts.asset_identifier.clone(),
                FungibleTokenBalance {
                    balance: balance.to_string(),
                    total_sent: None,
                    total_received: None,
                },
            );
        }
        response
    }

    /// Confirmed transactions involving `address`, newest first
    pub fn transactions(&self, address: &str, limit: usize) -> Vec<Value> {
        let state = self.lock();
        state
            .confirmed
            .iter()
            .rev()
            .filter(|tx| self.involves(&state, tx, address))
            .take(limit)
            .filter_map(|tx| serde_json::to_value(tx).ok())
            .collect()
    }

    /// Mempool transactions involving `address`, newest first
    pub fn mempool(&self, address: &str, limit: usize) -> Vec<Value> {
        let state = self.lock();
        state
            .mempool
            .iter()
            .rev()
            .map(|(_, tx)| tx)
            .filter(|tx| self.involves(&state, tx, address))
            .take(limit)
            .filter_map(|tx| serde_json::to_value(tx).ok())
            .collect()
    }

    /// Indexed under the sender, principal arguments, transfer parties and
    /// the parties of the referenced payment request
    fn involves(&self, state: &ChainState, tx: &Transaction, address: &str) -> bool {
        if tx.sender_address == address {
            return true;
        }
        let party = |p: &Option<String>| p.as_deref() == Some(address);
        if tx.ft_transfers.iter().any(|t| party(&t.sender) || party(&t.recipient)) {
            return true;
        }
        let Some(call) = &tx.contract_call else {
            return false;
        };
        if call
            .function_args
            .iter()
            .any(|arg| arg.as_principal().as_deref() == Some(address))
        {
            return true;
        }
        if call.contract_id == self.contracts.payment {
            if let Some(entry) = call
                .arg(0)
                .and_then(FunctionArg::as_string)
                .and_then(|id| state.requests.get(&id))
            {
                return entry.creator == address || entry.recipient == address;
            }
        }
        false
    }

    pub fn contract_interface(&self, contract_id: &str) -> Option<Value> {
        let contracts = &self.contracts;
        let (functions, read_only): (&[&str], &[&str]) = if contract_id == contracts.token {
            (&["transfer"], &["get-balance"])
        } else if contract_id == contracts.payment {
            (
                &[
                    "create-payment-request",
                    "create-invoice-request",
                    "claim-payment",
                    "pay-invoice",
                    "cancel-payment-request",
                ],
                &["get-payment-request"],
            )
        } else if contract_id == contracts.registry {
            (&["register-username"], &["get-address", "get-username"])
        } else {
            return None;
        };

        let entries: Vec<Value> = functions
            .iter()
            .map(|name| json!({ "name": name, "access": "public" }))
            .chain(
                read_only
                    .iter()
                    .map(|name| json!({ "name": name, "access": "read_only" })),
            )
            .collect();
        Some(json!({ "functions": entries, "variables": [], "maps": [], "fungible_tokens": [] }))
    }

    pub fn contract_source(&self, contract_id: &str) -> Option<ContractSource> {
        let interface = self.contract_interface(contract_id)?;
        let names: Vec<String> = interface["functions"]
            .as_array()
            .map(|fns| {
                fns.iter()
                    .filter_map(|f| f["name"].as_str())
                    .map(|n| format!(";; ({})", n))
                    .collect()
            })
            .unwrap_or_default();
        Some(ContractSource {
            source: format!(";; mock of {}\n{}\n", contract_id, names.join("\n")),
            publish_height: 1,
            proof: None,
        })
    }
}

fn arg_names(function: &str) -> &'static [&'static str] {
    match function {
        "transfer" => &["amount", "sender", "recipient", "memo"],
        "create-payment-request" | "create-invoice-request" => {
            &["request-id", "recipient", "amount", "memo"]
        }
        "claim-payment" | "pay-invoice" | "cancel-payment-request" => &["request-id"],
        "register-username" => &["username"],
        _ => &[],
    }
}

fn pending_request(entry: Option<&RequestEntry>, id: &str) -> Result<RequestEntry, String> {
    match entry {
        Some(entry) if entry.status == "pending" => Ok(entry.clone()),
        Some(entry) => Err(format!("(err u103) request {} is {}", id, entry.status)),
        None => Err(format!("(err u102) request {} not found", id)),
    }
}

fn principal(address: &str) -> Result<ClarityValue, String> {
    ClarityValue::principal(address).map_err(|e| e.to_string())
}

fn request_tuple(entry: &RequestEntry) -> Result<ClarityValue, String> {
    Ok(ClarityValue::Tuple(vec![
        ("creator".to_string(), principal(&entry.creator)?),
        ("recipient".to_string(), principal(&entry.recipient)?),
        ("amount".to_string(), ClarityValue::uint(entry.amount)),
        ("memo".to_string(), ClarityValue::utf8(&entry.memo)),
        ("is-invoice".to_string(), ClarityValue::Bool(entry.invoice)),
        ("status".to_string(), ClarityValue::StringAscii(entry.status.to_string())),
    ]))
}

fn arg_string(args: &[ClarityValue], index: usize) -> Result<String, String> {
    args.get(index)
        .and_then(ClarityValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("argument {} must be a string", index))
}

fn arg_uint(args: &[ClarityValue], index: usize) -> Result<u64, String> {
    args.get(index)
        .and_then(ClarityValue::as_uint)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| format!("argument {} must be a uint", index))
}

fn arg_principal(args: &[ClarityValue], index: usize) -> Result<String, String> {
    args.get(index)
        .and_then(ClarityValue::as_principal)
        .ok_or_else(|| format!("argument {} must be a principal", index))
}
