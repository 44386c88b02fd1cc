//! The light node: lifecycle coordinator, polling worker, and the
//! registries that give the outside world stable handles.
//!
//! A node owns one account on one network. After `connect` it runs a
//! polling worker that, every cycle, asks the injected [`ClientPort`]
//! to refresh chain-derived facts; results come back asynchronously
//! through the `announce_*` entry points, which mutate the registries
//! under the node lock and emit listener events.
//!
//! Locking discipline: one non-recursive mutex guards all node state.
//! Any function that reads or mutates a registry takes it; the worker
//! acquires it once per cycle around all refresh dispatch; it is never
//! held across an `.await`. Listener delivery happens on the event
//! bus dispatcher, outside the lock, so announce paths cannot
//! re-enter a locked region.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_signer_local::PrivateKeySigner;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::account::{self, Account};
use crate::client::{ClientPort, NodeType, RequestId};
use crate::config::NodeConfig;
use crate::event::{
    BlockEventKind, Event, EventBus, EventStatus, Listener, TransactionEventKind, WalletEventKind,
};
use crate::network::Network;
use crate::registry::Registry;
use crate::token::{self, Token};
use crate::transaction::Transaction;
use crate::types::{
    Amount, Block, BlockId, Gas, GasPrice, ListenerId, TransactionId, WalletId, Wei,
};
use crate::wallet::Wallet;

/// Lifecycle states of a node.
///
/// ```text
/// Created ──connect──▶ Connecting ──worker──▶ Connected
/// Connected ──disconnect──▶ Disconnecting ──worker exit──▶ Disconnected
/// Disconnected/Errored ──connect──▶ Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Created,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Errored,
}

/// A transaction-history entry as reported by the remote backend.
#[derive(Debug, Clone)]
pub struct TransactionBundle {
    pub hash: B256,
    pub from: Address,
    pub to: Address,
    /// Transferred value in WEI.
    pub amount: U256,
    pub gas_limit: Gas,
    pub gas_price: GasPrice,
    pub data: Bytes,
    pub nonce: u64,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub block_timestamp: Option<u64>,
    /// The remote side reported the transaction as failed.
    pub failed: bool,
}

/// A contract log entry as reported by the remote backend. The node
/// only consumes ERC20 Transfer logs; anything else is ignored.
#[derive(Debug, Clone)]
pub struct LogBundle {
    pub transaction_hash: B256,
    pub contract: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub block_timestamp: Option<u64>,
}

struct NodeInner {
    state: NodeState,
    node_type: NodeType,
    client: Option<Arc<dyn ClientPort>>,
    wallets: Registry<Wallet>,
    transactions: Registry<Transaction>,
    blocks: Registry<Block>,
    block_height: u64,
    /// Next account nonce to assign at signing time; advanced by
    /// remote nonce announcements and by local signing.
    next_nonce: u64,
    request_id: u64,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl NodeInner {
    fn next_request_id(&mut self) -> RequestId {
        self.request_id += 1;
        RequestId(self.request_id)
    }
}

/// Resolve the client to dispatch through for the current node type.
/// `Les` currently falls through to the JSON-RPC dispatch path.
fn client_for_dispatch(inner: &NodeInner) -> Option<Arc<dyn ClientPort>> {
    match inner.node_type {
        NodeType::Les | NodeType::JsonRpc => inner.client.clone(),
        NodeType::None => None,
    }
}

/// The in-process coordinator for one account on one network.
pub struct LightNode {
    network: Network,
    account: Account,
    config: NodeConfig,
    inner: Mutex<NodeInner>,
    bus: EventBus,
}

impl LightNode {
    /// Create a node with default configuration. Must be called from
    /// within a Tokio runtime; the event dispatcher starts
    /// immediately. The ether-holding wallet is created here and is
    /// always [`WalletId`] 0.
    pub fn new(network: Network, account: Account) -> Arc<Self> {
        Self::with_config(network, account, NodeConfig::default())
    }

    pub fn with_config(network: Network, account: Account, config: NodeConfig) -> Arc<Self> {
        let node = Arc::new(LightNode {
            network,
            account,
            inner: Mutex::new(NodeInner {
                state: NodeState::Created,
                node_type: config.node_type,
                client: None,
                wallets: Registry::new(),
                transactions: Registry::new(),
                blocks: Registry::new(),
                block_height: 0,
                next_nonce: 0,
                request_id: 0,
                cancel: CancellationToken::new(),
                worker: None,
            }),
            config,
            bus: EventBus::start(),
        });
        let ether_wallet = Wallet::new(account.primary_address(), network);
        {
            let mut inner = node.locked();
            node.insert_wallet_locked(&mut inner, ether_wallet);
        }
        node
    }

    fn locked(&self) -> MutexGuard<'_, NodeInner> {
        self.inner.lock().expect("node lock poisoned")
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn state(&self) -> NodeState {
        self.locked().state
    }

    pub fn block_height(&self) -> u64 {
        self.locked().block_height
    }

    //
    // Listeners
    //

    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> ListenerId {
        self.bus.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.bus.has_listener(id)
    }

    //
    // Connect / disconnect
    //

    /// Store the client and start the polling worker. Returns `false`
    /// without side effects when a connection is already being set up
    /// or torn down, and flips the node to [`NodeState::Errored`] when
    /// no runtime is available to spawn the worker on.
    pub fn connect(self: &Arc<Self>, client: Arc<dyn ClientPort>) -> bool {
        let mut inner = self.locked();
        match inner.state {
            NodeState::Connecting | NodeState::Connected | NodeState::Disconnecting => {
                return false;
            }
            NodeState::Created | NodeState::Disconnected | NodeState::Errored => {}
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            inner.state = NodeState::Errored;
            tracing::error!(network = %self.network, "connect failed: no runtime for the poll worker");
            return false;
        };

        // The client and the Connecting state must both be published
        // before the worker can observe anything.
        inner.client = Some(client);
        inner.state = NodeState::Connecting;
        inner.cancel = CancellationToken::new();
        let cancel = inner.cancel.clone();
        let node = Arc::clone(self);
        inner.worker = Some(runtime.spawn(poll_loop(node, cancel)));
        tracing::info!(network = %self.network, account = %self.account, "light node connecting");
        true
    }

    /// Ask the worker to stop. Asynchronous: the node reaches
    /// [`NodeState::Disconnected`] once the worker observes the state
    /// change and exits. Idempotent.
    pub fn disconnect(&self) -> bool {
        let mut inner = self.locked();
        if matches!(inner.state, NodeState::Connecting | NodeState::Connected) {
            inner.state = NodeState::Disconnecting;
            tracing::info!(network = %self.network, "light node disconnecting");
        }
        inner.cancel.cancel();
        true
    }

    /// Disconnect and wait for the worker and the event dispatcher to
    /// finish. After this the node can be dropped safely or
    /// reconnected (the event bus, however, is gone: shutdown is
    /// terminal for event delivery).
    pub async fn shutdown(&self) {
        self.disconnect();
        let worker = self.locked().worker.take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        self.bus.shutdown().await;
    }

    fn publish_connected(&self) {
        let mut inner = self.locked();
        if inner.state == NodeState::Connecting {
            inner.state = NodeState::Connected;
            tracing::info!(network = %self.network, "light node connected");
        }
    }

    fn publish_disconnected(&self) {
        let mut inner = self.locked();
        inner.state = NodeState::Disconnected;
        tracing::info!(network = %self.network, "light node disconnected");
    }

    fn disconnecting(&self) -> bool {
        self.locked().state == NodeState::Disconnecting
    }

    //
    // Wallets
    //

    /// The ether-holding wallet, created at node init.
    pub fn wallet(&self) -> WalletId {
        WalletId(0)
    }

    /// Find the wallet holding `token`, creating it on first use.
    /// Idempotent: at most one wallet exists per token.
    pub fn wallet_holding_token(&self, token: &Token) -> WalletId {
        let mut inner = self.locked();
        self.wallet_holding_token_locked(&mut inner, token)
    }

    fn wallet_holding_token_locked(&self, inner: &mut NodeInner, token: &Token) -> WalletId {
        if let Some(index) = inner.wallets.position(|w| w.holds_token(token)) {
            return WalletId(index);
        }
        let wallet =
            Wallet::holding_token(self.account.primary_address(), self.network, token.clone());
        self.insert_wallet_locked(inner, wallet)
    }

    fn insert_wallet_locked(&self, inner: &mut NodeInner, wallet: Wallet) -> WalletId {
        let wid = WalletId(inner.wallets.insert(wallet));
        self.emit_wallet_event(wid, WalletEventKind::Created, EventStatus::Success, None);
        wid
    }

    pub fn wallet_token(&self, wallet: WalletId) -> Option<Token> {
        self.locked()
            .wallets
            .get(wallet.0)
            .and_then(|w| w.token().cloned())
    }

    pub fn wallet_balance(&self, wallet: WalletId) -> Option<Amount> {
        self.locked()
            .wallets
            .get(wallet.0)
            .map(|w| w.balance().clone())
    }

    pub fn wallet_default_gas_limit(&self, wallet: WalletId) -> Option<Gas> {
        self.locked()
            .wallets
            .get(wallet.0)
            .map(|w| w.default_gas_limit())
    }

    pub fn wallet_default_gas_price(&self, wallet: WalletId) -> Option<GasPrice> {
        self.locked()
            .wallets
            .get(wallet.0)
            .map(|w| w.default_gas_price())
    }

    pub fn wallet_set_default_gas_limit(&self, wallet: WalletId, gas_limit: Gas) {
        let mut inner = self.locked();
        match inner.wallets.get_mut(wallet.0) {
            Some(w) => {
                w.set_default_gas_limit(gas_limit);
                self.emit_wallet_event(
                    wallet,
                    WalletEventKind::DefaultGasLimitUpdated,
                    EventStatus::Success,
                    None,
                );
            }
            None => self.emit_wallet_event(
                wallet,
                WalletEventKind::DefaultGasLimitUpdated,
                EventStatus::UnknownWallet,
                None,
            ),
        }
    }

    pub fn wallet_set_default_gas_price(&self, wallet: WalletId, gas_price: GasPrice) {
        let mut inner = self.locked();
        match inner.wallets.get_mut(wallet.0) {
            Some(w) => {
                w.set_default_gas_price(gas_price);
                self.emit_wallet_event(
                    wallet,
                    WalletEventKind::DefaultGasPriceUpdated,
                    EventStatus::Success,
                    None,
                );
            }
            None => self.emit_wallet_event(
                wallet,
                WalletEventKind::DefaultGasPriceUpdated,
                EventStatus::UnknownWallet,
                None,
            ),
        }
    }

    //
    // Transactions
    //

    /// Build a transaction through the wallet's defaults, insert it
    /// into the node's table, and hand it to the wallet. Emits
    /// `Created` then `Added`. Returns `None` for an unknown wallet.
    pub fn wallet_create_transaction(
        &self,
        wallet: WalletId,
        to: Address,
        amount: Amount,
    ) -> Option<TransactionId> {
        let mut inner = self.locked();
        let transaction = inner.wallets.get(wallet.0)?.create_transaction(to, amount);
        Some(self.insert_wallet_transaction_locked(&mut inner, wallet, transaction))
    }

    /// As [`LightNode::wallet_create_transaction`], with explicit gas
    /// parameters and calldata.
    pub fn wallet_create_transaction_generic(
        &self,
        wallet: WalletId,
        to: Address,
        amount: Wei,
        gas_price: GasPrice,
        gas_limit: Gas,
        data: Bytes,
    ) -> Option<TransactionId> {
        let mut inner = self.locked();
        let transaction = inner
            .wallets
            .get(wallet.0)?
            .create_transaction_generic(to, amount, gas_price, gas_limit, data);
        Some(self.insert_wallet_transaction_locked(&mut inner, wallet, transaction))
    }

    fn insert_wallet_transaction_locked(
        &self,
        inner: &mut NodeInner,
        wallet: WalletId,
        transaction: Transaction,
    ) -> TransactionId {
        let tid = TransactionId(inner.transactions.insert(transaction));
        if let Some(w) = inner.wallets.get_mut(wallet.0) {
            w.handle_transaction(tid);
        }
        self.emit_transaction_event(
            wallet,
            tid,
            TransactionEventKind::Created,
            EventStatus::Success,
            None,
        );
        self.emit_transaction_event(
            wallet,
            tid,
            TransactionEventKind::Added,
            EventStatus::Success,
            None,
        );
        tid
    }

    /// Sign in place with the node's next account nonce. Emits
    /// `Signed` with a success or failure status.
    pub fn wallet_sign_transaction(
        &self,
        wallet: WalletId,
        transaction: TransactionId,
        signer: &PrivateKeySigner,
    ) {
        let mut inner = self.locked();
        if inner.wallets.get(wallet.0).is_none() {
            self.emit_transaction_event(
                wallet,
                transaction,
                TransactionEventKind::Signed,
                EventStatus::UnknownWallet,
                None,
            );
            return;
        }
        let nonce = inner.next_nonce;
        let chain_id = self.network.chain_id();
        let Some(entry) = inner.transactions.get_mut(transaction.0) else {
            self.emit_transaction_event(
                wallet,
                transaction,
                TransactionEventKind::Signed,
                EventStatus::UnknownTransaction,
                None,
            );
            return;
        };
        let result = entry.sign(chain_id, nonce, signer);
        match result {
            Ok(()) => {
                inner.next_nonce += 1;
                self.emit_transaction_event(
                    wallet,
                    transaction,
                    TransactionEventKind::Signed,
                    EventStatus::Success,
                    None,
                );
            }
            Err(err) => {
                tracing::warn!(%transaction, error = %err, "transaction signing failed");
                self.emit_transaction_event(
                    wallet,
                    transaction,
                    TransactionEventKind::Signed,
                    EventStatus::SigningFailed,
                    Some(err.to_string()),
                );
            }
        }
    }

    /// Derive the signer from a BIP-39 paper key, then sign. A
    /// derivation failure is reported as a `Signed` event with
    /// [`EventStatus::SigningFailed`].
    pub fn wallet_sign_transaction_with_paper_key(
        &self,
        wallet: WalletId,
        transaction: TransactionId,
        paper_key: &str,
    ) {
        match account::signer_from_paper_key(paper_key) {
            Ok(signer) => self.wallet_sign_transaction(wallet, transaction, &signer),
            Err(err) => {
                tracing::warn!(%transaction, error = %err, "paper key derivation failed");
                self.emit_transaction_event(
                    wallet,
                    transaction,
                    TransactionEventKind::Signed,
                    EventStatus::SigningFailed,
                    Some(err.to_string()),
                );
            }
        }
    }

    /// Hex-encode the raw signed transaction and hand it to the
    /// client's submit callback. An unsigned or unknown transaction is
    /// reported as a `Submitted` event with
    /// [`EventStatus::SubmissionFailed`].
    pub fn wallet_submit_transaction(&self, wallet: WalletId, transaction: TransactionId) {
        let mut inner = self.locked();
        let raw = inner
            .transactions
            .get(transaction.0)
            .and_then(|t| t.raw_signed_hex());
        let Some(raw) = raw else {
            self.emit_transaction_event(
                wallet,
                transaction,
                TransactionEventKind::Submitted,
                EventStatus::SubmissionFailed,
                Some("transaction is not signed".into()),
            );
            return;
        };
        if let Some(client) = client_for_dispatch(&inner) {
            let rid = inner.next_request_id();
            client.submit_transaction(self, wallet, transaction, &raw, rid);
        }
    }

    /// The ids of the transactions a wallet has accepted; empty for an
    /// unknown wallet.
    pub fn wallet_transactions(&self, wallet: WalletId) -> Vec<TransactionId> {
        self.locked()
            .wallets
            .get(wallet.0)
            .map(|w| w.transactions().to_vec())
            .unwrap_or_default()
    }

    /// Snapshot of a transaction. Handle-stable: a given id resolves
    /// to the same transaction or, after deletion, to `None` — never
    /// to a different one.
    pub fn transaction(&self, transaction: TransactionId) -> Option<Transaction> {
        self.locked().transactions.get(transaction.0).cloned()
    }

    pub fn transaction_by_hash(&self, hash: B256) -> Option<TransactionId> {
        self.locked()
            .transactions
            .position(|t| t.hash == Some(hash))
            .map(TransactionId)
    }

    /// `0x`-prefixed raw signed hex, once the transaction is signed.
    pub fn transaction_raw_hex(&self, transaction: TransactionId) -> Option<String> {
        self.locked()
            .transactions
            .get(transaction.0)
            .and_then(|t| t.raw_signed_hex())
    }

    /// Unhandle the transaction from every wallet carrying it
    /// (announcing `Removed` per wallet), then null the node's slot.
    /// The slot is never compacted, so outstanding ids stay valid.
    pub fn delete_transaction(&self, transaction: TransactionId) -> bool {
        let mut inner = self.locked();
        if inner.transactions.get(transaction.0).is_none() {
            return false;
        }
        let holders: Vec<WalletId> = inner
            .wallets
            .iter()
            .filter(|(_, w)| w.has_transaction(transaction))
            .map(|(index, _)| WalletId(index))
            .collect();
        for wid in holders {
            if let Some(w) = inner.wallets.get_mut(wid.0) {
                w.unhandle_transaction(transaction);
            }
            self.emit_transaction_event(
                wid,
                transaction,
                TransactionEventKind::Removed,
                EventStatus::Success,
                None,
            );
        }
        inner.transactions.clear_slot(transaction.0)
    }

    //
    // Blocks
    //

    pub fn block(&self, block: BlockId) -> Option<Block> {
        self.locked().blocks.get(block.0).copied()
    }

    pub fn block_by_hash(&self, hash: B256) -> Option<BlockId> {
        self.locked()
            .blocks
            .position(|b| b.hash == hash)
            .map(BlockId)
    }

    fn find_or_create_block_locked(
        &self,
        inner: &mut NodeInner,
        hash: B256,
        number: u64,
        timestamp: u64,
    ) -> BlockId {
        if let Some(index) = inner.blocks.position(|b| b.hash == hash) {
            return BlockId(index);
        }
        let bid = BlockId(inner.blocks.insert(Block {
            hash,
            number,
            timestamp,
        }));
        self.emit_block_event(bid, BlockEventKind::Created, EventStatus::Success, None);
        bid
    }

    //
    // Refresh requests
    //
    // Every helper re-checks `Connected` and degrades to a no-op
    // otherwise, so announce paths re-entering after a disconnect
    // silently drop nested work.
    //

    pub fn update_block_number(&self) {
        let mut inner = self.locked();
        self.update_block_number_locked(&mut inner);
    }

    fn update_block_number_locked(&self, inner: &mut NodeInner) {
        if inner.state != NodeState::Connected {
            return;
        }
        if let Some(client) = client_for_dispatch(inner) {
            let rid = inner.next_request_id();
            client.get_block_number(self, rid);
        }
    }

    pub fn update_nonce(&self) {
        let mut inner = self.locked();
        self.update_nonce_locked(&mut inner);
    }

    fn update_nonce_locked(&self, inner: &mut NodeInner) {
        if inner.state != NodeState::Connected {
            return;
        }
        if let Some(client) = client_for_dispatch(inner) {
            let rid = inner.next_request_id();
            client.get_nonce(self, &self.account.primary_address_hex(), rid);
        }
    }

    pub fn update_transactions(&self) {
        let mut inner = self.locked();
        self.update_transactions_locked(&mut inner);
    }

    fn update_transactions_locked(&self, inner: &mut NodeInner) {
        if inner.state != NodeState::Connected {
            return;
        }
        if let Some(client) = client_for_dispatch(inner) {
            let rid = inner.next_request_id();
            client.get_transactions(self, &self.account.primary_address_hex(), rid);
        }
    }

    /// Request ERC20 Transfer-log history. With `wallet` given, the
    /// query is narrowed to that wallet's token contract; `None` asks
    /// for logs from any contract.
    pub fn update_logs(&self, wallet: Option<WalletId>) {
        let mut inner = self.locked();
        self.update_logs_locked(&mut inner, wallet);
    }

    fn update_logs_locked(&self, inner: &mut NodeInner, wallet: Option<WalletId>) {
        if inner.state != NodeState::Connected {
            return;
        }
        let contract = wallet
            .and_then(|wid| inner.wallets.get(wid.0))
            .and_then(|w| w.token())
            .map(|t| t.address_hex());
        if let Some(client) = client_for_dispatch(inner) {
            let rid = inner.next_request_id();
            client.get_logs(
                self,
                contract.as_deref(),
                &token::address_topic_hex(self.account.primary_address()),
                &token::transfer_event_selector_hex(),
                rid,
            );
        }
    }

    pub fn update_wallet_balance(&self, wallet: WalletId) {
        let mut inner = self.locked();
        self.update_wallet_balance_locked(&mut inner, wallet);
    }

    fn update_wallet_balance_locked(&self, inner: &mut NodeInner, wallet: WalletId) {
        let address = match inner.wallets.get(wallet.0) {
            Some(w) => w.address_hex(),
            None => {
                self.emit_wallet_event(
                    wallet,
                    WalletEventKind::BalanceUpdated,
                    EventStatus::UnknownWallet,
                    None,
                );
                return;
            }
        };
        if inner.state != NodeState::Connected {
            self.emit_wallet_event(
                wallet,
                WalletEventKind::BalanceUpdated,
                EventStatus::NodeNotConnected,
                None,
            );
            return;
        }
        if let Some(client) = client_for_dispatch(inner) {
            let rid = inner.next_request_id();
            client.get_balance(self, wallet, &address, rid);
        }
    }

    pub fn update_wallet_default_gas_price(&self, wallet: WalletId) {
        let mut inner = self.locked();
        if inner.wallets.get(wallet.0).is_none() {
            self.emit_wallet_event(
                wallet,
                WalletEventKind::DefaultGasPriceUpdated,
                EventStatus::UnknownWallet,
                None,
            );
            return;
        }
        if inner.state != NodeState::Connected {
            self.emit_wallet_event(
                wallet,
                WalletEventKind::DefaultGasPriceUpdated,
                EventStatus::NodeNotConnected,
                None,
            );
            return;
        }
        if let Some(client) = client_for_dispatch(&inner) {
            let rid = inner.next_request_id();
            client.get_gas_price(self, wallet, rid);
        }
    }

    /// Request a remote gas estimate for a transaction. The amount
    /// crosses as canonical hex (`"0x1"`, never `"0x01"`) and is zero
    /// when the amount is token-denominated.
    pub fn update_transaction_gas_estimate(&self, wallet: WalletId, transaction: TransactionId) {
        let mut inner = self.locked();
        let Some(entry) = inner.transactions.get(transaction.0) else {
            self.emit_transaction_event(
                wallet,
                transaction,
                TransactionEventKind::GasEstimateUpdated,
                EventStatus::UnknownTransaction,
                None,
            );
            return;
        };
        let to = entry.effective_to_hex();
        let amount = entry.effective_amount_hex();
        let data = entry.effective_data_hex();
        if inner.state != NodeState::Connected {
            self.emit_transaction_event(
                wallet,
                transaction,
                TransactionEventKind::GasEstimateUpdated,
                EventStatus::NodeNotConnected,
                None,
            );
            return;
        }
        if let Some(client) = client_for_dispatch(&inner) {
            let rid = inner.next_request_id();
            client.estimate_gas(self, wallet, transaction, &to, &amount, &data, rid);
        }
    }

    //
    // Announce-backs
    //
    // Called from the client's tasks with the results of earlier
    // requests. Thread-safe; each takes the node lock itself.
    //

    pub fn announce_block_number(&self, height: u64, rid: RequestId) {
        let mut inner = self.locked();
        if height > inner.block_height {
            tracing::debug!(%rid, height, "block height advanced");
            inner.block_height = height;
        }
    }

    pub fn announce_nonce(&self, address: Address, nonce: u64, rid: RequestId) {
        if address != self.account.primary_address() {
            tracing::debug!(%rid, %address, "nonce for foreign address ignored");
            return;
        }
        let mut inner = self.locked();
        if nonce > inner.next_nonce {
            inner.next_nonce = nonce;
        }
    }

    pub fn announce_balance(&self, wallet: WalletId, value: U256, rid: RequestId) {
        let mut inner = self.locked();
        let Some(w) = inner.wallets.get_mut(wallet.0) else {
            self.emit_wallet_event(
                wallet,
                WalletEventKind::BalanceUpdated,
                EventStatus::UnknownWallet,
                None,
            );
            return;
        };
        let balance = match w.token() {
            Some(token) => Amount::Token {
                token: token.clone(),
                value,
            },
            None => Amount::Ether(Wei(value)),
        };
        w.set_balance(balance);
        tracing::debug!(%rid, %wallet, "balance updated");
        self.emit_wallet_event(
            wallet,
            WalletEventKind::BalanceUpdated,
            EventStatus::Success,
            None,
        );
    }

    pub fn announce_gas_price(&self, wallet: WalletId, gas_price: GasPrice, rid: RequestId) {
        let mut inner = self.locked();
        match inner.wallets.get_mut(wallet.0) {
            Some(w) => {
                w.set_default_gas_price(gas_price);
                tracing::debug!(%rid, %wallet, %gas_price, "gas price updated");
                self.emit_wallet_event(
                    wallet,
                    WalletEventKind::DefaultGasPriceUpdated,
                    EventStatus::Success,
                    None,
                );
            }
            None => self.emit_wallet_event(
                wallet,
                WalletEventKind::DefaultGasPriceUpdated,
                EventStatus::UnknownWallet,
                None,
            ),
        }
    }

    pub fn announce_gas_estimate(
        &self,
        wallet: WalletId,
        transaction: TransactionId,
        gas: Gas,
        rid: RequestId,
    ) {
        let mut inner = self.locked();
        match inner.transactions.get_mut(transaction.0) {
            Some(entry) => {
                entry.gas_estimate = Some(gas);
                tracing::debug!(%rid, %transaction, %gas, "gas estimate updated");
                self.emit_transaction_event(
                    wallet,
                    transaction,
                    TransactionEventKind::GasEstimateUpdated,
                    EventStatus::Success,
                    None,
                );
            }
            None => self.emit_transaction_event(
                wallet,
                transaction,
                TransactionEventKind::GasEstimateUpdated,
                EventStatus::UnknownTransaction,
                None,
            ),
        }
    }

    /// Result of a submission: the transaction hash on acceptance, or
    /// the remote error message.
    pub fn announce_submission(
        &self,
        wallet: WalletId,
        transaction: TransactionId,
        result: Result<B256, String>,
        rid: RequestId,
    ) {
        let mut inner = self.locked();
        match result {
            Ok(hash) => {
                if let Some(entry) = inner.transactions.get_mut(transaction.0) {
                    entry.hash = Some(hash);
                }
                tracing::debug!(%rid, %transaction, %hash, "transaction submitted");
                self.emit_transaction_event(
                    wallet,
                    transaction,
                    TransactionEventKind::Submitted,
                    EventStatus::Success,
                    None,
                );
            }
            Err(message) => {
                tracing::warn!(%rid, %transaction, %message, "transaction submission failed");
                self.emit_transaction_event(
                    wallet,
                    transaction,
                    TransactionEventKind::Submitted,
                    EventStatus::SubmissionFailed,
                    Some(message),
                );
            }
        }
    }

    /// A transaction-history entry. Unknown hashes create a new
    /// transaction in the ether wallet (`Created` + `Added`);
    /// inclusion in a block records the block (`Block::Created` on
    /// first sight) and emits `Included` once.
    pub fn announce_transaction(&self, bundle: TransactionBundle, rid: RequestId) {
        let mut inner = self.locked();
        let wid = self.wallet();
        let tid = match inner
            .transactions
            .position(|t| t.hash == Some(bundle.hash))
            .map(TransactionId)
        {
            Some(tid) => tid,
            None => {
                let mut transaction = Transaction::new(
                    bundle.to,
                    Amount::Ether(Wei(bundle.amount)),
                    bundle.gas_price,
                    bundle.gas_limit,
                    bundle.data.clone(),
                );
                transaction.nonce = Some(bundle.nonce);
                transaction.hash = Some(bundle.hash);
                tracing::debug!(%rid, hash = %bundle.hash, "new transaction from history");
                self.insert_wallet_transaction_locked(&mut inner, wid, transaction)
            }
        };
        self.apply_block_facts_locked(
            &mut inner,
            wid,
            tid,
            bundle.block_hash,
            bundle.block_number,
            bundle.block_timestamp,
            bundle.failed,
        );
        // An outgoing history entry proves nonces up to its own are spent.
        if bundle.from == self.account.primary_address() && bundle.nonce + 1 > inner.next_nonce {
            inner.next_nonce = bundle.nonce + 1;
        }
    }

    /// An ERC20 Transfer log. Routed to the wallet holding the token
    /// (created on demand); non-Transfer logs and unknown token
    /// contracts are skipped.
    pub fn announce_log(&self, bundle: LogBundle, rid: RequestId) {
        if bundle.topics.len() != 3 || bundle.topics[0] != token::transfer_event_selector() {
            tracing::debug!(%rid, contract = %bundle.contract, "ignoring non-Transfer log");
            return;
        }
        let Some(held_token) = Token::by_address(bundle.contract) else {
            tracing::debug!(%rid, contract = %bundle.contract, "ignoring log for unknown token");
            return;
        };
        let from = token::address_from_topic(bundle.topics[1]);
        let to = token::address_from_topic(bundle.topics[2]);
        let value = U256::from_be_slice(&bundle.data);

        let mut inner = self.locked();
        let wid = self.wallet_holding_token_locked(&mut inner, held_token);
        let existing = inner.wallets.get(wid.0).and_then(|w| {
            w.transactions().iter().copied().find(|tid| {
                inner.transactions.get(tid.0).and_then(|t| t.hash) == Some(bundle.transaction_hash)
            })
        });
        let tid = match existing {
            Some(tid) => tid,
            None => {
                let Some(w) = inner.wallets.get(wid.0) else {
                    return;
                };
                let mut transaction = w.create_transaction(
                    to,
                    Amount::Token {
                        token: held_token.clone(),
                        value,
                    },
                );
                transaction.hash = Some(bundle.transaction_hash);
                tracing::debug!(%rid, %from, %to, token = %held_token, "new token transfer from logs");
                self.insert_wallet_transaction_locked(&mut inner, wid, transaction)
            }
        };
        self.apply_block_facts_locked(
            &mut inner,
            wid,
            tid,
            bundle.block_hash,
            bundle.block_number,
            bundle.block_timestamp,
            false,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_block_facts_locked(
        &self,
        inner: &mut NodeInner,
        wallet: WalletId,
        transaction: TransactionId,
        block_hash: Option<B256>,
        block_number: Option<u64>,
        block_timestamp: Option<u64>,
        failed: bool,
    ) {
        if let Some(hash) = block_hash {
            self.find_or_create_block_locked(
                inner,
                hash,
                block_number.unwrap_or(0),
                block_timestamp.unwrap_or(0),
            );
            if let Some(entry) = inner.transactions.get_mut(transaction.0) {
                let newly_included = entry.block_hash.is_none();
                entry.block_hash = Some(hash);
                entry.block_number = block_number;
                if newly_included {
                    self.emit_transaction_event(
                        wallet,
                        transaction,
                        TransactionEventKind::Included,
                        EventStatus::Success,
                        None,
                    );
                }
            }
        }
        if failed {
            if let Some(entry) = inner.transactions.get_mut(transaction.0) {
                if !entry.failed {
                    entry.failed = true;
                    self.emit_transaction_event(
                        wallet,
                        transaction,
                        TransactionEventKind::Errored,
                        EventStatus::Success,
                        Some("remote reported failure".into()),
                    );
                }
            }
        }
    }

    //
    // Event emission
    //

    fn emit_wallet_event(
        &self,
        wallet: WalletId,
        kind: WalletEventKind,
        status: EventStatus,
        description: Option<String>,
    ) {
        self.bus.announce(Event::Wallet {
            wallet,
            kind,
            status,
            description,
        });
    }

    fn emit_transaction_event(
        &self,
        wallet: WalletId,
        transaction: TransactionId,
        kind: TransactionEventKind,
        status: EventStatus,
        description: Option<String>,
    ) {
        self.bus.announce(Event::Transaction {
            wallet,
            transaction,
            kind,
            status,
            description,
        });
    }

    fn emit_block_event(
        &self,
        block: BlockId,
        kind: BlockEventKind,
        status: EventStatus,
        description: Option<String>,
    ) {
        self.bus.announce(Event::Block {
            block,
            kind,
            status,
            description,
        });
    }

    fn poll_once(&self) {
        let mut inner = self.locked();
        tracing::debug!(network = %self.network, height = inner.block_height, "poll cycle");
        self.update_block_number_locked(&mut inner);
        self.update_nonce_locked(&mut inner);
        self.update_transactions_locked(&mut inner);
        self.update_logs_locked(&mut inner, None);
        let wallet_ids: Vec<WalletId> = inner
            .wallets
            .iter()
            .map(|(index, _)| WalletId(index))
            .collect();
        for wid in wallet_ids {
            self.update_wallet_balance_locked(&mut inner, wid);
        }
    }
}

/// The polling worker. Publishes `Connected`, then cycles until it
/// observes `Disconnecting`, finally publishing `Disconnected`.
async fn poll_loop(node: Arc<LightNode>, cancel: CancellationToken) {
    node.publish_connected();
    loop {
        if node.disconnecting() {
            break;
        }
        node.poll_once();
        if node.disconnecting() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(node.config.poll_interval()) => {}
        }
    }
    node.publish_disconnected();
}
