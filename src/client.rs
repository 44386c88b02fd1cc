//! The injected client port: the node's bridge to a remote backend.
//!
//! The node never speaks a chain protocol itself. Every refresh turns
//! into a call on the [`ClientPort`] the caller injected at connect
//! time. Calls are fire-and-forget: the implementation must hand the
//! work to its own executor and return immediately, and it must not
//! call back into the node on the caller's stack. Results arrive
//! later, from the client's own tasks, through the `announce_*` entry
//! points on [`LightNode`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::node::LightNode;
use crate::types::{TransactionId, WalletId};

/// Correlation token for one outstanding request. Monotonic and unique
/// within a node's lifetime; the node keeps no other per-request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// How the node reaches its backend. `Les` currently routes through
/// the same dispatch path as `JsonRpc`; the discriminant is kept so a
/// future LES backend can fan out differently. `None` disables all
/// remote dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "json-rpc")]
    JsonRpc,
    #[serde(rename = "les")]
    Les,
}

/// The callback table a remote bridge implements.
///
/// Addresses cross as lowercase `0x`-prefixed hex; raw transactions as
/// `0x`-prefixed RLP hex; the estimate-gas amount is canonical hex with
/// no redundant leading zero.
pub trait ClientPort: Send + Sync {
    /// Fetch the balance of `address` for `wallet`.
    fn get_balance(&self, node: &LightNode, wallet: WalletId, address: &str, rid: RequestId);

    /// Fetch the current gas price for `wallet`.
    fn get_gas_price(&self, node: &LightNode, wallet: WalletId, rid: RequestId);

    /// Estimate gas for a prospective transaction.
    #[allow(clippy::too_many_arguments)]
    fn estimate_gas(
        &self,
        node: &LightNode,
        wallet: WalletId,
        transaction: TransactionId,
        to: &str,
        amount: &str,
        data: &str,
        rid: RequestId,
    );

    /// Submit a raw signed transaction.
    fn submit_transaction(
        &self,
        node: &LightNode,
        wallet: WalletId,
        transaction: TransactionId,
        raw: &str,
        rid: RequestId,
    );

    /// Fetch the full transaction history of `address`.
    fn get_transactions(&self, node: &LightNode, address: &str, rid: RequestId);

    /// Fetch ERC20 Transfer logs. `contract` of `None` means any
    /// contract; `address_topic` is the account address encoded as an
    /// indexed-event topic; `event_topic` is the Transfer selector.
    fn get_logs(
        &self,
        node: &LightNode,
        contract: Option<&str>,
        address_topic: &str,
        event_topic: &str,
        rid: RequestId,
    );

    /// Fetch the current block number.
    fn get_block_number(&self, node: &LightNode, rid: RequestId);

    /// Fetch the transaction-count nonce of `address`.
    fn get_nonce(&self, node: &LightNode, address: &str, rid: RequestId);
}

impl<T: ClientPort> ClientPort for Arc<T> {
    fn get_balance(&self, node: &LightNode, wallet: WalletId, address: &str, rid: RequestId) {
        self.as_ref().get_balance(node, wallet, address, rid)
    }

    fn get_gas_price(&self, node: &LightNode, wallet: WalletId, rid: RequestId) {
        self.as_ref().get_gas_price(node, wallet, rid)
    }

    fn estimate_gas(
        &self,
        node: &LightNode,
        wallet: WalletId,
        transaction: TransactionId,
        to: &str,
        amount: &str,
        data: &str,
        rid: RequestId,
    ) {
        self.as_ref()
            .estimate_gas(node, wallet, transaction, to, amount, data, rid)
    }

    fn submit_transaction(
        &self,
        node: &LightNode,
        wallet: WalletId,
        transaction: TransactionId,
        raw: &str,
        rid: RequestId,
    ) {
        self.as_ref()
            .submit_transaction(node, wallet, transaction, raw, rid)
    }

    fn get_transactions(&self, node: &LightNode, address: &str, rid: RequestId) {
        self.as_ref().get_transactions(node, address, rid)
    }

    fn get_logs(
        &self,
        node: &LightNode,
        contract: Option<&str>,
        address_topic: &str,
        event_topic: &str,
        rid: RequestId,
    ) {
        self.as_ref()
            .get_logs(node, contract, address_topic, event_topic, rid)
    }

    fn get_block_number(&self, node: &LightNode, rid: RequestId) {
        self.as_ref().get_block_number(node, rid)
    }

    fn get_nonce(&self, node: &LightNode, address: &str, rid: RequestId) {
        self.as_ref().get_nonce(node, address, rid)
    }
}

/// A client that drops every request. Useful as a stand-in while no
/// backend is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClient;

impl ClientPort for NullClient {
    fn get_balance(&self, _node: &LightNode, _wallet: WalletId, _address: &str, _rid: RequestId) {}

    fn get_gas_price(&self, _node: &LightNode, _wallet: WalletId, _rid: RequestId) {}

    fn estimate_gas(
        &self,
        _node: &LightNode,
        _wallet: WalletId,
        _transaction: TransactionId,
        _to: &str,
        _amount: &str,
        _data: &str,
        _rid: RequestId,
    ) {
    }

    fn submit_transaction(
        &self,
        _node: &LightNode,
        _wallet: WalletId,
        _transaction: TransactionId,
        _raw: &str,
        _rid: RequestId,
    ) {
    }

    fn get_transactions(&self, _node: &LightNode, _address: &str, _rid: RequestId) {}

    fn get_logs(
        &self,
        _node: &LightNode,
        _contract: Option<&str>,
        _address_topic: &str,
        _event_topic: &str,
        _rid: RequestId,
    ) {
    }

    fn get_block_number(&self, _node: &LightNode, _rid: RequestId) {}

    fn get_nonce(&self, _node: &LightNode, _address: &str, _rid: RequestId) {}
}
