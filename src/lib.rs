//! Light Ethereum wallet node core.
//!
//! This crate implements the coordination core of a light wallet
//! client: a long-lived [`node::LightNode`] that owns an account,
//! tracks per-currency wallets (ether plus ERC20 tokens), keeps the
//! catalog of transactions and blocks it has learned about, and runs a
//! periodic worker that asks an injected [`client::ClientPort`] — a
//! bridge to a remote JSON-RPC or light-client backend — to refresh
//! chain-derived facts. Every state change is announced to subscribed
//! [`event::Listener`]s in a single total order.
//!
//! The node is a coordinator and a registry, not a chain validator: it
//! speaks no protocol itself, validates no headers, and re-derives no
//! state. Results flow back in through thread-safe `announce_*` entry
//! points on the node, called from the client's own tasks.
//!
//! # Modules
//!
//! - [`account`] — the tracked account and BIP-39 paper-key derivation.
//! - [`client`] — the injected callback table and request correlation.
//! - [`config`] — node tunables with serde defaults and a JSON loader.
//! - [`event`] — event kinds, the listener trait, and the dispatch queue.
//! - [`file_service`] — typed, versioned per-directory persistence for
//!   wallet managers.
//! - [`mpt`] — Merkle-Patricia proof decoding.
//! - [`network`] — supported chains and their EIP-155 ids.
//! - [`node`] — the lifecycle coordinator, polling loop, and registries.
//! - [`registry`] — stable-slot tables behind all issued handles.
//! - [`token`] — ERC20 descriptors, known deployments, Transfer topics.
//! - [`transaction`] — legacy transactions, EIP-155 signing, raw RLP.
//! - [`types`] — amounts, gas, blocks, and the id newtypes.
//! - [`wallet`] — the per-currency wallet view.
//!
//! # Example
//!
//! ```ignore
//! let account = Account::from_paper_key("...")?;
//! let node = LightNode::new(Network::Mainnet, account);
//! node.add_listener(listener);
//! node.connect(client);
//! // ... later:
//! node.shutdown().await;
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod event;
pub mod file_service;
pub mod mpt;
pub mod network;
pub mod node;
pub mod registry;
pub mod token;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use account::Account;
pub use client::{ClientPort, NodeType, RequestId};
pub use config::NodeConfig;
pub use event::{
    BlockEventKind, EventStatus, Listener, TransactionEventKind, WalletEventKind,
};
pub use network::Network;
pub use node::{LightNode, LogBundle, NodeState, TransactionBundle};
pub use token::Token;
pub use types::{Amount, BlockId, Gas, GasPrice, ListenerId, TransactionId, WalletId, Wei};
