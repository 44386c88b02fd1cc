//! Core value types shared across the node.
//!
//! Amounts are carried in WEI as 256-bit integers; gas quantities and
//! prices get their own newtypes so the two cannot be confused. The
//! identifier newtypes at the bottom are the stable handles the node
//! hands out: they index append-only registries and stay valid for the
//! node's whole lifetime.

use alloy_primitives::{B256, U256, hex};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::Add;

use crate::token::Token;

/// An ether amount denominated in WEI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Wei(pub U256);

impl Wei {
    pub const ZERO: Wei = Wei(U256::ZERO);

    pub fn from_u64(value: u64) -> Self {
        Wei(U256::from(value))
    }

    /// Canonical `0x`-prefixed hex rendering with no redundant leading
    /// zero digit: zero renders as `"0x0"`, one WEI as `"0x1"`.
    ///
    /// This is the form remote gas-estimation endpoints expect.
    pub fn canonical_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl Display for Wei {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

impl Add for Wei {
    type Output = Wei;

    fn add(self, rhs: Wei) -> Wei {
        Wei(self.0 + rhs.0)
    }
}

/// An amount of gas (computation units), as in a transaction gas limit
/// or a remote gas estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gas(pub u64);

impl Display for Gas {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} gas", self.0)
    }
}

/// A price per unit of gas, in WEI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GasPrice(pub Wei);

impl GasPrice {
    pub fn from_gwei(gwei: u64) -> Self {
        GasPrice(Wei(U256::from(gwei) * U256::from(1_000_000_000u64)))
    }
}

impl Display for GasPrice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/gas", self.0)
    }
}

/// A held or transferred amount: either ether or a quantity of a
/// specific ERC20 token, in the token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    Ether(Wei),
    Token { token: Token, value: U256 },
}

impl Amount {
    /// The amount in WEI when the amount is ether; zero when the amount
    /// is denominated in a token. Token value travels in calldata, not
    /// in the transaction value field.
    pub fn effective_wei(&self) -> Wei {
        match self {
            Amount::Ether(wei) => *wei,
            Amount::Token { .. } => Wei::ZERO,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            Amount::Ether(_) => None,
            Amount::Token { token, .. } => Some(token),
        }
    }
}

/// A block header fact the node has learned from the remote side.
///
/// The node records these so transactions can point at the block that
/// included them; it performs no header validation of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: B256,
    pub number: u64,
    pub timestamp: u64,
}

/// Render an `0x`-prefixed lowercase hex string for raw bytes.
pub fn hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Handle to a wallet owned by a node. Index 0 is always the
/// ether-holding wallet. Handles are never reused or shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(pub usize);

/// Handle to a transaction in the node's flat transaction table.
/// Slots are nulled on deletion, never compacted, so an issued handle
/// resolves to the same transaction or to nothing, never to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub usize);

/// Handle to a block the node has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub usize);

/// Handle to a registered listener. Removal clears the slot; the id is
/// the slot index and is never shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub usize);

impl Display for WalletId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "wallet#{}", self.0)
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "transaction#{}", self.0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

impl Display for ListenerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_hex_drops_redundant_zero() {
        assert_eq!(Wei::from_u64(0).canonical_hex(), "0x0");
        assert_eq!(Wei::from_u64(1).canonical_hex(), "0x1");
        assert_eq!(Wei::from_u64(255).canonical_hex(), "0xff");
        assert_eq!(Wei::from_u64(4096).canonical_hex(), "0x1000");
    }

    #[test]
    fn token_amount_has_zero_effective_wei() {
        let token = crate::token::known_tokens()[0].clone();
        let amount = Amount::Token {
            token,
            value: U256::from(1_000_000u64),
        };
        assert_eq!(amount.effective_wei(), Wei::ZERO);

        let ether = Amount::Ether(Wei::from_u64(7));
        assert_eq!(ether.effective_wei(), Wei::from_u64(7));
    }

    #[test]
    fn gas_price_from_gwei() {
        assert_eq!(
            GasPrice::from_gwei(2).0,
            Wei(U256::from(2_000_000_000u64))
        );
    }
}
