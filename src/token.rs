//! ERC20 token descriptors and the statically known deployments.
//!
//! Token wallets are created on demand per distinct token; the node
//! resolves contract addresses seen in Transfer logs against the table
//! here. The ERC20 `Transfer` event selector and the address-as-topic
//! encoding used by log queries also live in this module.

use alloy_primitives::{Address, B256, U256, address};
use alloy_sol_types::{SolCall, SolEvent, sol};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::types::Gas;

sol! {
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);

    function transfer(address to, uint256 value) returns (bool);
}

/// An ERC20 token deployment the node can hold a wallet for.
///
/// Tokens are compared by contract address; symbol, name, and decimals
/// are display metadata.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Default gas limit for transfers of this token.
    pub gas_limit: Gas,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#x})", self.symbol, self.address)
    }
}

impl Token {
    /// Lowercase `0x`-prefixed contract address, the form log queries
    /// cross the client boundary in.
    pub fn address_hex(&self) -> String {
        format!("{:#x}", self.address)
    }

    /// Resolve a known token by contract address.
    pub fn by_address(address: Address) -> Option<&'static Token> {
        known_tokens().iter().find(|t| t.address == address)
    }
}

/// Default gas limit for ERC20 transfer calls.
const TOKEN_TRANSFER_GAS_LIMIT: Gas = Gas(92_000);

/// Lazily initialized well-known mainnet token deployments.
static KNOWN_TOKENS: Lazy<Vec<Token>> = Lazy::new(|| {
    vec![
        Token {
            address: address!("0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            symbol: "USDT".into(),
            name: "Tether USD".into(),
            decimals: 6,
            gas_limit: TOKEN_TRANSFER_GAS_LIMIT,
        },
        Token {
            address: address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            symbol: "USDC".into(),
            name: "USD Coin".into(),
            decimals: 6,
            gas_limit: TOKEN_TRANSFER_GAS_LIMIT,
        },
        Token {
            address: address!("0x6B175474E89094C44Da98b954EedeAC495271d0F"),
            symbol: "DAI".into(),
            name: "Dai Stablecoin".into(),
            decimals: 18,
            gas_limit: TOKEN_TRANSFER_GAS_LIMIT,
        },
    ]
});

/// The statically known token deployments.
pub fn known_tokens() -> &'static [Token] {
    &KNOWN_TOKENS
}

/// The ERC20 `Transfer(address,address,uint256)` event selector, used
/// as topic 0 when querying token transfer history.
pub fn transfer_event_selector() -> B256 {
    Transfer::SIGNATURE_HASH
}

/// `0x`-prefixed hex of the Transfer event selector, the form it
/// crosses the client boundary in.
pub fn transfer_event_selector_hex() -> String {
    format!("{:#x}", Transfer::SIGNATURE_HASH)
}

/// Encode an account address as a 32-byte log topic (left-padded), for
/// matching the indexed `from`/`to` positions of a Transfer event.
pub fn address_topic(address: Address) -> B256 {
    address.into_word()
}

/// `0x`-prefixed hex of [`address_topic`].
pub fn address_topic_hex(address: Address) -> String {
    format!("{:#x}", address_topic(address))
}

/// Decode an address back out of an indexed log topic.
pub fn address_from_topic(topic: B256) -> Address {
    Address::from_word(topic)
}

/// ABI-encode an ERC20 `transfer(to, value)` call. This is the
/// calldata a token-denominated transaction carries; the transaction's
/// own value field stays zero.
pub fn encode_transfer_call(to: Address, value: U256) -> Vec<u8> {
    transferCall { to, value }.abi_encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_selector_is_the_well_known_topic() {
        assert_eq!(
            transfer_event_selector_hex(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn address_topic_round_trips() {
        let address = address!("0xdAC17F958D2ee523a2206206994597C13D831ec7");
        let topic = address_topic(address);
        assert!(topic.as_slice()[..12].iter().all(|b| *b == 0));
        assert_eq!(address_from_topic(topic), address);
        assert_eq!(
            address_topic_hex(address),
            "0x000000000000000000000000dac17f958d2ee523a2206206994597c13d831ec7"
        );
    }

    #[test]
    fn known_tokens_resolve_by_address() {
        let usdt = address!("0xdAC17F958D2ee523a2206206994597C13D831ec7");
        assert_eq!(Token::by_address(usdt).unwrap().symbol, "USDT");
        assert!(Token::by_address(Address::ZERO).is_none());
    }

    #[test]
    fn transfer_call_has_selector_and_args() {
        let to = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let data = encode_transfer_call(to, U256::from(5u64));
        // 4-byte selector + two 32-byte words
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(U256::from_be_slice(&data[36..68]), U256::from(5u64));
    }
}
