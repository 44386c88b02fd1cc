//! Ethereum network definitions.
//!
//! This module defines the chains a light node can track and their
//! EIP-155 chain IDs, and names them the way they appear in file-system
//! layouts and log output.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Supported Ethereum networks.
///
/// The network is fixed at node creation and selects the chain ID used
/// for EIP-155 transaction signing.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Ethereum mainnet (chain ID 1).
    #[serde(rename = "mainnet")]
    Mainnet,
    /// Ropsten testnet (chain ID 3).
    #[serde(rename = "ropsten")]
    Ropsten,
    /// Rinkeby testnet (chain ID 4).
    #[serde(rename = "rinkeby")]
    Rinkeby,
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Ropsten => write!(f, "ropsten"),
            Network::Rinkeby => write!(f, "rinkeby"),
        }
    }
}

impl Network {
    /// Return the EIP-155 chain ID associated with the network.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Ropsten => 3,
            Network::Rinkeby => 4,
        }
    }

    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[Network::Mainnet, Network::Ropsten, Network::Rinkeby]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_match_eip155() {
        assert_eq!(Network::Mainnet.chain_id(), 1);
        assert_eq!(Network::Ropsten.chain_id(), 3);
        assert_eq!(Network::Rinkeby.chain_id(), 4);
    }

    #[test]
    fn display_is_lowercase_name() {
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
        assert_eq!(
            serde_json::to_string(&Network::Rinkeby).unwrap(),
            "\"rinkeby\""
        );
    }
}
