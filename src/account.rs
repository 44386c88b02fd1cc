//! The account a node tracks: its primary address and key derivation.
//!
//! Key material never lives on the node. Callers either hold a
//! [`PrivateKeySigner`] themselves or hand the node a BIP-39 paper key
//! at signing time, from which the signer is derived on the spot and
//! dropped again.

use alloy_primitives::Address;
use alloy_signer_local::coins_bip39::English;
use alloy_signer_local::{LocalSignerError, MnemonicBuilder, PrivateKeySigner};
use std::fmt::{Display, Formatter};

/// The public identity a light node is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    address: Address,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Account { address }
    }

    /// Build an account from an existing signer's address.
    pub fn from_signer(signer: &PrivateKeySigner) -> Self {
        Account {
            address: signer.address(),
        }
    }

    /// Derive the account from a BIP-39 paper key, using the default
    /// Ethereum derivation path.
    pub fn from_paper_key(phrase: &str) -> Result<Self, LocalSignerError> {
        let signer = signer_from_paper_key(phrase)?;
        Ok(Account::from_signer(&signer))
    }

    pub fn primary_address(&self) -> Address {
        self.address
    }

    /// Lowercase `0x`-prefixed hex of the primary address, the form
    /// addresses cross the client boundary in.
    pub fn primary_address_hex(&self) -> String {
        format!("{:#x}", self.address)
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.address)
    }
}

/// Derive a signer from a BIP-39 paper key.
pub fn signer_from_paper_key(phrase: &str) -> Result<PrivateKeySigner, LocalSignerError> {
    MnemonicBuilder::<English>::default().phrase(phrase).build()
}
