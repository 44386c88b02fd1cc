//! Ethereum legacy transactions as the node tracks them.
//!
//! A transaction starts life locally (created through a wallet), gets
//! signed in place, and is later enriched with chain-derived facts
//! (hash, containing block, failure flag) learned from announce-backs.
//! Signing follows EIP-155: the payload is the RLP of the nine legacy
//! fields with `(chain_id, 0, 0)` in the signature positions, and the
//! recovery id folds the chain id into `v`.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_rlp::{Encodable, Header};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::token;
use crate::types::{Amount, Gas, GasPrice, Wei, hex_prefixed};

/// The EIP-155 signature triple carried by a signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

/// A transaction owned by the node's flat transaction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Receive address as the user addressed it. For token amounts the
    /// wire-level target is the token contract; see [`Transaction::effective_to`].
    pub to: Address,
    pub amount: Amount,
    pub gas_price: GasPrice,
    pub gas_limit: Gas,
    pub data: Bytes,
    pub nonce: Option<u64>,
    pub signature: Option<TransactionSignature>,
    /// Transaction hash, set at signing or learned from history.
    pub hash: Option<B256>,
    /// Remote gas estimate, when one has been announced.
    pub gas_estimate: Option<Gas>,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    /// The remote side reported the transaction as failed.
    pub failed: bool,
}

impl Transaction {
    pub fn new(
        to: Address,
        amount: Amount,
        gas_price: GasPrice,
        gas_limit: Gas,
        data: Bytes,
    ) -> Self {
        Transaction {
            to,
            amount,
            gas_price,
            gas_limit,
            data,
            nonce: None,
            signature: None,
            hash: None,
            gas_estimate: None,
            block_hash: None,
            block_number: None,
            failed: false,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn is_included(&self) -> bool {
        self.block_hash.is_some()
    }

    /// The address the wire-level transaction targets: the token
    /// contract for token amounts, the receive address otherwise.
    pub fn effective_to(&self) -> Address {
        match self.amount.token() {
            Some(token) => token.address,
            None => self.to,
        }
    }

    /// Lowercase `0x`-prefixed hex of [`Transaction::effective_to`].
    pub fn effective_to_hex(&self) -> String {
        format!("{:#x}", self.effective_to())
    }

    /// The calldata the wire-level transaction carries: an ERC20
    /// `transfer(to, value)` encoding for token amounts, the explicit
    /// data field otherwise.
    pub fn effective_data(&self) -> Bytes {
        match &self.amount {
            Amount::Token { token: _, value } => {
                Bytes::from(token::encode_transfer_call(self.to, *value))
            }
            Amount::Ether(_) => self.data.clone(),
        }
    }

    /// `0x`-prefixed hex of the effective calldata; empty data renders
    /// as `"0x"`.
    pub fn effective_data_hex(&self) -> String {
        hex_prefixed(&self.effective_data())
    }

    /// Canonical `0x`-prefixed hex of the effective WEI amount, with
    /// the redundant leading zero dropped (`"0x0"`, not `"0x00"`).
    pub fn effective_amount_hex(&self) -> String {
        self.amount.effective_wei().canonical_hex()
    }

    /// Sign in place with the given nonce under EIP-155 for `chain_id`.
    /// Sets the nonce, the signature, and the transaction hash.
    pub fn sign(
        &mut self,
        chain_id: u64,
        nonce: u64,
        signer: &PrivateKeySigner,
    ) -> Result<(), alloy_signer::Error> {
        self.nonce = Some(nonce);
        let payload = self.rlp_unsigned(chain_id, nonce);
        let signature = signer.sign_hash_sync(&keccak256(&payload))?;
        let v = 35 + chain_id * 2 + u64::from(signature.v());
        self.signature = Some(TransactionSignature {
            v,
            r: signature.r(),
            s: signature.s(),
        });
        self.hash = Some(keccak256(self.raw_signed().expect("signature just set")));
        Ok(())
    }

    /// RLP of the raw signed transaction, ready for submission.
    /// `None` until the transaction is signed.
    pub fn raw_signed(&self) -> Option<Vec<u8>> {
        let signature = self.signature.as_ref()?;
        let nonce = self.nonce?;
        let value = self.amount.effective_wei();
        let data = self.effective_data();
        Some(rlp_legacy(
            nonce,
            self.gas_price,
            self.gas_limit,
            self.effective_to(),
            value,
            &data,
            (signature.v, signature.r, signature.s),
        ))
    }

    /// `0x`-prefixed hex of the raw signed transaction, the form it
    /// crosses the client boundary in.
    pub fn raw_signed_hex(&self) -> Option<String> {
        self.raw_signed().map(|raw| hex_prefixed(&raw))
    }

    fn rlp_unsigned(&self, chain_id: u64, nonce: u64) -> Vec<u8> {
        let value = self.amount.effective_wei();
        let data = self.effective_data();
        rlp_legacy(
            nonce,
            self.gas_price,
            self.gas_limit,
            self.effective_to(),
            value,
            &data,
            (chain_id, U256::ZERO, U256::ZERO),
        )
    }
}

/// Encode the nine legacy transaction fields as an RLP list. The tail
/// triple is `(chain_id, 0, 0)` for the EIP-155 signing payload and
/// `(v, r, s)` for the raw signed form.
fn rlp_legacy(
    nonce: u64,
    gas_price: GasPrice,
    gas_limit: Gas,
    to: Address,
    value: Wei,
    data: &Bytes,
    tail: (u64, U256, U256),
) -> Vec<u8> {
    let gas_price = gas_price.0.0;
    let gas_limit = gas_limit.0;
    let value = value.0;
    let (tail0, tail1, tail2) = tail;

    let payload_length = nonce.length()
        + gas_price.length()
        + gas_limit.length()
        + to.length()
        + value.length()
        + data.length()
        + tail0.length()
        + tail1.length()
        + tail2.length();

    let mut out = Vec::with_capacity(payload_length + 4);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    nonce.encode(&mut out);
    gas_price.encode(&mut out);
    gas_limit.encode(&mut out);
    to.encode(&mut out);
    value.encode(&mut out);
    data.encode(&mut out);
    tail0.encode(&mut out);
    tail1.encode(&mut out);
    tail2.encode(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::str::FromStr;

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::from_str(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap()
    }

    fn ether_transaction(wei: u64) -> Transaction {
        Transaction::new(
            address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            Amount::Ether(Wei::from_u64(wei)),
            GasPrice::from_gwei(2),
            Gas(21_000),
            Bytes::new(),
        )
    }

    #[test]
    fn one_wei_renders_canonically() {
        let transaction = ether_transaction(1);
        assert_eq!(transaction.effective_amount_hex(), "0x1");
        assert_eq!(transaction.effective_data_hex(), "0x");
    }

    #[test]
    fn signing_sets_signature_nonce_and_hash() {
        let mut transaction = ether_transaction(1_000_000);
        assert!(!transaction.is_signed());

        transaction.sign(1, 0, &signer()).unwrap();

        assert!(transaction.is_signed());
        assert_eq!(transaction.nonce, Some(0));
        assert!(transaction.hash.is_some());
        // EIP-155 on mainnet: v is 37 or 38.
        let v = transaction.signature.unwrap().v;
        assert!(v == 37 || v == 38, "unexpected v {v}");
    }

    #[test]
    fn raw_signed_is_prefixed_rlp_list() {
        let mut transaction = ether_transaction(1_000_000);
        transaction.sign(1, 7, &signer()).unwrap();

        let hex = transaction.raw_signed_hex().unwrap();
        assert!(hex.starts_with("0x"));

        let raw = transaction.raw_signed().unwrap();
        // Top-level RLP list header.
        assert!(raw[0] >= 0xc0);
        assert_eq!(keccak256(&raw), transaction.hash.unwrap());
    }

    #[test]
    fn unsigned_transaction_has_no_raw_form() {
        assert!(ether_transaction(1).raw_signed().is_none());
        assert!(ether_transaction(1).raw_signed_hex().is_none());
    }

    #[test]
    fn token_transaction_targets_the_contract() {
        let token = crate::token::known_tokens()[0].clone();
        let contract = token.address;
        let recipient = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
        let transaction = Transaction::new(
            recipient,
            Amount::Token {
                token,
                value: U256::from(250u64),
            },
            GasPrice::from_gwei(2),
            Gas(92_000),
            Bytes::new(),
        );

        assert_eq!(transaction.effective_to(), contract);
        assert_eq!(transaction.effective_amount_hex(), "0x0");
        let data = transaction.effective_data();
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    }
}
