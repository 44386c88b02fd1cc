//! Per-currency wallets.
//!
//! A wallet is the account's view of one currency on one network:
//! either ether or a specific ERC20 token. Wallets do not own
//! transactions; the node's flat table does, and a wallet keeps only
//! the stable ids of the transactions it has accepted.

use alloy_primitives::{Address, Bytes, U256};

use crate::network::Network;
use crate::token::Token;
use crate::transaction::Transaction;
use crate::types::{Amount, Gas, GasPrice, TransactionId, Wei};

/// Default gas limit for a plain ether transfer.
pub const DEFAULT_ETHER_GAS_LIMIT: Gas = Gas(21_000);

/// Default gas price applied to new wallets until a remote price is
/// announced.
pub const DEFAULT_GAS_PRICE_GWEI: u64 = 2;

#[derive(Debug, Clone)]
pub struct Wallet {
    address: Address,
    network: Network,
    token: Option<Token>,
    default_gas_limit: Gas,
    default_gas_price: GasPrice,
    balance: Amount,
    transactions: Vec<TransactionId>,
}

impl Wallet {
    /// Create the ether-holding wallet for an account.
    pub fn new(address: Address, network: Network) -> Self {
        Wallet {
            address,
            network,
            token: None,
            default_gas_limit: DEFAULT_ETHER_GAS_LIMIT,
            default_gas_price: GasPrice::from_gwei(DEFAULT_GAS_PRICE_GWEI),
            balance: Amount::Ether(Wei::ZERO),
            transactions: Vec::new(),
        }
    }

    /// Create a wallet holding a specific token.
    pub fn holding_token(address: Address, network: Network, token: Token) -> Self {
        let balance = Amount::Token {
            token: token.clone(),
            value: U256::ZERO,
        };
        Wallet {
            address,
            network,
            token: Some(token.clone()),
            default_gas_limit: token.gas_limit,
            default_gas_price: GasPrice::from_gwei(DEFAULT_GAS_PRICE_GWEI),
            balance,
            transactions: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Lowercase `0x`-prefixed hex of the wallet's address.
    pub fn address_hex(&self) -> String {
        format!("{:#x}", self.address)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn holds_token(&self, token: &Token) -> bool {
        self.token.as_ref() == Some(token)
    }

    pub fn default_gas_limit(&self) -> Gas {
        self.default_gas_limit
    }

    pub fn set_default_gas_limit(&mut self, gas_limit: Gas) {
        self.default_gas_limit = gas_limit;
    }

    pub fn default_gas_price(&self) -> GasPrice {
        self.default_gas_price
    }

    pub fn set_default_gas_price(&mut self, gas_price: GasPrice) {
        self.default_gas_price = gas_price;
    }

    pub fn balance(&self) -> &Amount {
        &self.balance
    }

    pub fn set_balance(&mut self, balance: Amount) {
        self.balance = balance;
    }

    /// Build a transaction using the wallet's default gas parameters.
    /// The caller (the node) owns insertion into the transaction table.
    pub fn create_transaction(&self, to: Address, amount: Amount) -> Transaction {
        Transaction::new(
            to,
            amount,
            self.default_gas_price,
            self.default_gas_limit,
            Bytes::new(),
        )
    }

    /// Build a transaction with explicit gas parameters and calldata.
    pub fn create_transaction_generic(
        &self,
        to: Address,
        amount: Wei,
        gas_price: GasPrice,
        gas_limit: Gas,
        data: Bytes,
    ) -> Transaction {
        Transaction::new(to, Amount::Ether(amount), gas_price, gas_limit, data)
    }

    /// Accept a transaction id into this wallet. Idempotent.
    pub fn handle_transaction(&mut self, id: TransactionId) {
        if !self.transactions.contains(&id) {
            self.transactions.push(id);
        }
    }

    /// Drop a transaction id from this wallet. Returns whether the
    /// wallet carried it.
    pub fn unhandle_transaction(&mut self, id: TransactionId) -> bool {
        match self.transactions.iter().position(|held| *held == id) {
            Some(index) => {
                self.transactions.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn has_transaction(&self, id: TransactionId) -> bool {
        self.transactions.contains(&id)
    }

    pub fn transactions(&self) -> &[TransactionId] {
        &self.transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use crate::token::known_tokens;

    const OWNER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[test]
    fn ether_wallet_has_transfer_defaults() {
        let wallet = Wallet::new(OWNER, Network::Mainnet);
        assert!(wallet.token().is_none());
        assert_eq!(wallet.default_gas_limit(), DEFAULT_ETHER_GAS_LIMIT);
        assert_eq!(wallet.balance(), &Amount::Ether(Wei::ZERO));
    }

    #[test]
    fn token_wallet_takes_token_gas_limit() {
        let token = known_tokens()[0].clone();
        let wallet = Wallet::holding_token(OWNER, Network::Mainnet, token.clone());
        assert!(wallet.holds_token(&token));
        assert_eq!(wallet.default_gas_limit(), token.gas_limit);
    }

    #[test]
    fn handle_is_idempotent_and_unhandle_reports() {
        let mut wallet = Wallet::new(OWNER, Network::Mainnet);
        wallet.handle_transaction(TransactionId(3));
        wallet.handle_transaction(TransactionId(3));
        assert_eq!(wallet.transactions(), &[TransactionId(3)]);

        assert!(wallet.unhandle_transaction(TransactionId(3)));
        assert!(!wallet.unhandle_transaction(TransactionId(3)));
        assert!(wallet.transactions().is_empty());
    }

    #[test]
    fn created_transaction_uses_wallet_defaults() {
        let mut wallet = Wallet::new(OWNER, Network::Mainnet);
        wallet.set_default_gas_price(GasPrice::from_gwei(5));
        let transaction =
            wallet.create_transaction(OWNER, Amount::Ether(Wei::from_u64(10)));
        assert_eq!(transaction.gas_price, GasPrice::from_gwei(5));
        assert_eq!(transaction.gas_limit, DEFAULT_ETHER_GAS_LIMIT);
    }
}
