use crate::*;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use tokio::sync::broadcast;

/// Notification pushed by a wallet provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The authorized account list changed. Empty means the user revoked access.
    AccountsChanged(Vec<Address>),

    /// The wallet switched to another network
    ChainChanged(u64),
}

/// Request surface of a user's wallet
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Contract binding produced for a connected account
    type Signer: ContractBackend + Clone + 'static;

    /// Ask the wallet for account access
    async fn request_accounts(&self) -> Result<Vec<Address>, CallError>;

    async fn chain_id(&self) -> Result<u64, CallError>;

    async fn balance(&self, account: Address) -> Result<U256, CallError>;

    /// Deployed code at `address`, empty if there is none
    async fn code(&self, address: Address) -> Result<Vec<u8>, CallError>;

    /// Bind the contract at `contract` to `account` for signing
    async fn signer(&self, account: Address, contract: Address)
        -> Result<Self::Signer, CallError>;

    /// Subscribe to account and network change notifications
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Capacity of wallet notification channels
pub const EVENT_CHANNEL_CAPACITY: usize = 16;
