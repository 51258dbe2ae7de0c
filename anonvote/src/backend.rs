use crate::*;
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

/// A state-changing contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transact {
    CreateVoting {
        title: String,
        description: String,
        candidates: Vec<String>,
        duration: u64,
    },
    Vote {
        voting_id: u64,
        candidate_index: u64,
        handle: [u8; 32],
        proof: Vec<u8>,
    },
    EndVoting {
        voting_id: u64,
    },
}

impl Transact {
    /// Name of the ABI function this call invokes
    pub fn function(&self) -> &'static str {
        match self {
            Transact::CreateVoting { .. } => FN_CREATE_VOTING,
            Transact::Vote { .. } => FN_VOTE,
            Transact::EndVoting { .. } => FN_END_VOTING,
        }
    }

    /// The voting session this call targets, if any
    pub fn voting_id(&self) -> Option<u64> {
        match self {
            Transact::CreateVoting { .. } => None,
            Transact::Vote { voting_id, .. } => Some(*voting_id),
            Transact::EndVoting { voting_id } => Some(*voting_id),
        }
    }
}

/// Gas settings for one submission. `None` leaves the choice to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub gas_limit: Option<U256>,
    pub gas_price: Option<U256>,
}

/// A mined transaction
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,

    /// Id of the session a `createVoting` opened, from its `VotingCreated` event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_voting: Option<u64>,
}

/// The raw surface of the voting contract, one method per ABI function.
///
/// Implementations are bound to a single contract address and a single
/// signing account. State-changing calls go through [`estimate_gas`] and
/// [`send`]; `send` returns once the transaction is confirmed.
///
/// [`estimate_gas`]: ContractBackend::estimate_gas
/// [`send`]: ContractBackend::send
#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// Address of the contract
    fn address(&self) -> Address;

    /// Account transactions are signed with
    fn account(&self) -> Address;

    /// Whether there is code at the contract address
    async fn is_deployed(&self) -> Result<bool, CallError>;

    async fn get_total_votings(&self) -> Result<U256, CallError>;

    async fn get_voting_info(&self, voting_id: U256) -> Result<RawVotingInfo, CallError>;

    async fn is_voting_active(&self, voting_id: U256) -> Result<bool, CallError>;

    async fn has_voted(&self, voting_id: U256, voter: Address) -> Result<bool, CallError>;

    async fn get_candidate_info(&self, voting_id: U256, index: U256) -> Result<String, CallError>;

    async fn get_candidate_vote_count(
        &self,
        voting_id: U256,
        index: U256,
    ) -> Result<U256, CallError>;

    async fn estimate_gas(&self, tx: &Transact) -> Result<U256, CallError>;

    async fn send(&self, tx: &Transact, options: TxOptions) -> Result<TxReceipt, CallError>;
}
