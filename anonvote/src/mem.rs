//! In-memory stand-ins for the chain, the voting contract, the wallet and the
//! encryption service.
//!
//! `MemChain` reproduces the voting contract's observable behavior (revert
//! reasons, time window, creator-only early end, one vote per account, opaque
//! tally handles) closely enough to exercise the whole client without a node.

use crate::*;
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Simulated gas cost of `vote`
pub const VOTE_GAS: u64 = 180_000;

/// Simulated gas cost of `endVoting`
pub const END_VOTING_GAS: u64 = 45_000;

/// Simulated base gas cost of `createVoting`, plus [`CANDIDATE_GAS`] per candidate
pub const CREATE_VOTING_GAS: u64 = 250_000;
pub const CANDIDATE_GAS: u64 = 50_000;

/// Start time of a fresh chain
pub const GENESIS_TIME: u64 = 1_700_000_000;

struct MemSession {
    title: String,
    description: String,
    start_time: u64,
    end_time: u64,
    ended: bool,
    creator: Address,
    candidates: Vec<String>,
    tallies: Vec<[u8; 32]>,
    voters: HashSet<Address>,
}

#[derive(Default)]
struct MemContractState {
    sessions: Vec<MemSession>,
}

struct ChainState {
    chain_id: u64,
    now: u64,
    balances: HashMap<Address, U256>,
    contracts: HashMap<Address, MemContractState>,
    verify_proofs: bool,
    broken_candidate_names: bool,
    undecodable_sessions: HashSet<u64>,
    tx_count: u64,
    last_options: Option<TxOptions>,
    next_contract: u64,
}

/// A simulated chain holding voting contracts
#[derive(Clone)]
pub struct MemChain {
    inner: Arc<Mutex<ChainState>>,
}

impl MemChain {
    pub fn new(chain_id: u64) -> Self {
        MemChain {
            inner: Arc::new(Mutex::new(ChainState {
                chain_id,
                now: GENESIS_TIME,
                balances: HashMap::new(),
                contracts: HashMap::new(),
                verify_proofs: true,
                broken_candidate_names: false,
                undecodable_sessions: HashSet::new(),
                tx_count: 0,
                last_options: None,
                next_contract: 1,
            })),
        }
    }

    /// Deploy a fresh voting contract and return its address
    pub async fn deploy(&self) -> Address {
        let mut state = self.inner.lock().await;
        let address = Address::from_low_u64_be(0xc0de_0000 + state.next_contract);
        state.next_contract += 1;
        state
            .contracts
            .insert(address, MemContractState::default());
        address
    }

    /// The contract at `address`, signing as `account`
    pub fn contract(&self, address: Address, account: Address) -> MemContract {
        MemContract {
            chain: self.clone(),
            address,
            account,
        }
    }

    pub async fn fund(&self, account: Address, amount: U256) {
        self.inner.lock().await.balances.insert(account, amount);
    }

    pub async fn chain_id(&self) -> u64 {
        self.inner.lock().await.chain_id
    }

    pub async fn set_chain_id(&self, chain_id: u64) {
        self.inner.lock().await.chain_id = chain_id;
    }

    /// Current block time
    pub async fn now(&self) -> u64 {
        self.inner.lock().await.now
    }

    /// Move block time forward
    pub async fn advance(&self, seconds: u64) {
        self.inner.lock().await.now += seconds;
    }

    /// Accept any vote proof, like a misconfigured contract would
    pub async fn skip_proof_verification(&self) {
        self.inner.lock().await.verify_proofs = false;
    }

    /// Make every `getCandidateInfo` call fail to decode
    pub async fn break_candidate_names(&self) {
        self.inner.lock().await.broken_candidate_names = true;
    }

    /// Make `getVotingInfo(voting_id)` return undecodable data
    pub async fn corrupt_session(&self, voting_id: u64) {
        self.inner
            .lock()
            .await
            .undecodable_sessions
            .insert(voting_id);
    }

    /// Number of transactions submitted, mined or reverted
    pub async fn transaction_count(&self) -> u64 {
        self.inner.lock().await.tx_count
    }

    /// Options of the most recent submitted transaction
    pub async fn last_options(&self) -> Option<TxOptions> {
        self.inner.lock().await.last_options
    }
}

/// Expected proof for an encrypted input, as `MemEncryptor` issues it
pub fn input_proof(contract: Address, user: Address, handle: &[u8; 32]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(b"input-proof");
    hasher.update(contract.as_bytes());
    hasher.update(user.as_bytes());
    hasher.update(handle);
    hasher.finalize().to_vec()
}

fn initial_tally(contract: Address, voting_id: u64, index: usize) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"tally");
    hasher.update(contract.as_bytes());
    hasher.update(voting_id.to_be_bytes());
    hasher.update((index as u64).to_be_bytes());
    hasher.finalize().into()
}

fn add_to_tally(tally: &[u8; 32], input: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tally);
    hasher.update(input);
    hasher.finalize().into()
}

fn revert(reason: &str) -> CallError {
    CallError::Reverted(reason.to_owned())
}

fn voting_index(voting_id: U256) -> Result<usize, CallError> {
    if voting_id > U256::from(u32::MAX) {
        return Err(revert(REVERT_NOT_FOUND));
    }
    Ok(voting_id.low_u64() as usize)
}

impl MemContractState {
    fn session(&self, voting_id: U256) -> Result<&MemSession, CallError> {
        self.sessions
            .get(voting_index(voting_id)?)
            .ok_or_else(|| revert(REVERT_NOT_FOUND))
    }

    fn session_mut(&mut self, voting_id: u64) -> Result<&mut MemSession, CallError> {
        self.sessions
            .get_mut(voting_id as usize)
            .ok_or_else(|| revert(REVERT_NOT_FOUND))
    }
}

impl MemSession {
    fn is_active(&self, now: u64) -> bool {
        !self.ended && now >= self.start_time && now < self.end_time
    }
}

impl ChainState {
    fn contract(&self, address: Address) -> Result<&MemContractState, CallError> {
        self.contracts.get(&address).ok_or_else(|| {
            CallError::Unavailable(format!(
                "could not decode result data (value=\"0x\"): no code at {:?}",
                address
            ))
        })
    }

    /// Run `tx` against the contract. With `commit` false nothing changes.
    fn execute(
        &mut self,
        address: Address,
        sender: Address,
        tx: &Transact,
        commit: bool,
    ) -> Result<u64, CallError> {
        let now = self.now;
        let verify_proofs = self.verify_proofs;
        let contract = self.contracts.get_mut(&address).ok_or_else(|| {
            CallError::Unavailable(format!("no code at {:?}", address))
        })?;

        match tx {
            Transact::CreateVoting {
                title,
                description,
                candidates,
                duration,
            } => {
                if candidates.len() < MIN_CANDIDATES {
                    return Err(revert(REVERT_TOO_FEW_CANDIDATES));
                }
                if candidates.len() > MAX_CANDIDATES {
                    return Err(revert(REVERT_TOO_MANY_CANDIDATES));
                }
                if *duration == 0 {
                    return Err(revert(REVERT_BAD_DURATION));
                }
                if commit {
                    let voting_id = contract.sessions.len() as u64;
                    let tallies = (0..candidates.len())
                        .map(|i| initial_tally(address, voting_id, i))
                        .collect();
                    contract.sessions.push(MemSession {
                        title: title.clone(),
                        description: description.clone(),
                        start_time: now,
                        end_time: now + duration,
                        ended: false,
                        creator: sender,
                        candidates: candidates.clone(),
                        tallies,
                        voters: HashSet::new(),
                    });
                }
                Ok(CREATE_VOTING_GAS + CANDIDATE_GAS * candidates.len() as u64)
            }
            Transact::Vote {
                voting_id,
                candidate_index,
                handle,
                proof,
            } => {
                let session = contract.session_mut(*voting_id)?;
                if session.ended {
                    return Err(revert(REVERT_MANUALLY_ENDED));
                }
                if now >= session.end_time {
                    return Err(revert(REVERT_ENDED));
                }
                if session.voters.contains(&sender) {
                    return Err(revert(REVERT_ALREADY_VOTED));
                }
                if *candidate_index >= session.candidates.len() as u64 {
                    return Err(revert(REVERT_INVALID_CANDIDATE));
                }
                if verify_proofs && *proof != input_proof(address, sender, handle) {
                    return Err(revert(REVERT_INVALID_PROOF));
                }
                if commit {
                    let index = *candidate_index as usize;
                    session.tallies[index] = add_to_tally(&session.tallies[index], handle);
                    session.voters.insert(sender);
                }
                Ok(VOTE_GAS)
            }
            Transact::EndVoting { voting_id } => {
                let session = contract.session_mut(*voting_id)?;
                if session.creator != sender {
                    return Err(revert(REVERT_NOT_CREATOR));
                }
                if session.ended {
                    return Err(revert(REVERT_ALREADY_ENDED));
                }
                if commit {
                    session.ended = true;
                }
                Ok(END_VOTING_GAS)
            }
        }
    }
}

/// The voting contract on a [`MemChain`], bound to one signing account
#[derive(Clone)]
pub struct MemContract {
    chain: MemChain,
    address: Address,
    account: Address,
}

#[async_trait]
impl ContractBackend for MemContract {
    fn address(&self) -> Address {
        self.address
    }

    fn account(&self) -> Address {
        self.account
    }

    async fn is_deployed(&self) -> Result<bool, CallError> {
        let state = self.chain.inner.lock().await;
        Ok(state.contracts.contains_key(&self.address))
    }

    async fn get_total_votings(&self) -> Result<U256, CallError> {
        let state = self.chain.inner.lock().await;
        Ok(state.contract(self.address)?.sessions.len().into())
    }

    async fn get_voting_info(&self, voting_id: U256) -> Result<RawVotingInfo, CallError> {
        let state = self.chain.inner.lock().await;
        let session = state.contract(self.address)?.session(voting_id)?;
        if state.undecodable_sessions.contains(&voting_id.low_u64()) {
            return Err(CallError::Unavailable(
                "could not decode result data".into(),
            ));
        }
        Ok((
            session.title.clone(),
            session.description.clone(),
            session.start_time.into(),
            session.end_time.into(),
            session.ended,
            session.creator,
            session.voters.len().into(),
            session.candidates.len().into(),
        ))
    }

    async fn is_voting_active(&self, voting_id: U256) -> Result<bool, CallError> {
        let state = self.chain.inner.lock().await;
        let session = state.contract(self.address)?.session(voting_id)?;
        Ok(session.is_active(state.now))
    }

    async fn has_voted(&self, voting_id: U256, voter: Address) -> Result<bool, CallError> {
        let state = self.chain.inner.lock().await;
        let session = state.contract(self.address)?.session(voting_id)?;
        Ok(session.voters.contains(&voter))
    }

    async fn get_candidate_info(&self, voting_id: U256, index: U256) -> Result<String, CallError> {
        let state = self.chain.inner.lock().await;
        let session = state.contract(self.address)?.session(voting_id)?;
        if state.broken_candidate_names {
            return Err(CallError::Unavailable(
                "could not decode result data".into(),
            ));
        }
        session
            .candidates
            .get(voting_index(index)?)
            .cloned()
            .ok_or_else(|| revert(REVERT_INVALID_CANDIDATE))
    }

    async fn get_candidate_vote_count(
        &self,
        voting_id: U256,
        index: U256,
    ) -> Result<U256, CallError> {
        let state = self.chain.inner.lock().await;
        let session = state.contract(self.address)?.session(voting_id)?;
        if session.is_active(state.now) {
            return Err(revert(REVERT_STILL_ACTIVE));
        }
        session
            .tallies
            .get(voting_index(index)?)
            .map(|handle| U256::from_big_endian(handle))
            .ok_or_else(|| revert(REVERT_INVALID_CANDIDATE))
    }

    async fn estimate_gas(&self, tx: &Transact) -> Result<U256, CallError> {
        let mut state = self.chain.inner.lock().await;
        state
            .execute(self.address, self.account, tx, false)
            .map(U256::from)
    }

    async fn send(&self, tx: &Transact, options: TxOptions) -> Result<TxReceipt, CallError> {
        let mut state = self.chain.inner.lock().await;
        let balance = state
            .balances
            .get(&self.account)
            .copied()
            .unwrap_or_default();
        if balance.is_zero() {
            return Err(CallError::Unavailable(
                "insufficient funds for gas * price + value".into(),
            ));
        }

        state.tx_count += 1;
        state.last_options = Some(options);

        let needed = state.execute(self.address, self.account, tx, false)?;
        if let Some(limit) = options.gas_limit {
            if limit < U256::from(needed) {
                return Err(revert("out of gas"));
            }
        }
        let created_voting = match tx {
            Transact::CreateVoting { .. } => {
                Some(state.contract(self.address)?.sessions.len() as u64)
            }
            _ => None,
        };
        state.execute(self.address, self.account, tx, true)?;

        let mut hasher = Sha256::new();
        hasher.update(state.tx_count.to_be_bytes());
        hasher.update(self.account.as_bytes());
        Ok(TxReceipt {
            tx_hash: H256::from_slice(&hasher.finalize()),
            block_number: Some(state.tx_count),
            gas_used: Some(needed.into()),
            created_voting,
        })
    }
}

struct WalletState {
    accounts: Vec<Address>,
}

/// A simulated browser wallet on a [`MemChain`]
#[derive(Clone)]
pub struct MemWallet {
    chain: MemChain,
    state: Arc<Mutex<WalletState>>,
    events: broadcast::Sender<WalletEvent>,
}

impl MemWallet {
    pub fn new(chain: MemChain, accounts: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        MemWallet {
            chain,
            state: Arc::new(Mutex::new(WalletState { accounts })),
            events,
        }
    }

    /// Change the authorized accounts and notify subscribers
    pub async fn set_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().await.accounts = accounts.clone();
        let _ = self.events.send(WalletEvent::AccountsChanged(accounts));
    }

    /// Switch networks and notify subscribers
    pub async fn switch_chain(&self, chain_id: u64) {
        self.chain.set_chain_id(chain_id).await;
        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
    }
}

#[async_trait]
impl WalletProvider for MemWallet {
    type Signer = MemContract;

    async fn request_accounts(&self) -> Result<Vec<Address>, CallError> {
        Ok(self.state.lock().await.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, CallError> {
        Ok(self.chain.chain_id().await)
    }

    async fn balance(&self, account: Address) -> Result<U256, CallError> {
        let state = self.chain.inner.lock().await;
        Ok(state.balances.get(&account).copied().unwrap_or_default())
    }

    async fn code(&self, address: Address) -> Result<Vec<u8>, CallError> {
        let state = self.chain.inner.lock().await;
        if state.contracts.contains_key(&address) {
            Ok(vec![0x60, 0x80, 0x60, 0x40])
        } else {
            Ok(vec![])
        }
    }

    async fn signer(&self, account: Address, contract: Address) -> Result<MemContract, CallError> {
        Ok(self.chain.contract(contract, account))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

/// Issues encrypted inputs that [`MemChain`] accepts
#[derive(Default)]
pub struct MemEncryptor;

impl MemEncryptor {
    pub fn new() -> Self {
        MemEncryptor
    }
}

#[async_trait]
impl VoteEncryptor for MemEncryptor {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<EncryptedVote, Error> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut hasher = Sha256::new();
        hasher.update(nonce);
        hasher.update(value.to_be_bytes());
        let handle: [u8; 32] = hasher.finalize().into();

        Ok(EncryptedVote {
            handle,
            proof: input_proof(contract, user, &handle),
            simulated: false,
        })
    }
}
