use crate::*;
use ethers::types::{Address, U256};

/// Largest number of candidates a voting session may carry
pub const MAX_CANDIDATES: usize = 10;

/// Smallest number of candidates a voting session may carry
pub const MIN_CANDIDATES: usize = 2;

/// One election instance, as reported by the voting contract.
///
/// This is a read-through copy: the contract owns the state and any
/// instance held by the client may be stale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VotingSession {
    /// Assigned by the contract in creation order
    pub id: u64,
    pub title: String,
    pub description: String,

    /// Unix timestamp, seconds
    pub start_time: u64,

    /// Unix timestamp, seconds
    pub end_time: u64,

    /// Set when the creator ended the session early. Never unset.
    pub ended: bool,
    pub creator: Address,
    pub total_voters: u64,

    /// Fixed at creation
    pub candidate_count: u64,
}

impl VotingSession {
    /// Build a session from the raw `getVotingInfo` return tuple
    pub fn from_raw(id: u64, raw: RawVotingInfo) -> Result<Self, CallError> {
        let (title, description, start_time, end_time, ended, creator, total_voters, count) = raw;
        Ok(VotingSession {
            id,
            title,
            description,
            start_time: to_u64(start_time, "startTime")?,
            end_time: to_u64(end_time, "endTime")?,
            ended,
            creator,
            total_voters: to_u64(total_voters, "totalVoters")?,
            candidate_count: to_u64(count, "candidateCount")?,
        })
    }

    /// Whether `account` created this session
    pub fn is_creator(&self, account: Address) -> bool {
        self.creator == account
    }

    /// Seconds left before the session closes by time, negative once passed
    pub fn seconds_remaining(&self, now: u64) -> i64 {
        self.end_time as i64 - now as i64
    }
}

/// A candidate within one voting session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,

    /// Zero-based position within the session
    pub index: u64,
}

impl Candidate {
    /// Stand-in used when a candidate name can't be fetched
    pub fn placeholder(index: u64) -> Self {
        Candidate {
            name: format!("Candidate {}", index + 1),
            index,
        }
    }
}

/// Encrypted input for `vote()`: a 32-byte ciphertext handle and its proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedVote {
    pub handle: [u8; 32],
    pub proof: Vec<u8>,

    /// Placeholder filler instead of real ciphertext. Not private.
    pub simulated: bool,
}

/// Opaque handle to an encrypted tally, returned once a session has ended
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedTally(pub [u8; 32]);

impl EncryptedTally {
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        EncryptedTally(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl std::fmt::Display for EncryptedTally {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Raw `getVotingInfo` outputs, in ABI order
pub type RawVotingInfo = (String, String, U256, U256, bool, Address, U256, U256);

/// Narrow a uint256 return value, treating overflow as undecodable data
pub fn to_u64(value: U256, field: &str) -> Result<u64, CallError> {
    if value > U256::from(u64::MAX) {
        return Err(CallError::Unavailable(format!(
            "could not decode result data: {} does not fit in 64 bits",
            field
        )));
    }
    Ok(value.low_u64())
}

/// Shorten an address for display, `0x1234...abcd`
pub fn short_address(address: Address) -> String {
    let full = format!("{:?}", address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
