use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("anonvote: no wallet provider available: {0}")]
    WalletNotFound(String),

    #[error("anonvote: account {0} has no funds to pay for gas")]
    InsufficientFunds(String),

    #[error("anonvote: contract unavailable: {0}")]
    ContractUnavailable(String),

    #[error("anonvote: voting {0} does not exist")]
    VotingNotFound(u64),

    #[error("anonvote: results for voting {0} are not available until it ends")]
    ResultsNotYetAvailable(u64),

    #[error("anonvote: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("anonvote: vote encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("anonvote: transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("anonvote: this account has already voted in voting {0}")]
    DoubleVote(u64),

    #[error("anonvote: unauthorized: {0}")]
    Unauthorized(String),

    #[error("anonvote: configuration error: {0}")]
    Config(String),
}

/// Client-side form validation errors
///
/// Only the first failing rule is ever reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please enter a title")]
    EmptyTitle,

    #[error("please enter a description")]
    EmptyDescription,

    #[error("duration must be at least 1 hour")]
    DurationTooShort,

    #[error("duration must be at most {0} hours")]
    DurationTooLong(i64),

    #[error("at least 2 candidates are required")]
    TooFewCandidates,

    #[error("at most 10 candidates are allowed")]
    TooManyCandidates,

    #[error("candidate names must be unique")]
    DuplicateCandidates,

    #[error("select a candidate first")]
    NoCandidateSelected,

    #[error("candidate index {0} is out of range")]
    InvalidCandidateIndex(u64),

    #[error("this voting is not accepting votes")]
    VotingClosed,
}

/// Failure of a single raw contract call, before translation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("{0}")]
    Unavailable(String),
}

impl Error {
    /// Translate a failed contract call into the client error taxonomy.
    ///
    /// `voting_id` is the session the call targeted, when there is one.
    pub fn from_call(err: CallError, voting_id: Option<u64>) -> Self {
        match err {
            CallError::Unavailable(detail) => Error::ContractUnavailable(detail),
            CallError::Reverted(reason) => {
                let id = voting_id.unwrap_or_default();
                match reason.as_str() {
                    REVERT_NOT_FOUND => Error::VotingNotFound(id),
                    REVERT_STILL_ACTIVE => Error::ResultsNotYetAvailable(id),
                    REVERT_ALREADY_VOTED => Error::DoubleVote(id),
                    REVERT_NOT_CREATOR => Error::Unauthorized(reason),
                    _ => Error::TransactionReverted(reason),
                }
            }
        }
    }

    /// Whether the UI should offer a retry rather than a form correction
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ContractUnavailable(_) | Error::WalletNotFound(_))
    }
}

// Revert reasons emitted by the voting contract
pub const REVERT_NOT_FOUND: &str = "Voting does not exist";
pub const REVERT_STILL_ACTIVE: &str = "Voting is still active";
pub const REVERT_ALREADY_VOTED: &str = "Address has already voted";
pub const REVERT_NOT_CREATOR: &str = "Only voting creator can perform this action";
pub const REVERT_MANUALLY_ENDED: &str = "Voting has been manually ended";
pub const REVERT_ENDED: &str = "Voting has ended";
pub const REVERT_ALREADY_ENDED: &str = "Voting already ended";
pub const REVERT_INVALID_CANDIDATE: &str = "Invalid candidate index";
pub const REVERT_TOO_FEW_CANDIDATES: &str = "At least 2 candidates required";
pub const REVERT_TOO_MANY_CANDIDATES: &str = "Maximum 10 candidates allowed";
pub const REVERT_INVALID_PROOF: &str = "Invalid input proof";
pub const REVERT_BAD_DURATION: &str = "Duration must be positive";
