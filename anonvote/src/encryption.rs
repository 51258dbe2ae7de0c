//! Client-side vote encryption.
//!
//! The adapter initializes its encryption client in the background. Until it
//! is ready (or if it never becomes ready) the rest of the client keeps
//! working read-only, and votes can only go out as explicitly confirmed,
//! clearly labelled placeholder payloads.

use crate::*;
use async_trait::async_trait;
use ethers::types::Address;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The plaintext every vote encrypts: one vote for the chosen candidate
pub const VOTE_VALUE: u32 = 1;

pub const PLACEHOLDER_HANDLE_BYTE: u8 = 1;
pub const PLACEHOLDER_PROOF_BYTE: u8 = 2;
pub const PLACEHOLDER_PROOF_LEN: usize = 64;

/// Question asked before every placeholder vote
pub const TEST_VOTE_PROMPT: &str = "The vote encryption client is not ready.\n\
     This can happen when you are not on a network with an encryption service,\n\
     the service is unreachable, or its initialization failed.\n\n\
     Submit a TEST VOTE with placeholder data instead?\n\
     It is NOT private and the contract will most likely reject it.";

/// Produces encrypted inputs for the voting contract
#[async_trait]
pub trait VoteEncryptor: Send + Sync {
    /// Encrypt `value` for use by `user` in a call to `contract`
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<EncryptedVote, Error>;
}

/// Asks the human at the keyboard a yes/no question
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every question the same way
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Fixed-length filler submitted in place of real ciphertext
pub fn placeholder_vote() -> EncryptedVote {
    EncryptedVote {
        handle: [PLACEHOLDER_HANDLE_BYTE; 32],
        proof: vec![PLACEHOLDER_PROOF_BYTE; PLACEHOLDER_PROOF_LEN],
        simulated: true,
    }
}

#[derive(Clone)]
enum AdapterState {
    Initializing,
    Ready(Arc<dyn VoteEncryptor>),
    Unavailable(String),
}

/// Readiness of the encryption client, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    Initializing,
    Ready,
    Unavailable(String),
}

/// Wraps a vote encryptor whose initialization may be slow or fail
pub struct EncryptionAdapter {
    state: watch::Receiver<AdapterState>,
    allow_test_votes: bool,
}

impl EncryptionAdapter {
    /// Start initializing in the background. Must be called inside a tokio runtime.
    pub fn spawn<F>(init: F, allow_test_votes: bool) -> Self
    where
        F: Future<Output = Result<Arc<dyn VoteEncryptor>, Error>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(AdapterState::Initializing);
        tokio::spawn(async move {
            let state = match init.await {
                Ok(encryptor) => {
                    info!("vote encryption client ready");
                    AdapterState::Ready(encryptor)
                }
                Err(e) => {
                    warn!("vote encryption client failed to initialize: {}", e);
                    AdapterState::Unavailable(e.to_string())
                }
            };
            tx.send_replace(state);
        });

        EncryptionAdapter {
            state: rx,
            allow_test_votes,
        }
    }

    /// An adapter that is ready immediately
    pub fn ready(encryptor: Arc<dyn VoteEncryptor>, allow_test_votes: bool) -> Self {
        let (_tx, rx) = watch::channel(AdapterState::Ready(encryptor));
        EncryptionAdapter {
            state: rx,
            allow_test_votes,
        }
    }

    /// An adapter that will never be ready
    pub fn unavailable(reason: &str, allow_test_votes: bool) -> Self {
        let (_tx, rx) = watch::channel(AdapterState::Unavailable(reason.to_owned()));
        EncryptionAdapter {
            state: rx,
            allow_test_votes,
        }
    }

    pub fn status(&self) -> AdapterStatus {
        match &*self.state.borrow() {
            AdapterState::Initializing => AdapterStatus::Initializing,
            AdapterState::Ready(_) => AdapterStatus::Ready,
            AdapterState::Unavailable(reason) => AdapterStatus::Unavailable(reason.clone()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == AdapterStatus::Ready
    }

    pub fn allows_test_votes(&self) -> bool {
        self.allow_test_votes
    }

    /// Wait until initialization has either succeeded or failed
    pub async fn settle(&mut self) -> AdapterStatus {
        loop {
            let status = self.status();
            if status != AdapterStatus::Initializing {
                return status;
            }
            if self.state.changed().await.is_err() {
                // Initializer went away without reporting
                return self.status();
            }
        }
    }

    /// Like `settle`, but gives up after `limit` and reports whatever the
    /// status is at that point
    pub async fn settle_within(&mut self, limit: Duration) -> AdapterStatus {
        match tokio::time::timeout(limit, self.settle()).await {
            Ok(status) => status,
            Err(_) => {
                debug!("encryption client still initializing after {:?}", limit);
                self.status()
            }
        }
    }

    /// Produce the encrypted payload for one vote.
    ///
    /// Returns `Ok(None)` when the user declines a placeholder test vote.
    pub async fn prepare_vote(
        &self,
        contract: Address,
        user: Address,
        confirm: &dyn Confirm,
    ) -> Result<Option<EncryptedVote>, Error> {
        let state = self.state.borrow().clone();
        match state {
            AdapterState::Ready(encryptor) => {
                let vote = encryptor.encrypt_u32(contract, user, VOTE_VALUE).await?;
                debug!(
                    "encrypted vote: handle 0x{}, proof {} bytes",
                    hex::encode(vote.handle),
                    vote.proof.len()
                );
                Ok(Some(vote))
            }
            AdapterState::Initializing | AdapterState::Unavailable(_) => {
                if !self.allow_test_votes {
                    return Err(Error::EncryptionFailure(
                        "encryption client is not ready".into(),
                    ));
                }
                if !confirm.confirm(TEST_VOTE_PROMPT) {
                    info!("placeholder test vote declined");
                    return Ok(None);
                }
                warn!("encryption client unavailable, using placeholder test vote");
                Ok(Some(placeholder_vote()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConfirm {
        answer: bool,
        asked: AtomicUsize,
    }

    impl Confirm for CountingConfirm {
        fn confirm(&self, prompt: &str) -> bool {
            assert!(prompt.contains("TEST VOTE"));
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    struct Broken;

    #[async_trait]
    impl VoteEncryptor for Broken {
        async fn encrypt_u32(&self, _: Address, _: Address, _: u32) -> Result<EncryptedVote, Error> {
            Err(Error::EncryptionFailure("boom".into()))
        }
    }

    #[tokio::test]
    async fn ready_adapter_encrypts() {
        let adapter = EncryptionAdapter::ready(Arc::new(MemEncryptor::new()), true);
        let confirm = CountingConfirm {
            answer: true,
            asked: AtomicUsize::new(0),
        };

        let vote = adapter
            .prepare_vote(Address::repeat_byte(1), Address::repeat_byte(2), &confirm)
            .await
            .unwrap()
            .unwrap();
        assert!(!vote.simulated);
        assert_eq!(confirm.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn encryption_errors_surface() {
        let adapter = EncryptionAdapter::ready(Arc::new(Broken), true);
        let err = adapter
            .prepare_vote(Address::zero(), Address::zero(), &FixedAnswer(true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncryptionFailure(_)));
    }

    #[tokio::test]
    async fn placeholder_needs_confirmation_every_time() {
        let adapter = EncryptionAdapter::unavailable("no relayer", true);
        let confirm = CountingConfirm {
            answer: true,
            asked: AtomicUsize::new(0),
        };

        for _ in 0..2 {
            let vote = adapter
                .prepare_vote(Address::zero(), Address::zero(), &confirm)
                .await
                .unwrap()
                .unwrap();
            assert!(vote.simulated);
            assert_eq!(vote, placeholder_vote());
        }
        assert_eq!(confirm.asked.load(Ordering::SeqCst), 2);

        let declined = adapter
            .prepare_vote(Address::zero(), Address::zero(), &FixedAnswer(false))
            .await
            .unwrap();
        assert!(declined.is_none());
    }

    #[tokio::test]
    async fn placeholder_can_be_disabled() {
        let adapter = EncryptionAdapter::unavailable("no relayer", false);
        let err = adapter
            .prepare_vote(Address::zero(), Address::zero(), &FixedAnswer(true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncryptionFailure(_)));
    }

    #[tokio::test]
    async fn background_initialization() {
        let mut adapter = EncryptionAdapter::spawn(
            async { Ok(Arc::new(MemEncryptor::new()) as Arc<dyn VoteEncryptor>) },
            false,
        );
        assert_eq!(adapter.settle().await, AdapterStatus::Ready);

        let mut failed = EncryptionAdapter::spawn(
            async { Err(Error::EncryptionFailure("unreachable".into())) },
            false,
        );
        match failed.settle().await {
            AdapterStatus::Unavailable(reason) => assert!(reason.contains("unreachable")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn hung_initialization_does_not_block() {
        let mut adapter = EncryptionAdapter::spawn(
            async {
                std::future::pending::<()>().await;
                Err(Error::EncryptionFailure("never".into()))
            },
            true,
        );

        let status = adapter.settle_within(Duration::from_millis(50)).await;
        assert_eq!(status, AdapterStatus::Initializing);

        // Placeholder path stays available while waiting
        let vote = adapter
            .prepare_vote(Address::zero(), Address::zero(), &FixedAnswer(true))
            .await
            .unwrap()
            .unwrap();
        assert!(vote.simulated);
    }
}
