use crate::*;
use ethers::types::{Address, U256};
use std::collections::HashSet;

/// How transactions are priced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    /// Applied to the gas estimate of a vote, e.g. 120 for 120%
    pub margin_percent: u64,

    /// Explicit gas price for votes and early ends, in wei
    pub gas_price: U256,

    /// Fixed gas limit for `endVoting`
    pub end_voting_gas_limit: U256,
}

impl Default for GasPolicy {
    fn default() -> Self {
        GasPolicy {
            margin_percent: 120,
            gas_price: U256::from(20u64) * U256::exp10(9),
            end_voting_gas_limit: U256::from(200_000u64),
        }
    }
}

impl GasPolicy {
    /// Gas limit for a call whose estimate is `estimate`
    pub fn with_margin(&self, estimate: U256) -> U256 {
        estimate * U256::from(self.margin_percent) / U256::from(100u64)
    }
}

/// Domain-level access to the voting contract.
///
/// Every failure is translated into [`Error`]: reverts by their reason,
/// transport and decoding problems as `ContractUnavailable`.
pub struct Gateway<B> {
    backend: B,
    gas: GasPolicy,
}

impl<B: ContractBackend> Gateway<B> {
    pub fn new(backend: B, gas: GasPolicy) -> Self {
        Gateway { backend, gas }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn gas_policy(&self) -> GasPolicy {
        self.gas
    }

    /// Account that signs this gateway's transactions
    pub fn account(&self) -> Address {
        self.backend.account()
    }

    /// Address of the contract
    pub fn address(&self) -> Address {
        self.backend.address()
    }

    /// Fail with `ContractUnavailable` unless there is code at the contract address
    pub async fn ensure_deployed(&self) -> Result<(), Error> {
        let deployed = self
            .backend
            .is_deployed()
            .await
            .map_err(|e| Error::from_call(e, None))?;
        if !deployed {
            return Err(Error::ContractUnavailable(format!(
                "no contract deployed at {:?}",
                self.address()
            )));
        }
        Ok(())
    }

    /// Confirm a freshly deployed contract answers, returning its session count
    pub async fn verify_deployment(&self) -> Result<u64, Error> {
        self.ensure_deployed().await?;
        let total = self.get_total_votings().await?;
        info!(
            "contract at {:?} answers, {} voting sessions",
            self.address(),
            total
        );
        Ok(total)
    }

    pub async fn get_total_votings(&self) -> Result<u64, Error> {
        let total = self
            .backend
            .get_total_votings()
            .await
            .map_err(|e| Error::from_call(e, None))?;
        to_u64(total, "getTotalVotings").map_err(|e| Error::from_call(e, None))
    }

    pub async fn get_voting_info(&self, voting_id: u64) -> Result<VotingSession, Error> {
        let raw = self
            .backend
            .get_voting_info(voting_id.into())
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))?;
        VotingSession::from_raw(voting_id, raw).map_err(|e| Error::from_call(e, Some(voting_id)))
    }

    pub async fn is_voting_active(&self, voting_id: u64) -> Result<bool, Error> {
        self.backend
            .is_voting_active(voting_id.into())
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))
    }

    pub async fn has_voted(&self, voting_id: u64, account: Address) -> Result<bool, Error> {
        self.backend
            .has_voted(voting_id.into(), account)
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))
    }

    pub async fn get_candidate_info(&self, voting_id: u64, index: u64) -> Result<String, Error> {
        self.backend
            .get_candidate_info(voting_id.into(), index.into())
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))
    }

    /// Encrypted tally handle for one candidate. Only available once the session has ended.
    pub async fn get_candidate_vote_count(
        &self,
        voting_id: u64,
        index: u64,
    ) -> Result<EncryptedTally, Error> {
        let handle = self
            .backend
            .get_candidate_vote_count(voting_id.into(), index.into())
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))?;
        Ok(EncryptedTally::from_u256(handle))
    }

    /// Create a voting session and wait for it to be mined.
    ///
    /// The candidate list is checked before anything is submitted.
    pub async fn create_voting(
        &self,
        title: &str,
        description: &str,
        candidates: &[String],
        duration_seconds: u64,
    ) -> Result<TxReceipt, Error> {
        check_candidates(candidates)?;

        let tx = Transact::CreateVoting {
            title: title.to_owned(),
            description: description.to_owned(),
            candidates: candidates.to_vec(),
            duration: duration_seconds,
        };
        let receipt = self.submit(&tx, TxOptions::default()).await?;
        info!(
            "voting \"{}\" created in transaction {:?}",
            title, receipt.tx_hash
        );
        Ok(receipt)
    }

    /// Cast an encrypted vote and wait for it to be mined.
    ///
    /// Gas is estimated first and the limit padded by the policy's margin.
    pub async fn vote(
        &self,
        voting_id: u64,
        candidate_index: u64,
        vote: &EncryptedVote,
    ) -> Result<TxReceipt, Error> {
        if vote.simulated {
            warn!(
                "submitting a placeholder test vote to voting {}; it is not private",
                voting_id
            );
        }

        let tx = Transact::Vote {
            voting_id,
            candidate_index,
            handle: vote.handle,
            proof: vote.proof.clone(),
        };

        let estimate = self
            .backend
            .estimate_gas(&tx)
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))?;
        let gas_limit = self.gas.with_margin(estimate);
        debug!("vote gas estimate {}, limit {}", estimate, gas_limit);

        let options = TxOptions {
            gas_limit: Some(gas_limit),
            gas_price: Some(self.gas.gas_price),
        };
        let receipt = self.submit(&tx, options).await?;
        info!(
            "vote for voting {} mined in transaction {:?}",
            voting_id, receipt.tx_hash
        );
        Ok(receipt)
    }

    /// End a session early. The contract only allows the creator to do this.
    ///
    /// The call is simulated first so a refusal comes back with its revert
    /// reason. A mined failure carries none.
    pub async fn end_voting(&self, voting_id: u64) -> Result<TxReceipt, Error> {
        let tx = Transact::EndVoting { voting_id };
        let estimate = self
            .backend
            .estimate_gas(&tx)
            .await
            .map_err(|e| Error::from_call(e, Some(voting_id)))?;
        debug!(
            "endVoting gas estimate {}, limit {}",
            estimate, self.gas.end_voting_gas_limit
        );

        let options = TxOptions {
            gas_limit: Some(self.gas.end_voting_gas_limit),
            gas_price: Some(self.gas.gas_price),
        };
        let receipt = self.submit(&tx, options).await?;
        info!(
            "voting {} ended in transaction {:?}",
            voting_id, receipt.tx_hash
        );
        Ok(receipt)
    }

    async fn submit(&self, tx: &Transact, options: TxOptions) -> Result<TxReceipt, Error> {
        self.backend
            .send(tx, options)
            .await
            .map_err(|e| Error::from_call(e, tx.voting_id()))
    }
}

/// Candidate-list rules the contract enforces, checked up front to avoid wasted gas
pub fn check_candidates(candidates: &[String]) -> Result<(), ValidationError> {
    if candidates.len() < MIN_CANDIDATES {
        return Err(ValidationError::TooFewCandidates);
    }
    if candidates.len() > MAX_CANDIDATES {
        return Err(ValidationError::TooManyCandidates);
    }

    let unique: HashSet<&str> = candidates.iter().map(|c| c.as_str()).collect();
    if unique.len() != candidates.len() {
        return Err(ValidationError::DuplicateCandidates);
    }

    Ok(())
}
