use crate::*;
use ethers::types::Address;
use std::fmt::Write;

/// One session with its candidates, as the details view shows it
#[derive(Serialize, Debug, Clone)]
pub struct VotingDetail {
    pub account: Address,
    pub session: VotingSession,
    pub active: bool,
    pub has_voted: bool,
    pub candidates: Vec<Candidate>,

    /// Candidate names could not be fetched and are placeholders
    pub placeholder_candidates: bool,
}

impl VotingDetail {
    /// Fetch one session and its candidates.
    ///
    /// The voted flag and the candidate names are read tolerantly so the
    /// session stays usable: a failed voted check reads as "not voted", and
    /// failed names are replaced by "Candidate N".
    pub async fn load<B: ContractBackend>(
        gateway: &Gateway<B>,
        account: Address,
        voting_id: u64,
    ) -> Result<Self, Error> {
        let total = gateway.get_total_votings().await?;
        if voting_id >= total {
            return Err(Error::VotingNotFound(voting_id));
        }

        let session = gateway.get_voting_info(voting_id).await?;
        let active = gateway.is_voting_active(voting_id).await?;

        let has_voted = match gateway.has_voted(voting_id, account).await {
            Ok(voted) => voted,
            Err(e) => {
                warn!("could not check vote status for voting {}: {}", voting_id, e);
                false
            }
        };

        let mut candidates = Vec::new();
        let mut placeholder_candidates = false;
        for index in 0..session.candidate_count {
            match gateway.get_candidate_info(voting_id, index).await {
                Ok(name) => candidates.push(Candidate { name, index }),
                Err(e) => {
                    warn!("could not load candidates of voting {}: {}", voting_id, e);
                    placeholder_candidates = true;
                    break;
                }
            }
        }
        if placeholder_candidates {
            candidates = (0..session.candidate_count)
                .map(Candidate::placeholder)
                .collect();
        }

        Ok(VotingDetail {
            account,
            session,
            active,
            has_voted,
            candidates,
            placeholder_candidates,
        })
    }

    /// Whether the current account may vote
    pub fn can_vote(&self) -> bool {
        self.active && !self.has_voted
    }

    /// Whether to offer the early-end control
    pub fn can_end(&self) -> bool {
        self.active && self.session.is_creator(self.account)
    }

    /// Encrypt and cast a vote for the selected candidate.
    ///
    /// Returns `Ok(None)` if the user declined a placeholder test vote.
    pub async fn cast_vote<B: ContractBackend>(
        &self,
        gateway: &Gateway<B>,
        adapter: &EncryptionAdapter,
        confirm: &dyn Confirm,
        selection: Option<u64>,
    ) -> Result<Option<TxReceipt>, Error> {
        let index = selection.ok_or(ValidationError::NoCandidateSelected)?;
        if self.has_voted {
            return Err(Error::DoubleVote(self.session.id));
        }
        if !self.active {
            return Err(ValidationError::VotingClosed.into());
        }
        if index >= self.session.candidate_count {
            return Err(ValidationError::InvalidCandidateIndex(index).into());
        }

        let vote = match adapter
            .prepare_vote(gateway.address(), gateway.account(), confirm)
            .await?
        {
            Some(vote) => vote,
            None => return Ok(None),
        };

        gateway.vote(self.session.id, index, &vote).await.map(Some)
    }

    /// End the session early. Only the creator may; the contract rejects anyone else.
    pub async fn end<B: ContractBackend>(&self, gateway: &Gateway<B>) -> Result<TxReceipt, Error> {
        gateway.end_voting(self.session.id).await
    }

    /// Encrypted tally handle of every candidate. Fails while the session is active.
    pub async fn results<B: ContractBackend>(
        &self,
        gateway: &Gateway<B>,
    ) -> Result<Vec<(Candidate, EncryptedTally)>, Error> {
        let mut results = Vec::with_capacity(self.candidates.len());
        for candidate in self.candidates.iter() {
            let tally = gateway
                .get_candidate_vote_count(self.session.id, candidate.index)
                .await?;
            results.push((candidate.clone(), tally));
        }
        Ok(results)
    }

    pub fn render(&self, now: u64, encryption: &AdapterStatus) -> String {
        let session = &self.session;
        let mut out = String::new();

        let _ = writeln!(out, "#{} {}", session.id, session.title);
        let _ = writeln!(out, "  {}", session.description);
        let _ = writeln!(
            out,
            "  creator:   {}",
            creator_label(session.creator, self.account)
        );
        let _ = writeln!(out, "  start:     {}", format_timestamp(session.start_time));
        let _ = writeln!(out, "  end:       {}", format_timestamp(session.end_time));
        let _ = writeln!(
            out,
            "  remaining: {}",
            time_remaining(session.end_time, now)
        );
        let _ = writeln!(out, "  voters:    {}", session.total_voters);
        let state = if session.ended || !self.active {
            "ended"
        } else {
            "in progress"
        };
        let _ = writeln!(out, "  status:    {}", state);
        let voted = if self.has_voted { "voted" } else { "not voted" };
        let _ = writeln!(out, "  you:       {}", voted);

        match encryption {
            AdapterStatus::Ready => {
                let _ = writeln!(out, "  encryption ready");
            }
            AdapterStatus::Initializing => {
                let _ = writeln!(out, "  encryption initializing (test votes possible)");
            }
            AdapterStatus::Unavailable(reason) => {
                let _ = writeln!(
                    out,
                    "  encryption unavailable: {} (test votes possible)",
                    reason
                );
            }
        }

        out.push_str("\nCandidates:\n");
        for candidate in self.candidates.iter() {
            let _ = writeln!(out, "  [{}] {}", candidate.index, candidate.name);
        }
        if self.placeholder_candidates {
            out.push_str("  (candidate names could not be loaded)\n");
        }

        if self.can_vote() {
            match encryption {
                AdapterStatus::Ready => out.push_str("\nvote <index> to cast an encrypted vote\n"),
                _ => out.push_str("\nvote <index> to cast a TEST VOTE (not private)\n"),
            }
        } else if self.has_voted {
            out.push_str("\nYou have voted. Thank you!\n");
        }
        if !self.active {
            out.push_str("\nVoting has ended. Tallies are kept encrypted on chain.\n");
        }
        if self.can_end() {
            out.push_str("end to close this voting early\n");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use std::sync::Arc;

    struct Fixture {
        chain: MemChain,
        address: Address,
        creator: Address,
        voter: Address,
    }

    impl Fixture {
        async fn new() -> Self {
            let chain = MemChain::new(31337);
            let creator = Address::repeat_byte(0xc1);
            let voter = Address::repeat_byte(0xd2);
            chain.fund(creator, U256::exp10(18)).await;
            chain.fund(voter, U256::exp10(18)).await;
            let address = chain.deploy().await;

            let names: Vec<String> = vec!["Alice Smith".into(), "Bob Johnson".into()];
            Gateway::new(chain.contract(address, creator), GasPolicy::default())
                .create_voting("President", "Choose", &names, 3600)
                .await
                .unwrap();

            Fixture {
                chain,
                address,
                creator,
                voter,
            }
        }

        fn gateway(&self, account: Address) -> Gateway<MemContract> {
            Gateway::new(self.chain.contract(self.address, account), GasPolicy::default())
        }
    }

    fn ready() -> EncryptionAdapter {
        EncryptionAdapter::ready(Arc::new(MemEncryptor::new()), false)
    }

    #[tokio::test]
    async fn loads_candidates() {
        let fx = Fixture::new().await;
        let gateway = fx.gateway(fx.voter);
        let detail = VotingDetail::load(&gateway, fx.voter, 0).await.unwrap();

        assert_eq!(detail.candidates.len(), 2);
        assert_eq!(detail.candidates[1].name, "Bob Johnson");
        assert!(!detail.placeholder_candidates);
        assert!(detail.can_vote());
        assert!(!detail.can_end());

        let rendered = detail.render(fx.chain.now().await, &AdapterStatus::Ready);
        assert!(rendered.contains("[1] Bob Johnson"));
        assert!(rendered.contains("remaining: 1h 0m"));
        assert!(!rendered.contains("end to close"));
    }

    #[tokio::test]
    async fn out_of_range_id() {
        let fx = Fixture::new().await;
        let err = VotingDetail::load(&fx.gateway(fx.voter), fx.voter, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VotingNotFound(5)));
    }

    #[tokio::test]
    async fn placeholder_candidates() {
        let fx = Fixture::new().await;
        fx.chain.break_candidate_names().await;

        let detail = VotingDetail::load(&fx.gateway(fx.voter), fx.voter, 0)
            .await
            .unwrap();
        assert!(detail.placeholder_candidates);
        let names: Vec<&str> = detail.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Candidate 1", "Candidate 2"]);
        assert!(detail.can_vote());
    }

    #[tokio::test]
    async fn vote_then_reload() {
        let fx = Fixture::new().await;
        let gateway = fx.gateway(fx.voter);
        let adapter = ready();

        let detail = VotingDetail::load(&gateway, fx.voter, 0).await.unwrap();
        let err = detail
            .cast_vote(&gateway, &adapter, &FixedAnswer(true), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ValidationError(ValidationError::NoCandidateSelected)
        ));

        let receipt = detail
            .cast_vote(&gateway, &adapter, &FixedAnswer(true), Some(1))
            .await
            .unwrap();
        assert!(receipt.is_some());

        let detail = VotingDetail::load(&gateway, fx.voter, 0).await.unwrap();
        assert!(detail.has_voted);
        assert!(!detail.can_vote());
        assert_eq!(detail.session.total_voters, 1);

        let err = detail
            .cast_vote(&gateway, &adapter, &FixedAnswer(true), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DoubleVote(0)));
    }

    #[tokio::test]
    async fn placeholder_vote_is_rejected_by_contract() {
        let fx = Fixture::new().await;
        let gateway = fx.gateway(fx.voter);
        let adapter = EncryptionAdapter::unavailable("no relayer", true);

        let detail = VotingDetail::load(&gateway, fx.voter, 0).await.unwrap();
        let declined = detail
            .cast_vote(&gateway, &adapter, &FixedAnswer(false), Some(0))
            .await
            .unwrap();
        assert!(declined.is_none());

        let err = detail
            .cast_vote(&gateway, &adapter, &FixedAnswer(true), Some(0))
            .await
            .unwrap_err();
        match err {
            Error::TransactionReverted(reason) => assert_eq!(reason, REVERT_INVALID_PROOF),
            other => panic!("unexpected error {}", other),
        }
        assert!(!gateway.has_voted(0, fx.voter).await.unwrap());
    }

    #[tokio::test]
    async fn creator_ends_and_reads_results() {
        let fx = Fixture::new().await;
        let gateway = fx.gateway(fx.creator);

        let detail = VotingDetail::load(&gateway, fx.creator, 0).await.unwrap();
        assert!(detail.can_end());
        assert!(matches!(
            detail.results(&gateway).await,
            Err(Error::ResultsNotYetAvailable(0))
        ));

        detail.end(&gateway).await.unwrap();
        let detail = VotingDetail::load(&gateway, fx.creator, 0).await.unwrap();
        assert!(!detail.active);
        assert!(!detail.can_end());
        assert!(detail.session.ended);

        let results = detail.results(&gateway).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, tally)| !tally.is_zero()));

        let rendered = detail.render(fx.chain.now().await, &AdapterStatus::Initializing);
        assert!(rendered.contains("status:    ended"));
        assert!(rendered.contains("Voting has ended"));
    }
}
