use crate::*;
use ethers::types::Address;
use std::fmt::Write;

/// How a session is badged in the list
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Voted,
    Ended,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let label = match self {
            Status::Active => "active",
            Status::Voted => "voted",
            Status::Ended => "ended",
        };
        write!(f, "{}", label)
    }
}

/// One session as the list shows it
#[derive(Serialize, Debug, Clone)]
pub struct SessionRow {
    #[serde(flatten)]
    pub session: VotingSession,
    pub active: bool,
    pub has_voted: bool,
}

impl SessionRow {
    pub fn status(&self) -> Status {
        if self.session.ended || !self.active {
            Status::Ended
        } else if self.has_voted {
            Status::Voted
        } else {
            Status::Active
        }
    }
}

/// Every voting session, newest first
#[derive(Serialize, Debug, Clone)]
pub struct VotingList {
    pub account: Address,
    pub rows: Vec<SessionRow>,
}

impl VotingList {
    /// Fetch all sessions.
    ///
    /// Reads are issued one at a time: the count, then for each id its info,
    /// active flag and voted flag. Any failure fails the whole page.
    pub async fn load<B: ContractBackend>(
        gateway: &Gateway<B>,
        account: Address,
    ) -> Result<Self, Error> {
        gateway.ensure_deployed().await?;

        let total = gateway.get_total_votings().await?;
        debug!("loading {} votings", total);

        let mut rows = Vec::new();
        for id in 0..total {
            let session = gateway.get_voting_info(id).await?;
            let active = gateway.is_voting_active(id).await?;
            let has_voted = gateway.has_voted(id, account).await?;
            rows.push(SessionRow {
                session,
                active,
                has_voted,
            });
        }
        rows.reverse();

        Ok(VotingList { account, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, now: u64) -> String {
        let mut out = String::new();
        if self.rows.is_empty() {
            out.push_str("No votings yet. Be the first to create one!\n");
            return out;
        }

        for row in self.rows.iter() {
            let session = &row.session;
            let _ = writeln!(out, "#{} {} [{}]", session.id, session.title, row.status());
            let _ = writeln!(out, "    {}", session.description);
            let _ = writeln!(
                out,
                "    candidates: {}  voters: {}  remaining: {}  creator: {}",
                session.candidate_count,
                session.total_voters,
                time_remaining(session.end_time, now),
                creator_label(session.creator, self.account)
            );
            let _ = writeln!(
                out,
                "    start: {}  end: {}",
                format_timestamp(session.start_time),
                format_timestamp(session.end_time)
            );
        }
        out
    }
}
