//! Interface description of the external voting contract.
//!
//! The JSON below is the compiled contract's ABI. Everything that talks to the
//! contract builds its calls from it, either through the parsed [`ABI`] or the
//! typed [`descriptor`] table.

use ethers::abi::Abi;
use indexmap::IndexMap;

pub const FN_CREATE_VOTING: &str = "createVoting";
pub const FN_END_VOTING: &str = "endVoting";
pub const FN_GET_CANDIDATE_INFO: &str = "getCandidateInfo";
pub const FN_GET_CANDIDATE_VOTE_COUNT: &str = "getCandidateVoteCount";
pub const FN_GET_TOTAL_VOTINGS: &str = "getTotalVotings";
pub const FN_GET_VOTING_INFO: &str = "getVotingInfo";
pub const FN_HAS_VOTED: &str = "hasVoted";
pub const FN_IS_VOTING_ACTIVE: &str = "isVotingActive";
pub const FN_VOTE: &str = "vote";
pub const FN_VOTING_COUNTER: &str = "votingCounter";

pub const EVENT_VOTING_CREATED: &str = "VotingCreated";
pub const EVENT_VOTE_CAST: &str = "VoteCast";
pub const EVENT_VOTING_ENDED: &str = "VotingEnded";

/// ABI version this client was built against
pub const ABI_VERSION: &str = "1";

pub const ABI_JSON: &str = r#"[
  {"anonymous":false,"inputs":[
    {"indexed":true,"internalType":"uint256","name":"votingId","type":"uint256"},
    {"indexed":true,"internalType":"address","name":"voter","type":"address"}],
   "name":"VoteCast","type":"event"},
  {"anonymous":false,"inputs":[
    {"indexed":true,"internalType":"uint256","name":"votingId","type":"uint256"},
    {"indexed":false,"internalType":"string","name":"title","type":"string"},
    {"indexed":false,"internalType":"uint256","name":"startTime","type":"uint256"},
    {"indexed":false,"internalType":"uint256","name":"endTime","type":"uint256"}],
   "name":"VotingCreated","type":"event"},
  {"anonymous":false,"inputs":[
    {"indexed":true,"internalType":"uint256","name":"votingId","type":"uint256"}],
   "name":"VotingEnded","type":"event"},
  {"inputs":[
    {"internalType":"string","name":"_title","type":"string"},
    {"internalType":"string","name":"_description","type":"string"},
    {"internalType":"string[]","name":"_candidateNames","type":"string[]"},
    {"internalType":"uint256","name":"_duration","type":"uint256"}],
   "name":"createVoting","outputs":[],"stateMutability":"nonpayable","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"}],
   "name":"endVoting","outputs":[],"stateMutability":"nonpayable","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"},
    {"internalType":"uint256","name":"_candidateIndex","type":"uint256"}],
   "name":"getCandidateInfo",
   "outputs":[{"internalType":"string","name":"name","type":"string"}],
   "stateMutability":"view","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"},
    {"internalType":"uint256","name":"_candidateIndex","type":"uint256"}],
   "name":"getCandidateVoteCount",
   "outputs":[{"internalType":"euint32","name":"","type":"uint256"}],
   "stateMutability":"view","type":"function"},
  {"inputs":[],"name":"getTotalVotings",
   "outputs":[{"internalType":"uint256","name":"","type":"uint256"}],
   "stateMutability":"view","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"}],
   "name":"getVotingInfo",
   "outputs":[
    {"internalType":"string","name":"title","type":"string"},
    {"internalType":"string","name":"description","type":"string"},
    {"internalType":"uint256","name":"startTime","type":"uint256"},
    {"internalType":"uint256","name":"endTime","type":"uint256"},
    {"internalType":"bool","name":"ended","type":"bool"},
    {"internalType":"address","name":"creator","type":"address"},
    {"internalType":"uint256","name":"totalVoters","type":"uint256"},
    {"internalType":"uint256","name":"candidateCount","type":"uint256"}],
   "stateMutability":"view","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"},
    {"internalType":"address","name":"_voter","type":"address"}],
   "name":"hasVoted",
   "outputs":[{"internalType":"bool","name":"","type":"bool"}],
   "stateMutability":"view","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"}],
   "name":"isVotingActive",
   "outputs":[{"internalType":"bool","name":"","type":"bool"}],
   "stateMutability":"view","type":"function"},
  {"inputs":[
    {"internalType":"uint256","name":"_votingId","type":"uint256"},
    {"internalType":"uint256","name":"_candidateIndex","type":"uint256"},
    {"internalType":"bytes32","name":"inputEuint32","type":"bytes32"},
    {"internalType":"bytes","name":"inputProof","type":"bytes"}],
   "name":"vote","outputs":[],"stateMutability":"nonpayable","type":"function"},
  {"inputs":[],"name":"votingCounter",
   "outputs":[{"internalType":"uint256","name":"","type":"uint256"}],
   "stateMutability":"view","type":"function"}
]"#;

lazy_static! {
    /// The parsed contract ABI
    pub static ref ABI: Abi = load_abi();
}

// ABI_JSON is a constant covered by tests
fn load_abi() -> Abi {
    serde_json::from_str(ABI_JSON).expect("anonvote: embedded ABI is malformed")
}

/// Whether a function reads or writes contract state
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    View,
    Nonpayable,
}

/// One callable contract operation
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub inputs: Vec<(&'static str, &'static str)>,
    pub outputs: Vec<&'static str>,
    pub mutability: Mutability,
}

impl FunctionDescriptor {
    fn new(
        name: &'static str,
        inputs: &[(&'static str, &'static str)],
        outputs: &[&'static str],
        mutability: Mutability,
    ) -> Self {
        FunctionDescriptor {
            name,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            mutability,
        }
    }

    /// Solidity-style signature, e.g. `hasVoted(uint256,address)`
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|(_, ty)| *ty).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

/// The contract operations, keyed by name, in ABI order
pub fn descriptor() -> IndexMap<&'static str, FunctionDescriptor> {
    use Mutability::*;

    let entries = vec![
        FunctionDescriptor::new(
            FN_CREATE_VOTING,
            &[
                ("_title", "string"),
                ("_description", "string"),
                ("_candidateNames", "string[]"),
                ("_duration", "uint256"),
            ],
            &[],
            Nonpayable,
        ),
        FunctionDescriptor::new(FN_END_VOTING, &[("_votingId", "uint256")], &[], Nonpayable),
        FunctionDescriptor::new(
            FN_GET_CANDIDATE_INFO,
            &[("_votingId", "uint256"), ("_candidateIndex", "uint256")],
            &["string"],
            View,
        ),
        FunctionDescriptor::new(
            FN_GET_CANDIDATE_VOTE_COUNT,
            &[("_votingId", "uint256"), ("_candidateIndex", "uint256")],
            &["uint256"],
            View,
        ),
        FunctionDescriptor::new(FN_GET_TOTAL_VOTINGS, &[], &["uint256"], View),
        FunctionDescriptor::new(
            FN_GET_VOTING_INFO,
            &[("_votingId", "uint256")],
            &[
                "string", "string", "uint256", "uint256", "bool", "address", "uint256", "uint256",
            ],
            View,
        ),
        FunctionDescriptor::new(
            FN_HAS_VOTED,
            &[("_votingId", "uint256"), ("_voter", "address")],
            &["bool"],
            View,
        ),
        FunctionDescriptor::new(
            FN_IS_VOTING_ACTIVE,
            &[("_votingId", "uint256")],
            &["bool"],
            View,
        ),
        FunctionDescriptor::new(
            FN_VOTE,
            &[
                ("_votingId", "uint256"),
                ("_candidateIndex", "uint256"),
                ("inputEuint32", "bytes32"),
                ("inputProof", "bytes"),
            ],
            &[],
            Nonpayable,
        ),
        FunctionDescriptor::new(FN_VOTING_COUNTER, &[], &["uint256"], View),
    ];

    entries.into_iter().map(|f| (f.name, f)).collect()
}

/// Pretty-printed ABI JSON, for export to other tooling
pub fn abi_json_pretty() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&*ABI)
}
