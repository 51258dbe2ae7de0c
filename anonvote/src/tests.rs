use super::*;
use ethers::types::{Address, U256};
use std::sync::Arc;

struct Network {
    chain: MemChain,
    contract: Address,
    manager: Arc<SessionManager<MemWallet>>,
    wallet: MemWallet,
}

async fn network(accounts: &[Address]) -> Network {
    let chain = MemChain::new(DEFAULT_CHAIN_ID);
    for account in accounts {
        chain.fund(*account, U256::exp10(18)).await;
    }
    let contract = chain.deploy().await;
    let wallet = MemWallet::new(chain.clone(), accounts.to_vec());
    let config = NetworkConfig {
        contract_address: contract,
        chain_id: DEFAULT_CHAIN_ID,
    };
    let manager = Arc::new(SessionManager::new(Some(Arc::new(wallet.clone())), config));
    Network {
        chain,
        contract,
        manager,
        wallet,
    }
}

impl Network {
    fn gateway(&self, account: Address) -> Gateway<MemContract> {
        Gateway::new(self.chain.contract(self.contract, account), GasPolicy::default())
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn encryption() -> EncryptionAdapter {
    EncryptionAdapter::ready(Arc::new(MemEncryptor::new()), true)
}

async fn encrypted_vote(gateway: &Gateway<MemContract>) -> EncryptedVote {
    encryption()
        .prepare_vote(gateway.address(), gateway.account(), &FixedAnswer(false))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn create_session_end_to_end() {
    let creator = Address::repeat_byte(0x01);
    let net = network(&[creator]).await;
    let gateway = net.gateway(creator);

    let before = gateway.get_total_votings().await.unwrap();
    let receipt = gateway
        .create_voting("T", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();
    assert_eq!(gateway.get_total_votings().await.unwrap(), before + 1);
    assert_eq!(receipt.created_voting, Some(before));

    // Another creator in between does not shift the id reported to each
    let other = Address::repeat_byte(0x02);
    net.chain.fund(other, U256::exp10(18)).await;
    let theirs = net
        .gateway(other)
        .create_voting("U", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();
    let ours = gateway
        .create_voting("V", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();
    assert_eq!(theirs.created_voting, Some(before + 1));
    assert_eq!(ours.created_voting, Some(before + 2));
    assert_eq!(gateway.get_voting_info(before + 2).await.unwrap().title, "V");

    let session = gateway.get_voting_info(before).await.unwrap();
    assert_eq!(session.candidate_count, 2);
    assert!(!session.ended);
    assert_eq!(session.title, "T");
    assert!(gateway.is_voting_active(before).await.unwrap());
}

#[tokio::test]
async fn two_voters_are_counted() {
    let creator = Address::repeat_byte(0x01);
    let alice = Address::repeat_byte(0x0a);
    let bob = Address::repeat_byte(0x0b);
    let net = network(&[creator, alice, bob]).await;
    net.gateway(creator)
        .create_voting("T", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();

    for voter in [alice, bob].iter() {
        let gateway = net.gateway(*voter);
        let vote = encrypted_vote(&gateway).await;
        gateway.vote(0, 0, &vote).await.unwrap();
        assert!(gateway.has_voted(0, *voter).await.unwrap());
    }

    let session = net.gateway(creator).get_voting_info(0).await.unwrap();
    assert_eq!(session.total_voters, 2);
}

#[tokio::test]
async fn second_vote_is_rejected() {
    let creator = Address::repeat_byte(0x01);
    let alice = Address::repeat_byte(0x0a);
    let net = network(&[creator, alice]).await;
    net.gateway(creator)
        .create_voting("T", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();

    let gateway = net.gateway(alice);
    let vote = encrypted_vote(&gateway).await;
    gateway.vote(0, 1, &vote).await.unwrap();

    let vote = encrypted_vote(&gateway).await;
    let err = gateway.vote(0, 0, &vote).await.unwrap_err();
    assert!(matches!(err, Error::DoubleVote(0)));
    assert_eq!(gateway.get_voting_info(0).await.unwrap().total_voters, 1);
    assert!(gateway.has_voted(0, alice).await.unwrap());

    net.chain.advance(3600).await;
    assert!(gateway.has_voted(0, alice).await.unwrap());
}

#[tokio::test]
async fn results_only_after_end() {
    let creator = Address::repeat_byte(0x01);
    let alice = Address::repeat_byte(0x0a);
    let net = network(&[creator, alice]).await;
    let gateway = net.gateway(creator);
    gateway
        .create_voting("T", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();

    let voter = net.gateway(alice);
    let vote = encrypted_vote(&voter).await;
    voter.vote(0, 0, &vote).await.unwrap();

    assert!(matches!(
        gateway.get_candidate_vote_count(0, 0).await,
        Err(Error::ResultsNotYetAvailable(0))
    ));

    net.chain.advance(3600).await;
    assert!(!gateway.is_voting_active(0).await.unwrap());
    let tally = gateway.get_candidate_vote_count(0, 0).await.unwrap();
    assert!(!tally.is_zero());
}

#[tokio::test]
async fn only_creator_ends_early() {
    let creator = Address::repeat_byte(0x01);
    let alice = Address::repeat_byte(0x0a);
    let net = network(&[creator, alice]).await;
    net.gateway(creator)
        .create_voting("T", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();

    let err = net.gateway(alice).end_voting(0).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(net.gateway(alice).is_voting_active(0).await.unwrap());

    net.gateway(creator).end_voting(0).await.unwrap();
    assert!(!net.gateway(creator).is_voting_active(0).await.unwrap());

    let gateway = net.gateway(alice);
    let vote = encrypted_vote(&gateway).await;
    match gateway.vote(0, 0, &vote).await.unwrap_err() {
        Error::TransactionReverted(reason) => assert!(reason.contains("manually ended")),
        other => panic!("unexpected error {}", other),
    }

    let err = net.gateway(creator).end_voting(0).await.unwrap_err();
    assert!(matches!(err, Error::TransactionReverted(_)));
}

#[tokio::test]
async fn candidate_counts_match_retrievable_candidates() {
    let creator = Address::repeat_byte(0x01);
    let net = network(&[creator]).await;
    let gateway = net.gateway(creator);
    let lists = vec![
        names(&["A", "B"]),
        names(&["A", "B", "C", "D", "E"]),
        (0..10).map(|i| format!("C{}", i)).collect::<Vec<_>>(),
    ];
    for list in lists.iter() {
        gateway.create_voting("T", "D", list, 60).await.unwrap();
    }

    let total = gateway.get_total_votings().await.unwrap();
    for id in 0..total {
        let session = gateway.get_voting_info(id).await.unwrap();
        assert_eq!(session.candidate_count as usize, lists[id as usize].len());
        for index in 0..session.candidate_count {
            let name = gateway.get_candidate_info(id, index).await.unwrap();
            assert_eq!(name, lists[id as usize][index as usize]);
        }
        assert!(gateway
            .get_candidate_info(id, session.candidate_count)
            .await
            .is_err());
    }
}

#[tokio::test]
async fn invalid_candidate_lists_never_reach_the_chain() {
    let creator = Address::repeat_byte(0x01);
    let net = network(&[creator]).await;
    let gateway = net.gateway(creator);

    let many: Vec<String> = (0..11).map(|i| format!("C{}", i)).collect();
    for list in vec![names(&["A"]), many, names(&["A", "A"])] {
        let err = gateway.create_voting("T", "D", &list, 60).await.unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }
    assert_eq!(net.chain.transaction_count().await, 0);
}

#[tokio::test]
async fn placeholder_votes_need_a_lax_contract() {
    let creator = Address::repeat_byte(0x01);
    let alice = Address::repeat_byte(0x0a);
    let net = network(&[creator, alice]).await;
    net.gateway(creator)
        .create_voting("T", "D", &names(&["A", "B"]), 3600)
        .await
        .unwrap();

    let adapter = EncryptionAdapter::unavailable("relayer unreachable", true);
    let gateway = net.gateway(alice);
    let vote = adapter
        .prepare_vote(gateway.address(), alice, &FixedAnswer(true))
        .await
        .unwrap()
        .unwrap();
    assert!(vote.simulated);

    match gateway.vote(0, 0, &vote).await.unwrap_err() {
        Error::TransactionReverted(reason) => assert_eq!(reason, REVERT_INVALID_PROOF),
        other => panic!("unexpected error {}", other),
    }

    net.chain.skip_proof_verification().await;
    gateway.vote(0, 0, &vote).await.unwrap();
    assert!(gateway.has_voted(0, alice).await.unwrap());
}

#[tokio::test]
async fn views_follow_the_router() {
    let alice = Address::repeat_byte(0x0a);
    let net = network(&[alice]).await;
    let session = net.manager.connect().await.unwrap();
    let gateway = session.gateway(GasPolicy::default());
    let mut router = Router::new();

    let ticket = router.ticket();
    let list = VotingList::load(&gateway, session.account).await.unwrap();
    let list = router.accept(ticket, list).unwrap();
    assert!(list.is_empty());

    assert_eq!(router.dispatch(Action::OpenCreate), Some(View::Create));
    let mut form = CreateForm::filled("Lunch", "Where to?", 2, &names(&["Pizza", "Sushi"]));
    form.submit(&gateway).await.unwrap();
    assert_eq!(router.dispatch(Action::Created), Some(View::List));

    let list = VotingList::load(&gateway, session.account).await.unwrap();
    assert_eq!(list.rows.len(), 1);
    assert_eq!(list.rows[0].status(), Status::Active);
    assert!(list.render(net.chain.now().await).contains("creator: you"));

    let id = list.rows[0].session.id;
    assert_eq!(router.dispatch(Action::Select(id)), Some(View::Details(Some(id))));

    // a load started before a refresh is stale once it completes
    let stale = router.ticket();
    let detail = VotingDetail::load(&gateway, session.account, id).await.unwrap();
    router.dispatch(Action::Refresh);
    assert!(router.accept(stale, detail.clone()).is_none());

    let adapter = encryption();
    detail
        .cast_vote(&gateway, &adapter, &FixedAnswer(false), Some(1))
        .await
        .unwrap();

    let list = VotingList::load(&gateway, session.account).await.unwrap();
    assert_eq!(list.rows[0].status(), Status::Voted);

    assert_eq!(router.dispatch(Action::Back), Some(View::List));
    assert_eq!(router.dispatch(Action::OpenDetails(None)), Some(View::Details(None)));
    assert_eq!(router.selected(), None);
}

#[tokio::test]
async fn account_switch_invalidates_loads() {
    let alice = Address::repeat_byte(0x0a);
    let bob = Address::repeat_byte(0x0b);
    let net = network(&[alice, bob]).await;
    net.manager.connect().await.unwrap();
    let mut router = Router::new();

    let ticket = router.ticket();
    net.wallet.set_accounts(vec![bob]).await;
    net.manager
        .apply_events(vec![WalletEvent::AccountsChanged(vec![bob])])
        .await
        .unwrap();
    router.session_changed();

    assert!(!router.is_current(ticket));
    assert_eq!(net.manager.current().account(), Some(bob));
}
