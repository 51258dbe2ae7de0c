use crate::*;
use ethers::types::Address;
use ethers::utils::format_ether;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// A connected wallet
#[derive(Clone)]
pub struct WalletSession<S> {
    pub account: Address,
    pub chain_id: u64,

    /// The wallet is on another network than the one configured
    pub network_mismatch: bool,
    pub signer: S,
}

impl<S: ContractBackend + Clone> WalletSession<S> {
    /// A contract gateway signing with this session's account
    pub fn gateway(&self, gas: GasPolicy) -> Gateway<S> {
        Gateway::new(self.signer.clone(), gas)
    }
}

/// Lifecycle of the shared wallet session
#[derive(Clone)]
pub enum SessionState<S> {
    Uninitialized,
    Connected(WalletSession<S>),
    Disconnected,
}

impl<S> SessionState<S> {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    pub fn account(&self) -> Option<Address> {
        match self {
            SessionState::Connected(session) => Some(session.account),
            _ => None,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            SessionState::Connected(session) => Some(session.chain_id),
            _ => None,
        }
    }
}

/// Owns the single wallet session shared by every view.
///
/// Transitions (connect, disconnect, refresh after a wallet notification) are
/// serialized, so the published state never mixes one account with another
/// account's network. Views observe the state through [`subscribe`].
///
/// [`subscribe`]: SessionManager::subscribe
pub struct SessionManager<W: WalletProvider> {
    wallet: Option<Arc<W>>,
    network: NetworkConfig,
    transition: Mutex<()>,
    state: watch::Sender<SessionState<W::Signer>>,
}

impl<W: WalletProvider> SessionManager<W> {
    /// `wallet` is `None` when no wallet provider is available at all
    pub fn new(wallet: Option<Arc<W>>, network: NetworkConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        SessionManager {
            wallet,
            network,
            transition: Mutex::new(()),
            state,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Observe session changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState<W::Signer>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState<W::Signer> {
        self.state.borrow().clone()
    }

    /// Request account access and establish a session.
    ///
    /// A failure drops any session that was connected before.
    pub async fn connect(&self) -> Result<WalletSession<W::Signer>, Error> {
        let _guard = self.transition.lock().await;
        let result = self.connect_locked().await;
        if result.is_err() && self.current().is_connected() {
            warn!("reconnect failed, dropping the previous session");
            self.state.send_replace(SessionState::Disconnected);
        }
        result
    }

    /// Forget the session. Nothing is sent to the wallet.
    pub async fn disconnect(&self) {
        let _guard = self.transition.lock().await;
        info!("wallet disconnected");
        self.state.send_replace(SessionState::Disconnected);
    }

    /// Apply a batch of wallet notifications as one transition.
    ///
    /// Only a connected session reacts. An empty account list disconnects;
    /// any other account or network change re-runs the connect sequence once.
    /// If that fails the session ends up disconnected rather than half-updated.
    pub async fn apply_events(&self, events: Vec<WalletEvent>) -> Result<(), Error> {
        let mut accounts = None;
        let mut chain_changed = false;
        for event in events {
            match event {
                WalletEvent::AccountsChanged(list) => accounts = Some(list),
                WalletEvent::ChainChanged(_) => chain_changed = true,
            }
        }

        let _guard = self.transition.lock().await;
        let current = match self.current() {
            SessionState::Connected(session) => session,
            _ => {
                debug!("ignoring wallet notification while not connected");
                return Ok(());
            }
        };

        let account_changed = match &accounts {
            Some(list) if list.is_empty() => {
                info!("wallet revoked all accounts");
                self.state.send_replace(SessionState::Disconnected);
                return Ok(());
            }
            Some(list) => list[0] != current.account,
            None => false,
        };

        if !account_changed && !chain_changed {
            return Ok(());
        }

        match self.connect_locked().await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.state.send_replace(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Start applying wallet notifications in the background.
    ///
    /// Notifications that arrive together are collapsed into one transition.
    /// Dropping the returned listener unsubscribes. Returns `None` without a wallet.
    pub fn listen(self: &Arc<Self>) -> Option<Listener> {
        let wallet = self.wallet.as_ref()?;
        let mut events = wallet.subscribe();
        let manager = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                let first = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("missed {} wallet notifications", missed);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let mut batch = vec![first];
                loop {
                    match events.try_recv() {
                        Ok(event) => batch.push(event),
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }

                if let Err(e) = manager.apply_events(batch).await {
                    warn!("wallet refresh failed: {}", e);
                }
            }
        });

        Some(Listener { handle })
    }

    async fn connect_locked(&self) -> Result<WalletSession<W::Signer>, Error> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| Error::WalletNotFound("no wallet provider is configured".into()))?;

        let accounts = wallet
            .request_accounts()
            .await
            .map_err(|e| Error::WalletNotFound(e.to_string()))?;
        let account = *accounts
            .first()
            .ok_or_else(|| Error::WalletNotFound("the wallet authorized no accounts".into()))?;

        let chain_id = wallet
            .chain_id()
            .await
            .map_err(|e| Error::from_call(e, None))?;
        let network_mismatch = chain_id != self.network.chain_id;
        if network_mismatch {
            warn!(
                "wallet is on chain {}, expected chain {}",
                chain_id, self.network.chain_id
            );
        }

        let balance = wallet
            .balance(account)
            .await
            .map_err(|e| Error::from_call(e, None))?;
        info!("account {:?} balance: {} ETH", account, format_ether(balance));
        if balance.is_zero() {
            return Err(Error::InsufficientFunds(format!("{:?}", account)));
        }

        let contract = self.network.contract_address;
        let code = wallet
            .code(contract)
            .await
            .map_err(|e| Error::from_call(e, None))?;
        if code.is_empty() {
            return Err(Error::ContractUnavailable(format!(
                "no contract deployed at {:?}, check the contract address and network",
                contract
            )));
        }

        let signer = wallet
            .signer(account, contract)
            .await
            .map_err(|e| Error::from_call(e, None))?;

        let total = signer.get_total_votings().await.map_err(|e| {
            Error::ContractUnavailable(format!("contract connection test failed: {}", e))
        })?;
        info!("connected to contract {:?}, {} votings", contract, total);

        let session = WalletSession {
            account,
            chain_id,
            network_mismatch,
            signer,
        };
        self.state
            .send_replace(SessionState::Connected(session.clone()));
        Ok(session)
    }
}

/// Background task applying wallet notifications. Stops when dropped.
pub struct Listener {
    handle: JoinHandle<()>,
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use std::time::Duration;

    async fn setup(
        accounts: Vec<Address>,
    ) -> (MemChain, MemWallet, Arc<SessionManager<MemWallet>>) {
        let chain = MemChain::new(31337);
        for account in accounts.iter() {
            chain.fund(*account, U256::exp10(18)).await;
        }
        let contract_address = chain.deploy().await;
        let wallet = MemWallet::new(chain.clone(), accounts);
        let network = NetworkConfig {
            contract_address,
            chain_id: 31337,
        };
        let manager = Arc::new(SessionManager::new(Some(Arc::new(wallet.clone())), network));
        (chain, wallet, manager)
    }

    #[tokio::test]
    async fn no_wallet() {
        let network = NetworkConfig {
            contract_address: Address::repeat_byte(1),
            chain_id: 1,
        };
        let manager: SessionManager<MemWallet> = SessionManager::new(None, network);
        assert!(matches!(
            manager.connect().await,
            Err(Error::WalletNotFound(_))
        ));
        assert!(!manager.current().is_connected());
    }

    #[tokio::test]
    async fn connect_and_disconnect() {
        let alice = Address::repeat_byte(0xa1);
        let (_chain, _wallet, manager) = setup(vec![alice]).await;

        let session = manager.connect().await.unwrap();
        assert_eq!(session.account, alice);
        assert_eq!(session.chain_id, 31337);
        assert!(!session.network_mismatch);
        assert_eq!(manager.current().account(), Some(alice));

        manager.disconnect().await;
        assert!(matches!(manager.current(), SessionState::Disconnected));
    }

    #[tokio::test]
    async fn unfunded_account() {
        let chain = MemChain::new(31337);
        let contract_address = chain.deploy().await;
        let wallet = MemWallet::new(chain.clone(), vec![Address::repeat_byte(3)]);
        let network = NetworkConfig {
            contract_address,
            chain_id: 31337,
        };
        let manager = SessionManager::new(Some(Arc::new(wallet)), network);
        assert!(matches!(
            manager.connect().await,
            Err(Error::InsufficientFunds(_))
        ));
    }

    #[tokio::test]
    async fn failed_reconnect_drops_old_session() {
        let alice = Address::repeat_byte(0xa1);
        let (chain, _wallet, manager) = setup(vec![alice]).await;
        manager.connect().await.unwrap();
        let mut updates = manager.subscribe();
        let _ = updates.borrow_and_update();

        chain.fund(alice, U256::zero()).await;
        assert!(matches!(
            manager.connect().await,
            Err(Error::InsufficientFunds(_))
        ));
        assert!(matches!(manager.current(), SessionState::Disconnected));
        assert!(updates.has_changed().unwrap());
        assert_eq!(manager.current().account(), None);
    }

    #[tokio::test]
    async fn missing_contract_blocks_connection() {
        let alice = Address::repeat_byte(0xa1);
        let chain = MemChain::new(31337);
        chain.fund(alice, U256::exp10(18)).await;
        let wallet = MemWallet::new(chain.clone(), vec![alice]);
        let network = NetworkConfig {
            contract_address: Address::repeat_byte(0xee),
            chain_id: 31337,
        };
        let manager = SessionManager::new(Some(Arc::new(wallet)), network);
        assert!(matches!(
            manager.connect().await,
            Err(Error::ContractUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn wrong_network_is_only_a_warning() {
        let alice = Address::repeat_byte(0xa1);
        let (_chain, wallet, manager) = setup(vec![alice]).await;
        wallet.switch_chain(11155111).await;

        let session = manager.connect().await.unwrap();
        assert!(session.network_mismatch);
        assert_eq!(session.chain_id, 11155111);
    }

    #[tokio::test]
    async fn empty_account_list_disconnects() {
        let alice = Address::repeat_byte(0xa1);
        let (_chain, _wallet, manager) = setup(vec![alice]).await;
        manager.connect().await.unwrap();

        manager
            .apply_events(vec![WalletEvent::AccountsChanged(vec![])])
            .await
            .unwrap();
        assert!(matches!(manager.current(), SessionState::Disconnected));
    }

    #[tokio::test]
    async fn notifications_ignored_until_connected() {
        let alice = Address::repeat_byte(0xa1);
        let (_chain, _wallet, manager) = setup(vec![alice]).await;
        manager
            .apply_events(vec![WalletEvent::ChainChanged(5)])
            .await
            .unwrap();
        assert!(matches!(manager.current(), SessionState::Uninitialized));
    }

    #[tokio::test]
    async fn concurrent_changes_collapse_to_one_state() {
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let (_chain, wallet, manager) = setup(vec![alice, bob]).await;
        manager.connect().await.unwrap();

        // The wallet moves to bob on another network, reporting both at once
        wallet.set_accounts(vec![bob]).await;
        wallet.switch_chain(11155111).await;

        let a = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .apply_events(vec![WalletEvent::AccountsChanged(vec![bob])])
                    .await
            })
        };
        let b = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .apply_events(vec![WalletEvent::ChainChanged(11155111)])
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let state = manager.current();
        assert_eq!(state.account(), Some(bob));
        assert_eq!(state.chain_id(), Some(11155111));
    }

    #[tokio::test]
    async fn listener_follows_wallet() {
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let (_chain, wallet, manager) = setup(vec![alice, bob]).await;
        let mut updates = manager.subscribe();
        let _listener = manager.listen().unwrap();
        manager.connect().await.unwrap();
        let _ = updates.borrow_and_update();

        wallet.set_accounts(vec![bob]).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                updates.changed().await.unwrap();
                if updates.borrow().account() == Some(bob) {
                    break;
                }
            }
        })
        .await
        .unwrap();

        wallet.set_accounts(vec![]).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                updates.changed().await.unwrap();
                if !updates.borrow().is_connected() {
                    break;
                }
            }
        })
        .await
        .unwrap();
    }
}
