//! Live bindings: a JSON-RPC endpoint plus a local signing key stand in for
//! the user's wallet, and the voting contract is called through ethers.

use crate::*;
use async_trait::async_trait;
use ethers::abi::{Detokenize, RawLog, Tokenize};
use ethers::contract::{Contract, ContractCall, ContractError, ContractFactory};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Log, H256, U256, U64};
use std::convert::TryFrom;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Provider plus signing key, the way transactions reach the chain
pub type RpcClient = SignerMiddleware<Provider<Http>, LocalWallet>;

const REVERT_PREFIX: &str = "execution reverted: ";

/// Pull a revert reason out of a node's error message, e.g.
/// `(code: 3, message: execution reverted: Voting has ended, data: ..)`
pub fn revert_reason_from_message(message: &str) -> Option<String> {
    let start = message.find(REVERT_PREFIX)? + REVERT_PREFIX.len();
    let rest = &message[start..];
    let end = rest
        .find(|c: char| c == ',' || c == ')' || c == '"' || c == '\n')
        .unwrap_or_else(|| rest.len());
    let reason = rest[..end].trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_owned())
    }
}

fn translate<M: Middleware>(err: ContractError<M>) -> CallError {
    if let Some(reason) = err.decode_revert::<String>() {
        return CallError::Reverted(reason);
    }
    let message = err.to_string();
    match revert_reason_from_message(&message) {
        Some(reason) => CallError::Reverted(reason),
        None => CallError::Unavailable(message),
    }
}

/// The voting contract reached through an ethers middleware
pub struct EthersBackend<M> {
    contract: Contract<M>,
    client: Arc<M>,
    account: Address,
}

impl<M> Clone for EthersBackend<M> {
    fn clone(&self) -> Self {
        EthersBackend {
            contract: self.contract.clone(),
            client: Arc::clone(&self.client),
            account: self.account,
        }
    }
}

impl<M: Middleware + 'static> EthersBackend<M> {
    pub fn new(address: Address, client: Arc<M>, account: Address) -> Self {
        let contract = Contract::new(address, ABI.clone(), Arc::clone(&client));
        EthersBackend {
            contract,
            client,
            account,
        }
    }

    fn method<T: Tokenize, D: Detokenize>(
        &self,
        name: &str,
        args: T,
    ) -> Result<ContractCall<M, D>, CallError> {
        let call = self
            .contract
            .method::<T, D>(name, args)
            .map_err(|e| CallError::Unavailable(format!("cannot encode {}: {}", name, e)))?;
        Ok(call.from(self.account))
    }

    async fn view<T: Tokenize, D: Detokenize>(&self, name: &str, args: T) -> Result<D, CallError> {
        self.method::<T, D>(name, args)?
            .call()
            .await
            .map_err(translate)
    }

    fn transaction(&self, tx: &Transact) -> Result<ContractCall<M, ()>, CallError> {
        match tx {
            Transact::CreateVoting {
                title,
                description,
                candidates,
                duration,
            } => self.method(
                FN_CREATE_VOTING,
                (
                    title.clone(),
                    description.clone(),
                    candidates.clone(),
                    U256::from(*duration),
                ),
            ),
            Transact::Vote {
                voting_id,
                candidate_index,
                handle,
                proof,
            } => self.method(
                FN_VOTE,
                (
                    U256::from(*voting_id),
                    U256::from(*candidate_index),
                    H256::from(*handle),
                    Bytes::from(proof.clone()),
                ),
            ),
            Transact::EndVoting { voting_id } => {
                self.method(FN_END_VOTING, U256::from(*voting_id))
            }
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractBackend for EthersBackend<M> {
    fn address(&self) -> Address {
        self.contract.address()
    }

    fn account(&self) -> Address {
        self.account
    }

    async fn is_deployed(&self) -> Result<bool, CallError> {
        let code = self
            .client
            .get_code(self.address(), None)
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?;
        Ok(!code.as_ref().is_empty())
    }

    async fn get_total_votings(&self) -> Result<U256, CallError> {
        self.view(FN_GET_TOTAL_VOTINGS, ()).await
    }

    async fn get_voting_info(&self, voting_id: U256) -> Result<RawVotingInfo, CallError> {
        self.view(FN_GET_VOTING_INFO, voting_id).await
    }

    async fn is_voting_active(&self, voting_id: U256) -> Result<bool, CallError> {
        self.view(FN_IS_VOTING_ACTIVE, voting_id).await
    }

    async fn has_voted(&self, voting_id: U256, voter: Address) -> Result<bool, CallError> {
        self.view(FN_HAS_VOTED, (voting_id, voter)).await
    }

    async fn get_candidate_info(&self, voting_id: U256, index: U256) -> Result<String, CallError> {
        self.view(FN_GET_CANDIDATE_INFO, (voting_id, index)).await
    }

    async fn get_candidate_vote_count(
        &self,
        voting_id: U256,
        index: U256,
    ) -> Result<U256, CallError> {
        self.view(FN_GET_CANDIDATE_VOTE_COUNT, (voting_id, index))
            .await
    }

    async fn estimate_gas(&self, tx: &Transact) -> Result<U256, CallError> {
        self.transaction(tx)?
            .estimate_gas()
            .await
            .map_err(translate)
    }

    async fn send(&self, tx: &Transact, options: TxOptions) -> Result<TxReceipt, CallError> {
        let mut call = self.transaction(tx)?;
        if let Some(gas_price) = options.gas_price {
            call = call.legacy().gas_price(gas_price);
        }
        if let Some(gas_limit) = options.gas_limit {
            call = call.gas(gas_limit);
        }

        let pending = call.send().await.map_err(translate)?;
        let tx_hash = *pending;
        debug!("{} submitted as {:?}", tx.function(), tx_hash);

        let receipt = pending
            .confirmations(1)
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?
            .ok_or_else(|| {
                CallError::Unavailable(format!("transaction {:?} was dropped", tx_hash))
            })?;

        if receipt.status == Some(U64::zero()) {
            return Err(CallError::Reverted(format!(
                "transaction {:?} failed",
                tx_hash
            )));
        }

        let created_voting = match tx {
            Transact::CreateVoting { .. } => {
                created_voting_from_logs(self.contract.address(), &receipt.logs)
            }
            _ => None,
        };

        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
            created_voting,
        })
    }
}

/// Id of the session opened by a `createVoting` transaction, taken from the
/// `VotingCreated` event `contract` emitted in `logs`
pub fn created_voting_from_logs(contract: Address, logs: &[Log]) -> Option<u64> {
    let event = ABI.event(EVENT_VOTING_CREATED).ok()?;
    let topic = event.signature();
    logs.iter()
        .filter(|log| log.address == contract && log.topics.first() == Some(&topic))
        .find_map(|log| {
            let parsed = event
                .parse_log(RawLog {
                    topics: log.topics.clone(),
                    data: log.data.to_vec(),
                })
                .ok()?;
            let id = parsed
                .params
                .into_iter()
                .find(|param| param.name == "votingId")?
                .value
                .into_uint()?;
            to_u64(id, "votingId").ok()
        })
}

/// A wallet made of a JSON-RPC endpoint and an optional local key
pub struct RpcWallet {
    provider: Provider<Http>,
    key: RwLock<Option<LocalWallet>>,
    events: broadcast::Sender<WalletEvent>,
}

fn parse_key(private_key: &str) -> Result<LocalWallet, Error> {
    private_key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| Error::Config(format!("invalid private key: {}", e)))
}

impl RpcWallet {
    pub fn new(rpc_url: &str, private_key: Option<&str>) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::WalletNotFound(format!("invalid RPC url {}: {}", rpc_url, e)))?;
        let key = match private_key {
            Some(k) => Some(parse_key(k)?),
            None => None,
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(RpcWallet {
            provider,
            key: RwLock::new(key),
            events,
        })
    }

    /// Swap the signing key and notify subscribers. `None` revokes access.
    pub fn replace_key(&self, private_key: Option<&str>) -> Result<(), Error> {
        let key = match private_key {
            Some(k) => Some(parse_key(k)?),
            None => None,
        };
        let accounts = key.iter().map(|k| k.address()).collect();
        match self.key.write() {
            Ok(mut guard) => *guard = key,
            Err(poisoned) => *poisoned.into_inner() = key,
        }
        let _ = self.events.send(WalletEvent::AccountsChanged(accounts));
        Ok(())
    }

    fn key(&self) -> Option<LocalWallet> {
        match self.key.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// A signing client for the current key on the endpoint's chain
    pub async fn client(&self) -> Result<Arc<RpcClient>, Error> {
        let key = self
            .key()
            .ok_or_else(|| Error::WalletNotFound("no private key is configured".into()))?;
        let chain_id = self
            .chain_id()
            .await
            .map_err(|e| Error::WalletNotFound(e.to_string()))?;
        let client = SignerMiddleware::new(self.provider.clone(), key.with_chain_id(chain_id));
        Ok(Arc::new(client))
    }

    /// Poll the endpoint's chain id and publish `ChainChanged` when it moves
    pub fn watch_chain(self: &Arc<Self>, interval: Duration) -> ChainPoller {
        let wallet = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut last = None;
            loop {
                tokio::time::sleep(interval).await;
                match wallet.chain_id().await {
                    Ok(chain_id) => {
                        if last.is_some() && last != Some(chain_id) {
                            info!("RPC endpoint switched to chain {}", chain_id);
                            let _ = wallet.events.send(WalletEvent::ChainChanged(chain_id));
                        }
                        last = Some(chain_id);
                    }
                    Err(e) => debug!("chain id poll failed: {}", e),
                }
            }
        });
        ChainPoller { handle }
    }
}

/// Background chain id poller. Stops when dropped.
pub struct ChainPoller {
    handle: JoinHandle<()>,
}

impl Drop for ChainPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    type Signer = EthersBackend<RpcClient>;

    async fn request_accounts(&self) -> Result<Vec<Address>, CallError> {
        Ok(self.key().iter().map(|k| k.address()).collect())
    }

    async fn chain_id(&self) -> Result<u64, CallError> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?;
        to_u64(chain_id, "chainId")
    }

    async fn balance(&self, account: Address) -> Result<U256, CallError> {
        self.provider
            .get_balance(account, None)
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))
    }

    async fn code(&self, address: Address) -> Result<Vec<u8>, CallError> {
        let code = self
            .provider
            .get_code(address, None)
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?;
        Ok(code.to_vec())
    }

    async fn signer(
        &self,
        account: Address,
        contract: Address,
    ) -> Result<EthersBackend<RpcClient>, CallError> {
        let client = self
            .client()
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?;
        if client.address() != account {
            return Err(CallError::Unavailable(format!(
                "no key for account {:?}",
                account
            )));
        }
        Ok(EthersBackend::new(contract, client, account))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

/// Deploy the voting contract from its compiled bytecode (hex)
pub async fn deploy(client: Arc<RpcClient>, bytecode: &str) -> Result<Address, Error> {
    let bytecode = bytecode.trim();
    let bytecode = bytecode.strip_prefix("0x").unwrap_or(bytecode);
    let bytecode = hex::decode(bytecode)
        .map_err(|e| Error::Config(format!("invalid contract bytecode: {}", e)))?;
    if bytecode.is_empty() {
        return Err(Error::Config("contract bytecode is empty".into()));
    }

    let factory = ContractFactory::new(ABI.clone(), Bytes::from(bytecode), client);
    let deployer = factory
        .deploy(())
        .map_err(|e| Error::from_call(translate(e), None))?;
    let contract = deployer
        .send()
        .await
        .map_err(|e| Error::from_call(translate(e), None))?;
    Ok(contract.address())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn revert_reasons_from_node_messages() {
        let msg = "(code: 3, message: execution reverted: Voting has ended, data: Some(String(\"0x08c3\")))";
        assert_eq!(
            revert_reason_from_message(msg).as_deref(),
            Some(REVERT_ENDED)
        );

        let msg = "Contract call reverted with data: execution reverted: Address has already voted";
        assert_eq!(
            revert_reason_from_message(msg).as_deref(),
            Some(REVERT_ALREADY_VOTED)
        );

        assert_eq!(revert_reason_from_message("connection refused"), None);
        assert_eq!(revert_reason_from_message("execution reverted: "), None);
    }

    #[test]
    fn created_voting_id_from_receipt_logs() {
        use ethers::abi::Token;

        let contract = Address::repeat_byte(7);
        let event = ABI.event(EVENT_VOTING_CREATED).unwrap();
        let data = ethers::abi::encode(&[
            Token::String("Lunch".into()),
            Token::Uint(U256::from(100u64)),
            Token::Uint(U256::from(3700u64)),
        ]);
        let created = Log {
            address: contract,
            topics: vec![event.signature(), H256::from_low_u64_be(41)],
            data: Bytes::from(data),
            ..Default::default()
        };
        let unrelated = Log {
            address: contract,
            topics: vec![H256::repeat_byte(1), H256::from_low_u64_be(3)],
            ..Default::default()
        };

        assert_eq!(
            created_voting_from_logs(contract, &[unrelated.clone(), created.clone()]),
            Some(41)
        );
        // Same event from another contract does not count
        assert_eq!(
            created_voting_from_logs(Address::repeat_byte(8), &[created]),
            None
        );
        assert_eq!(created_voting_from_logs(contract, &[unrelated]), None);
    }

    #[tokio::test]
    async fn key_changes_notify_subscribers() {
        let wallet = RpcWallet::new("http://localhost:8545", None).unwrap();
        assert!(wallet.request_accounts().await.unwrap().is_empty());

        let mut events = wallet.subscribe();
        wallet.replace_key(Some(KEY)).unwrap();
        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(
            events.recv().await.unwrap(),
            WalletEvent::AccountsChanged(accounts)
        );

        wallet.replace_key(None).unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            WalletEvent::AccountsChanged(vec![])
        );
    }

    #[test]
    fn bad_inputs() {
        assert!(matches!(
            RpcWallet::new("not a url", None),
            Err(Error::WalletNotFound(_))
        ));
        assert!(matches!(
            RpcWallet::new("http://localhost:8545", Some("zz")),
            Err(Error::Config(_))
        ));
    }
}
