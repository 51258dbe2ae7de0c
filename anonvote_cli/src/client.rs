use anonvote::*;
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;

/// How long a vote waits for the encryption client before falling back
pub const ENCRYPTION_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long read-only views wait for the encryption status line
pub const ENCRYPTION_STATUS_WAIT: Duration = Duration::from_secs(3);

pub type LiveBackend = EthersBackend<RpcClient>;

/// Everything a command needs to reach the chain and the encryption service
pub struct Client {
    pub config: Config,
    pub wallet: Option<Arc<RpcWallet>>,
    pub manager: Arc<SessionManager<RpcWallet>>,
    pub json: bool,
}

impl Client {
    pub fn new(config: Config, json: bool) -> Result<Self, Error> {
        let wallet = match &config.rpc_url {
            Some(url) => Some(Arc::new(RpcWallet::new(url, config.private_key.as_deref())?)),
            None => None,
        };
        let manager = Arc::new(SessionManager::new(wallet.clone(), config.network.clone()));
        Ok(Client {
            config,
            wallet,
            manager,
            json,
        })
    }

    /// Connect the wallet and return the account plus a gateway signing with it
    pub async fn connect(&self) -> Result<(Address, Gateway<LiveBackend>), Error> {
        let session = self.manager.connect().await?;
        if session.network_mismatch {
            eprintln!(
                "warning: connected to chain {}, expected chain {}",
                session.chain_id, self.config.network.chain_id
            );
        }
        Ok((session.account, session.gateway(self.config.gas)))
    }

    /// Start the encryption client in the background
    pub fn encryption(&self) -> EncryptionAdapter {
        let allow_test_votes = self.config.allow_test_votes;
        match self.config.encryption_network() {
            Some(network) => EncryptionAdapter::spawn(
                async move {
                    let encryptor = RelayerEncryptor::init(&network).await?;
                    Ok(Arc::new(encryptor) as Arc<dyn VoteEncryptor>)
                },
                allow_test_votes,
            ),
            None => EncryptionAdapter::unavailable("no relayer configured", allow_test_votes),
        }
    }

    /// Print `value` as JSON
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Config(format!("unable to serialize output: {}", e)))?;
        println!("{}", json);
        Ok(())
    }
}
