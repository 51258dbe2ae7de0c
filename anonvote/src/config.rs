use crate::*;
use ethers::types::{Address, U256};
use std::env::var;
use std::time::Duration;

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x246eE751F0432E236A0b7791fddc120962E398bE";

/// Sepolia
pub const DEFAULT_CHAIN_ID: u64 = 11155111;

pub const DEFAULT_KMS_ADDRESS: &str = "0x9d6891A6240D6130c54ae243d8005063D05A696b";
pub const DEFAULT_ACL_ADDRESS: &str = "0x339EcE85B9E11a3A3AA557582784a15d7F82AAf2";

/// Where the client expects to find the voting contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub contract_address: Address,
    pub chain_id: u64,
}

/// Parameters the encryption service needs for the target network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionNetwork {
    pub relayer_url: String,
    pub chain_id: u64,
    pub kms_address: Address,
    pub acl_address: Address,
}

pub struct Config {
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub network: NetworkConfig,
    pub relayer_url: Option<String>,
    pub kms_address: Address,
    pub acl_address: Address,
    pub gas: GasPolicy,
    pub allow_test_votes: bool,

    /// How often the wallet provider is polled for network changes
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| var(key).ok())
    }

    /// Build a config from any key lookup, e.g. the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let contract_address = parse_address(
            "ANONVOTE_CONTRACT_ADDRESS",
            &get("ANONVOTE_CONTRACT_ADDRESS").unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.into()),
        )?;
        let chain_id = match get("ANONVOTE_CHAIN_ID") {
            Some(val) => parse_number("ANONVOTE_CHAIN_ID", &val)?,
            None => DEFAULT_CHAIN_ID,
        };
        let kms_address = parse_address(
            "ANONVOTE_KMS_ADDRESS",
            &get("ANONVOTE_KMS_ADDRESS").unwrap_or_else(|| DEFAULT_KMS_ADDRESS.into()),
        )?;
        let acl_address = parse_address(
            "ANONVOTE_ACL_ADDRESS",
            &get("ANONVOTE_ACL_ADDRESS").unwrap_or_else(|| DEFAULT_ACL_ADDRESS.into()),
        )?;

        let mut gas = GasPolicy::default();
        if let Some(val) = get("ANONVOTE_GAS_PRICE_GWEI") {
            let gwei = parse_number("ANONVOTE_GAS_PRICE_GWEI", &val)?;
            gas.gas_price = U256::from(gwei) * U256::exp10(9);
        }
        if let Some(val) = get("ANONVOTE_GAS_MARGIN_PERCENT") {
            gas.margin_percent = parse_number("ANONVOTE_GAS_MARGIN_PERCENT", &val)?;
            if gas.margin_percent < 100 {
                return Err(Error::Config(
                    "ANONVOTE_GAS_MARGIN_PERCENT must be at least 100".into(),
                ));
            }
        }

        let allow_test_votes = match get("ANONVOTE_ALLOW_TEST_VOTES") {
            Some(val) => parse_bool("ANONVOTE_ALLOW_TEST_VOTES", &val)?,
            None => true,
        };

        let poll_interval = match get("ANONVOTE_POLL_SECONDS") {
            Some(val) => Duration::from_secs(parse_number("ANONVOTE_POLL_SECONDS", &val)?),
            None => Duration::from_secs(4),
        };

        Ok(Config {
            rpc_url: get("ANONVOTE_RPC_URL"),
            private_key: get("ANONVOTE_PRIVATE_KEY"),
            network: NetworkConfig {
                contract_address,
                chain_id,
            },
            relayer_url: get("ANONVOTE_RELAYER_URL"),
            kms_address,
            acl_address,
            gas,
            allow_test_votes,
            poll_interval,
        })
    }

    /// Encryption service parameters, if a relayer is configured
    pub fn encryption_network(&self) -> Option<EncryptionNetwork> {
        let relayer_url = self.relayer_url.clone()?;
        Some(EncryptionNetwork {
            relayer_url,
            chain_id: self.network.chain_id,
            kms_address: self.kms_address,
            acl_address: self.acl_address,
        })
    }
}

pub fn parse_address(key: &str, val: &str) -> Result<Address, Error> {
    val.trim()
        .parse::<Address>()
        .map_err(|e| Error::Config(format!("{} is not a valid address: {}", key, e)))
}

fn parse_number(key: &str, val: &str) -> Result<u64, Error> {
    val.trim()
        .parse::<u64>()
        .map_err(|e| Error::Config(format!("{} is not a valid number: {}", key, e)))
}

fn parse_bool(key: &str, val: &str) -> Result<bool, Error> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{} is not a boolean: {}", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.network.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(
            config.network.contract_address,
            DEFAULT_CONTRACT_ADDRESS.parse::<Address>().unwrap()
        );
        assert_eq!(config.gas, GasPolicy::default());
        assert!(config.allow_test_votes);
        assert!(config.rpc_url.is_none());
        assert!(config.encryption_network().is_none());
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ANONVOTE_CHAIN_ID", "31337"),
            ("ANONVOTE_GAS_PRICE_GWEI", "3"),
            ("ANONVOTE_GAS_MARGIN_PERCENT", "150"),
            ("ANONVOTE_ALLOW_TEST_VOTES", "no"),
            ("ANONVOTE_RELAYER_URL", "http://localhost:3000"),
            ("ANONVOTE_RPC_URL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.network.chain_id, 31337);
        assert_eq!(config.gas.gas_price, U256::from(3_000_000_000u64));
        assert_eq!(config.gas.margin_percent, 150);
        assert!(!config.allow_test_votes);
        assert!(config.rpc_url.is_none());
        assert_eq!(config.encryption_network().unwrap().chain_id, 31337);
    }

    #[test]
    fn bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("ANONVOTE_CONTRACT_ADDRESS", "0xnope")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ANONVOTE_GAS_MARGIN_PERCENT", "90")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ANONVOTE_ALLOW_TEST_VOTES", "maybe")])),
            Err(Error::Config(_))
        ));
    }
}
