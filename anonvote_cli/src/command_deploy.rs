use crate::{expand, Client};
use anonvote::*;
use ethers::providers::Middleware;
use std::sync::Arc;
use ethers::utils::format_ether;

pub async fn command_deploy(matches: &clap::ArgMatches<'_>, client: &Client) -> Result<(), Error> {
    let filename = expand(matches.value_of("bytecode").unwrap_or_default());
    let bytecode = std::fs::read_to_string(&filename)
        .map_err(|e| Error::Config(format!("unable to read {}: {}", filename, e)))?;

    let wallet = client
        .wallet
        .as_ref()
        .ok_or_else(|| Error::WalletNotFound("set ANONVOTE_RPC_URL or --rpc-url".into()))?;
    let signer = wallet.client().await?;
    let account = signer.address();
    let balance = signer
        .get_balance(account, None)
        .await
        .map_err(|e| Error::ContractUnavailable(e.to_string()))?;
    let chain_id = wallet.chain_id().await.map_err(|e| Error::from_call(e, None))?;

    println!("Deploying with account: {:?}", account);
    println!("Account balance: {} ETH", format_ether(balance));
    if balance.is_zero() {
        return Err(Error::InsufficientFunds(format!("{:?}", account)));
    }

    let address = deploy(Arc::clone(&signer), &bytecode).await?;
    info!("voting contract deployed at {:?}", address);

    let gateway = Gateway::new(EthersBackend::new(address, signer, account), client.config.gas);
    let total = gateway.verify_deployment().await?;

    if client.json {
        return client.print_json(&serde_json::json!({
            "address": address,
            "chainId": chain_id,
            "deployer": account,
            "totalVotings": total,
        }));
    }
    println!("Contract deployed to: {:?}", address);
    println!("Network chain id: {}", chain_id);
    println!("Total votings: {}", total);
    if chain_id != client.config.network.chain_id {
        println!(
            "Note: the client expects chain {}, set ANONVOTE_CHAIN_ID={} to use this network",
            client.config.network.chain_id, chain_id
        );
    }
    println!();
    println!("Configure the client with:");
    println!("ANONVOTE_CONTRACT_ADDRESS={:?}", address);
    Ok(())
}
