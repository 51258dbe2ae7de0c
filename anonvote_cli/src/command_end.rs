use crate::{parse_id, Client};
use anonvote::*;

pub async fn command_end(matches: &clap::ArgMatches<'_>, client: &Client) -> Result<(), Error> {
    let voting_id = parse_id("ID", matches.value_of("ID").unwrap_or_default())?;

    let (account, gateway) = client.connect().await?;
    let detail = VotingDetail::load(&gateway, account, voting_id).await?;
    if !detail.session.is_creator(account) {
        warn!("{:?} did not create voting #{}, the contract will refuse", account, voting_id);
    }

    let receipt = detail.end(&gateway).await?;
    if client.json {
        return client.print_json(&receipt);
    }
    println!("Voting #{} ended in transaction {:?}", voting_id, receipt.tx_hash);
    Ok(())
}
