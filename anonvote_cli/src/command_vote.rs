use crate::{parse_id, Client, StdinConfirm, ENCRYPTION_INIT_TIMEOUT};
use anonvote::*;

pub async fn command_vote(matches: &clap::ArgMatches<'_>, client: &Client) -> Result<(), Error> {
    let voting_id = parse_id("ID", matches.value_of("ID").unwrap_or_default())?;
    let index = match matches.value_of("INDEX") {
        Some(index) => Some(parse_id("INDEX", index)?),
        None => None,
    };

    let mut encryption = client.encryption();
    let (account, gateway) = client.connect().await?;
    let detail = VotingDetail::load(&gateway, account, voting_id).await?;

    if encryption.settle_within(ENCRYPTION_INIT_TIMEOUT).await == AdapterStatus::Initializing {
        warn!("vote encryption client is still initializing");
    }

    let receipt = match detail
        .cast_vote(&gateway, &encryption, &StdinConfirm, index)
        .await?
    {
        Some(receipt) => receipt,
        None => {
            println!("Vote cancelled");
            return Ok(());
        }
    };

    if client.json {
        return client.print_json(&receipt);
    }
    let label = if encryption.is_ready() {
        "Encrypted vote"
    } else {
        "TEST VOTE (not private)"
    };
    println!(
        "{} cast in voting #{} in transaction {:?}",
        label, voting_id, receipt.tx_hash
    );
    Ok(())
}
