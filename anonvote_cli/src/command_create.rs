use crate::{expand, Client};
use anonvote::*;

pub async fn command_create(matches: &clap::ArgMatches<'_>, client: &Client) -> Result<(), Error> {
    let title = expand(matches.value_of("title").unwrap_or_default());
    let description = expand(matches.value_of("description").unwrap_or_default());
    let hours = matches.value_of("hours").unwrap_or("24");
    let hours: i64 = hours
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("--hours must be a whole number, got {}", hours)))?;
    let candidates: Vec<String> = matches
        .values_of("candidate")
        .map(|values| values.map(expand).collect())
        .unwrap_or_default();

    let mut form = CreateForm::filled(&title, &description, hours, &candidates);

    // Nothing is sent if the form is invalid
    form.validate()?;

    let (_account, gateway) = client.connect().await?;
    let receipt = form.submit(&gateway).await?;

    if client.json {
        return client.print_json(&serde_json::json!({
            "votingId": receipt.created_voting,
            "receipt": receipt,
        }));
    }
    match receipt.created_voting {
        Some(voting_id) => println!(
            "Created voting #{} in transaction {:?}",
            voting_id, receipt.tx_hash
        ),
        None => {
            // No VotingCreated event in the receipt, fall back to the newest id
            let latest = gateway.get_total_votings().await?.saturating_sub(1);
            println!(
                "Created a voting in transaction {:?} (probably #{}, the newest)",
                receipt.tx_hash, latest
            );
        }
    }
    Ok(())
}
