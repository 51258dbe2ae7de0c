use crate::{parse_id, Client};
use anonvote::*;

#[derive(serde::Serialize)]
struct ResultRow {
    index: u64,
    name: String,
    tally: String,
}

pub async fn command_results(matches: &clap::ArgMatches<'_>, client: &Client) -> Result<(), Error> {
    let voting_id = parse_id("ID", matches.value_of("ID").unwrap_or_default())?;

    let (account, gateway) = client.connect().await?;
    let detail = VotingDetail::load(&gateway, account, voting_id).await?;
    let results = detail.results(&gateway).await?;

    let rows: Vec<ResultRow> = results
        .into_iter()
        .map(|(candidate, tally)| ResultRow {
            index: candidate.index,
            name: candidate.name,
            tally: tally.to_string(),
        })
        .collect();

    if client.json {
        return client.print_json(&rows);
    }
    println!("Encrypted tallies for voting #{}:", voting_id);
    for row in rows.iter() {
        println!("  [{}] {}: {}", row.index, row.name, row.tally);
    }
    println!("Tallies stay encrypted until decrypted through the encryption service.");
    Ok(())
}
