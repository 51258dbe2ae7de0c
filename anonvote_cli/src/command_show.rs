use crate::{parse_id, Client, ENCRYPTION_STATUS_WAIT};
use anonvote::*;

pub async fn command_show(matches: &clap::ArgMatches<'_>, client: &Client) -> Result<(), Error> {
    let voting_id = parse_id("ID", matches.value_of("ID").unwrap_or_default())?;

    let mut encryption = client.encryption();
    let (account, gateway) = client.connect().await?;
    let detail = VotingDetail::load(&gateway, account, voting_id).await?;

    if client.json {
        return client.print_json(&detail);
    }
    let status = encryption.settle_within(ENCRYPTION_STATUS_WAIT).await;
    print!("{}", detail.render(unix_now(), &status));
    Ok(())
}
