use crate::Client;
use anonvote::*;

pub async fn command_list(client: &Client) -> Result<(), Error> {
    let (account, gateway) = client.connect().await?;
    let list = VotingList::load(&gateway, account).await?;

    if client.json {
        return client.print_json(&list);
    }
    print!("{}", list.render(unix_now()));
    Ok(())
}
