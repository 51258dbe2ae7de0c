use anonvote::*;

pub fn command_abi(matches: &clap::ArgMatches) -> Result<(), Error> {
    let out = if matches.is_present("descriptor") {
        serde_json::to_string_pretty(&descriptor())
    } else {
        abi_json_pretty()
    };
    let out = out.map_err(|e| Error::Config(format!("unable to print ABI: {}", e)))?;
    println!("{}", out);
    Ok(())
}
