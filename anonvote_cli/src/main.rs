use anonvote::Error;
use clap::{App, AppSettings, Arg, SubCommand};
use num_enum::TryFromPrimitive;
use std::convert::TryFrom;

#[macro_use]
extern crate log;

mod client;
mod command_abi;
mod command_create;
mod command_deploy;
mod command_end;
mod command_list;
mod command_results;
mod command_show;
mod command_vote;
mod prompt;
mod shell;

pub use client::*;
pub use command_abi::*;
pub use command_create::*;
pub use command_deploy::*;
pub use command_end::*;
pub use command_list::*;
pub use command_results::*;
pub use command_show::*;
pub use command_vote::*;
pub use prompt::*;
pub use shell::*;

#[derive(TryFromPrimitive, PartialEq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Verbosity {
    fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Silent => log::LevelFilter::Off,
            Verbosity::Error => log::LevelFilter::Error,
            Verbosity::Warn => log::LevelFilter::Warn,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Debug => log::LevelFilter::Debug,
        }
    }
}

fn main() {
    let matches = App::new("anonvote")
        .version("0.1")
        .about("Create voting sessions and cast encrypted votes on an anonymous voting contract")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("rpc-url")
                .long("rpc-url")
                .takes_value(true)
                .global(true)
                .help("JSON-RPC endpoint - can also be set with ANONVOTE_RPC_URL"),
        )
        .arg(
            Arg::with_name("private-key")
                .long("private-key")
                .takes_value(true)
                .global(true)
                .help("Hex signing key - can also be set with ANONVOTE_PRIVATE_KEY"),
        )
        .arg(
            Arg::with_name("contract")
                .long("contract")
                .takes_value(true)
                .global(true)
                .help("Voting contract address - can also be set with ANONVOTE_CONTRACT_ADDRESS"),
        )
        .arg(
            Arg::with_name("relayer")
                .long("relayer")
                .takes_value(true)
                .global(true)
                .help("Encryption relayer URL - can also be set with ANONVOTE_RELAYER_URL"),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .global(true)
                .help("Print JSON instead of text"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(SubCommand::with_name("list").about("List all voting sessions"))
        .subcommand(
            SubCommand::with_name("show")
                .about("Show one voting session and its candidates")
                .arg(Arg::with_name("ID").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("Create a voting session")
                .arg(
                    Arg::with_name("title")
                        .long("title")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("description")
                        .long("description")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("hours")
                        .long("hours")
                        .takes_value(true)
                        .default_value("24")
                        .help("Duration in hours"),
                )
                .arg(
                    Arg::with_name("candidate")
                        .long("candidate")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)
                        .help("Candidate name, repeat for each candidate"),
                ),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast an encrypted vote")
                .arg(Arg::with_name("ID").index(1).required(true))
                .arg(
                    Arg::with_name("INDEX")
                        .index(2)
                        .help("Zero-based candidate index"),
                ),
        )
        .subcommand(
            SubCommand::with_name("end")
                .about("End a voting session early (creator only)")
                .arg(Arg::with_name("ID").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("results")
                .about("Show the encrypted tally handles of an ended session")
                .arg(Arg::with_name("ID").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("abi")
                .about("Print the contract ABI")
                .arg(
                    Arg::with_name("descriptor")
                        .long("descriptor")
                        .help("Print the typed function table instead"),
                ),
        )
        .subcommand(
            SubCommand::with_name("deploy")
                .about("Deploy the voting contract")
                .arg(
                    Arg::with_name("bytecode")
                        .long("bytecode")
                        .takes_value(true)
                        .required(true)
                        .help("File holding the compiled contract bytecode in hex"),
                ),
        )
        .subcommand(SubCommand::with_name("shell").about("Interactive session"))
        .get_matches();

    let occurrences = std::cmp::min(matches.occurrences_of("v") + 2, 4) as u8;
    let verbosity = Verbosity::try_from(occurrences).unwrap_or(Verbosity::Debug);
    init_logger(verbosity);

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("anonvote: unable to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(&matches, config)) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(matches: &clap::ArgMatches<'_>, config: anonvote::Config) -> Result<(), Error> {
    let json = matches.is_present("json");

    if let Some(matches) = matches.subcommand_matches("abi") {
        return command_abi(matches);
    }

    let client = Client::new(config, json)?;
    match matches.subcommand() {
        ("list", Some(_)) => command_list(&client).await,
        ("show", Some(matches)) => command_show(matches, &client).await,
        ("create", Some(matches)) => command_create(matches, &client).await,
        ("vote", Some(matches)) => command_vote(matches, &client).await,
        ("end", Some(matches)) => command_end(matches, &client).await,
        ("results", Some(matches)) => command_results(matches, &client).await,
        ("deploy", Some(matches)) => command_deploy(matches, &client).await,
        ("shell", Some(_)) => command_shell(&client).await,
        _ => Ok(()),
    }
}

fn init_logger(verbosity: Verbosity) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(verbosity.level_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

/// Environment first, then command line flags on top
fn load_config(matches: &clap::ArgMatches) -> Result<anonvote::Config, Error> {
    let mut config = anonvote::Config::from_env()?;
    if let Some(url) = matches.value_of("rpc-url") {
        config.rpc_url = Some(expand(url));
    }
    if let Some(key) = matches.value_of("private-key") {
        config.private_key = Some(expand(key));
    }
    if let Some(address) = matches.value_of("contract") {
        config.network.contract_address = anonvote::parse_address("--contract", &expand(address))?;
    }
    if let Some(url) = matches.value_of("relayer") {
        config.relayer_url = Some(expand(url));
    }
    Ok(config)
}

pub fn expand(input: &str) -> String {
    match shellexpand::full(input) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            warn!("unable to expand {}: {}", input, e);
            input.to_owned()
        }
    }
}

/// Parse a voting id or candidate index argument
pub fn parse_id(name: &str, value: &str) -> Result<u64, Error> {
    expand(value)
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got {}", name, value)))
}
