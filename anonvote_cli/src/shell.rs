use crate::{Client, LiveBackend};
use anonvote::*;
use ethers::types::Address;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

const HELP: &str = "\
Navigation:  list | open <id> | create | back | refresh
Details:     vote <index> | end | results
Create form: title <text> | description <text> | hours <n> | candidate <row> <name>
             add | remove <row> | submit
Wallet:      connect | disconnect
             help | quit";

/// What a command asks the loop to do next
enum Next {
    Stay,
    Render,
    Quit,
}

struct Shell<'a> {
    client: &'a Client,
    router: Router,
    encryption: EncryptionAdapter,
    updates: watch::Receiver<SessionState<LiveBackend>>,
    lines: Lines<BufReader<Stdin>>,
    detail: Option<VotingDetail>,
    form: CreateForm,
}

pub async fn command_shell(client: &Client) -> Result<(), Error> {
    let _listener = client.manager.listen();
    let _poller = client
        .wallet
        .as_ref()
        .map(|wallet| wallet.watch_chain(client.config.poll_interval));

    let mut shell = Shell {
        client,
        router: Router::new(),
        encryption: client.encryption(),
        updates: client.manager.subscribe(),
        lines: BufReader::new(tokio::io::stdin()).lines(),
        detail: None,
        form: CreateForm::new(),
    };

    println!("{}\n", HELP);
    shell.connect().await;
    let _ = shell.updates.borrow_and_update();
    shell.render().await;

    loop {
        print!("anonvote> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            line = shell.lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        return Err(Error::Config(format!("unable to read input: {}", e)));
                    }
                };
                match shell.handle(line.trim()).await {
                    Next::Stay => {}
                    Next::Render => shell.render().await,
                    Next::Quit => break,
                }
            }
            changed = shell.updates.changed() => {
                if changed.is_err() {
                    break;
                }
                shell.router.session_changed();
                shell.detail = None;
                println!();
                match shell.updates.borrow().account() {
                    Some(account) => println!("Wallet session changed: {:?}", account),
                    None => println!("Wallet disconnected. Type `connect` to reconnect."),
                }
                shell.render().await;
            }
        }
    }

    Ok(())
}

fn parse_arg(arg: Option<&str>) -> Option<u64> {
    arg.and_then(|a| a.trim().parse().ok())
}

impl<'a> Shell<'a> {
    async fn handle(&mut self, line: &str) -> Next {
        let (command, rest) = match line.find(' ') {
            Some(pos) => (&line[..pos], line[pos + 1..].trim()),
            None => (line, ""),
        };
        let arg = if rest.is_empty() { None } else { Some(rest) };

        match command {
            "" => Next::Stay,
            "help" | "?" => {
                println!("{}", HELP);
                Next::Stay
            }
            "quit" | "exit" => Next::Quit,
            "list" => self.navigate(Action::ShowList),
            "create" => self.navigate(Action::OpenCreate),
            "back" => self.navigate(Action::Back),
            "refresh" => self.navigate(Action::Refresh),
            "open" => {
                let id = parse_arg(arg);
                let action = match (self.router.view(), id) {
                    (View::List, Some(id)) => Action::Select(id),
                    (_, id) => Action::OpenDetails(id),
                };
                self.navigate(action)
            }
            "connect" => {
                self.connect().await;
                Next::Stay
            }
            "disconnect" => {
                self.client.manager.disconnect().await;
                Next::Stay
            }
            "vote" => self.vote(arg).await,
            "end" => self.end().await,
            "results" => self.results().await,
            "title" | "description" | "hours" | "candidate" | "add" | "remove" | "submit" => {
                if self.router.view() != View::Create {
                    println!("Type `create` to open the create form first");
                    return Next::Stay;
                }
                self.edit_form(command, rest).await
            }
            _ => {
                println!("Unknown command {}. Type `help` for a list.", command);
                Next::Stay
            }
        }
    }

    fn navigate(&mut self, action: Action) -> Next {
        match self.router.dispatch(action) {
            Some(_) => {
                self.detail = None;
                Next::Render
            }
            None => {
                println!("Nothing to do here");
                Next::Stay
            }
        }
    }

    async fn connect(&mut self) {
        match self.client.connect().await {
            Ok((account, _)) => println!("Connected as {:?}", account),
            Err(e) => print_error(&e),
        }
    }

    fn gateway(&self) -> Result<(Address, Gateway<LiveBackend>), Error> {
        match &*self.updates.borrow() {
            SessionState::Connected(session) => {
                Ok((session.account, session.gateway(self.client.config.gas)))
            }
            _ => Err(Error::WalletNotFound(
                "not connected, type `connect` first".into(),
            )),
        }
    }

    /// Load and print the current view, unless the load went stale
    async fn render(&mut self) {
        let ticket = self.router.ticket();
        let output = match self.router.view() {
            View::List => self.load_list().await,
            View::Create => Ok(render_form(&self.form)),
            View::Details(None) => Ok(NO_SELECTION_PANEL.to_owned()),
            View::Details(Some(id)) => self.load_detail(id).await,
        };

        if self.updates.has_changed().unwrap_or(false) {
            self.router.session_changed();
        }
        match self.router.accept(ticket, output) {
            Some(Ok(text)) => println!("{}", text.trim_end()),
            Some(Err(e)) => print_error(&e),
            None => self.detail = None,
        }
    }

    async fn load_list(&mut self) -> Result<String, Error> {
        let (account, gateway) = self.gateway()?;
        let list = VotingList::load(&gateway, account).await?;
        Ok(list.render(unix_now()))
    }

    async fn load_detail(&mut self, voting_id: u64) -> Result<String, Error> {
        let (account, gateway) = self.gateway()?;
        let detail = VotingDetail::load(&gateway, account, voting_id).await?;
        let text = detail.render(unix_now(), &self.encryption.status());
        self.detail = Some(detail);
        Ok(text)
    }

    async fn read_line(&mut self) -> Option<String> {
        self.lines.next_line().await.ok().flatten()
    }

    async fn vote(&mut self, arg: Option<&str>) -> Next {
        let detail = match &self.detail {
            Some(detail) => detail.clone(),
            None => {
                println!("Open a voting first");
                return Next::Stay;
            }
        };
        let (_, gateway) = match self.gateway() {
            Ok(gateway) => gateway,
            Err(e) => {
                print_error(&e);
                return Next::Stay;
            }
        };

        // The line reader belongs to the loop, so the test-vote question is asked here
        let index = parse_arg(arg);
        let asks = !self.encryption.is_ready() && self.encryption.allows_test_votes();
        let mut answer = false;
        if asks && index.is_some() && detail.can_vote() {
            println!("{}", TEST_VOTE_PROMPT);
            print!("[y/N] ");
            let _ = std::io::stdout().flush();
            answer = self
                .read_line()
                .await
                .map(|line| crate::is_yes(&line))
                .unwrap_or(false);
        }

        match detail
            .cast_vote(&gateway, &self.encryption, &FixedAnswer(answer), index)
            .await
        {
            Ok(Some(receipt)) => {
                if !self.encryption.is_ready() {
                    println!("TEST VOTE (not private) cast in transaction {:?}", receipt.tx_hash);
                } else {
                    println!("Encrypted vote cast in transaction {:?}", receipt.tx_hash);
                }
                self.navigate(Action::Refresh)
            }
            Ok(None) => {
                println!("Vote cancelled");
                Next::Stay
            }
            Err(e) => {
                print_error(&e);
                Next::Stay
            }
        }
    }

    async fn end(&mut self) -> Next {
        let detail = match &self.detail {
            Some(detail) => detail.clone(),
            None => {
                println!("Open a voting first");
                return Next::Stay;
            }
        };
        let (_, gateway) = match self.gateway() {
            Ok(gateway) => gateway,
            Err(e) => {
                print_error(&e);
                return Next::Stay;
            }
        };
        match detail.end(&gateway).await {
            Ok(receipt) => {
                println!("Voting ended in transaction {:?}", receipt.tx_hash);
                self.navigate(Action::Refresh)
            }
            Err(e) => {
                print_error(&e);
                Next::Stay
            }
        }
    }

    async fn results(&mut self) -> Next {
        let detail = match &self.detail {
            Some(detail) => detail.clone(),
            None => {
                println!("Open a voting first");
                return Next::Stay;
            }
        };
        let result = match self.gateway() {
            Ok((_, gateway)) => detail.results(&gateway).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(results) => {
                for (candidate, tally) in results {
                    println!("  [{}] {}: {}", candidate.index, candidate.name, tally);
                }
            }
            Err(e) => print_error(&e),
        }
        Next::Stay
    }

    async fn edit_form(&mut self, command: &str, rest: &str) -> Next {
        match command {
            "title" => self.form.set_title(rest),
            "description" => self.form.set_description(rest),
            "hours" => match rest.parse() {
                Ok(hours) => self.form.set_duration_hours(hours),
                Err(_) => println!("hours must be a whole number"),
            },
            "candidate" => {
                let (row, name) = match rest.find(' ') {
                    Some(pos) => (&rest[..pos], rest[pos + 1..].trim()),
                    None => (rest, ""),
                };
                let updated = match row.parse::<usize>() {
                    Ok(row) => self.form.set_candidate(row, name),
                    Err(_) => false,
                };
                if !updated {
                    println!("No candidate row {}", row);
                }
            }
            "add" => {
                if !self.form.add_candidate() {
                    println!("At most {} candidates", MAX_CANDIDATES);
                }
            }
            "remove" => {
                let removed = match rest.parse::<usize>() {
                    Ok(row) => self.form.remove_candidate(row),
                    Err(_) => false,
                };
                if !removed {
                    println!("At least {} candidate rows are needed", MIN_CANDIDATES);
                }
            }
            "submit" => {
                let (_, gateway) = match self.gateway() {
                    Ok(gateway) => gateway,
                    Err(e) => {
                        print_error(&e);
                        return Next::Stay;
                    }
                };
                return match self.form.submit(&gateway).await {
                    Ok(receipt) => {
                        println!("Voting created in transaction {:?}", receipt.tx_hash);
                        self.navigate(Action::Created)
                    }
                    Err(e) => {
                        print_error(&e);
                        Next::Stay
                    }
                };
            }
            _ => {}
        }
        print!("{}", render_form(&self.form));
        Next::Stay
    }
}

fn print_error(e: &Error) {
    if e.is_transient() {
        println!("{} (type `refresh` to retry)", e);
    } else {
        println!("{}", e);
    }
}

fn render_form(form: &CreateForm) -> String {
    let mut out = String::from("Create a voting\n");
    out.push_str(&format!("  title:       {}\n", form.title));
    out.push_str(&format!("  description: {}\n", form.description));
    out.push_str(&format!("  hours:       {}\n", form.duration_hours));
    for (row, name) in form.candidates.iter().enumerate() {
        out.push_str(&format!("  candidate {}: {}\n", row, name));
    }
    out
}
