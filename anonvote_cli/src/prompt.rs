use anonvote::Confirm;
use std::io::{BufRead, Write};

/// Asks on the terminal, every time. Anything but "y" or "yes" is a no.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprintln!("{}", prompt);
        eprint!("[y/N] ");
        let _ = std::io::stderr().flush();
        read_answer(std::io::stdin().lock())
    }
}

/// Read one answer line. End of input or a read error counts as no.
pub fn read_answer<R: BufRead>(mut input: R) -> bool {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) => is_yes(&line),
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn unattended_input_declines() {
        assert!(!read_answer(&b""[..]));
        assert!(!read_answer(&b"\n"[..]));
        assert!(read_answer(&b"y\n"[..]));
        assert!(!read_answer(&b"n\ny\n"[..]));
    }
}
