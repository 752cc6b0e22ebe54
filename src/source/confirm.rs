use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Decides whether a list should be migrated.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Asks on stdin, an empty answer meaning yes.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read answer from stdin")?;
        Ok(parse_answer(&answer))
    }
}

/// Accepts every list, for `--yes`.
pub struct AcceptAll;

impl Confirm for AcceptAll {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

pub fn parse_answer(answer: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_answer_means_yes() {
        assert!(parse_answer(""));
        assert!(parse_answer("\n"));
    }

    #[test]
    fn y_in_any_case_means_yes() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer("Y"));
    }

    #[test]
    fn anything_else_means_no() {
        assert!(!parse_answer("n"));
        assert!(!parse_answer("yes"));
        assert!(!parse_answer("nope\n"));
    }

    #[test]
    fn accept_all_never_asks() {
        assert!(AcceptAll.confirm("Do you want to migrate Inbox? [y]/n ").unwrap());
    }
}
