use std::io::{self, BufRead, StdinLock, Stdout, Write};
use thiserror::Error;

use crate::normalize::Pending;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("input closed, conversion aborted")]
    Aborted,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What to do with a token whose issuer/account could not be settled
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept { issuer: String, account: String },
    Skip,
}

/// Asks someone (or something) to settle an ambiguous token.
pub trait Resolver {
    fn resolve(&mut self, pending: &Pending<'_>) -> Result<Decision, PromptError>;
}

/// Typing this at the issuer prompt drops the token.
pub const SKIP_INPUT: &str = "-";

/// Typing this at the issuer prompt asks for an empty issuer.
pub const CLEAR_INPUT: &str = "!";

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Prompter::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    pub fn prompt_string(&mut self, prompt: &str) -> Result<String, PromptError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut s = String::new();
        if self.input.read_line(&mut s)? == 0 {
            return Err(PromptError::Aborted);
        }
        if s.ends_with('\n') {
            s.pop();
            if s.ends_with('\r') {
                s.pop();
            }
        }
        Ok(s)
    }

    /// Empty input keeps `default`.
    fn prompt_default(&mut self, label: &str, default: &str) -> Result<String, PromptError> {
        let answer = self.prompt_string(&format!("{label} [{default}]: "))?;
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.to_string())
        }
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, PromptError> {
        let answer = self.prompt_string(prompt)?;
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

impl<R: BufRead, W: Write> Resolver for Prompter<R, W> {
    fn resolve(&mut self, pending: &Pending<'_>) -> Result<Decision, PromptError> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "token #{} '{}' {}",
            pending.index + 1,
            pending.name,
            pending.reason
        )?;

        let issuer = loop {
            let answer = self.prompt_default(
                &format!("Issuer ('{SKIP_INPUT}' skips this token, '{CLEAR_INPUT}' leaves it empty)"),
                &pending.guess.issuer,
            )?;
            if answer == SKIP_INPUT {
                return Ok(Decision::Skip);
            }
            let issuer = if answer == CLEAR_INPUT {
                String::new()
            } else {
                answer
            };
            if !issuer.is_empty() || self.confirm("Leave the issuer empty? [y/N]: ")? {
                break issuer;
            }
        };

        let account = loop {
            let account = self.prompt_default("Account name", &pending.guess.account)?;
            if !account.is_empty() {
                break account;
            }
            writeln!(self.output, "Account name cannot be empty.")?;
        };

        Ok(Decision::Accept { issuer, account })
    }
}
