//! Issuer/account repair for decrypted Authy tokens.
//!
//! Every record goes through [`resolve_fields`]. Records it cannot settle are
//! handed to a [`Resolver`] in interactive mode, or get a best-effort
//! fallback and end up in [`Report::needs_review`] otherwise.

use std::fmt;

use crate::config::OtpDefaults;
use crate::prompt::{Decision, PromptError, Resolver};
use crate::token::{RecordError, ResolvedToken, TokenRecord, normalize_secret};

/// Separators between issuer and account in a token name, highest priority
/// first. Anything other than the colon must be surrounded by spaces so that
/// `alice-smith@example.com` stays whole.
pub const DELIMITERS: &[&str] = &[":", " - ", " | ", " / "];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields {
    pub issuer: String,
    pub account: String,
}

impl Fields {
    fn new(issuer: &str, account: &str) -> Self {
        Fields {
            issuer: issuer.to_string(),
            account: account.to_string(),
        }
    }
}

/// Why a token could not be settled automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    NoIssuer,
    EmptyAccount,
    EmbeddedIssuer,
}

impl fmt::Display for Review {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Review::NoIssuer => "has no issuer and no recognizable separator in its name",
            Review::EmptyAccount => "has no account name apart from the issuer",
            Review::EmbeddedIssuer => "may still contain the issuer in its account name",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Fields),
    NeedsInput { guess: Fields, reason: Review },
}

/// An ambiguous token as shown to a [`Resolver`].
#[derive(Debug)]
pub struct Pending<'a> {
    pub index: usize,
    pub name: &'a str,
    pub guess: Fields,
    pub reason: Review,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub index: usize,
    pub name: String,
    pub error: RecordError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flagged {
    pub index: usize,
    pub name: String,
    pub reason: Review,
}

#[derive(Debug, Default)]
pub struct Report {
    pub converted: usize,
    pub skipped: Vec<Skipped>,
    pub needs_review: Vec<Flagged>,
    pub aborted: bool,
}

/// Split `name` on the first delimiter from [`DELIMITERS`] that leaves two
/// non-empty sides.
pub fn split_name(name: &str) -> Option<(&str, &str)> {
    DELIMITERS.iter().find_map(|delim| {
        let (issuer, account) = name.split_once(delim)?;
        let (issuer, account) = (issuer.trim(), account.trim());
        if issuer.is_empty() || account.is_empty() {
            None
        } else {
            Some((issuer, account))
        }
    })
}

/// Remove a leading `issuer` from `name` (case-insensitive) when it is
/// followed by one of [`DELIMITERS`] (spaced or not) or by whitespace.
/// `name` equal to `issuer` strips to "".
pub fn strip_issuer<'a>(name: &'a str, issuer: &str) -> &'a str {
    let name = name.trim();
    if issuer.is_empty() {
        return name;
    }
    let Some(rest) = strip_prefix_ignore_case(name, issuer) else {
        return name;
    };

    let trimmed = rest.trim_start();
    if let Some(after) = DELIMITERS
        .iter()
        .find_map(|delim| trimmed.strip_prefix(delim.trim()))
    {
        return after.trim();
    }
    if trimmed.is_empty() || trimmed.len() != rest.len() {
        return trimmed;
    }
    name
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = s.char_indices();
    for p in prefix.chars() {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    let end = chars.next().map(|(i, _)| i).unwrap_or(s.len());
    Some(&s[end..])
}

/// Capitalize all-lowercase words; words that already carry a capital
/// (`eBay`, `GitHub`) are kept.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            if word.chars().any(char::is_uppercase) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Issuer taken from the Authy `logo` or `account_type` fields. Generic
/// "authenticator" values carry no information and are ignored.
pub fn issuer_hint(record: &TokenRecord) -> Option<String> {
    let logo = record
        .logo
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("authenticator_"));
    let account_type = record
        .account_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.starts_with("authenticator"));

    logo.or(account_type).map(title_case)
}

/// Decide issuer and account for one record without asking anybody.
pub fn resolve_fields(record: &TokenRecord) -> Resolution {
    let name = record.name();
    let issuer = record.issuer();

    if !issuer.is_empty() {
        return with_issuer(name, issuer);
    }

    if let Some((issuer, account)) = split_name(name) {
        return checked(&title_case(issuer), account);
    }

    if let Some(hint) = issuer_hint(record) {
        return with_issuer(name, &hint);
    }

    Resolution::NeedsInput {
        guess: Fields::new("", name),
        reason: Review::NoIssuer,
    }
}

fn with_issuer(name: &str, issuer: &str) -> Resolution {
    let account = strip_issuer(name, issuer);
    if account.is_empty() {
        return Resolution::NeedsInput {
            guess: Fields::new(issuer, name),
            reason: Review::EmptyAccount,
        };
    }
    checked(issuer, account)
}

fn checked(issuer: &str, account: &str) -> Resolution {
    if account.contains(": ") {
        Resolution::NeedsInput {
            guess: Fields::new(issuer, account),
            reason: Review::EmbeddedIssuer,
        }
    } else {
        Resolution::Resolved(Fields::new(issuer, account))
    }
}

/// Non-interactive stand-in for a [`Resolver`]: keep the guess, making sure
/// the account is never empty.
fn fallback(index: usize, guess: Fields) -> Fields {
    let account = if !guess.account.is_empty() {
        guess.account
    } else if !guess.issuer.is_empty() {
        guess.issuer.clone()
    } else {
        format!("token-{}", index + 1)
    };
    Fields {
        issuer: guess.issuer,
        account,
    }
}

enum Outcome {
    Token(ResolvedToken, Option<Review>),
    Skipped(RecordError),
    Aborted,
}

pub struct Normalizer<'a> {
    defaults: OtpDefaults,
    resolver: Option<&'a mut dyn Resolver>,
}

impl<'a> Normalizer<'a> {
    pub fn new(defaults: OtpDefaults) -> Self {
        Normalizer {
            defaults,
            resolver: None,
        }
    }

    pub fn interactive(defaults: OtpDefaults, resolver: &'a mut dyn Resolver) -> Self {
        Normalizer {
            defaults,
            resolver: Some(resolver),
        }
    }

    /// Resolve every record in order, handing each token to `emit` as soon
    /// as it is ready. Stops early (with `Report::aborted`) if the resolver
    /// reports that its input went away.
    pub fn run<F>(&mut self, records: &[TokenRecord], mut emit: F) -> anyhow::Result<Report>
    where
        F: FnMut(&ResolvedToken) -> anyhow::Result<()>,
    {
        let mut report = Report::default();

        for (index, record) in records.iter().enumerate() {
            match self.normalize_one(index, record)? {
                Outcome::Token(token, review) => {
                    tracing::info!(
                        "processed totp - issuer: {} | account: {}",
                        token.issuer,
                        token.account
                    );
                    emit(&token)?;
                    report.converted += 1;
                    if let Some(reason) = review {
                        report.needs_review.push(Flagged {
                            index,
                            name: record.name().to_string(),
                            reason,
                        });
                    }
                }
                Outcome::Skipped(error) => {
                    tracing::warn!("skipping token #{} '{}': {}", index + 1, record.name(), error);
                    report.skipped.push(Skipped {
                        index,
                        name: record.name().to_string(),
                        error,
                    });
                }
                Outcome::Aborted => {
                    tracing::warn!("conversion aborted at token #{}", index + 1);
                    report.aborted = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Collecting variant of [`Normalizer::run`].
    pub fn normalize(
        &mut self,
        records: &[TokenRecord],
    ) -> anyhow::Result<(Vec<ResolvedToken>, Report)> {
        let mut tokens = Vec::new();
        let report = self.run(records, |token| {
            tokens.push(token.clone());
            Ok(())
        })?;
        Ok((tokens, report))
    }

    fn normalize_one(&mut self, index: usize, record: &TokenRecord) -> anyhow::Result<Outcome> {
        let secret = match normalize_secret(record.secret.as_deref()) {
            Ok(s) => s,
            Err(e) => return Ok(Outcome::Skipped(e)),
        };
        let (digits, period, algorithm) = match record.otp_params(&self.defaults) {
            Ok(p) => p,
            Err(e) => return Ok(Outcome::Skipped(e)),
        };

        let (fields, review) = match resolve_fields(record) {
            Resolution::Resolved(fields) => {
                tracing::debug!("token #{} resolved automatically", index + 1);
                (fields, None)
            }
            Resolution::NeedsInput { guess, reason } => match self.resolver.as_deref_mut() {
                Some(resolver) => {
                    let pending = Pending {
                        index,
                        name: record.name(),
                        guess,
                        reason,
                    };
                    match resolver.resolve(&pending) {
                        Ok(Decision::Accept { issuer, account }) => (Fields { issuer, account }, None),
                        Ok(Decision::Skip) => return Ok(Outcome::Skipped(RecordError::Declined)),
                        Err(PromptError::Aborted) => return Ok(Outcome::Aborted),
                        Err(PromptError::Io(e)) => return Err(e.into()),
                    }
                }
                None => {
                    tracing::warn!(
                        "token #{} '{}' {}, needs review",
                        index + 1,
                        record.name(),
                        reason
                    );
                    (fallback(index, guess), Some(reason))
                }
            },
        };

        let token = ResolvedToken {
            issuer: fields.issuer,
            account: fields.account,
            secret,
            digits,
            period,
            algorithm,
        };
        Ok(Outcome::Token(token, review))
    }
}
