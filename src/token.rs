use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use totp_rs::Secret;
use zeroize::Zeroize;

use crate::config::OtpDefaults;

/// Why a record was left out of the output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing secret")]
    MissingSecret,
    #[error("invalid base32 secret: {0}")]
    InvalidSecret(String),
    #[error("unsupported algorithm '{0}', expected SHA1/SHA256/SHA512")]
    UnsupportedAlgorithm(String),
    #[error("unsupported digits '{0}', expected 6-8")]
    UnsupportedDigits(u32),
    #[error("period must be greater than zero")]
    ZeroPeriod,
    #[error("skipped by user")]
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SHA1" => Ok(Algorithm::Sha1),
            "SHA256" => Ok(Algorithm::Sha256),
            "SHA512" => Ok(Algorithm::Sha512),
            _ => Err(RecordError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = RecordError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One account as exported by the Authy decryptor.
///
/// Only `secret` (or `decrypted_seed`) is required for a usable token;
/// everything else may be missing, `null` or empty.
#[derive(Clone, Default, Deserialize)]
pub struct TokenRecord {
    pub name: Option<String>,
    pub issuer: Option<String>,
    #[serde(alias = "decrypted_seed")]
    pub secret: Option<String>,
    pub digits: Option<u32>,
    pub period: Option<u64>,
    pub algorithm: Option<String>,
    pub logo: Option<String>,
    pub account_type: Option<String>,
}

impl TokenRecord {
    pub fn new(name: &str, issuer: &str, secret: &str) -> Self {
        TokenRecord {
            name: Some(name.to_string()),
            issuer: Some(issuer.to_string()),
            secret: Some(secret.to_string()),
            digits: None,
            period: None,
            algorithm: None,
            logo: None,
            account_type: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn issuer(&self) -> &str {
        self.issuer.as_deref().map(str::trim).unwrap_or("")
    }

    /// Digits, period and algorithm, falling back to `defaults` for
    /// whatever the record leaves out.
    pub fn otp_params(&self, defaults: &OtpDefaults) -> Result<(u32, u64, Algorithm), RecordError> {
        let digits = self.digits.unwrap_or(defaults.digits);
        if !(6..=8).contains(&digits) {
            return Err(RecordError::UnsupportedDigits(digits));
        }

        let period = self.period.unwrap_or(defaults.period);
        if period == 0 {
            return Err(RecordError::ZeroPeriod);
        }

        let algorithm = match self.algorithm.as_deref() {
            Some(a) if !a.trim().is_empty() => a.parse()?,
            _ => defaults.algorithm,
        };

        Ok((digits, period, algorithm))
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("name", &self.name)
            .field("issuer", &self.issuer)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("algorithm", &self.algorithm)
            .field("logo", &self.logo)
            .field("account_type", &self.account_type)
            .finish()
    }
}

impl Drop for TokenRecord {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// A token ready to be written out as an otpauth:// URI.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub issuer: String,
    pub account: String,
    pub secret: String,
    pub digits: u32,
    pub period: u64,
    pub algorithm: Algorithm,
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("issuer", &self.issuer)
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl Drop for ResolvedToken {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Strip whitespace, uppercase, and check the result is decodable base32.
/// Trailing `=` padding is kept as given.
pub fn normalize_secret(raw: Option<&str>) -> Result<String, RecordError> {
    let mut secret: String = raw
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    secret.make_ascii_uppercase();

    if secret.is_empty() {
        return Err(RecordError::MissingSecret);
    }

    if let Err(e) = check_base32(&secret) {
        secret.zeroize();
        return Err(e);
    }

    Ok(secret)
}

fn check_base32(secret: &str) -> Result<(), RecordError> {
    let body = secret.trim_end_matches('=');

    if let Some(bad) = body.chars().find(|c| !matches!(c, 'A'..='Z' | '2'..='7')) {
        return Err(RecordError::InvalidSecret(format!(
            "unexpected character '{bad}'"
        )));
    }
    if body.is_empty() {
        return Err(RecordError::InvalidSecret("only padding".to_string()));
    }
    if body.len() != secret.len() && secret.len() % 8 != 0 {
        return Err(RecordError::InvalidSecret(format!(
            "padded length {} is not a multiple of 8",
            secret.len()
        )));
    }
    if !matches!(body.len() % 8, 0 | 2 | 4 | 5 | 7) {
        return Err(RecordError::InvalidSecret(format!(
            "{} characters is not a valid base32 length",
            body.len()
        )));
    }

    let mut bytes = Secret::Encoded(body.to_string())
        .to_bytes()
        .map_err(|e| RecordError::InvalidSecret(format!("{e:?}")))?;
    let empty = bytes.is_empty();
    bytes.zeroize();

    if empty {
        return Err(RecordError::InvalidSecret(
            "decoded to empty byte string".to_string(),
        ));
    }
    Ok(())
}
