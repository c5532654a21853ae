use anyhow::anyhow;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::Url;

use crate::config::OtpDefaults;
use crate::token::ResolvedToken;

/// Everything except ASCII alphanumerics and the RFC 3986 unreserved marks.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn encode(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

fn decode(s: &str) -> anyhow::Result<String> {
    let decoded = percent_decode_str(s)
        .decode_utf8()
        .map_err(|e| anyhow!("Invalid UTF-8 in otpauth URL: {e}"))?;
    Ok(decoded.into_owned())
}

/// `Issuer:account`, each side escaped on its own so the separator stays a
/// literal colon.
pub fn label(issuer: &str, account: &str) -> String {
    if issuer.is_empty() {
        // "." and ".." are dot-segments, URL normalization would drop them
        // (escaped dots count too), so they get an explicit empty issuer
        match account {
            "." | ".." => format!(":{account}"),
            _ => encode(account),
        }
    } else {
        format!("{}:{}", encode(issuer), encode(account))
    }
}

/// otpauth://totp/LABEL?secret=..&issuer=..&algorithm=..&digits=..&period=..
///
/// With `omit_default_params` the last three are left out whenever they hold
/// the standard TOTP values.
pub fn to_uri(token: &ResolvedToken, omit_default_params: bool) -> String {
    let standard = OtpDefaults::default();

    let mut params = vec![format!("secret={}", encode(&token.secret))];
    if !token.issuer.is_empty() {
        params.push(format!("issuer={}", encode(&token.issuer)));
    }
    if !omit_default_params || token.algorithm != standard.algorithm {
        params.push(format!("algorithm={}", token.algorithm));
    }
    if !omit_default_params || token.digits != standard.digits {
        params.push(format!("digits={}", token.digits));
    }
    if !omit_default_params || token.period != standard.period {
        params.push(format!("period={}", token.period));
    }

    format!(
        "otpauth://totp/{}?{}",
        label(&token.issuer, &token.account),
        params.join("&")
    )
}

/// Read an otpauth:// TOTP URI back into its parts. Missing parameters take
/// the standard TOTP values; an `issuer` parameter wins over the label.
pub fn parse(input: &str) -> anyhow::Result<ResolvedToken> {
    let url = Url::parse(input).map_err(|e| anyhow!("Invalid otpauth URL: {e}"))?;

    if url.scheme() != "otpauth" {
        return Err(anyhow!("Invalid otpauth URL scheme: {}", url.scheme()));
    }

    let kind = url.host_str().unwrap_or("").to_lowercase();
    if kind != "totp" {
        return Err(anyhow!(
            "Unsupported otpauth type '{}', only 'totp' is supported",
            kind
        ));
    }

    let raw_label = url.path().trim_start_matches('/');
    let (label_issuer, account) = match raw_label.split_once(':') {
        Some((issuer, account)) => (decode(issuer)?, decode(account)?),
        None => (String::new(), decode(raw_label)?),
    };

    let standard = OtpDefaults::default();
    let mut secret: Option<String> = None;
    let mut issuer: Option<String> = None;
    let mut algorithm = standard.algorithm;
    let mut digits = standard.digits;
    let mut period = standard.period;

    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "secret" => secret = Some(v.into_owned()),
            "issuer" => issuer = Some(v.into_owned()),
            "algorithm" => {
                algorithm = v
                    .parse()
                    .map_err(|e| anyhow!("Invalid otpauth URL: {e}"))?;
            }
            "digits" => {
                digits = v
                    .parse()
                    .map_err(|e| anyhow!("Invalid digits '{v}': {e}"))?;
            }
            "period" => {
                period = v
                    .parse()
                    .map_err(|e| anyhow!("Invalid period '{v}': {e}"))?;
            }
            _ => {}
        }
    }

    let secret = secret.ok_or_else(|| anyhow!("otpauth URL missing 'secret' param"))?;

    Ok(ResolvedToken {
        issuer: issuer.unwrap_or(label_issuer),
        account,
        secret,
        digits,
        period,
        algorithm,
    })
}
