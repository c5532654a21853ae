use anyhow::Context;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroize;

use crate::token::TokenRecord;

/// Key the Authy decryptor puts its token list under.
pub const TOKEN_LIST_KEY: &str = "decrypted_authenticator_tokens";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not find '{}'", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read '{}': {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("invalid JSON in '{}': {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("'{}' has no '{}' list", .0.display(), TOKEN_LIST_KEY)]
    MissingTokenList(PathBuf),
    #[error("no tokens found in '{}'", .0.display())]
    NoTokens(PathBuf),
}

/// Read the decrypted token list, either the decryptor's export object or a
/// bare JSON array of records.
pub fn load_tokens(path: &Path) -> Result<Vec<TokenRecord>, InputError> {
    let mut data = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            InputError::NotFound(path.to_path_buf())
        } else {
            InputError::Unreadable {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let records = parse_tokens(&data, path);
    data.zeroize();
    records
}

fn parse_tokens(data: &str, path: &Path) -> Result<Vec<TokenRecord>, InputError> {
    let invalid = |source| InputError::InvalidJson {
        path: path.to_path_buf(),
        source,
    };

    let list = match serde_json::from_str::<Value>(data).map_err(invalid)? {
        list @ Value::Array(_) => list,
        Value::Object(mut map) => map
            .remove(TOKEN_LIST_KEY)
            .ok_or_else(|| InputError::MissingTokenList(path.to_path_buf()))?,
        _ => return Err(InputError::MissingTokenList(path.to_path_buf())),
    };

    let records: Vec<TokenRecord> = serde_json::from_value(list).map_err(invalid)?;
    if records.is_empty() {
        return Err(InputError::NoTokens(path.to_path_buf()));
    }
    Ok(records)
}

#[cfg(unix)]
fn set_perms_restrictive(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_perms_restrictive(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Output file with one URI per line. Every line is flushed as soon as it is
/// written, so an interrupted run keeps what it already produced.
pub struct UriWriter {
    path: PathBuf,
    out: LineWriter<File>,
    written: usize,
}

impl UriWriter {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("cannot create output file {}", path.display()))?;
        // the file holds every secret in clear text
        if let Err(e) = set_perms_restrictive(path) {
            tracing::warn!("cannot restrict permissions of {}: {e}", path.display());
        }

        Ok(UriWriter {
            path: path.to_path_buf(),
            out: LineWriter::new(file),
            written: 0,
        })
    }

    pub fn write_uri(&mut self, uri: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{uri}")
            .with_context(|| format!("cannot write to {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of lines written.
    pub fn finish(mut self) -> anyhow::Result<usize> {
        self.out
            .flush()
            .with_context(|| format!("cannot write to {}", self.path.display()))?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_input(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("decrypted_tokens.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn export_object_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(
            &dir,
            r#"{"message":"success","decrypted_authenticator_tokens":[
                {"account_type":"github","digits":6,"issuer":null,"logo":"github",
                 "name":"GitHub: alice","decrypted_seed":"JBSWY3DPEHPK3PXP","unique_id":"1"}
            ],"success":true}"#,
        );
        let records = load_tokens(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "GitHub: alice");
        assert_eq!(records[0].logo.as_deref(), Some("github"));
    }

    #[test]
    fn bare_array_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(&dir, r#"[{"name":"a","secret":"JBSWY3DPEHPK3PXP"},{"name":"b"}]"#);
        let records = load_tokens(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].secret.is_none());
    }

    #[test]
    fn input_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("nope.json");
        assert!(matches!(load_tokens(&missing), Err(InputError::NotFound(_))));

        let path = write_input(&dir, "{not json");
        assert!(matches!(load_tokens(&path), Err(InputError::InvalidJson { .. })));

        let path = write_input(&dir, r#"{"tokens":[]}"#);
        assert!(matches!(load_tokens(&path), Err(InputError::MissingTokenList(_))));

        let path = write_input(&dir, r#""just a string""#);
        assert!(matches!(load_tokens(&path), Err(InputError::MissingTokenList(_))));

        let path = write_input(&dir, r#"{"decrypted_authenticator_tokens":[]}"#);
        assert!(matches!(load_tokens(&path), Err(InputError::NoTokens(_))));

        let path = write_input(&dir, r#"[{"name":42}]"#);
        assert!(matches!(load_tokens(&path), Err(InputError::InvalidJson { .. })));
    }

    #[test]
    fn error_message_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let msg = load_tokens(&missing).unwrap_err().to_string();
        assert!(msg.contains("nope.json"));
    }

    #[test]
    fn writer_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("otpauth_uris.txt");
        let mut w = UriWriter::create(&path).unwrap();
        w.write_uri("otpauth://totp/a?secret=A").unwrap();
        w.write_uri("otpauth://totp/b?secret=B").unwrap();
        assert_eq!(w.finish().unwrap(), 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "otpauth://totp/a?secret=A\notpauth://totp/b?secret=B\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn output_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("otpauth_uris.txt");
        UriWriter::create(&path).unwrap().finish().unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
