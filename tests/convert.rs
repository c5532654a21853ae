use authy2otp::config::Config;
use authy2otp::convert::{Options, convert};
use authy2otp::normalize::Review;
use authy2otp::prompt::{Prompter, Resolver};
use authy2otp::token::RecordError;
use authy2otp::uri;
use std::fs;
use std::io::Cursor;
use std::path::Path;

const EXPORT: &str = r#"{
  "message": "success",
  "decrypted_authenticator_tokens": [
    {"name": "GitHub: alice@example.com", "issuer": "", "decrypted_seed": "JBSWY3DPEHPK3PXP", "digits": 6},
    {"name": "randomlabel", "issuer": "", "decrypted_seed": "ABCDEFGHIJKLMNOP", "digits": 6},
    {"name": "Broken: bob", "issuer": "", "decrypted_seed": "", "digits": 6},
    {"name": "bob@corp.example", "issuer": null, "logo": "okta", "decrypted_seed": "mzxw 6ytb", "digits": 8}
  ],
  "success": true
}"#;

fn setup(body: &str) -> (tempfile::TempDir, Options) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("decrypted_tokens.json");
    fs::write(&input, body).unwrap();
    let opts = Options {
        input,
        output: dir.path().join("otpauth_uris.txt"),
    };
    (dir, opts)
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn export_is_converted() {
    let (_dir, opts) = setup(EXPORT);
    let report = convert(&opts, &Config::default(), None).unwrap();

    assert_eq!(
        lines(&opts.output),
        vec![
            "otpauth://totp/GitHub:alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=GitHub&algorithm=SHA1&digits=6&period=30",
            "otpauth://totp/randomlabel?secret=ABCDEFGHIJKLMNOP&algorithm=SHA1&digits=6&period=30",
            "otpauth://totp/Okta:bob%40corp.example?secret=MZXW6YTB&issuer=Okta&algorithm=SHA1&digits=8&period=30",
        ]
    );

    assert_eq!(report.converted, 3);
    assert!(!report.aborted);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 2);
    assert_eq!(report.skipped[0].error, RecordError::MissingSecret);

    assert_eq!(report.needs_review.len(), 1);
    assert_eq!(report.needs_review[0].name, "randomlabel");
    assert_eq!(report.needs_review[0].reason, Review::NoIssuer);
}

#[test]
fn output_lines_parse_back() {
    let (_dir, opts) = setup(EXPORT);
    convert(&opts, &Config::default(), None).unwrap();

    let tokens: Vec<_> = lines(&opts.output)
        .iter()
        .map(|l| uri::parse(l).unwrap())
        .collect();
    assert_eq!(tokens[0].issuer, "GitHub");
    assert_eq!(tokens[0].account, "alice@example.com");
    assert_eq!(tokens[1].issuer, "");
    assert_eq!(tokens[1].account, "randomlabel");
    assert_eq!(tokens[2].digits, 8);
}

#[test]
fn runs_are_byte_identical() {
    let (dir, opts) = setup(EXPORT);
    convert(&opts, &Config::default(), None).unwrap();
    let first = fs::read(&opts.output).unwrap();

    let again = Options {
        input: opts.input.clone(),
        output: dir.path().join("second.txt"),
    };
    convert(&again, &Config::default(), None).unwrap();
    convert(&opts, &Config::default(), None).unwrap();

    assert_eq!(first, fs::read(&again.output).unwrap());
    assert_eq!(first, fs::read(&opts.output).unwrap());
}

#[test]
fn omitting_default_params() {
    let (_dir, opts) = setup(EXPORT);
    let config = Config {
        omit_default_params: true,
        ..Config::default()
    };
    convert(&opts, &config, None).unwrap();

    let out = lines(&opts.output);
    assert_eq!(
        out[0],
        "otpauth://totp/GitHub:alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=GitHub"
    );
    assert_eq!(
        out[2],
        "otpauth://totp/Okta:bob%40corp.example?secret=MZXW6YTB&issuer=Okta&digits=8"
    );
}

#[test]
fn only_skipped_records_still_succeeds() {
    let (_dir, opts) = setup(r#"[{"name": "a", "secret": ""}]"#);
    let report = convert(&opts, &Config::default(), None).unwrap();

    assert_eq!(report.converted, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(fs::read_to_string(&opts.output).unwrap(), "");
}

#[test]
fn bad_input_leaves_no_output() {
    for body in ["{oops", r#"{"decrypted_authenticator_tokens": []}"#, r#"{"other": 1}"#] {
        let (_dir, opts) = setup(body);
        assert!(convert(&opts, &Config::default(), None).is_err());
        assert!(!opts.output.exists());
    }

    let (dir, mut opts) = setup("[]");
    opts.input = dir.path().join("missing.json");
    let err = convert(&opts, &Config::default(), None).unwrap_err();
    assert!(err.to_string().contains("missing.json"));
    assert!(!opts.output.exists());
}

#[test]
fn interactive_answers_are_used() {
    let (_dir, opts) = setup(EXPORT);
    let mut out = Vec::new();
    let mut prompter = Prompter::new(Cursor::new("Example Corp\ncarol\n"), &mut out);
    let resolver: &mut dyn Resolver = &mut prompter;
    let report = convert(&opts, &Config::default(), Some(resolver)).unwrap();

    assert!(report.needs_review.is_empty());
    assert_eq!(
        lines(&opts.output)[1],
        "otpauth://totp/Example%20Corp:carol?secret=ABCDEFGHIJKLMNOP&issuer=Example%20Corp&algorithm=SHA1&digits=6&period=30"
    );
}

#[test]
fn interactive_abort_keeps_partial_output() {
    let (_dir, opts) = setup(EXPORT);
    let mut out = Vec::new();
    let mut prompter = Prompter::new(Cursor::new(""), &mut out);
    let resolver: &mut dyn Resolver = &mut prompter;
    let report = convert(&opts, &Config::default(), Some(resolver)).unwrap();

    assert!(report.aborted);
    assert_eq!(report.converted, 1);
    assert_eq!(
        lines(&opts.output),
        vec!["otpauth://totp/GitHub:alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=GitHub&algorithm=SHA1&digits=6&period=30"]
    );
}
