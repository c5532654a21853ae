use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::normalize::{Normalizer, Report};
use crate::prompt::Resolver;
use crate::store::{UriWriter, load_tokens};
use crate::uri::to_uri;

pub const DEFAULT_INPUT: &str = "decrypted_tokens.json";
pub const DEFAULT_OUTPUT: &str = "otpauth_uris.txt";

#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

/// Convert `opts.input` into `opts.output`.
///
/// The input is read and validated completely before the output file is
/// touched. With a `resolver` every ambiguous token is settled through it;
/// without one the best-effort fallback is used.
pub fn convert(
    opts: &Options,
    config: &Config,
    resolver: Option<&mut dyn Resolver>,
) -> anyhow::Result<Report> {
    let records = load_tokens(&opts.input)?;
    tracing::info!(
        "loaded {} token(s) from {}",
        records.len(),
        opts.input.display()
    );

    let mut writer = UriWriter::create(&opts.output)?;
    let mut normalizer = match resolver {
        Some(r) => Normalizer::interactive(config.defaults.clone(), r),
        None => Normalizer::new(config.defaults.clone()),
    };

    let omit = config.omit_default_params;
    let report = normalizer.run(&records, |token| writer.write_uri(&to_uri(token, omit)))?;
    writer.finish()?;

    log_summary(&report, &opts.output);
    Ok(report)
}

fn log_summary(report: &Report, output: &Path) {
    tracing::info!("");
    tracing::info!("converted {} token(s)", report.converted);

    if !report.skipped.is_empty() {
        tracing::warn!("skipped {} token(s):", report.skipped.len());
        for s in &report.skipped {
            tracing::warn!("  #{} '{}': {}", s.index + 1, s.name, s.error);
        }
    }

    if !report.needs_review.is_empty() {
        tracing::warn!(
            "{} token(s) need review in {}:",
            report.needs_review.len(),
            output.display()
        );
        for f in &report.needs_review {
            tracing::warn!("  #{} '{}' {}", f.index + 1, f.name, f.reason);
        }
    }

    tracing::info!("URIs written to: {}", output.display());
}
