use authy2otp::config::Config;
use authy2otp::convert::{DEFAULT_INPUT, DEFAULT_OUTPUT, Options, convert};
use authy2otp::prompt::{Prompter, Resolver};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "authy2otp",
    version,
    about = "Convert decrypted Authy TOTP tokens to the otpauth:// URI format",
    after_help = "Examples:\n  authy2otp\n  authy2otp -i my_tokens.json -o my_uris.txt\n  authy2otp --interactive"
)]
struct Cli {
    /// Path to the decrypted Authy TOTP JSON file
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Path to the output file for otpauth:// URIs
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Confirm or edit the issuer / account name of tokens that require input
    #[arg(long)]
    interactive: bool,

    /// JSON config file with TOTP defaults (digits, period, algorithm)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("authy2otp=info")),
        )
        .with_writer(std::io::stderr) // prompts go to stdout
        .init();

    let cli = Cli::parse();
    tracing::info!("running authy to otpauth:// conversion");

    let config = Config::load(cli.config.as_deref())?;
    let opts = Options {
        input: cli.input,
        output: cli.output,
    };

    let report = if cli.interactive {
        let mut prompter = Prompter::stdio();
        let resolver: &mut dyn Resolver = &mut prompter;
        convert(&opts, &config, Some(resolver))?
    } else {
        convert(&opts, &config, None)?
    };

    if report.aborted {
        anyhow::bail!(
            "conversion aborted, {} token(s) kept in {}",
            report.converted,
            opts.output.display()
        );
    }

    Ok(())
}
