use clap::{Parser, Subcommand};
use rcc_core::RccConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "rcc", version, about = "RCC job token CLI")]
struct Cli {
    /// Path to the configuration file (rcc.yaml)
    #[arg(long, short = 'c', global = true, env = "RCC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Key management (generate P-256 keypairs)
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Job token operations (issue/verify/inspect)
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a new keypair for signing job tokens
    Generate {
        /// Directory to write PEM files to. Prints base64 keys to stdout when omitted.
        #[arg(long, short = 'o', alias = "out-dir")]
        output: Option<PathBuf>,

        /// Overwrite existing key files
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issue a job token
    Issue {
        /// Private key (file path or base64 PEM). Falls back to configuration.
        #[arg(long)]
        key: Option<String>,

        /// Job the token is issued for
        #[arg(long)]
        job_id: String,

        /// User the job runs on behalf of
        #[arg(long)]
        user_id: String,

        /// Organization, for organization-owned jobs
        #[arg(long)]
        org_id: Option<String>,

        /// Job timeout in milliseconds
        #[arg(long)]
        timeout_ms: u64,

        /// Write the token to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Verify a token and print its authorization context
    Verify {
        /// Token string or path to a token file
        token: String,

        /// Public key (file path or base64 PEM). Falls back to configuration.
        #[arg(long)]
        key: Option<String>,

        /// Seconds of clock skew tolerated on exp and nbf
        #[arg(long)]
        clock_tolerance: Option<u64>,
    },

    /// Inspect a token without verifying its signature
    Inspect {
        /// Token string or path to a token file
        token: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RccConfig> {
    match path {
        Some(path) => RccConfig::load_with_context(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(RccConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { output, force } => commands::keys::generate(output, force),
        },
        Command::Token { cmd } => match cmd {
            TokenCommand::Issue {
                key,
                job_id,
                user_id,
                org_id,
                timeout_ms,
                output,
            } => commands::token::issue(
                commands::token::IssueArgs {
                    key,
                    job_id,
                    user_id,
                    org_id,
                    timeout_ms,
                    output,
                },
                &config.job_token,
            ),
            TokenCommand::Verify {
                token,
                key,
                clock_tolerance,
            } => commands::token::verify(key, token, clock_tolerance, &config.job_token).map(|_| ()),
            TokenCommand::Inspect { token } => commands::token::inspect(token),
        },
    }
}
