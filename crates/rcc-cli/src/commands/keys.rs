//! Key management commands.
//!
//! `rcc keys generate` - Generate a new P-256 keypair for job tokens.

use rcc_core::config::job_token::{DEFAULT_PRIVATE_KEY_ENV, DEFAULT_PUBLIC_KEY_ENV};
use rcc_jobtoken::KeyPair;
use std::fs;
use std::path::PathBuf;

pub const PRIVATE_KEY_FILE: &str = "job_token_private.pem";
pub const PUBLIC_KEY_FILE: &str = "job_token_public.pem";

/// Generate a new keypair, either into `output` or onto stdout.
pub fn generate(output: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let keypair = KeyPair::generate()?;

    if let Some(output_dir) = output {
        fs::create_dir_all(&output_dir)?;

        let private_path = output_dir.join(PRIVATE_KEY_FILE);
        let public_path = output_dir.join(PUBLIC_KEY_FILE);
        if !force && (private_path.exists() || public_path.exists()) {
            anyhow::bail!(
                "Keys already exist in {}. Use --force to overwrite.",
                output_dir.display()
            );
        }

        keypair.save_to_files(&private_path, &public_path)?;
        tracing::info!(dir = %output_dir.display(), "generated job token keypair");

        println!("✔ Generated job token keypair:");
        println!("  Private key: {}", private_path.display());
        println!("  Public key:  {}", public_path.display());
        println!();
        println!("⚠️  Keep your private key secure! Never commit it to version control.");
        println!();
        println!("Set as environment variables:");
        println!(
            "  export {}=$(base64 -w0 {})",
            DEFAULT_PRIVATE_KEY_ENV,
            private_path.display()
        );
        println!(
            "  export {}=$(base64 -w0 {})",
            DEFAULT_PUBLIC_KEY_ENV,
            public_path.display()
        );
    } else {
        println!("{}={}", DEFAULT_PRIVATE_KEY_ENV, keypair.private_key_base64()?);
        println!("{}={}", DEFAULT_PUBLIC_KEY_ENV, keypair.public_key_base64()?);
    }

    Ok(())
}
