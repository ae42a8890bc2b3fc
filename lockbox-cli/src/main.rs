//! Lockbox premium key tool
//!
//! Manages the premium key stored in the Lockbox settings file, using the
//! same verification as the desktop client.
//!
//! Usage:
//!   lockbox-license status
//!   lockbox-license register ~/Downloads/lockbox.license
//!   lockbox-license remove

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lockbox_license::{
    read_first_line, ErrorCategory, JsonFileConfigStore, LicenseError, PremiumKey,
    PremiumKeyState, PremiumKeyVerifier, PREMIUM_PUBLIC_KEY_VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lockbox-license")]
#[command(about = "Manage the Lockbox premium key")]
struct Args {
    /// Settings file (defaults to <config dir>/lockbox/settings.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the registered premium key
    Status {
        /// Print the key as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a premium key file without registering it
    Verify {
        /// File whose first line holds the premium key
        file: PathBuf,
        /// Print the key as JSON
        #[arg(long)]
        json: bool,
    },
    /// Register the premium key from a file
    Register {
        /// File whose first line holds the premium key
        file: PathBuf,
        /// Print the key as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the registered premium key
    Remove,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Verify,
    Register,
    Remove,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let settings = match args.config {
        Some(path) => path,
        None => JsonFileConfigStore::default_path()
            .context("no platform config directory; pass --config")?,
    };
    debug!("Using settings file {}", settings.display());

    let verifier = PremiumKeyVerifier::embedded().context("embedded premium key is unusable")?;
    debug!(key_version = PREMIUM_PUBLIC_KEY_VERSION, "Loaded embedded verification key");
    let state = PremiumKeyState::new(verifier.clone(), Arc::new(JsonFileConfigStore::new(settings)));

    match args.command {
        Command::Status { json } => {
            match state.initialize().await {
                Some(key) => print_key(&key, json)?,
                None if json => println!("null"),
                None => println!("No premium key registered"),
            }
        }
        Command::Verify { file, json } => {
            let key = read_first_line(&file)
                .and_then(|token| verifier.verify(&token))
                .map_err(|e| explain(Action::Verify, e))?;
            print_key(&key, json)?;
        }
        Command::Register { file, json } => {
            state.initialize().await;
            let key = state
                .register_file(file)
                .await
                .map_err(|e| explain(Action::Register, e))?;
            print_key(&key, json)?;
        }
        Command::Remove => {
            state.remove().await.map_err(|e| explain(Action::Remove, e))?;
            println!("Premium key removed");
        }
    }

    Ok(())
}

fn print_key(key: &PremiumKey, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(key)?);
        return Ok(());
    }

    println!("Premium key {}", key.id());
    println!("  Name:    {}", key.name());
    println!("  Email:   {}", key.email());
    if let Some(company) = key.company() {
        println!("  Company: {company}");
    }
    match key.expiration_date() {
        Some(exp) => println!("  Expires: {}", exp.format("%Y-%m-%d %H:%M UTC")),
        None => println!("  Expires: never"),
    }
    Ok(())
}

/// Wraps a license error in the message shown to the user.
fn explain(action: Action, err: LicenseError) -> anyhow::Error {
    let message = match (action, err.category()) {
        (Action::Remove, _) => "Could not remove the premium key",
        (_, ErrorCategory::Storage) if matches!(err, LicenseError::Io(_)) => {
            "Could not read the license file"
        }
        (_, ErrorCategory::Storage) => "Could not save the license settings",
        (Action::Verify, ErrorCategory::InvalidLicense) => "The license file is invalid",
        (Action::Verify, ErrorCategory::Expired) => "The license has expired",
        (Action::Register, ErrorCategory::InvalidLicense) => {
            "Could not register license: the license file is invalid"
        }
        (Action::Register, ErrorCategory::Expired) => {
            "Could not register license: the license has expired"
        }
    };
    anyhow::Error::new(err).context(message)
}
