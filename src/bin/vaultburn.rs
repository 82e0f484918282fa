//! vaultburn CLI - secure shredding and single-file encryption
//!
//! Shreds files by overwriting them with random data before deleting
//! them, and encrypts/decrypts single files with NaCl secretbox
//! (XSalsa20Poly1305) under a fresh random key per file.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use vaultburn::commands::{self, DecryptOptions, EncryptOptions, ShredOptions};
use vaultburn::config::Config;
use vaultburn::confirm::{AssumeYes, Confirmer, StreamConfirmer};
use vaultburn::error::Result;
use vaultburn::key_source::{ConstantKeySource, KeySource, ReaderKeySource, TerminalKeySource};

#[derive(Parser)]
#[command(name = "vaultburn")]
#[command(version)]
#[command(about = "Secure file shredding and single-file encryption.", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read settings from FILE instead of the default config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overwrite files with random data, then delete them
    #[command(alias = "s")]
    Shred {
        /// Files or directories to destroy
        #[arg(required = true, value_name = "PATHS")]
        paths: Vec<PathBuf>,

        /// Number of overwrite passes (default from config, else 3)
        #[arg(short, long, value_name = "N")]
        passes: Option<u32>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,

        /// Hide progress and summary output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Encrypt files, each under a newly generated key
    #[command(alias = "e")]
    Encrypt {
        /// Files to encrypt
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Path to write the encrypted text to (single input only)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Replace existing output files
        #[arg(short, long)]
        force: bool,

        /// Shred each original once it has been encrypted
        #[arg(long)]
        shred_original: bool,

        /// Hide progress and summary output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the encrypted file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Path to write the decrypted data to
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Key printed by `vaultburn encrypt`
        #[arg(long, value_name = "KEY", conflicts_with = "key_stdin")]
        key: Option<String>,

        /// Read the key from stdin instead of from the terminal
        #[arg(long)]
        key_stdin: bool,

        /// Replace an existing output file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the activity log
    Log {
        /// Only show the last N entries
        #[arg(long, value_name = "N")]
        tail: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("vaultburn={}", level))),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e.display_chain());
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Shred {
            paths,
            passes,
            recursive,
            yes,
            quiet,
        } => {
            let mut confirmer: Box<dyn Confirmer> = if yes || !config.confirm {
                Box::new(AssumeYes)
            } else {
                Box::new(StreamConfirmer::new(io::stdin().lock(), io::stderr()))
            };
            let opts = ShredOptions {
                paths,
                passes,
                recursive,
                quiet,
            };
            commands::shred(&config, &opts, &mut *confirmer)
        }
        Commands::Encrypt {
            files,
            output,
            force,
            shred_original,
            quiet,
        } => {
            let opts = EncryptOptions {
                files,
                output,
                force,
                shred_original,
                quiet,
            };
            commands::encrypt(&config, &opts, &mut io::stdout().lock())
        }
        Commands::Decrypt {
            input,
            output,
            key,
            key_stdin,
            force,
        } => {
            let mut keys = get_key_source(key, key_stdin);
            let opts = DecryptOptions {
                input,
                output,
                force,
            };
            commands::decrypt(&config, &opts, &mut *keys)
        }
        Commands::Log { tail } => commands::show_log(&config, tail, &mut io::stdout().lock()),
    }
}

fn get_key_source(key: Option<String>, use_stdin: bool) -> Box<dyn KeySource> {
    match key {
        Some(text) => Box::new(ConstantKeySource::new(text)),
        None if use_stdin => Box::new(ReaderKeySource::new(Box::new(io::stdin()))),
        None => Box::new(TerminalKeySource::new()),
    }
}
