//! Account management command.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use powchain_core::Keypair;
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct AccountArgs {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Generate a new keypair
    New {
        /// Save the keypair as JSON to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show the address of a private key
    Show {
        /// Hex-encoded private key (with or without 0x)
        private_key: String,
    },
}

pub fn run(args: AccountArgs) -> Result<()> {
    match args.command {
        AccountCommand::New { out } => new_keypair(out),
        AccountCommand::Show { private_key } => show_keypair(&private_key),
    }
}

fn new_keypair(out: Option<PathBuf>) -> Result<()> {
    let keypair = Keypair::generate();

    println!("{}", "Generated new keypair:".bold().cyan());
    print_keypair(&keypair);

    if let Some(path) = out {
        if path.exists() {
            bail!("Refusing to overwrite existing file: {}", path.display());
        }

        let key_json = serde_json::json!({
            "address": keypair.address(),
            "public_key": keypair.public_key.to_hex(),
            "private_key": keypair.private_key_hex(),
        });
        fs::write(&path, serde_json::to_string_pretty(&key_json)?)
            .with_context(|| format!("Failed to write keypair to {}", path.display()))?;

        println!();
        println!(
            "{}  Saved to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_black()
        );
    }

    println!();
    println!("{}", "Keep your private key safe!".yellow().bold());

    Ok(())
}

fn show_keypair(private_key: &str) -> Result<()> {
    let keypair = Keypair::from_private_key_hex(private_key).context("Invalid private key")?;

    println!("{}", "Keypair:".bold().cyan());
    print_keypair(&keypair);

    Ok(())
}

fn print_keypair(keypair: &Keypair) {
    println!();
    println!("  Address:     {}", keypair.address().as_str().bright_yellow());
    println!(
        "  Public Key:  {}",
        keypair.public_key.to_hex().bright_black()
    );
    println!(
        "  Private Key: {}",
        keypair.private_key_hex().bright_black()
    );
}
