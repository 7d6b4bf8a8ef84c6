//! Chain verification command.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_chain::{Blockchain, BlockchainConfig};
use powchain_core::{Address, Block};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct VerifyArgs {
    /// JSON file holding the chain (as written by `powchain demo --out`)
    path: PathBuf,

    /// Difficulty every block must meet
    #[arg(short, long, default_value = "2")]
    difficulty: usize,

    /// Print the balance of this address after validation
    #[arg(short, long)]
    balance: Option<String>,
}

pub fn run(args: VerifyArgs) -> Result<()> {
    let data = fs::read_to_string(&args.path)
        .with_context(|| format!("Failed to read {}", args.path.display()))?;
    let blocks: Vec<Block> =
        serde_json::from_str(&data).with_context(|| "Failed to parse chain JSON")?;

    let config = BlockchainConfig {
        difficulty: args.difficulty,
        ..BlockchainConfig::default()
    };
    let blockchain = Blockchain::from_blocks(blocks, config)?;
    info!(path = %args.path.display(), height = blockchain.height(), "loaded chain");

    if !blockchain.is_chain_valid() {
        bail!("chain in {} is invalid", args.path.display());
    }

    println!(
        "{}  Chain is valid ({} blocks)",
        "✓".green().bold(),
        blockchain.chain().len().to_string().bright_cyan()
    );

    if let Some(address) = args.balance {
        let balance = blockchain.balance_of(&Address::new(address.as_str()));
        println!(
            "    {}: {}",
            address.bright_yellow(),
            balance.to_string().bright_green()
        );
    }

    Ok(())
}
