//! End-to-end demo command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_chain::{Blockchain, BlockchainConfig};
use powchain_core::{Address, CancelToken, Keypair, Transaction};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Args)]
pub struct DemoArgs {
    /// Leading hex zeros required of each block hash
    #[arg(short, long, default_value = "2")]
    difficulty: usize,

    /// Coinbase reward per mined block
    #[arg(short, long, default_value = "100")]
    reward: f64,

    /// Amount transferred from the first account to the second
    #[arg(short, long, default_value = "30")]
    amount: f64,

    /// Give up mining a block after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the resulting chain as JSON
    #[arg(long)]
    json: bool,

    /// Save the resulting chain as JSON to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

pub fn run(args: DemoArgs) -> Result<()> {
    let config = BlockchainConfig {
        difficulty: args.difficulty,
        mining_reward: args.reward,
    };
    let timeout = args.timeout.map(Duration::from_secs);

    println!("{}", "Starting powchain demo...".bold().cyan());
    println!();

    let alice = Keypair::generate();
    let bob = Keypair::generate();
    let miner = Keypair::generate();
    println!("  Alice: {}", alice.address().as_str().bright_yellow());
    println!("  Bob:   {}", bob.address().as_str().bright_yellow());
    println!("  Miner: {}", miner.address().as_str().bright_yellow());

    let mut blockchain = Blockchain::with_config(config);
    println!();
    println!(
        "{}  Created ledger (difficulty {}, reward {})",
        "✓".green().bold(),
        args.difficulty.to_string().bright_cyan(),
        args.reward.to_string().bright_cyan()
    );

    mine(&mut blockchain, &alice.address(), timeout).context("Failed to mine reward block")?;
    println!(
        "    Alice balance: {}",
        blockchain.balance_of(&alice.address()).to_string().bright_green()
    );

    let tx = Transaction::new(alice.address(), bob.address(), args.amount)
        .signed(&alice)
        .context("Failed to sign transfer")?;
    blockchain
        .add_transaction(tx)
        .context("Transfer was rejected")?;
    println!();
    println!(
        "{}  Queued transfer of {} from Alice to Bob",
        "✓".green().bold(),
        args.amount.to_string().bright_cyan()
    );

    let overspend = Transaction::new(alice.address(), bob.address(), args.reward * 10.0)
        .signed(&alice)
        .context("Failed to sign transfer")?;
    if let Err(e) = blockchain.add_transaction(overspend) {
        println!("{}  Rejected overspend: {}", "✗".red().bold(), e);
    }

    mine(&mut blockchain, &miner.address(), timeout).context("Failed to mine transfer block")?;

    println!();
    println!("{}", "Balances:".bold());
    for (name, address) in [
        ("Alice", alice.address()),
        ("Bob", bob.address()),
        ("Miner", miner.address()),
    ] {
        println!(
            "  {:<6} {}",
            name,
            blockchain.balance_of(&address).to_string().bright_green()
        );
    }

    let valid = blockchain.is_chain_valid();
    println!();
    if valid {
        println!("{}  Chain is valid", "✓".green().bold());
    } else {
        println!("{}  Chain is invalid", "✗".red().bold());
    }

    let stats = blockchain.stats();
    println!("    Height: {}", stats.height.to_string().bright_cyan());
    println!(
        "    Transactions: {}",
        stats.total_transactions.to_string().bright_cyan()
    );

    if args.json || args.out.is_some() {
        let chain_json = serde_json::to_string_pretty(blockchain.chain())?;
        if let Some(path) = &args.out {
            fs::write(path, &chain_json)
                .with_context(|| format!("Failed to write chain to {}", path.display()))?;
            println!(
                "{}  Saved chain to: {}",
                "✓".green().bold(),
                path.display().to_string().bright_black()
            );
        }
        if args.json {
            println!();
            println!("{}", chain_json);
        }
    }

    Ok(())
}

fn mine(blockchain: &mut Blockchain, reward: &Address, timeout: Option<Duration>) -> Result<()> {
    let started = Instant::now();
    let block = match timeout {
        Some(limit) => blockchain.mine_pending_transactions_until(
            reward,
            &CancelToken::new(),
            Some(started + limit),
        )?,
        None => blockchain.mine_pending_transactions(reward)?,
    };

    println!();
    println!(
        "{}  Mined block in {} ms",
        "✓".green().bold(),
        started.elapsed().as_millis()
    );
    println!("    Hash:  {}", block.hash.to_string().bright_yellow());
    println!("    Nonce: {}", block.nonce.to_string().bright_cyan());
    println!("    Txs:   {}", block.tx_count().to_string().bright_cyan());

    Ok(())
}
