//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;

mod account;
mod demo;
mod hash;
mod verify;

#[derive(Subcommand)]
pub enum Commands {
    /// Account management
    Account(account::AccountArgs),
    /// Hash a string with the ledger's hash function
    Hash(hash::HashArgs),
    /// Run the full mine, transfer, mine flow on a fresh ledger
    Demo(demo::DemoArgs),
    /// Validate a chain previously saved as JSON
    Verify(verify::VerifyArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Account(args) => account::run(args),
        Commands::Hash(args) => hash::run(args),
        Commands::Demo(args) => demo::run(args),
        Commands::Verify(args) => verify::run(args),
    }
}
