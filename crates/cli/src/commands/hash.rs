//! Hash command.

use anyhow::Result;
use clap::Args;
use powchain_core::hash;

#[derive(Args)]
pub struct HashArgs {
    /// Text to hash (UTF-8 bytes)
    text: String,
}

pub fn run(args: HashArgs) -> Result<()> {
    println!("{}", hash(args.text.as_bytes()).to_hex());
    Ok(())
}
