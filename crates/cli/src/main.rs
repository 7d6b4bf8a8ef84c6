//! powchain CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "powchain")]
#[command(about = "A minimal proof-of-work ledger", long_about = None)]
struct Cli {
    /// Log filter (e.g. "info", "debug", "powchain_chain=debug").
    /// Falls back to RUST_LOG, then "info".
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("powchain - A minimal proof-of-work ledger");
            println!("Run 'powchain --help' for usage information.");
        }
    }
}
