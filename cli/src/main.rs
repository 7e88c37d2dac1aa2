//! Flotilla CLI - Declarative fleet management for AI agents

use clap::Parser;

use flotilla_cli::cli::Cli;
use flotilla_cli::output;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = cli.run().await {
        if json {
            match output::json::format_error(&format!("{e:#}")) {
                Ok(doc) => eprintln!("{doc}"),
                Err(_) => eprintln!("Error: {e:#}"),
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
