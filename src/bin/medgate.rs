//! medgate binary: serves the access gate or runs an operator command.

use clap::Parser;

use medgate::cli::{self, Cli};
use medgate::observability::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = cli::run(cli.command).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
