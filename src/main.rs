//! Marketo source CLI
//!
//! Command-line entry point for the tap

use clap::Parser;
use marketo_source::cli::{Cli, Runner};

#[tokio::main]
async fn main() {
    // Records go to stdout; logs stay on stderr so the two never mix.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let runner = Runner::new(cli);

    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
