use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use drivelink::config::ExchangeArgs;

/// Simulator-side controller: applies commands, publishes vehicle status
#[derive(Parser)]
#[command(name = "drivelink", version)]
struct Cli {
    #[command(flatten)]
    exchange: ExchangeArgs,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    let cli = Cli::parse();

    if let Err(e) = drivelink::runtime::run(&cli.exchange).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
