//! Command-line entry point of `uups-deployer`.
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uups_deployer::Root;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr, stdout only carries the addresses.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    Root::parse().run().await
}
