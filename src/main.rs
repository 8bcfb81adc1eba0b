use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use swatchwork::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
