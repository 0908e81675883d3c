use anyhow::Result;
use clap::Parser;

use quant_ingest_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    quant_ingest_cli::app_init()?;
    quant_ingest_cli::run(cli).await
}
