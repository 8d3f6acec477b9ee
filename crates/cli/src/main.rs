use anyhow::Result;
use clap::Parser;
use env_logger::init;
use textoutline_cli::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init();
    Cli::parse().run().await
}
