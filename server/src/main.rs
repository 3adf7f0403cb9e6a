use clap::Parser;
use msgbridge_server::Cli;
use msgbridge_server::run_main;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_main(Cli::parse()).await
}
