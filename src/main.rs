use clap::Parser;
use query_decision_engine::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::CheckConfig => cli::check_config::run(),
        Command::Fingerprint(args) => cli::fingerprint::run(args),
    }
}
