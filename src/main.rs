use clap::Parser;
use perp_liquidator::adapter::inbound::cli::command::{CheckCommand, Cli, Commands};
use perp_liquidator::adapter::inbound::cli::output::{self, OutputConfig};
use perp_liquidator::adapter::inbound::cli::{check, run};
use perp_liquidator::error::Result;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet));

    if let Err(e) = dispatch(cli.command).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run::execute(&args).await,
        Commands::Check(CheckCommand::Config(arg)) => check::execute_config(&arg.config),
    }
}
