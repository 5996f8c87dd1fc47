use clap::Parser;
use edgeguard::cli::{check, run, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Commands::CheckConfig(args) => check::execute_config(&args.config)?,
        Commands::Run(args) => run::execute(&args).await?,
    }
    Ok(())
}
