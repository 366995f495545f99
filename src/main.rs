use anyhow::Result;
use clap::Parser;
use insights_mailer::{
    app,
    cli::{
        handle_config_command, handle_preview_command, handle_send_command, Cli, CliCommand,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so `preview` can stream HTML on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("insights-mailer {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Preview(args)) => {
            handle_preview_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Send(args)) => {
            handle_send_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Config(args)) => {
            handle_config_command(args)?;
            return Ok(());
        }
        None => {}
    }

    app::run_service().await
}
