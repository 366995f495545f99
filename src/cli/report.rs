//! CLI handlers that generate the report outside the HTTP service.

use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::cli::{PreviewCliArgs, SendCliArgs};
use crate::config::Config;
use crate::pipeline::{resolve_recipient, resolve_window, ReportService};

pub async fn handle_preview_command(args: PreviewCliArgs) -> Result<()> {
    let config = Config::load()?;
    config.validate_store()?;

    let today = config.report.today();
    let window = resolve_window(&config.report, today, args.days, args.end)?;
    let service = ReportService::from_config(&config)?;
    let generated = service.generate(args.mode, window, today).await?;

    if generated.skipped > 0 {
        eprintln!("Warning: {} malformed rows were skipped", generated.skipped);
    }

    match args.output {
        Some(path) => {
            fs::write(&path, &generated.html)
                .with_context(|| format!("Failed to write preview to {}", path.display()))?;
            info!("Preview written to {}", path.display());
            println!(
                "{}: {} meetings, preview written to {}",
                generated.subject,
                generated.report.metrics.total_meetings,
                path.display()
            );
        }
        None => print!("{}", generated.html),
    }

    Ok(())
}

pub async fn handle_send_command(args: SendCliArgs) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let recipient = resolve_recipient(args.to.as_deref(), &config.delivery.default_recipient)?;
    let today = config.report.today();
    let window = resolve_window(&config.report, today, args.days, args.end)?;

    let service = ReportService::from_config(&config)?;
    let outcome = service.send(&recipient, args.mode, window, today).await?;

    println!("{} ({})", outcome.receipt.message, outcome.subject);
    println!("Meetings analysed: {}", outcome.total_meetings);
    Ok(())
}
