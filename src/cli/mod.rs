use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::report::ReportMode;

pub mod config;
pub mod report;

pub use config::handle_config_command;
pub use report::{handle_preview_command, handle_send_command};

#[derive(Parser, Debug)]
#[command(name = "insights-mailer")]
#[command(about = "Weekly meeting-insights email from scored meeting evidence", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Render the weekly report without sending it
    Preview(PreviewCliArgs),
    /// Render the weekly report and deliver it through the webhook
    Send(SendCliArgs),
    /// Inspect or initialise the configuration file
    Config(ConfigCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct PreviewCliArgs {
    /// Number of days to look back (default from config)
    #[arg(short, long)]
    pub days: Option<u32>,
    /// Last day of the window, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Which briefing to build
    #[arg(short, long, value_enum, default_value_t = ReportMode::Insights)]
    pub mode: ReportMode,
    /// Write the HTML to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct SendCliArgs {
    /// Recipient address (default: delivery.default_recipient)
    #[arg(short, long)]
    pub to: Option<String>,
    /// Number of days to look back (default from config)
    #[arg(short, long)]
    pub days: Option<u32>,
    /// Last day of the window, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Which briefing to build
    #[arg(short, long, value_enum, default_value_t = ReportMode::Insights)]
    pub mode: ReportMode,
}

#[derive(ClapArgs, Debug)]
pub struct ConfigCliArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (file plus environment), secrets masked
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_service() {
        let cli = Cli::try_parse_from(["insights-mailer"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_preview() {
        let cli = Cli::try_parse_from([
            "insights-mailer",
            "preview",
            "--days",
            "14",
            "--end",
            "2025-03-14",
            "-o",
            "out.html",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Some(CliCommand::Preview(args)) => {
                assert_eq!(args.days, Some(14));
                assert_eq!(args.end, NaiveDate::from_ymd_opt(2025, 3, 14));
                assert_eq!(args.output, Some(PathBuf::from("out.html")));
                assert_eq!(args.mode, ReportMode::Insights);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_send_and_config() {
        let cli = Cli::try_parse_from(["insights-mailer", "send", "--to", "a@x.com"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(CliCommand::Send(SendCliArgs { to: Some(ref to), .. })) if to == "a@x.com"
        ));

        let cli = Cli::try_parse_from(["insights-mailer", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(CliCommand::Config(ConfigCliArgs {
                command: ConfigCommand::Init { force: true }
            }))
        ));
    }

    #[test]
    fn test_parse_coaching_mode() {
        let cli = Cli::try_parse_from(["insights-mailer", "send", "--mode", "coaching"]).unwrap();
        match cli.command {
            Some(CliCommand::Send(args)) => assert_eq!(args.mode, ReportMode::Coaching),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["insights-mailer", "preview", "-m", "weekly"]).is_err());
    }

    #[test]
    fn test_rejects_bad_end_date() {
        assert!(Cli::try_parse_from(["insights-mailer", "preview", "--end", "14/03/2025"]).is_err());
    }
}
