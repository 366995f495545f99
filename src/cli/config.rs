//! CLI handler for configuration management.

use anyhow::{bail, Result};

use crate::cli::{ConfigCliArgs, ConfigCommand};
use crate::config::Config;

const MASK: &str = "********";

pub fn handle_config_command(args: ConfigCliArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show => handle_show(),
        ConfigCommand::Path => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
        ConfigCommand::Init { force } => handle_init(force),
    }
}

fn handle_show() -> Result<()> {
    let config = masked(Config::load()?);
    print!("{}", toml::to_string_pretty(&config)?);

    let missing = config.missing_store_settings();
    if !missing.is_empty() {
        eprintln!("\nMissing required settings: {}", missing.join(", "));
    }
    Ok(())
}

fn handle_init(force: bool) -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() && !force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Hides credentials before the config is printed.
fn masked(mut config: Config) -> Config {
    if config.store.access_token.is_some() {
        config.store.access_token = Some(MASK.to_string());
    }
    if config.summarizer.api_key.is_some() {
        config.summarizer.api_key = Some(MASK.to_string());
    }
    if !config.delivery.webhook_url.is_empty() {
        config.delivery.webhook_url = MASK.to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = Config::default();
        config.summarizer.api_key = Some("sk-live".to_string());
        config.store.access_token = Some("ya29.token".to_string());
        config.delivery.webhook_url = "https://hooks.zapier.com/hooks/catch/1/abc".to_string();

        let text = toml::to_string_pretty(&masked(config)).unwrap();

        assert!(!text.contains("sk-live"));
        assert!(!text.contains("ya29"));
        assert!(!text.contains("hooks.zapier.com"));
        assert!(text.contains(MASK));
    }

    #[test]
    fn test_masked_leaves_unset_values_alone() {
        let config = masked(Config::default());
        assert!(config.summarizer.api_key.is_none());
        assert!(config.delivery.webhook_url.is_empty());
    }
}
