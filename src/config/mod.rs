use crate::global;
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Most Priority Opportunities a briefing lists.
pub const MAX_PRIORITY_LIMIT: usize = 3;

/// Environment variables that take precedence over the config file.
pub mod env_keys {
    pub const BQ_PROJECT_ID: &str = "BQ_PROJECT_ID";
    pub const BQ_DATASET: &str = "BQ_DATASET";
    pub const BQ_TABLE: &str = "BQ_TABLE";
    pub const BQ_ACCESS_TOKEN: &str = "BQ_ACCESS_TOKEN";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const DEFAULT_LLM_MODEL: &str = "DEFAULT_LLM_MODEL";
    pub const ZAPIER_HOOK_URL: &str = "ZAPIER_HOOK_URL";
    pub const INSIGHTS_SEND_TO: &str = "INSIGHTS_SEND_TO";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub summarizer: SummarizerConfig,
    pub delivery: DeliveryConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// "bigquery" or "json-file"
    pub provider: String,
    pub project_id: String,
    pub dataset: String,
    pub table: String,
    /// Static OAuth token. When unset the GCE metadata server is asked for one.
    pub access_token: Option<String>,
    pub api_endpoint: Option<String>,
    /// Rows file for the json-file provider.
    pub json_path: Option<String>,
    pub row_limit: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub enabled: bool,
    pub api_endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub webhook_url: String,
    pub default_recipient: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub brand: String,
    pub timezone: String,
    /// Default look-back window in days.
    pub days: u32,
    pub priority_limit: usize,
    pub section_limit: usize,
    pub market_terms: Vec<String>,
    pub urgency_terms: Vec<String>,
    /// Records returned by the debug endpoint.
    pub debug_sample: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: "bigquery".to_string(),
            project_id: String::new(),
            dataset: String::new(),
            table: String::new(),
            access_token: None,
            api_endpoint: None,
            json_path: None,
            row_limit: 500,
            timeout_seconds: 60,
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1500,
            temperature: 0.3,
            timeout_seconds: 60,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            default_recipient: String::new(),
            timeout_seconds: 30,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            brand: "UNKNOWN Brain".to_string(),
            timezone: "Europe/London".to_string(),
            days: 7,
            priority_limit: 3,
            section_limit: 5,
            market_terms: [
                "market",
                "competitor",
                "competitors",
                "industry",
                "trend",
                "pricing",
                "day rate",
                "benchmark",
                "acquisition",
                "policy",
                "rival",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            urgency_terms: [
                "urgent",
                "asap",
                "immediately",
                "this week",
                "next week",
                "deadline",
                "by end of",
                "this month",
                "start date",
                "kick off",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            debug_sample: 2,
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.priority_limit > MAX_PRIORITY_LIMIT {
            bail!(
                "report.priority_limit must be at most {}, got {}",
                MAX_PRIORITY_LIMIT,
                self.priority_limit
            );
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }

    /// Today's calendar date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        match self.tz() {
            Ok(tz) => Utc::now().with_timezone(&tz).date_naive(),
            Err(e) => {
                warn!("{}, falling back to UTC", e);
                Utc::now().date_naive()
            }
        }
    }
}

impl StoreConfig {
    /// Fully-qualified `project.dataset.table` id.
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset, self.table)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_or_init(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads the file at `path`, writing a default one first if it is missing.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }

    /// Applies environment-style overrides. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env_keys::BQ_PROJECT_ID) {
            self.store.project_id = v;
        }
        if let Some(v) = get(env_keys::BQ_DATASET) {
            self.store.dataset = v;
        }
        if let Some(v) = get(env_keys::BQ_TABLE) {
            self.store.table = v;
        }
        if let Some(v) = get(env_keys::BQ_ACCESS_TOKEN) {
            self.store.access_token = Some(v);
        }
        if let Some(v) = get(env_keys::OPENAI_API_KEY) {
            self.summarizer.api_key = Some(v);
        }
        if let Some(v) = get(env_keys::DEFAULT_LLM_MODEL) {
            self.summarizer.model = v;
        }
        if let Some(v) = get(env_keys::ZAPIER_HOOK_URL) {
            self.delivery.webhook_url = v;
        }
        if let Some(v) = get(env_keys::INSIGHTS_SEND_TO) {
            self.delivery.default_recipient = v;
        }
    }

    /// Settings required to read evidence.
    pub fn missing_store_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.store.provider.as_str() {
            "bigquery" => {
                if self.store.project_id.is_empty() {
                    missing.push("store.project_id (BQ_PROJECT_ID)");
                }
                if self.store.dataset.is_empty() {
                    missing.push("store.dataset (BQ_DATASET)");
                }
                if self.store.table.is_empty() {
                    missing.push("store.table (BQ_TABLE)");
                }
            }
            "json-file" => {
                if self.store.json_path.is_none() {
                    missing.push("store.json_path");
                }
            }
            _ => {}
        }
        missing
    }

    pub fn validate_store(&self) -> Result<()> {
        let missing = self.missing_store_settings();
        if !missing.is_empty() {
            bail!("Missing required settings: {}", missing.join(", "));
        }
        self.report.validate()
    }

    /// Full validation for a service that delivers email.
    pub fn validate(&self) -> Result<()> {
        let mut missing = self.missing_store_settings();
        if self.delivery.webhook_url.is_empty() {
            missing.push("delivery.webhook_url (ZAPIER_HOOK_URL)");
        }
        if !missing.is_empty() {
            bail!("Missing required settings: {}", missing.join(", "));
        }
        self.report.validate()?;

        if self.summarizer.enabled && self.summarizer.api_key.is_none() {
            warn!("No summarizer API key configured (OPENAI_API_KEY); narratives will use the fallback text");
        }
        Ok(())
    }
}

/// Shared, reloadable configuration.
///
/// Each request takes a snapshot; a reload swaps the snapshot without
/// touching requests already in flight.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub async fn snapshot(&self) -> Arc<Config> {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, config: Arc<Config>) {
        *self.inner.write().await = config;
    }

    /// Re-reads the config file and environment.
    pub async fn reload(&self) -> Result<Arc<Config>> {
        let config = tokio::task::spawn_blocking(Config::load)
            .await
            .context("Config reload task failed")??;
        config.validate_store()?;
        let config = Arc::new(config);
        self.replace(config.clone()).await;
        info!("Configuration reloaded");
        Ok(config)
    }
}
