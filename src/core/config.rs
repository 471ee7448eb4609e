// src/core/config.rs
//! Typed configuration, loaded once at startup and validated before the server binds

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONFIG_PATH_ENV: &str = "PROFILE_MATCHER_CONFIG";
const DEFAULT_EXA_URL: &str = "https://api.exa.ai";
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4/accounts";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub crawler: CrawlerConfig,
    pub inference: InferenceConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub base_url: String,
    pub api_key: String,
    pub max_characters: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_token: String,
    pub model: String,
    pub timeout_ms: u64,
    /// Profile text is cut to this many characters before prompting
    pub profile_char_budget: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Sync,
    Webset,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: String,
    pub mode: SearchMode,
    pub entity: String,
    pub result_count: usize,
    /// How many profiles a webset job is asked to find
    pub webset_count: usize,
    pub sync_timeout_ms: u64,
    pub create_timeout_ms: u64,
    pub poll_timeout_ms: u64,
    pub items_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub early_exit_min_attempts: u32,
    pub early_exit_min_found: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXA_URL.to_string(),
            api_key: String::new(),
            max_characters: 10_000,
            timeout_ms: 30_000,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            model: "@cf/meta/llama-3.1-8b-instruct".to_string(),
            timeout_ms: 45_000,
            profile_char_budget: 6_000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXA_URL.to_string(),
            api_key: String::new(),
            mode: SearchMode::Webset,
            entity: "person".to_string(),
            result_count: 5,
            webset_count: 10,
            sync_timeout_ms: 30_000,
            create_timeout_ms: 30_000,
            poll_timeout_ms: 15_000,
            items_timeout_ms: 30_000,
            poll_interval_ms: 2_000,
            max_attempts: 30,
            early_exit_min_attempts: 15,
            early_exit_min_found: 3,
        }
    }
}

impl CrawlerConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl InferenceConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SearchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Load defaults, then `config.yaml` (if present), then environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let file_contents = if path.exists() {
            info!("Loading configuration file: {}", path.display());
            Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
            )
        } else {
            info!("No configuration file at {}, using defaults", path.display());
            None
        };

        Self::from_sources(file_contents.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(file_contents: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file_contents {
            Some(contents) if !contents.trim().is_empty() => {
                serde_yaml::from_str::<AppConfig>(contents)
                    .context("Failed to parse configuration file")?
            }
            _ => AppConfig::default(),
        };

        config.apply_env(|key| env(key).filter(|value| !value.trim().is_empty()))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = env("PORT").or_else(|| env("ROCKET_PORT")) {
            self.server.port = port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid port number"))?;
        }

        if let Some(url) = env("EXA_API_URL") {
            self.crawler.base_url = url.clone();
            self.search.base_url = url;
        }
        if let Some(key) = env("EXA_API_KEY") {
            self.crawler.api_key = key.clone();
            self.search.api_key = key;
        }

        if let Some(url) = env("INFERENCE_API_URL") {
            self.inference.base_url = url;
        } else if let Some(account_id) = env("CLOUDFLARE_ACCOUNT_ID") {
            self.inference.base_url = format!("{}/{}/ai/run", CLOUDFLARE_API_BASE, account_id);
        }
        if let Some(token) = env("INFERENCE_API_TOKEN").or_else(|| env("CLOUDFLARE_API_TOKEN")) {
            self.inference.api_token = token;
        }
        if let Some(model) = env("INFERENCE_MODEL") {
            self.inference.model = model;
        }

        if let Some(mode) = env("SEARCH_MODE") {
            self.search.mode = match mode.to_lowercase().as_str() {
                "sync" => SearchMode::Sync,
                "webset" => SearchMode::Webset,
                other => anyhow::bail!("SEARCH_MODE must be 'sync' or 'webset', got '{}'", other),
            };
        }

        Ok(())
    }

    /// Every field the pipeline needs is checked here, not at first use
    pub fn validate(&self) -> Result<()> {
        require_url("crawler.base_url", &self.crawler.base_url)?;
        require_present("crawler.api_key (EXA_API_KEY)", &self.crawler.api_key)?;
        require_positive("crawler.timeout_ms", self.crawler.timeout_ms)?;
        if self.crawler.max_characters == 0 {
            anyhow::bail!("crawler.max_characters must be greater than 0");
        }

        require_url(
            "inference.base_url (INFERENCE_API_URL or CLOUDFLARE_ACCOUNT_ID)",
            &self.inference.base_url,
        )?;
        require_present("inference.api_token (INFERENCE_API_TOKEN)", &self.inference.api_token)?;
        require_present("inference.model", &self.inference.model)?;
        require_positive("inference.timeout_ms", self.inference.timeout_ms)?;
        if self.inference.profile_char_budget == 0 {
            anyhow::bail!("inference.profile_char_budget must be greater than 0");
        }

        let search = &self.search;
        require_url("search.base_url", &search.base_url)?;
        require_present("search.api_key (EXA_API_KEY)", &search.api_key)?;
        require_positive("search.sync_timeout_ms", search.sync_timeout_ms)?;
        require_positive("search.create_timeout_ms", search.create_timeout_ms)?;
        require_positive("search.poll_timeout_ms", search.poll_timeout_ms)?;
        require_positive("search.items_timeout_ms", search.items_timeout_ms)?;
        require_positive("search.poll_interval_ms", search.poll_interval_ms)?;
        if search.result_count == 0 || search.webset_count == 0 {
            anyhow::bail!("search.result_count and search.webset_count must be greater than 0");
        }
        require_present("search.entity", &search.entity)?;
        if search.max_attempts == 0 {
            anyhow::bail!("search.max_attempts must be at least 1");
        }
        if search.early_exit_min_found == 0 {
            anyhow::bail!("search.early_exit_min_found must be at least 1");
        }
        if search.early_exit_min_attempts > search.max_attempts {
            anyhow::bail!(
                "search.early_exit_min_attempts ({}) cannot exceed search.max_attempts ({})",
                search.early_exit_min_attempts,
                search.max_attempts
            );
        }

        Ok(())
    }
}

fn require_present(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("Missing required configuration: {}", name);
    }
    Ok(())
}

fn require_url(name: &str, value: &str) -> Result<()> {
    require_present(name, value)?;
    let url = reqwest::Url::parse(value)
        .with_context(|| format!("Invalid URL for {}: {}", name, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{} must use http or https: {}", name, value);
    }
    Ok(())
}

fn require_positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        anyhow::bail!("{} must be greater than 0", name);
    }
    Ok(())
}
