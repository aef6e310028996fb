use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::invoker::ProviderRegistry;
use crate::roadmap::pipeline_budget;

/// Main configuration structure loaded from goal_roadmap.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub generation: GenerationConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Ordered backend list and resilience policy for outbound calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Priority-ordered model ids; the first one that answers wins
    pub models: Vec<String>,
    pub timeout_tiers_ms: Vec<u64>,
    pub max_retries: u32,
    #[serde(default)]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default)]
    pub app_title: Option<String>,
    /// Never read from the TOML file
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Sampling and size settings for the generation stages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    pub default_temperature: f32,
    pub conversion_temperature: f32,
    pub classification_max_tokens: u32,
    pub outline_max_tokens: u32,
    pub detailed_max_tokens: u32,
    pub conversion_max_tokens: u32,
    /// Answer obviously vague goals locally instead of calling a backend
    #[serde(default)]
    pub vagueness_prefilter: bool,
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub http_bind: std::net::SocketAddr,
    /// Whole-request budget; `None` derives it from the provider policy
    pub http_request_timeout_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "goal_roadmap=info,tower_http=info".to_string(),
            http_bind: std::net::SocketAddr::from(([127, 0, 0, 1], 8790)),
            http_request_timeout_ms: None,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            models: vec![
                "meta-llama/llama-3.3-70b-instruct:free".to_string(),
                "mistralai/mistral-small-3.1-24b-instruct:free".to_string(),
                "google/gemma-3-27b-it:free".to_string(),
            ],
            timeout_tiers_ms: vec![30_000, 45_000, 60_000],
            max_retries: 1,
            retry_delay_ms: 500,
            referer: None,
            app_title: Some("goal-roadmap".to_string()),
            api_key: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_temperature: 0.7,
            conversion_temperature: 0.3,
            classification_max_tokens: 600,
            outline_max_tokens: 1500,
            detailed_max_tokens: 3000,
            conversion_max_tokens: 2000,
            vagueness_prefilter: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Snapshot of the resilience policy handed to the invoker
    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry {
            models: self.models.clone(),
            timeout_tiers: self
                .timeout_tiers_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses GOAL_ROADMAP_CONFIG environment variable or defaults to "goal_roadmap.toml"
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(env_path) = std::env::var("ROADMAP_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::dotenv();
        }

        let config_path = std::env::var("GOAL_ROADMAP_CONFIG")
            .unwrap_or_else(|_| "goal_roadmap.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Env-first overrides for provider and generation settings
    pub fn apply_env_overrides(&mut self) {
        self.provider.api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        if let Ok(url) = std::env::var("ROADMAP_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Ok(models) = std::env::var("ROADMAP_MODELS") {
            self.provider.models = parse_list(&models);
            tracing::debug!("ROADMAP_MODELS env override applied");
        }
        if let Ok(tiers) = std::env::var("ROADMAP_TIMEOUT_TIERS_MS") {
            self.provider.timeout_tiers_ms = parse_list(&tiers)
                .iter()
                .filter_map(|t| t.parse().ok())
                .collect();
        }
        if let Some(retries) = std::env::var("ROADMAP_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.provider.max_retries = retries;
        }
        if let Some(delay) = std::env::var("ROADMAP_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.provider.retry_delay_ms = delay;
        }
        if let Some(temp) = std::env::var("ROADMAP_DEFAULT_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.generation.default_temperature = temp;
        }
        if let Some(prefilter) = env_flag("ROADMAP_VAGUENESS_PREFILTER") {
            self.generation.vagueness_prefilter = prefilter;
        }
    }

    /// Validate the configuration
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.provider.models.is_empty() {
            anyhow::bail!("provider.models must list at least one model");
        }
        if self.provider.timeout_tiers_ms.is_empty() {
            anyhow::bail!("provider.timeout_tiers_ms must list at least one tier");
        }
        if self.provider.timeout_tiers_ms.contains(&0) {
            anyhow::bail!("provider.timeout_tiers_ms entries must be > 0");
        }
        if self.provider.max_retries > 5 {
            tracing::warn!(
                "max_retries {} exceeds max 5, clamping to 5",
                self.provider.max_retries
            );
            self.provider.max_retries = 5;
        }
        for (name, t) in [
            ("default_temperature", self.generation.default_temperature),
            ("conversion_temperature", self.generation.conversion_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                anyhow::bail!("generation.{} must be between 0.0 and 2.0", name);
            }
        }
        if let Some(ms) = self.runtime.http_request_timeout_ms {
            if ms == 0 {
                anyhow::bail!("ROADMAP_HTTP_REQUEST_TIMEOUT_MS must be > 0");
            }
            let needed = pipeline_budget(&self.provider.registry());
            if Duration::from_millis(ms) < needed {
                tracing::warn!(
                    "request timeout {}ms is below the {}ms a fully exhausted pipeline can take; \
                     late upstream failures will be reported as timeouts",
                    ms,
                    needed.as_millis()
                );
            }
        }
        if !self.provider.has_credential() {
            tracing::warn!("OPENROUTER_API_KEY not set; generation requests will be rejected");
        }
        Ok(())
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(level) = std::env::var("RUST_LOG") {
            cfg.log_level = level;
        }
        if let Ok(v) = std::env::var("ROADMAP_HTTP_BIND")
            && let Ok(bind) = v.parse::<std::net::SocketAddr>()
        {
            cfg.http_bind = bind;
        }
        if let Some(timeout) = std::env::var("ROADMAP_HTTP_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            cfg.http_request_timeout_ms = Some(timeout);
        }
        cfg
    }
}
