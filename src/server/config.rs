//! Configuration loading for huginnd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! `NER_LABELS` (a JSON array) replaces the configured label list.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.huginn/secrets.toml` (user, must be 0600)
//! 2. `/etc/huginn/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extraction::DEFAULT_EXTRACTION_MODEL;
use crate::gateway::{DEFAULT_MODEL_ID, DEFAULT_MODEL_VERSION, DEFAULT_NER_MODEL, DEFAULT_RUN_PREFIX};
use crate::sinks::TrainingJobTemplate;
use crate::tokenizer::TokenizerSource;
use crate::types::LabelSet;
use crate::{HuginnError, Result};

/// Environment variable overriding the label list.
pub const LABELS_ENV: &str = "NER_LABELS";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Ordered label list; index 0 is the non-entity label.
    #[serde(default)]
    pub labels: Option<LabelSet>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_tokenizer")]
    pub tokenizer: TokenizerSource,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub tables: Option<TablesConfig>,
    #[serde(default)]
    pub training: TrainingConfig,
}

fn default_tokenizer() -> TokenizerSource {
    TokenizerSource::HuggingFace {
        repo_id: DEFAULT_MODEL_ID.to_string(),
    }
}

impl Default for TokenizerSource {
    fn default() -> Self {
        default_tokenizer()
    }
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:9090).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Inference backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Backend model serving token classification.
    pub ner_model: String,
    /// Model id reported on predictions.
    pub model_id: String,
    pub model_version: String,
    pub run_prefix: String,
    pub infer_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    /// Structural tokens; the decoder default applies when unset.
    pub special_tokens: Option<Vec<String>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ner_model: DEFAULT_NER_MODEL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            run_prefix: DEFAULT_RUN_PREFIX.to_string(),
            infer_timeout_secs: 30,
            ready_timeout_secs: 5,
            special_tokens: None,
        }
    }
}

impl BackendConfig {
    pub fn infer_timeout(&self) -> Duration {
        Duration::from_secs(self.infer_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// Document extraction configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub model: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_EXTRACTION_MODEL.to_string(),
        }
    }
}

/// Object store and table notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TablesConfig {
    pub store_url: String,
    pub bucket: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Retraining configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Dispatch in the background (default: true).
    #[serde(rename = "async", default = "default_true")]
    pub async_dispatch: bool,
    #[serde(default)]
    pub dry_run: bool,
    /// Job submission endpoint; without one jobs are only logged.
    #[serde(default)]
    pub dispatch_url: Option<String>,
    #[serde(flatten)]
    pub job: TrainingJobTemplate,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            async_dispatch: true,
            dry_run: false,
            dispatch_url: None,
            job: TrainingJobTemplate::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Secrets configuration (credentials and tokens).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub hf_token: Option<String>,
}

/// Secret field → environment variable fallback.
const SECRET_ENV_VARS: &[(&str, &str)] = &[
    ("client_id", "HUGINN_CLIENT_ID"),
    ("client_secret", "HUGINN_CLIENT_SECRET"),
    ("webhook_secret", "HUGINN_WEBHOOK_SECRET"),
    ("hf_token", "HF_TOKEN"),
];

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    ///
    /// Environment overrides are applied on top.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.apply_label_override(std::env::var(LABELS_ENV).ok().as_deref())?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }

    /// Replace the label list with a JSON array, if one is given.
    pub fn apply_label_override(&mut self, raw: Option<&str>) -> Result<()> {
        if let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) {
            let labels = LabelSet::from_json(raw)
                .map_err(|e| HuginnError::Configuration(format!("{LABELS_ENV}: {e}")))?;
            self.labels = Some(labels);
        }
        Ok(())
    }

    /// Configured labels, or the default label set.
    pub fn labels(&self) -> LabelSet {
        self.labels.clone().unwrap_or_default()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.huginn/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/huginn/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (env vars still apply).
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".huginn").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/huginn/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(HuginnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Get a secret by field name, falling back to the corresponding environment variable.
    pub fn get(&self, field: &str) -> Option<String> {
        let from_file = match field {
            "client_id" => self.client_id.as_ref(),
            "client_secret" => self.client_secret.as_ref(),
            "webhook_secret" => self.webhook_secret.as_ref(),
            "hf_token" => self.hf_token.as_ref(),
            _ => None,
        }
        .filter(|s| !s.is_empty())
        .cloned();

        from_file.or_else(|| {
            SECRET_ENV_VARS
                .iter()
                .find(|(name, _)| *name == field)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
                .filter(|s| !s.is_empty())
        })
    }

    /// Backend credential pair, only when both halves are present.
    pub fn client_credentials(&self) -> Option<(String, String)> {
        Some((self.get("client_id")?, self.get("client_secret")?))
    }
}
