//! Configuration system (layered: code > env > config file).

pub mod backend;
pub mod session;

pub use backend::{
    regional_endpoint, BackendConfig, BackendKind, DEFAULT_BACKEND_TIMEOUT, KNOWN_REGIONS,
};
pub use session::{GenerationConfig, SessionSettings, DEFAULT_MAX_TURNS, MAX_TURNS_LIMIT};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ParleyError, Result};
use crate::extract::ExtractionConfig;
use crate::util::retry::RetryPolicy;

/// Fully resolved configuration.
///
/// Resolution order:
/// 1. Values set in code after loading
/// 2. Environment variables (`PARLEY_*`, `.env` honoured)
/// 3. The TOML config file (`~/.parley/config.toml` by default)
#[derive(Debug, Clone, Default)]
pub struct ParleyConfig {
    pub backend: Option<BackendConfig>,
    pub generation: GenerationConfig,
    pub session: SessionSettings,
}

impl ParleyConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(source)?;
        file.into_config()
    }

    /// Load a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Load the default config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let path = default_config_path();
        let mut config = if path.is_file() {
            tracing::debug!(path = %path.display(), "Loading config file");
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment-style overrides from an arbitrary lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup("PARLEY_GENERATION_API_KEY").or_else(|| lookup("DEEPSEEK_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(url) = lookup("PARLEY_GENERATION_URL") {
            self.generation.url = url;
        }
        if let Some(model) = lookup("PARLEY_GENERATION_MODEL") {
            self.generation.model = model;
        }

        if let Some(endpoint) = lookup("PARLEY_BACKEND_URL") {
            let kind = match lookup("PARLEY_BACKEND_KIND") {
                Some(kind) => parse_kind(&kind)?,
                None => BackendKind::detect(&endpoint),
            };
            // Only the target moves; everything else the file set is kept.
            self.backend = Some(match self.backend.take() {
                Some(previous) => BackendConfig {
                    kind,
                    endpoint,
                    ..previous
                },
                None => BackendConfig::new(kind, endpoint),
            });
        } else if let (Some(kind), Some(backend)) = (lookup("PARLEY_BACKEND_KIND"), self.backend.as_mut()) {
            backend.kind = parse_kind(&kind)?;
        }

        if let Some(backend) = self.backend.as_mut() {
            if let Some(token) = lookup("PARLEY_BACKEND_TOKEN") {
                backend.headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
                backend.headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            if let Some(bot_id) = lookup("PARLEY_BACKEND_BOT_ID") {
                backend.bot_id = Some(bot_id);
            }
        }

        if let Some(turns) = lookup("PARLEY_MAX_TURNS") {
            self.session.max_turns = turns.trim().parse().map_err(|_| {
                ParleyError::Configuration(format!("PARLEY_MAX_TURNS is not a number: {turns}"))
            })?;
        }
        Ok(())
    }

    /// The configured backend, or a configuration error.
    pub fn require_backend(&self) -> Result<&BackendConfig> {
        self.backend
            .as_ref()
            .ok_or_else(|| ParleyError::Configuration("no [backend] configured".into()))
    }
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".parley"))
        .unwrap_or_else(|| PathBuf::from(".parley"))
        .join("config.toml")
}

fn parse_kind(value: &str) -> Result<BackendKind> {
    value
        .trim()
        .parse()
        .map_err(|_| ParleyError::Configuration(format!("unknown backend kind '{value}'")))
}

// On-disk shape

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backend: Option<BackendFile>,
    #[serde(default)]
    generation: GenerationFile,
    #[serde(default)]
    session: SessionFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BackendFile {
    kind: Option<BackendKind>,
    endpoint: Option<String>,
    method: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    timeout_secs: Option<u64>,
    bot_id: Option<String>,
    agent_id: Option<String>,
    region: Option<String>,
    user_id: Option<String>,
    #[serde(default)]
    raw_mode: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerationFile {
    api_key: Option<String>,
    url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    opening_temperature: Option<f64>,
    follow_up_temperature: Option<f64>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionFile {
    max_turns: Option<u32>,
    generation_timeout_secs: Option<u64>,
    deadline_secs: Option<u64>,
    retry: Option<RetryFile>,
    extraction: Option<ExtractionConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryFile {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    multiplier: Option<f64>,
}

impl ConfigFile {
    fn into_config(self) -> Result<ParleyConfig> {
        let backend = self.backend.map(BackendFile::into_backend).transpose()?;

        let defaults = GenerationConfig::default();
        let g = self.generation;
        let s = self.session;
        let generation = GenerationConfig {
            api_key: g.api_key,
            url: g.url.unwrap_or(defaults.url),
            model: g.model.unwrap_or(defaults.model),
            timeout: s
                .generation_timeout_secs
                .or(g.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            opening_temperature: g.opening_temperature.unwrap_or(defaults.opening_temperature),
            follow_up_temperature: g.follow_up_temperature.unwrap_or(defaults.follow_up_temperature),
            max_tokens: g.max_tokens.unwrap_or(defaults.max_tokens),
        };

        let mut session = SessionSettings::default();
        if let Some(max_turns) = s.max_turns {
            session.max_turns = max_turns;
        }
        session.session_deadline = s.deadline_secs.map(Duration::from_secs);
        if let Some(retry) = s.retry {
            session.retry = retry.into_policy();
        }
        if let Some(extraction) = s.extraction {
            session.extraction = extraction;
        }

        Ok(ParleyConfig {
            backend,
            generation,
            session,
        })
    }
}

impl BackendFile {
    fn into_backend(self) -> Result<BackendConfig> {
        let endpoint = match (self.endpoint, self.kind) {
            (Some(endpoint), _) => endpoint,
            // the hosted streaming service is addressed by region alone
            (None, Some(BackendKind::StreamingEvents)) => {
                regional_endpoint(self.region.as_deref()).to_string()
            }
            (None, _) => {
                return Err(ParleyError::Configuration(
                    "[backend] needs an endpoint unless kind is streaming_events".into(),
                ))
            }
        };
        let kind = self.kind.unwrap_or_else(|| BackendKind::detect(&endpoint));
        let mut backend = BackendConfig::new(kind, endpoint);
        if let Some(method) = self.method {
            backend.method = method;
        }
        backend.headers = self.headers;
        if let Some(secs) = self.timeout_secs {
            backend.timeout = Duration::from_secs(secs);
        }
        backend.bot_id = self.bot_id;
        backend.agent_id = self.agent_id;
        backend.region = self.region;
        backend.user_id = self.user_id;
        backend.raw_mode = self.raw_mode;
        backend.validate()?;
        Ok(backend)
    }
}

impl RetryFile {
    fn into_policy(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: self
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: self
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
        }
    }
}
