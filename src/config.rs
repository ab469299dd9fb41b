#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{LucidError, Result};
use crate::orchestration::PlanFormat;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://lucid.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_STORAGE_ROOT: &str = ".lucid/objects";
pub const DEFAULT_BUCKET: &str = "lucid-artifacts";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 800;
pub const DEFAULT_INLINE_OUTPUT_LIMIT: usize = 2048;
pub const DEFAULT_WORKER_POLL_MS: u64 = 1000;
pub const DEFAULT_JOB_LEASE_SECS: u64 = 600;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Text-generation backends that can be configured, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ProviderKind {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            _ => Err(format!("Unknown LLM provider: {s}")),
        }
    }
}

/// One provider's endpoint. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub providers: Vec<ProviderKind>,
    pub openai: Option<ProviderCredentials>,
    pub gemini: Option<ProviderCredentials>,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl LlmSettings {
    /// No credentials at all: every call goes to the mock provider.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            providers: vec![ProviderKind::OpenAi, ProviderKind::Gemini],
            openai: None,
            gemini: None,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
        }
    }

    #[must_use]
    pub const fn credentials(&self, kind: ProviderKind) -> Option<&ProviderCredentials> {
        match kind {
            ProviderKind::OpenAi => self.openai.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub root: PathBuf,
    pub bucket: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Outputs up to this many bytes stay on the node row.
    pub inline_output_limit: usize,
    pub plan_format: PlanFormat,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            inline_output_limit: DEFAULT_INLINE_OUTPUT_LIMIT,
            plan_format: PlanFormat::Numbered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub worker_id: String,
    /// How long a claimed job stays exclusive before another worker may take it.
    pub lease: Duration,
}

/// Process-wide settings, read once at start-up and handed to constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub storage: StorageSettings,
    pub llm: LlmSettings,
    pub execution: ExecutionSettings,
    pub worker: WorkerSettings,
}

impl Settings {
    /// # Errors
    /// Returns `ConfigError` for any present but invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as unset.
    ///
    /// # Errors
    /// Returns `ConfigError` for any present but invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let db_max_connections = parse_positive(
            "LUCID_DB_MAX_CONNECTIONS",
            get("LUCID_DB_MAX_CONNECTIONS"),
            DEFAULT_DB_MAX_CONNECTIONS,
        )?;
        let bind_addr = parse_value::<SocketAddr>(
            "LUCID_BIND_ADDR",
            get("LUCID_BIND_ADDR").as_deref().unwrap_or(DEFAULT_BIND_ADDR),
        )?;

        let storage = StorageSettings {
            root: get("LUCID_STORAGE_ROOT")
                .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT), PathBuf::from),
            bucket: get("LUCID_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        };

        let providers = get("LUCID_LLM_PROVIDERS").map_or_else(
            || Ok(vec![ProviderKind::OpenAi, ProviderKind::Gemini]),
            |raw| parse_providers(&raw),
        )?;
        let llm = LlmSettings {
            providers,
            openai: credentials(
                &get,
                "OPENAI_API_KEY",
                "OPENAI_BASE_URL",
                DEFAULT_OPENAI_BASE_URL,
                "OPENAI_MODEL",
                DEFAULT_OPENAI_MODEL,
            )?,
            gemini: credentials(
                &get,
                "GEMINI_API_KEY",
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_BASE_URL,
                "GEMINI_MODEL",
                DEFAULT_GEMINI_MODEL,
            )?,
            timeout: Duration::from_secs(parse_positive(
                "LUCID_LLM_TIMEOUT_SECS",
                get("LUCID_LLM_TIMEOUT_SECS"),
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
            max_tokens: parse_positive(
                "LUCID_LLM_MAX_TOKENS",
                get("LUCID_LLM_MAX_TOKENS"),
                DEFAULT_LLM_MAX_TOKENS,
            )?,
        };

        let execution = ExecutionSettings {
            inline_output_limit: get("LUCID_INLINE_OUTPUT_LIMIT").map_or(
                Ok(DEFAULT_INLINE_OUTPUT_LIMIT),
                |raw| parse_value("LUCID_INLINE_OUTPUT_LIMIT", &raw),
            )?,
            plan_format: get("LUCID_PLAN_FORMAT").map_or(Ok(PlanFormat::Numbered), |raw| {
                PlanFormat::try_from(raw.as_str())
                    .map_err(|e| LucidError::ConfigError(format!("LUCID_PLAN_FORMAT: {e}")))
            })?,
        };

        let worker = WorkerSettings {
            poll_interval: Duration::from_millis(parse_positive(
                "LUCID_WORKER_POLL_MS",
                get("LUCID_WORKER_POLL_MS"),
                DEFAULT_WORKER_POLL_MS,
            )?),
            worker_id: get("LUCID_WORKER_ID")
                .unwrap_or_else(|| format!("worker-{}", std::process::id())),
            lease: Duration::from_secs(parse_positive(
                "LUCID_JOB_LEASE_SECS",
                get("LUCID_JOB_LEASE_SECS"),
                DEFAULT_JOB_LEASE_SECS,
            )?),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            storage,
            llm,
            execution,
            worker,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| LucidError::ConfigError(format!("{key}={raw:?} is invalid: {e}")))
}

fn parse_positive<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = parse_value::<T>(key, &raw)?;
    if value == T::default() {
        return Err(LucidError::ConfigError(format!("{key} must be greater than zero")));
    }
    Ok(value)
}

fn parse_providers(raw: &str) -> Result<Vec<ProviderKind>> {
    let providers = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            ProviderKind::try_from(name)
                .map_err(|e| LucidError::ConfigError(format!("LUCID_LLM_PROVIDERS: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    if providers.is_empty() {
        return Err(LucidError::ConfigError(
            "LUCID_LLM_PROVIDERS must name at least one provider".to_string(),
        ));
    }
    Ok(providers)
}

fn credentials<G>(
    get: &G,
    key_var: &str,
    url_var: &str,
    default_url: &str,
    model_var: &str,
    default_model: &str,
) -> Result<Option<ProviderCredentials>>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(api_key) = get(key_var) else {
        return Ok(None);
    };
    let raw_url = get(url_var).unwrap_or_else(|| default_url.to_string());
    let base_url = Url::parse(&raw_url)
        .map_err(|e| LucidError::ConfigError(format!("{url_var}={raw_url:?} is invalid: {e}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LucidError::ConfigError(format!(
            "{url_var} must be an http(s) URL"
        )));
    }
    Ok(Some(ProviderCredentials {
        api_key,
        base_url,
        model: get(model_var).unwrap_or_else(|| default_model.to_string()),
    }))
}
