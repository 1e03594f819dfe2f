use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 24 * 7;
/// Default Hugging Face summarization model
const DEFAULT_HF_MODEL: &str = "facebook/bart-large-cnn";
/// Default Google generative model
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MAX_SUMMARY_WORDS: u32 = 120;

/// Configuration for AI insight generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Hugging Face model id used for summarization
    #[serde(default = "default_hf_model")]
    pub hf_model: String,

    /// Google generative model id
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Soft cap requested from the providers
    #[serde(default = "default_max_summary_words")]
    pub max_summary_words: u32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            hf_model: DEFAULT_HF_MODEL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            max_summary_words: DEFAULT_MAX_SUMMARY_WORDS,
        }
    }
}

fn default_hf_model() -> String {
    DEFAULT_HF_MODEL.to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_max_summary_words() -> u32 {
    DEFAULT_MAX_SUMMARY_WORDS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Lifetime of issued bearer tokens
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,

    #[serde(default)]
    pub insight: InsightConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            token_expiry_hours: DEFAULT_TOKEN_EXPIRY_HOURS,
            insight: InsightConfig::default(),
            base_path: String::new(),
        }
    }
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_token_expiry_hours() -> u64 {
    DEFAULT_TOKEN_EXPIRY_HOURS
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            bail!("bind_addr is not a valid socket address: {}", self.bind_addr);
        }

        if self.token_expiry_hours == 0 {
            bail!("token_expiry_hours must be greater than 0");
        }

        if self.insight.hf_model.trim().is_empty() {
            bail!("insight.hf_model must not be empty");
        }

        if self.insight.gemini_model.trim().is_empty() {
            bail!("insight.gemini_model must not be empty");
        }

        if self.insight.max_summary_words == 0 {
            bail!("insight.max_summary_words must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("creating data dir {base_path}"))?;

        let config_path = Path::new(base_path).join("config.yaml");

        // create new if does not exist
        if !config_path.exists() {
            log::info!("creating default config at {}", config_path.display());
            std::fs::write(&config_path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let mut config: Self =
            serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Path::new(&self.base_path).join("config.yaml");
        let tmp_path = Path::new(&self.base_path).join("config.yaml.tmp");

        std::fs::write(&tmp_path, serde_yml::to_string(self)?)?;
        std::fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

/// Third-party credentials and the token signing secret. Resolved from the
/// process environment first, then a `.env` file in the data dir. None of
/// these belong in config.yaml.
#[derive(Clone, Debug, Default)]
pub struct Secrets {
    pub token_secret: String,
    pub youtube_api_key: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub hf_api_token: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Secrets {
    pub fn load(base_path: &str) -> anyhow::Result<Self> {
        let file_vars = read_env_file(&Path::new(base_path).join(".env"))?;

        let lookup = |key: &str| -> Option<String> {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .or_else(|| file_vars.get(key).cloned())
        };

        let token_secret = match lookup("PODSIGHT_TOKEN_SECRET") {
            Some(secret) => secret,
            None => {
                log::warn!(
                    "PODSIGHT_TOKEN_SECRET is not set; using an ephemeral secret, \
                     issued tokens will not survive a restart"
                );
                crate::eid::Eid::new().to_string()
            }
        };

        Ok(Self {
            token_secret,
            youtube_api_key: lookup("YOUTUBE_API_KEY"),
            spotify_client_id: lookup("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: lookup("SPOTIFY_CLIENT_SECRET"),
            hf_api_token: lookup("HF_API_TOKEN"),
            gemini_api_key: lookup("GEMINI_API_KEY"),
        })
    }
}

/// Parses `KEY=value` lines, tolerating `export` prefixes, quotes, comments
/// and blank lines. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }

    Ok(vars)
}

/// Data dir resolution order: explicit flag, `PODSIGHT_BASE_PATH`, then
/// `~/.local/share/podsight`.
pub fn resolve_base_path(cli_override: Option<String>) -> String {
    if let Some(path) = cli_override {
        return path;
    }

    if let Ok(path) = std::env::var("PODSIGHT_BASE_PATH") {
        if !path.trim().is_empty() {
            return path;
        }
    }

    format!(
        "{}/.local/share/podsight",
        homedir::my_home()
            .expect("couldnt find home dir")
            .expect("couldnt find home dir")
            .to_string_lossy()
    )
}
