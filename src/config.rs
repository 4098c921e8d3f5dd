use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Origin of the Feed API, e.g. `http://127.0.0.1:3000`
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Address the console listens on
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Feed API request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Keep the "No Comments Link" sentinel as the comment href
    #[serde(default = "default_link_missing_comments")]
    pub link_missing_comments: bool,
}

fn default_api_base() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_link_missing_comments() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bind: default_bind(),
            request_timeout_secs: default_request_timeout(),
            link_missing_comments: default_link_missing_comments(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load the config file, or defaults when it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.api_base = config.api_base.trim_end_matches('/').to_string();
        if config.api_base.is_empty() {
            anyhow::bail!("api_base must not be empty");
        }
        Ok(config)
    }
}
