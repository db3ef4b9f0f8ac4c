//! Configuration management for analyst.toml
//!
//! Lookup order: an explicit path, `analyst.toml` in the current directory or
//! its parents, then `<config_dir>/analyst/config.toml`. Missing files fall
//! back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::openai::OPENAI_API_BASE_URL;

const CONFIG_FILE_NAME: &str = "analyst.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub market: MarketConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Assistant to run against (overridden by ANALYST_ASSISTANT_ID)
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// Instructions sent with every run
    #[serde(default = "default_run_instructions")]
    pub instructions: String,
    /// Name used by `assistant create`
    #[serde(default = "default_assistant_name")]
    pub name: String,
    /// Model used by `assistant create`
    #[serde(default = "default_model")]
    pub model: String,
    /// Standing instructions used by `assistant create`
    #[serde(default = "default_assistant_instructions")]
    pub assistant_instructions: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_speech_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Where synthesized audio is written
    #[serde(default = "default_speech_output")]
    pub output: PathBuf,
    /// Command line used to play the audio file; the file path is appended.
    /// An empty string disables playback.
    #[serde(default = "default_player")]
    pub player: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_url")]
    pub base_url: String,
    #[serde(default = "default_chart_range")]
    pub chart_range: String,
    /// Tickers shown by `charts`
    #[serde(default = "default_tickers")]
    pub tickers: Vec<TickerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerConfig {
    pub symbol: String,
    pub label: String,
}

impl TickerConfig {
    pub fn new(symbol: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            label: label.into(),
        }
    }
}

fn default_base_url() -> String {
    OPENAI_API_BASE_URL.to_string()
}

fn default_run_instructions() -> String {
    "Address the user by name if they give one. If there is no message from the user, \
     greet them and welcome them to the analyst desk."
        .to_string()
}

fn default_assistant_name() -> String {
    "Data Analyst Assistant".to_string()
}

fn default_model() -> String {
    "gpt-4-1106-preview".to_string()
}

fn default_assistant_instructions() -> String {
    "You are a personal data analyst assistant for a wealth management company. \
     Provide your honest advice and feedback to the user. \
     Provide the latest closing price of the stock in all your answers."
        .to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speech_output() -> PathBuf {
    PathBuf::from("output.mp3")
}

#[cfg(target_os = "macos")]
fn default_player() -> Option<String> {
    Some("afplay".to_string())
}

#[cfg(not(target_os = "macos"))]
fn default_player() -> Option<String> {
    Some("ffplay -nodisp -autoexit -loglevel quiet".to_string())
}

fn default_initial_backoff() -> u64 {
    250
}

fn default_max_backoff() -> u64 {
    2_000
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_wait() -> u64 {
    120
}

fn default_market_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_tickers() -> Vec<TickerConfig> {
    vec![
        TickerConfig::new("AAPL", "Apple"),
        TickerConfig::new("MSFT", "Microsoft"),
        TickerConfig::new("TSLA", "Tesla"),
        TickerConfig::new("AMZN", "Amazon"),
        TickerConfig::new("^GSPC", "S&P 500"),
        TickerConfig::new("COIN", "Coinbase"),
    ]
}

fn default_chart_range() -> String {
    "5y".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            assistant_id: None,
            instructions: default_run_instructions(),
            name: default_assistant_name(),
            model: default_model(),
            assistant_instructions: default_assistant_instructions(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_speech_model(),
            voice: default_voice(),
            output: default_speech_output(),
            player: default_player(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_url(),
            chart_range: default_chart_range(),
            tickers: default_tickers(),
        }
    }
}

impl Config {
    /// Load configuration, preferring an explicit path when given
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Some(path) = Self::find_config_path() {
            tracing::debug!(path = %path.display(), "Using project config");
            return Self::load_from(path);
        }

        match Self::user_config_path() {
            Ok(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Using user config");
                Self::load_from(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find analyst.toml by searching current directory and parents
    pub fn find_config_path() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        for _ in 0..10 {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Per-user configuration file path
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("analyst").join("config.toml"))
    }

    /// Write a commented default configuration file to `path`
    pub fn create_default(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

const DEFAULT_CONFIG: &str = r#"# analyst configuration

[assistant]
# Assistant to run against (ANALYST_ASSISTANT_ID takes precedence)
# assistant_id = "asst_..."

# Instructions sent with every run
# instructions = "Address the user by name if they give one."

# Used by `analyst assistant create`
# name = "Data Analyst Assistant"
# model = "gpt-4-1106-preview"

request_timeout_secs = 60

[speech]
enabled = true
model = "tts-1"
voice = "alloy"
output = "output.mp3"
# Defaults to "afplay" on macOS and "ffplay -nodisp -autoexit" elsewhere;
# set to "" to only write the file
# player = "mpv"

[poll]
initial_backoff_ms = 250
max_backoff_ms = 2000
multiplier = 2
max_wait_secs = 120

[market]
chart_range = "5y"

# [[market.tickers]]
# symbol = "AAPL"
# label = "Apple"
"#;
