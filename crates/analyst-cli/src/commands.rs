//! Command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use analyst_core::{
    AssistantApi, Config, CreateAssistant, MarketData, OpenAiClient, YahooFinanceClient,
};

use crate::audio;
use crate::charts;
use crate::progress::{Spinner, StatusLine};
use crate::run::{RunConfig, RunLoop};
use crate::session::Session;
use crate::tools::create_default_registry;

/// Secrets and overrides taken from flags or the environment
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub assistant_id: Option<String>,
}

fn openai_client(config: &Config, credentials: &Credentials) -> Result<Arc<OpenAiClient>> {
    let api_key = credentials
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;

    let client = OpenAiClient::new(
        api_key,
        config.assistant.base_url.clone(),
        Duration::from_secs(config.assistant.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

fn market_client(config: &Config) -> Result<Arc<YahooFinanceClient>> {
    Ok(Arc::new(YahooFinanceClient::new(
        config.market.base_url.clone(),
    )?))
}

/// Send one message to the assistant and print its reply
pub async fn ask(
    config: &Config,
    credentials: &Credentials,
    text: &str,
    speak: bool,
    json: bool,
) -> Result<()> {
    let client = openai_client(config, credentials)?;
    let registry = create_default_registry(market_client(config)?);

    let mut run_config = RunConfig::from_config(config, credentials.assistant_id.clone())?
        .with_show_progress(!json);
    if !speak {
        run_config = run_config.with_speech(None);
    }

    let run_loop = RunLoop::new(client.clone(), registry, run_config).with_speech(client.clone());

    let session = Session::start(client.clone()).await?;
    let result = run_loop.run(&session, text).await;
    if let Err(e) = session.end().await {
        warn!(error = %e, "Failed to end session");
    }
    let outcome = result?;

    info!(
        run_id = %outcome.run_id,
        polls = outcome.polls,
        tool_outputs = outcome.tool_outputs,
        "Assistant replied"
    );

    if json {
        let payload = serde_json::json!({
            "run_id": outcome.run_id,
            "response": outcome.response,
            "polls": outcome.polls,
            "tool_rounds": outcome.tool_rounds,
            "tool_outputs": outcome.tool_outputs,
            "audio": outcome.audio.as_ref().map(|_| config.speech.output.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        StatusLine::new().success(&outcome.response);
    }

    if let Some(audio) = outcome.audio.as_deref() {
        audio::play_reply(audio, &config.speech.output, config.speech.player.as_deref()).await;
    }

    Ok(())
}

/// Print the latest close for a symbol
pub async fn price(config: &Config, symbol: &str, json: bool) -> Result<()> {
    let market = market_client(config)?;
    let close = market.latest_close(symbol).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "symbol": symbol,
                "close": close,
            }))?
        );
    } else {
        println!("{} {:.2}", symbol, close);
    }
    Ok(())
}

/// Print price history sparklines for the configured tickers
pub async fn charts(config: &Config, range: Option<String>, width: usize) -> Result<()> {
    let market = market_client(config)?;
    let range = range.unwrap_or_else(|| config.market.chart_range.clone());
    let status = StatusLine::new();

    if config.market.tickers.is_empty() {
        status.warning("No tickers configured");
        return Ok(());
    }

    status.status(format!("Closing-price history over {}", range));

    let mut spinner = Spinner::new("Fetching price history...");
    spinner.start();

    let mut rendered = Vec::with_capacity(config.market.tickers.len());
    for ticker in &config.market.tickers {
        let chart = match market.history(&ticker.symbol, &range).await {
            Ok(history) => charts::render_chart(&ticker.label, &history, width, status.use_unicode()),
            Err(e) => {
                warn!(symbol = %ticker.symbol, error = %e, "Failed to fetch history");
                format!("{} ({})\n  unavailable: {}", ticker.label, ticker.symbol, e)
            }
        };
        rendered.push(chart);
    }

    spinner.stop().await;

    for chart in rendered {
        println!("{}\n", chart);
    }
    Ok(())
}

/// Create the assistant with the stock-price tool declared and print its id
pub async fn assistant_create(
    config: &Config,
    credentials: &Credentials,
    name: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let client = openai_client(config, credentials)?;
    let registry = create_default_registry(market_client(config)?);

    let request = CreateAssistant {
        name: name.unwrap_or_else(|| config.assistant.name.clone()),
        instructions: config.assistant.assistant_instructions.clone(),
        model: model.unwrap_or_else(|| config.assistant.model.clone()),
        tools: registry
            .tool_definitions()
            .iter()
            .map(|def| def.to_value())
            .collect(),
    };

    let assistant = client.create_assistant(&request).await?;
    StatusLine::new().success(format!("Created assistant {}", assistant.id));
    println!("Set ANALYST_ASSISTANT_ID={} or add it to analyst.toml", assistant.id);
    Ok(())
}

/// Write a default config file
pub fn config_init(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::user_config_path()?,
    };
    Config::create_default(&path)?;
    StatusLine::new().success(format!("Wrote {}", path.display()));
    Ok(())
}

/// Print the effective configuration
pub fn config_show(config: &Config, source: Option<&Path>) -> Result<()> {
    match source {
        Some(path) => println!("# {}", path.display()),
        None => println!("# defaults"),
    }
    print!("{}", config.to_toml().context("Failed to render config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_client_requires_key() {
        let config = Config::default();
        let err = openai_client(&config, &Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let empty = Credentials {
            api_key: Some(String::new()),
            assistant_id: None,
        };
        assert!(openai_client(&config, &empty).is_err());

        let credentials = Credentials {
            api_key: Some("sk-test".into()),
            assistant_id: None,
        };
        assert!(openai_client(&config, &credentials).is_ok());
    }

    #[test]
    fn test_config_init_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyst.toml");
        config_init(Some(path.clone())).unwrap();
        assert!(Config::load_from(&path).is_ok());
        assert!(config_init(Some(path)).is_err());
    }
}
