//! analyst: ask a hosted assistant about stock prices and hear the answer
//!
//! The assistant calls back into `get_stock_price`, which is served from
//! market data; the final reply is printed and optionally spoken.

mod audio;
mod charts;
mod commands;
mod error;
mod progress;
mod run;
mod session;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use analyst_core::Config;
use commands::Credentials;

#[derive(Debug, Parser)]
#[command(name = "analyst")]
#[command(about = "Stock questions answered by a hosted assistant", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to analyst.toml or the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Assistant to run (overrides config)
    #[arg(long, env = "ANALYST_ASSISTANT_ID", global = true)]
    assistant_id: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send a message to the assistant
    Ask {
        /// The message to send
        text: Vec<String>,

        /// Print the reply without synthesizing speech
        #[arg(long)]
        no_speech: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the latest closing price for a symbol
    Price {
        symbol: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chart closing prices for the configured tickers
    Charts {
        /// History range, e.g. 1mo, 1y, 5y
        #[arg(short, long)]
        range: Option<String>,

        /// Chart width in columns
        #[arg(short, long, default_value = "60")]
        width: usize,
    },

    /// Manage the hosted assistant
    Assistant {
        #[command(subcommand)]
        action: AssistantAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum AssistantAction {
    /// Create an assistant that declares get_stock_price
    Create {
        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Where to write it (defaults to the user config path)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(Commands::Config {
        action: ConfigAction::Init { path },
    }) = cli.command
    {
        return commands::config_init(path);
    }

    let config = Config::load(cli.config.as_deref())?;
    let credentials = Credentials {
        api_key: cli.api_key,
        assistant_id: cli.assistant_id,
    };

    match cli.command {
        Some(Commands::Ask {
            text,
            no_speech,
            json,
        }) => commands::ask(&config, &credentials, &text.join(" "), !no_speech, json).await,
        None => commands::ask(&config, &credentials, "", true, false).await,
        Some(Commands::Price { symbol, json }) => commands::price(&config, &symbol, json).await,
        Some(Commands::Charts { range, width }) => commands::charts(&config, range, width).await,
        Some(Commands::Assistant {
            action: AssistantAction::Create { name, model },
        }) => commands::assistant_create(&config, &credentials, name, model).await,
        Some(Commands::Config {
            action: ConfigAction::Show,
        }) => {
            let source = cli
                .config
                .or_else(Config::find_config_path)
                .or_else(|| Config::user_config_path().ok().filter(|p| p.exists()));
            commands::config_show(&config, source.as_deref())
        }
        Some(Commands::Config {
            action: ConfigAction::Init { .. },
        }) => Ok(()),
    }
}
