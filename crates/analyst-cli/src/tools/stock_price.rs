//! Latest closing price lookup

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use analyst_core::{MarketData, ParameterProperty, ParameterSchema};

use super::Tool;

pub const STOCK_PRICE_TOOL: &str = "get_stock_price";

/// Tool returning the most recent close for a ticker symbol
pub struct StockPriceTool {
    market: Arc<dyn MarketData>,
}

impl StockPriceTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        STOCK_PRICE_TOOL
    }

    fn description(&self) -> &str {
        "Retrieve the latest closing price of a stock using its ticker symbol"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("symbol", ParameterProperty::string("The ticker symbol of the stock"))
    }

    #[instrument(skip(self, args), fields(symbol = tracing::field::Empty))]
    async fn execute(&self, args: &Value) -> Result<String> {
        let symbol = args
            .get("symbol")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: symbol"))?;

        tracing::Span::current().record("symbol", symbol);

        let close = self.market.latest_close(symbol).await?;
        debug!(close, "Fetched latest close");

        Ok(close.to_string())
    }
}
