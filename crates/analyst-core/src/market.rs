//! Market data client (Yahoo Finance chart API)

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Daily close for one trading day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closing-price series for a ticker, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn min(&self) -> Option<f64> {
        self.points.iter().map(|p| p.close).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.points.iter().map(|p| p.close).reduce(f64::max)
    }
}

/// Source of ticker prices
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent available closing price
    async fn latest_close(&self, symbol: &str) -> Result<f64>;

    /// Daily closes over `range` (e.g. "5y")
    async fn history(&self, symbol: &str, range: &str) -> Result<PriceHistory>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parse a chart API body into a history, dropping days without a close
pub fn parse_chart(symbol: &str, body: &str) -> Result<PriceHistory> {
    let resp: ChartResponse =
        serde_json::from_str(body).with_context(|| format!("Failed to parse chart for {}", symbol))?;

    if let Some(err) = resp.chart.error {
        anyhow::bail!("Market data error for {}: {} ({})", symbol, err.description, err.code);
    }

    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("No market data for {}", symbol))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let points = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PricePoint { date, close })
        })
        .collect();

    Ok(PriceHistory {
        symbol: symbol.to_string(),
        points,
    })
}

/// Yahoo Finance chart API client
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn chart_url(&self, symbol: &str, range: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid market data URL: {}", self.base_url))?;

        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Market data URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);

        url.query_pairs_mut()
            .append_pair("range", range)
            .append_pair("interval", "1d");

        Ok(url)
    }
}

#[async_trait]
impl MarketData for YahooFinanceClient {
    async fn latest_close(&self, symbol: &str) -> Result<f64> {
        let history = self.history(symbol, "5d").await?;
        history
            .latest()
            .map(|p| p.close)
            .with_context(|| format!("No closing price available for {}", symbol))
    }

    #[instrument(skip(self))]
    async fn history(&self, symbol: &str, range: &str) -> Result<PriceHistory> {
        let url = self.chart_url(symbol, range)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to connect to market data provider")?;

        // The chart API reports unknown symbols as a 404 with a JSON error body
        let status = resp.status();
        let body = resp.text().await.context("Failed to read market data")?;
        let history = parse_chart(symbol, &body).map_err(|e| {
            if status.is_success() {
                e
            } else {
                e.context(format!("Market data request for {} failed ({})", symbol, status))
            }
        })?;

        debug!(points = history.points.len(), "Fetched price history");
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{serve_once, CannedResponse};
    use serde_json::json;

    fn chart_body() -> String {
        json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL"},
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {
                        "quote": [{"close": [185.64, null, 181.91]}]
                    }
                }],
                "error": null
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_chart_skips_missing_closes() {
        let history = parse_chart("AAPL", &chart_body()).unwrap();
        assert_eq!(history.symbol, "AAPL");
        assert_eq!(history.points.len(), 2);
        assert_eq!(history.closes(), vec![185.64, 181.91]);
        assert_eq!(
            history.first().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert_eq!(history.latest().unwrap().close, 181.91);
        assert_eq!(history.min(), Some(181.91));
        assert_eq!(history.max(), Some(185.64));
    }

    #[test]
    fn test_parse_chart_error() {
        let body = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        })
        .to_string();

        let err = parse_chart("NOPE", &body).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn test_parse_chart_without_result() {
        let body = json!({"chart": {"result": []}}).to_string();
        assert!(parse_chart("AAPL", &body).is_err());
    }

    #[test]
    fn test_empty_history_stats() {
        let history = PriceHistory {
            symbol: "X".into(),
            points: Vec::new(),
        };
        assert!(history.latest().is_none());
        assert!(history.min().is_none());
    }

    #[test]
    fn test_chart_url() {
        let client = YahooFinanceClient::new("https://query1.finance.yahoo.com/").unwrap();
        let url = client.chart_url("AAPL", "5y").unwrap();
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/AAPL?range=5y&interval=1d"
        );
    }

    #[tokio::test]
    async fn test_history_error_keeps_http_status() {
        let (base_url, server) =
            serve_once(CannedResponse::text(503, "upstream unavailable")).await;
        let client = YahooFinanceClient::new(base_url).unwrap();

        let err = client.history("AAPL", "5y").await.unwrap_err();
        let rendered = format!("{:#}", err);
        assert!(rendered.contains("503"), "{}", rendered);
        assert!(rendered.contains("Failed to parse chart for AAPL"), "{}", rendered);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v8/finance/chart/AAPL?range=5y&interval=1d "));
    }

    #[tokio::test]
    async fn test_latest_close_from_server() {
        let body: serde_json::Value = serde_json::from_str(&chart_body()).unwrap();
        let (base_url, server) = serve_once(CannedResponse::json(200, body)).await;
        let client = YahooFinanceClient::new(base_url).unwrap();

        assert_eq!(client.latest_close("AAPL").await.unwrap(), 181.91);
        assert!(server.await.unwrap().contains("range=5d"));
    }
}
