//! Stock quote tool: latest price from an Alpha Vantage style `GLOBAL_QUOTE`
//! endpoint.
//!
//! The endpoint answers 200 for almost everything, so the body shape decides
//! the outcome: an `Error Message` (unknown symbol), a `Note`/`Information`
//! about call limits (rate limit), or a `Global Quote` object.

use async_trait::async_trait;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::{Tool, ToolResult};
use tracing::{debug, warn};

pub struct StockQuoteTool {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// How the endpoint answered.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Price { symbol: String, price: String },
    InvalidSymbol(String),
    RateLimited(String),
    Unrecognized(Value),
}

impl StockQuoteTool {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Classify a decoded response body.
    pub fn classify(symbol: &str, body: Value) -> QuoteOutcome {
        if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
            return QuoteOutcome::InvalidSymbol(msg.to_string());
        }
        if let Some(note) = body.get("Note").and_then(Value::as_str)
            && note.to_lowercase().contains("limit")
        {
            return QuoteOutcome::RateLimited(note.to_string());
        }
        if let Some(info) = body.get("Information").and_then(Value::as_str)
            && info.to_lowercase().contains("rate limit")
        {
            return QuoteOutcome::RateLimited(info.to_string());
        }
        if let Some(price) = body
            .get("Global Quote")
            .and_then(|q| q.get("05. price"))
            .and_then(Value::as_str)
        {
            return QuoteOutcome::Price {
                symbol: symbol.to_string(),
                price: price.to_string(),
            };
        }
        QuoteOutcome::Unrecognized(body)
    }

    async fn fetch(&self, symbol: &str) -> Result<Value, String> {
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        response.json::<Value>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Tool for StockQuoteTool {
    fn name(&self) -> &str {
        "stock_quote"
    }

    fn description(&self) -> &str {
        "Fetch the latest stock price for a given ticker symbol (e.g. 'AAPL', 'TSLA')."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "The ticker symbol, e.g. AAPL"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let symbol = arguments
            .get("symbol")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_default();
        if symbol.is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'symbol' argument".into()));
        }

        debug!(symbol = %symbol, "Fetching stock quote");
        let body = match self.fetch(&symbol).await {
            Ok(body) => body,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Stock quote transport failure");
                return Ok(ToolResult::failure(format!(
                    "Stock quote transport failure for {symbol}: {e}"
                )));
            }
        };

        Ok(match Self::classify(&symbol, body) {
            QuoteOutcome::Price { symbol, price } => {
                ToolResult::structured(json!({ "symbol": symbol, "price": price }))
            }
            QuoteOutcome::InvalidSymbol(msg) => {
                ToolResult::failure(format!("Invalid stock symbol {symbol}: {msg}"))
            }
            QuoteOutcome::RateLimited(note) => {
                ToolResult::failure(format!("Stock quote rate limit exceeded: {note}"))
            }
            QuoteOutcome::Unrecognized(body) => ToolResult::failure(format!(
                "Could not find stock quote for {symbol}. API response: {body}"
            )),
        })
    }
}
