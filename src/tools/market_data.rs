//! Market Data
//!
//! Quote lookup for ticker symbols via the public Yahoo Finance chart endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<u64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub as_of: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn change_percent(&self) -> Option<f64> {
        self.previous_close
            .filter(|prev| *prev != 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }

    /// One block of plain text per quote, suitable for prompt embedding.
    pub fn describe(&self) -> String {
        let currency = self.currency.as_deref().unwrap_or("USD");
        let mut lines = vec![format!(
            "{}{}: {:.2} {}",
            self.symbol,
            self.name.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default(),
            self.price,
            currency
        )];
        if let (Some(prev), Some(pct)) = (self.previous_close, self.change_percent()) {
            lines.push(format!("  Previous close: {:.2} ({:+.2}%)", prev, pct));
        }
        if let (Some(low), Some(high)) = (self.day_low, self.day_high) {
            lines.push(format!("  Day range: {:.2} - {:.2}", low, high));
        }
        if let (Some(low), Some(high)) = (self.fifty_two_week_low, self.fifty_two_week_high) {
            lines.push(format!("  52-week range: {:.2} - {:.2}", low, high));
        }
        if let Some(volume) = self.volume {
            lines.push(format!("  Volume: {}", volume));
        }
        if let Some(ref exchange) = self.exchange {
            lines.push(format!("  Exchange: {}", exchange));
        }
        if let Some(as_of) = self.as_of {
            lines.push(format!("  As of: {}", as_of.format("%Y-%m-%d %H:%M UTC")));
        }
        lines.join("\n")
    }
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote>;
}

pub struct YahooQuoteSource {
    client: Client,
    base_url: String,
}

impl YahooQuoteSource {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
                .build()
                .unwrap_or_default(),
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
        }
    }

    fn parse_chart(symbol: &str, body: &Value) -> Result<Quote> {
        if let Some(err) = body["chart"]["error"]["description"].as_str() {
            anyhow::bail!("Yahoo rejected {}: {}", symbol, err);
        }

        let meta = &body["chart"]["result"][0]["meta"];
        let price = meta["regularMarketPrice"]
            .as_f64()
            .with_context(|| format!("No market price for {}", symbol))?;

        Ok(Quote {
            symbol: meta["symbol"].as_str().unwrap_or(symbol).to_uppercase(),
            name: meta["longName"].as_str().or_else(|| meta["shortName"].as_str()).map(String::from),
            currency: meta["currency"].as_str().map(String::from),
            exchange: meta["fullExchangeName"].as_str().or_else(|| meta["exchangeName"].as_str()).map(String::from),
            price,
            previous_close: meta["chartPreviousClose"].as_f64().or_else(|| meta["previousClose"].as_f64()),
            day_high: meta["regularMarketDayHigh"].as_f64(),
            day_low: meta["regularMarketDayLow"].as_f64(),
            volume: meta["regularMarketVolume"].as_u64(),
            fifty_two_week_high: meta["fiftyTwoWeekHigh"].as_f64(),
            fifty_two_week_low: meta["fiftyTwoWeekLow"].as_f64(),
            as_of: meta["regularMarketTime"].as_i64().and_then(|t| DateTime::from_timestamp(t, 0)),
        })
    }
}

impl Default for YahooQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for YahooQuoteSource {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!(
            "{}/{}?interval=1d&range=5d",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol)
        );
        debug!("Fetching quote: {}", url);

        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send quote request")?
            .json()
            .await
            .context("Failed to decode quote response")?;

        Self::parse_chart(symbol, &body)
    }
}
