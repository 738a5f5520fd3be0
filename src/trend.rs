use crate::config;
use crate::error::FetchError;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
            Trend::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the short-term trend vote. Implementations fail closed to
/// `Trend::Neutral`.
pub trait TrendSource: Send + Sync + 'static {
    fn classify_trend(&self) -> impl Future<Output = Trend> + Send;
}

/// Strictly rising last five closes is UP, strictly falling is DOWN,
/// anything else (including too few samples) is NEUTRAL.
pub fn classify_closes(closes: &[f64]) -> Trend {
    if closes.len() < config::TREND_SAMPLES {
        return Trend::Neutral;
    }
    let last = &closes[closes.len() - config::TREND_SAMPLES..];

    if last.windows(2).all(|w| w[1] > w[0]) {
        Trend::Up
    } else if last.windows(2).all(|w| w[1] < w[0]) {
        Trend::Down
    } else {
        Trend::Neutral
    }
}

// -----------------------------------------------
// YAHOO CHART API
// -----------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
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

/// 1-minute closes of the reference index from Yahoo Finance.
pub struct YahooTrend {
    client: Client,
    url: String,
}

impl YahooTrend {
    pub fn new(ticker: &str) -> Result<Self> {
        Self::with_base_url(config::TREND_BASE_URL, ticker)
    }

    pub fn with_base_url(base_url: &str, ticker: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config::USER_AGENT)
            .timeout(config::HTTP_TIMEOUT)
            .build()
            .context("Failed to build trend HTTP client")?;

        Ok(Self {
            client,
            url: config::trend_chart_url(base_url.trim_end_matches('/'), ticker),
        })
    }

    /// Today's 1-minute closes, oldest first, empty bars dropped.
    pub async fn fetch_closes(&self) -> Result<Vec<f64>, FetchError> {
        let res = self.client.get(&self.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16(), status.to_string()));
        }

        let body: ChartResponse = serde_json::from_str(&res.text().await?)?;
        Ok(extract_closes(body))
    }
}

fn extract_closes(body: ChartResponse) -> Vec<f64> {
    body.chart
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.indicators.quote.into_iter().next())
        .map(|quote| quote.close.into_iter().flatten().collect())
        .unwrap_or_default()
}

impl TrendSource for YahooTrend {
    async fn classify_trend(&self) -> Trend {
        match self.fetch_closes().await {
            Ok(closes) => {
                let trend = classify_closes(&closes);
                debug!(samples = closes.len(), %trend, "Trend classified");
                trend
            }
            Err(e) => {
                warn!(error = %e, "Trend fetch failed, treating as NEUTRAL");
                Trend::Neutral
            }
        }
    }
}

/// A trend that never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedTrend(pub Trend);

impl TrendSource for FixedTrend {
    async fn classify_trend(&self) -> Trend {
        self.0
    }
}
