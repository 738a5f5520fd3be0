use crate::config;
use crate::error::FetchError;
use crate::models::OptionChain;
use anyhow::{Context, Result};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{Client, header};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Anything the scheduler can pull an option chain from.
pub trait ChainSource: Send + Sync + 'static {
    /// Fetch one raw chain. No retries: the caller owns retry policy.
    fn fetch_chain(&self) -> impl Future<Output = Result<OptionChain, FetchError>> + Send;

    /// Perform the warm-up request that establishes session cookies.
    fn warm_up(&self) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Drop the current session so the next request starts clean.
    fn reset_session(&self) -> impl Future<Output = ()> + Send;
}

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE
// -----------------------------------------------
struct Session {
    client: Client,
    warmed_up: bool,
}

pub struct NSEClient {
    session: RwLock<Session>,
    base_url: String,
    chain_url: String,
}

impl NSEClient {
    pub fn new(symbol: &str) -> Result<Self> {
        Self::with_base_url(config::NSE_BASE_URL, symbol)
    }

    pub fn with_base_url(base_url: &str, symbol: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            session: RwLock::new(Session {
                client: build_client()?,
                warmed_up: false,
            }),
            chain_url: config::nse_option_chain_url(&base_url, symbol),
            base_url,
        })
    }

    pub fn chain_url(&self) -> &str {
        &self.chain_url
    }

    pub async fn is_warmed_up(&self) -> bool {
        self.session.read().await.warmed_up
    }

    /// Warmup the session once; a failed warm-up is logged and the
    /// data request goes ahead anyway.
    async fn warmup_if_needed(&self) -> Client {
        {
            let session = self.session.read().await;
            if session.warmed_up {
                return session.client.clone();
            }
        }

        let mut session = self.session.write().await;
        if !session.warmed_up {
            if let Err(e) = warm_up_with(&session.client, &self.base_url).await {
                warn!(error = %e, "NSE session warm-up failed, continuing without it");
            }
            session.warmed_up = true;
        }
        session.client.clone()
    }
}

impl ChainSource for NSEClient {
    async fn fetch_chain(&self) -> Result<OptionChain, FetchError> {
        let client = self.warmup_if_needed().await;

        let res = client
            .get(&self.chain_url)
            .header(header::REFERER, config::HEADER_REFERER)
            .header("X-Requested-With", config::HEADER_X_REQUESTED_WITH)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Status(status.as_u16(), preview(&body)));
        }

        let text = res.text().await?;
        let chain = parse_chain(&text)?;
        debug!(
            strikes = chain.records.as_ref().map(|r| r.data.len()).unwrap_or(0),
            "Option chain fetched"
        );
        Ok(chain)
    }

    async fn warm_up(&self) -> Result<(), FetchError> {
        let mut session = self.session.write().await;
        warm_up_with(&session.client, &self.base_url).await?;
        session.warmed_up = true;
        Ok(())
    }

    async fn reset_session(&self) {
        match build_client() {
            Ok(client) => {
                let mut session = self.session.write().await;
                *session = Session {
                    client,
                    warmed_up: false,
                };
                info!("NSE session reset");
            }
            Err(e) => warn!(error = %e, "Could not rebuild HTTP client, keeping old session"),
        }
    }
}

async fn warm_up_with(client: &Client, base_url: &str) -> Result<(), FetchError> {
    client
        .get(base_url)
        .header(header::ACCEPT, config::HEADER_ACCEPT_HTML)
        .send()
        .await?
        .error_for_status()?;

    tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;
    Ok(())
}

/// Parse a chain body, tolerating trailing garbage after the final `}`.
pub fn parse_chain(text: &str) -> Result<OptionChain, FetchError> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return Err(FetchError::NonJsonResponse(preview(text)));
    }

    match serde_json::from_str::<OptionChain>(trimmed) {
        Ok(chain) => Ok(chain),
        Err(first) => {
            let end = trimmed
                .rfind('}')
                .ok_or_else(|| FetchError::Parse(first.to_string()))?;
            serde_json::from_str(&trimmed[..=end]).map_err(|_| FetchError::Parse(first.to_string()))
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_str(lang)?);
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}
