use anyhow::{Result, bail};
use std::path::PathBuf;
use std::time::Duration;

// -----------------------------------------------
// NSE API ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const NSE_OPTION_CHAIN_PATH: &str = "/api/option-chain-indices";

pub fn nse_option_chain_url(base_url: &str, symbol: &str) -> String {
    format!(
        "{}{}?symbol={}",
        base_url,
        NSE_OPTION_CHAIN_PATH,
        urlencoding::encode(symbol)
    )
}

// -----------------------------------------------
// PRICE TREND SOURCE
// -----------------------------------------------
pub const TREND_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_TREND_TICKER: &str = "^NSEI";
pub const TREND_SAMPLES: usize = 5;

pub fn trend_chart_url(base_url: &str, ticker: &str) -> String {
    format!(
        "{}/v8/finance/chart/{}?range=1d&interval=1m",
        base_url,
        urlencoding::encode(ticker)
    )
}

// -----------------------------------------------
// DEFAULT SYMBOL
// -----------------------------------------------
pub const DEFAULT_SYMBOL: &str = "NIFTY";

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 300;

// Re-establishing a session after a failed fetch
pub const WARMUP_RETRY_BASE_DELAY_MS: u64 = 200;
pub const WARMUP_RETRY_FACTOR: u64 = 2;
pub const WARMUP_RETRY_MAX_DELAY_SECS: u64 = 2;
pub const WARMUP_RETRY_MAX_ATTEMPTS: usize = 3;
/// Wall-clock cap on the whole retry run, kept inside one loop interval
pub const WARMUP_RETRY_BUDGET_MS: u64 = 2_500;

// -----------------------------------------------
// HTTP HEADERS
// -----------------------------------------------
pub const HEADER_REFERER: &str = "https://www.nseindia.com/";
pub const HEADER_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HEADER_ACCEPT_HTML: &str = "text/html";

// -----------------------------------------------
// LOOP TIMING
// -----------------------------------------------
pub const LOOP_INTERVAL_SECS: u64 = 5;
pub const STOPPED_INTERVAL_SECS: u64 = 2;
pub const ERROR_BACKOFF_SECS: u64 = 5;

// -----------------------------------------------
// SIGNAL THRESHOLDS
// -----------------------------------------------
pub const STRIKE_STEP: f64 = 50.0;
pub const ATM_PCR_UPPER: f64 = 1.2;
pub const ATM_PCR_LOWER: f64 = 0.8;
pub const MIN_VOTES: usize = 2;

// -----------------------------------------------
// FILES
// -----------------------------------------------
pub const DATA_FILE: &str = "current_data.json";
pub const LOG_FILE: &str = "signals_log.csv";
pub const LOG_DIR: &str = "./logs";
pub const AUDIT_HEADER: &str = "Time,Signal,ATM,PCR,CE_Votes,PE_Votes";

/// Tunable constants of the voting engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParams {
    pub strike_step: f64,
    pub pcr_upper: f64,
    pub pcr_lower: f64,
    pub min_votes: usize,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            strike_step: STRIKE_STEP,
            pcr_upper: ATM_PCR_UPPER,
            pcr_lower: ATM_PCR_LOWER,
            min_votes: MIN_VOTES,
        }
    }
}

impl SignalParams {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            strike_step: env_or("NSE_STRIKE_STEP", defaults.strike_step),
            pcr_upper: env_or("NSE_PCR_UPPER", defaults.pcr_upper),
            pcr_lower: env_or("NSE_PCR_LOWER", defaults.pcr_lower),
            min_votes: env_or("NSE_MIN_VOTES", defaults.min_votes),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.strike_step > 0.0) {
            bail!("strike step must be positive, got {}", self.strike_step);
        }
        if self.pcr_lower > self.pcr_upper {
            bail!(
                "PCR lower bound {} is above upper bound {}",
                self.pcr_lower,
                self.pcr_upper
            );
        }
        if self.min_votes == 0 {
            bail!("minimum vote count must be at least 1");
        }
        Ok(())
    }
}

/// Pauses between scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    pub running: Duration,
    pub stopped: Duration,
    pub error_backoff: Duration,
    pub warm_up_budget: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            running: Duration::from_secs(LOOP_INTERVAL_SECS),
            stopped: Duration::from_secs(STOPPED_INTERVAL_SECS),
            error_backoff: Duration::from_secs(ERROR_BACKOFF_SECS),
            warm_up_budget: Duration::from_millis(WARMUP_RETRY_BUDGET_MS),
        }
    }
}

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Execution mode of the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Background worker plus HTTP accessors
    Server,
    /// A single fetch/decide cycle printed to stdout
    Once,
}

/// Application configuration handler
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: Mode,
    pub port: u16,
    pub symbol: String,
    pub trend_ticker: String,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub autostart: bool,
    pub timing: LoopTiming,
    pub params: SignalParams,
}

impl AppConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mode = match get_execution_mode().as_str() {
            "server" => Mode::Server,
            "once" => Mode::Once,
            other => bail!("Invalid mode '{}'. Use 'server' or 'once'", other),
        };

        let defaults = LoopTiming::default();
        let running = Duration::from_secs(env_or("NSE_LOOP_SECS", LOOP_INTERVAL_SECS));
        Ok(Self {
            mode,
            port: env_or("NSE_PORT", 5000),
            symbol: std::env::var("NSE_SYMBOL").unwrap_or_else(|_| DEFAULT_SYMBOL.to_string()),
            trend_ticker: std::env::var("NSE_TREND_TICKER")
                .unwrap_or_else(|_| DEFAULT_TREND_TICKER.to_string()),
            data_dir: std::env::var("NSE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            log_dir: std::env::var("NSE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(LOG_DIR)),
            autostart: std::env::var("NSE_AUTOSTART")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            timing: LoopTiming {
                running,
                warm_up_budget: defaults.warm_up_budget.min(running / 2),
                ..defaults
            },
            params: SignalParams::from_env(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            bail!("symbol must not be empty");
        }
        if self.timing.running.is_zero() {
            bail!("loop interval must be at least one second");
        }
        self.params.validate()
    }

    pub fn data_file(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE)
    }

    pub fn audit_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

/// Get the execution mode from environment or default to server
pub fn get_execution_mode() -> String {
    std::env::var("NSE_MODE").unwrap_or_else(|_| "server".to_string())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
