pub mod api_server_axum;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod nse_client;
pub mod processor;
pub mod rules;
pub mod scheduler;
pub mod state_store;
pub mod trend;

// Re-exports for convenience
pub use config::{AppConfig, LoopTiming, Mode, SignalParams};
pub use error::{CycleError, FetchError, PersistError};
pub use models::{ChainRow, OptionChain, Side, Signal, SignalState};
pub use nse_client::{ChainSource, NSEClient};
pub use rules::{Verdict, Vote, decide};
pub use scheduler::{RunControl, SignalWorker, WorkerState};
pub use state_store::StateStore;
pub use trend::{FixedTrend, Trend, TrendSource, YahooTrend};
