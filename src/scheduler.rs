use crate::config::{self, LoopTiming, SignalParams};
use crate::error::{CycleError, FetchError};
use crate::models::{SignalState, now_hms};
use crate::nse_client::ChainSource;
use crate::processor;
use crate::rules;
use crate::state_store::StateStore;
use crate::trend::TrendSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    ErrorRecovering,
}

// -----------------------------------------------
// RUN CONTROL
// -----------------------------------------------

/// Operator-side start/stop switch. Cloned into whatever interface toggles
/// the worker; the worker only ever holds a receiver.
#[derive(Clone)]
pub struct RunControl {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns false when already started.
    pub fn start(&self) -> bool {
        let changed = self.tx.send_if_modified(|running| !std::mem::replace(running, true));
        if changed {
            info!("Run control: started");
        }
        changed
    }

    /// Returns false when already stopped.
    pub fn stop(&self) -> bool {
        let changed = self.tx.send_if_modified(|running| std::mem::replace(running, false));
        if changed {
            info!("Run control: stopped");
        }
        changed
    }

    pub fn is_started(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn watcher(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

// -----------------------------------------------
// WORKER
// -----------------------------------------------

/// Drives fetch → normalize → decide → persist once per tick and keeps
/// going whatever a single cycle does.
pub struct SignalWorker<C: ChainSource, T: TrendSource> {
    source: Arc<C>,
    trend: Arc<T>,
    store: Arc<StateStore>,
    control: watch::Receiver<bool>,
    params: SignalParams,
    timing: LoopTiming,
    state: watch::Sender<WorkerState>,
}

impl<C: ChainSource, T: TrendSource> SignalWorker<C, T> {
    pub fn new(
        source: Arc<C>,
        trend: Arc<T>,
        store: Arc<StateStore>,
        control: watch::Receiver<bool>,
        params: SignalParams,
        timing: LoopTiming,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Stopped);
        Self {
            source,
            trend,
            store,
            control,
            params,
            timing,
            state,
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.timing.running.as_secs_f64(),
            "Signal worker started"
        );

        while !*shutdown.borrow() {
            let pause = self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Signal worker shutting down");
    }

    /// One scheduler tick. Returns how long to wait before the next one.
    pub async fn tick(&self) -> Duration {
        let started = *self.control.borrow();
        if !started {
            self.transition(WorkerState::Stopped);
            self.publish(SignalState::stopped());
            return self.timing.stopped;
        }

        match self.run_cycle().await {
            Ok(state) => {
                self.transition(WorkerState::Running);
                info!(
                    signal = %state.signal,
                    atm = ?state.atm,
                    pcr = ?state.pcr,
                    ce_votes = state.ce_votes,
                    pe_votes = state.pe_votes,
                    "Cycle complete"
                );
                self.timing.running
            }
            Err(CycleError::Fetch(e)) => {
                warn!(error = %e, "Option chain fetch failed, resetting session");
                self.transition(WorkerState::ErrorRecovering);
                // Readers must stop seeing the last signal before recovery starts
                self.publish(SignalState::fetch_failed(&e.to_string()));
                self.reestablish_session().await;
                self.timing.running
            }
            Err(CycleError::Unexpected(msg)) => {
                error!(error = %msg, "Cycle failed unexpectedly");
                self.transition(WorkerState::ErrorRecovering);
                self.publish(SignalState::error(&msg));
                self.timing.error_backoff
            }
        }
    }

    /// The cycle body runs on its own task so a panic anywhere inside it is
    /// contained and reported instead of killing the loop.
    async fn run_cycle(&self) -> Result<SignalState, CycleError> {
        let source = Arc::clone(&self.source);
        let trend = Arc::clone(&self.trend);
        let store = Arc::clone(&self.store);
        let params = self.params;

        let handle = tokio::spawn(async move {
            let chain = source.fetch_chain().await?;
            let rows = processor::normalize(&chain);
            let verdict = rules::decide(&rows, &params, trend.as_ref()).await;
            let state = verdict.into_state(now_hms());

            if let Err(e) = store.persist(state.clone()) {
                warn!(error = %e, "State persist failed");
            }
            store.append_audit(&state);
            Ok::<_, FetchError>(state)
        });

        match handle.await {
            Ok(result) => result.map_err(CycleError::from),
            Err(e) => Err(CycleError::Unexpected(describe_join_error(e))),
        }
    }

    async fn reestablish_session(&self) {
        self.source.reset_session().await;

        let backoff = ExponentialBackoff::from_millis(config::WARMUP_RETRY_BASE_DELAY_MS)
            .factor(config::WARMUP_RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::WARMUP_RETRY_MAX_DELAY_SECS))
            .take(config::WARMUP_RETRY_MAX_ATTEMPTS);

        let source = &self.source;
        let attempt = Retry::spawn(backoff, || source.warm_up());
        match tokio::time::timeout(self.timing.warm_up_budget, attempt).await {
            Ok(Ok(())) => info!("NSE session re-established"),
            Ok(Err(e)) => warn!(error = %e, "Session warm-up still failing, will retry next tick"),
            Err(_) => warn!(
                budget_ms = self.timing.warm_up_budget.as_millis() as u64,
                "Session warm-up out of time, will retry next tick"
            ),
        }
    }

    fn publish(&self, state: SignalState) {
        if let Err(e) = self.store.persist(state) {
            warn!(error = %e, "State persist failed");
        }
    }

    fn transition(&self, next: WorkerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!(from = ?prev, to = ?next, "Worker state changed");
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("cycle task cancelled: {}", err);
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "cycle task panicked".to_string()
    }
}
