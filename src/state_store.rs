use crate::config::AUDIT_HEADER;
use crate::error::PersistError;
use crate::models::{PLACEHOLDER, SignalState};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Single-writer home of the published `SignalState`.
///
/// The latest value lives in a `watch` cell for in-process readers and in a
/// JSON file for everyone else. The file is replaced by rename so a reader
/// sees either the previous document or the new one, never a torn write.
pub struct StateStore {
    data_path: PathBuf,
    audit_path: PathBuf,
    cell: watch::Sender<SignalState>,
}

impl StateStore {
    /// Open the store, seeding the cell with the last persisted state when
    /// one is readable.
    pub fn open(data_path: impl Into<PathBuf>, audit_path: impl Into<PathBuf>) -> Self {
        let data_path = data_path.into();
        let audit_path = audit_path.into();

        for dir in [data_path.parent(), audit_path.parent()].into_iter().flatten() {
            if !dir.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    warn!(error = %e, dir = %dir.display(), "Could not create data directory");
                }
            }
        }

        if let Err(e) = ensure_audit_header(&audit_path) {
            warn!(error = %e, path = %audit_path.display(), "Could not create audit log");
        }

        let initial = read_state(&data_path).unwrap_or_else(|_| SignalState::waiting());
        let (cell, _) = watch::channel(initial);

        Self {
            data_path,
            audit_path,
            cell,
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }

    /// Snapshot of the latest published state.
    pub fn current(&self) -> SignalState {
        self.cell.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SignalState> {
        self.cell.subscribe()
    }

    /// Publish `state` to in-process readers and write it to disk.
    ///
    /// The in-memory snapshot is replaced even when the file write fails.
    pub fn persist(&self, state: SignalState) -> Result<(), PersistError> {
        let written = write_atomic(&self.data_path, &state);
        self.cell.send_replace(state);
        written
    }

    /// Read the canonical file as an out-of-process reader would.
    pub fn load(&self) -> SignalState {
        read_state(&self.data_path).unwrap_or_else(|_| SignalState::waiting())
    }

    /// Append one audit row. Failures are logged and dropped.
    pub fn append_audit(&self, state: &SignalState) {
        if let Err(e) = append_row(&self.audit_path, state) {
            warn!(error = %e, path = %self.audit_path.display(), "Audit log append failed");
        }
    }
}

fn read_state(path: &Path) -> Result<SignalState, PersistError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_atomic(path: &Path, state: &SignalState) -> Result<(), PersistError> {
    let body = serde_json::to_vec(state)?;

    // Atomic write: write to a temporary sibling file, then rename.
    let tmp_path = path.with_extension("json.tmp");
    let atomic = std::fs::write(&tmp_path, &body).and_then(|_| std::fs::rename(&tmp_path, path));

    if let Err(e) = atomic {
        warn!(error = %e, path = %path.display(), "Atomic state write failed, overwriting in place");
        let _ = std::fs::remove_file(&tmp_path);
        std::fs::write(path, &body)?;
    }

    debug!(path = %path.display(), signal = %state.signal, "State persisted");
    Ok(())
}

fn ensure_audit_header(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, format!("{}\n", AUDIT_HEADER))
}

fn append_row(path: &Path, state: &SignalState) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", audit_row(state))
}

/// `Time,Signal,ATM,PCR,CE_Votes,PE_Votes`
pub fn audit_row(state: &SignalState) -> String {
    let atm = state
        .atm
        .map(|a| a.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let pcr = state
        .pcr
        .map(|p| format!("{:?}", p))
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    format!(
        "{},{},{},{},{},{}",
        state.timestamp, state.signal, atm, pcr, state.ce_votes, state.pe_votes
    )
}
