use nse_signal::{Signal, SignalState, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nse-signal-{}-{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn open_store(dir: &PathBuf) -> StateStore {
        StateStore::open(dir.join("current_data.json"), dir.join("signals_log.csv"))
    }

    fn graded(signal: Signal, atm: i64, pcr: f64, ce: usize, pe: usize) -> SignalState {
        SignalState {
            timestamp: "11:42:07".to_string(),
            signal,
            atm: Some(atm),
            pcr: Some(pcr),
            ce_votes: ce,
            pe_votes: pe,
            reasons: vec![
                "Underlying = 24012.35".to_string(),
                format!("ATM Strike = {}", atm),
                format!("PCR = {:?}", pcr),
                format!("Votes → CE:{}, PE:{}", ce, pe),
            ],
        }
    }

    #[test]
    fn test_fresh_store_starts_waiting() {
        let dir = scratch_dir("fresh");
        let store = open_store(&dir);

        assert_eq!(store.current(), SignalState::waiting());
        assert_eq!(store.load(), SignalState::waiting());

        let audit = std::fs::read_to_string(dir.join("signals_log.csv")).unwrap();
        assert_eq!(audit, "Time,Signal,ATM,PCR,CE_Votes,PE_Votes\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = scratch_dir("roundtrip");
        let store = open_store(&dir);
        let state = graded(Signal::BuyCe, 24000, 1.37, 3, 1);

        store.persist(state.clone()).unwrap();

        assert_eq!(store.current(), state);
        assert_eq!(store.load(), state);
        assert!(!dir.join("current_data.json.tmp").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_placeholder_states_round_trip() {
        let dir = scratch_dir("placeholder");
        let store = open_store(&dir);

        for state in [
            SignalState::stopped(),
            SignalState::fetch_failed("HTTP 403: Access Denied"),
            SignalState::error("index out of bounds"),
        ] {
            store.persist(state.clone()).unwrap();
            assert_eq!(store.load(), state);
        }

        let raw = std::fs::read_to_string(dir.join("current_data.json")).unwrap();
        assert!(raw.contains(r#""signal":"ERROR""#));
        assert!(raw.contains(r#""atm":"--""#));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_last_state_survives_reopen() {
        let dir = scratch_dir("reopen");
        let state = graded(Signal::BuyPe, 23950, 0.62, 0, 4);
        open_store(&dir).persist(state.clone()).unwrap();

        let reopened = open_store(&dir);

        assert_eq!(reopened.current(), state);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_falls_back_to_overwrite_when_rename_path_unavailable() {
        let dir = scratch_dir("fallback");
        // A directory squatting on the temp path makes the atomic route fail
        std::fs::create_dir_all(dir.join("current_data.json.tmp")).unwrap();
        let store = open_store(&dir);
        let state = graded(Signal::NoTrade, 24100, 1.0, 1, 1);

        store.persist(state.clone()).unwrap();

        assert_eq!(store.load(), state);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_audit_rows_append() {
        let dir = scratch_dir("audit");
        let store = open_store(&dir);

        store.append_audit(&graded(Signal::BuyCe, 24000, 1.4, 3, 1));
        store.append_audit(&graded(Signal::NoTrade, 24050, 1.0, 1, 1));

        let audit = std::fs::read_to_string(dir.join("signals_log.csv")).unwrap();
        let lines: Vec<&str> = audit.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Time,Signal,ATM,PCR,CE_Votes,PE_Votes",
                "11:42:07,BUY CE,24000,1.4,3,1",
                "11:42:07,NO TRADE,24050,1.0,1,1",
            ]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_audit_failure_is_swallowed() {
        let dir = scratch_dir("audit-fail");
        // The audit path is a directory, so every append fails
        std::fs::create_dir_all(dir.join("signals_log.csv")).unwrap();
        let store = open_store(&dir);
        let state = graded(Signal::BuyCe, 24000, 1.4, 3, 1);

        store.append_audit(&state);
        store.persist(state.clone()).unwrap();

        assert_eq!(store.load(), state);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_subscribers_see_whole_replacements() {
        let dir = scratch_dir("subscribe");
        let store = open_store(&dir);
        let mut rx = store.subscribe();
        let state = graded(Signal::BuyPe, 24000, 0.7, 1, 3);

        store.persist(state.clone()).unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), state);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_state() {
        let dir = scratch_dir("concurrent");
        let store = Arc::new(open_store(&dir));
        let first = graded(Signal::BuyCe, 24000, 1.4, 3, 1);
        let second = graded(Signal::NoTrade, 24050, 1.0, 1, 1);
        store.persist(first.clone()).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let path = dir.join("current_data.json");
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let done = Arc::clone(&done);
                let path = path.clone();
                let (a, b) = (first.clone(), second.clone());
                std::thread::spawn(move || {
                    let mut reads = 0usize;
                    while !done.load(Ordering::SeqCst) {
                        let bytes = std::fs::read(&path).expect("state file must always exist");
                        let seen: SignalState =
                            serde_json::from_slice(&bytes).expect("state file must always parse");
                        assert!(seen == a || seen == b);
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for i in 0..300 {
            let next = if i % 2 == 0 { second.clone() } else { first.clone() };
            store.persist(next).unwrap();
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
