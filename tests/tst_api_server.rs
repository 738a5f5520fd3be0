use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use nse_signal::api_server_axum::{AppState, router};
use nse_signal::{RunControl, Signal, SignalState, StateStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nse-api-{}-{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn app_state(dir: &PathBuf) -> (Arc<StateStore>, RunControl, AppState) {
        let store = Arc::new(StateStore::open(
            dir.join("current_data.json"),
            dir.join("signals_log.csv"),
        ));
        let control = RunControl::new();
        let state = AppState::new(Arc::clone(&store), control.clone());
        (store, control, state)
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
        let res = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = scratch_dir("health");
        let (_, _, state) = app_state(&dir);

        let (status, body) = get(state, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_status_before_first_cycle() {
        let dir = scratch_dir("status-initial");
        let (_, _, state) = app_state(&dir);

        let (status, body) = get(state, "/status").await;
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["time"], "--");
        assert_eq!(json["signal"], "Waiting…");
        assert_eq!(json["atm"], "--");
        assert_eq!(json["pcr"], "--");
        assert_eq!(json["ce_votes"], 0);
        assert_eq!(json["reasons"][0], "No data yet");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_status_serves_latest_state() {
        let dir = scratch_dir("status-latest");
        let (store, _, state) = app_state(&dir);
        let published = SignalState {
            timestamp: "13:05:40".to_string(),
            signal: Signal::BuyPe,
            atm: Some(24050),
            pcr: Some(0.6),
            ce_votes: 1,
            pe_votes: 4,
            reasons: vec!["Votes → CE:1, PE:4".to_string()],
        };
        store.persist(published.clone()).unwrap();

        let (_, body) = get(state, "/status").await;
        let served: SignalState = serde_json::from_slice(&body).unwrap();

        assert_eq!(served, published);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_start_and_stop_toggle_control() {
        let dir = scratch_dir("toggle");
        let (_, control, state) = app_state(&dir);

        let (_, body) = get(state.clone(), "/start").await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "started");
        assert_eq!(json["changed"], true);
        assert!(control.is_started());

        let (_, body) = get(state.clone(), "/start").await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["changed"], false);

        let (_, body) = get(state.clone(), "/stop").await;
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "stopped");
        assert_eq!(json["changed"], true);
        assert!(!control.is_started());

        let (status, _) = get(state, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
