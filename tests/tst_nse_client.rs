use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use nse_signal::{ChainSource, FetchError, NSEClient, Trend, TrendSource, YahooTrend};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    enum Reply {
        Chain,
        Forbidden,
        Html,
    }

    #[derive(Clone)]
    struct Stub {
        reply: Reply,
        warm_ups: Arc<AtomicUsize>,
        cookieless: Arc<AtomicUsize>,
    }

    async fn home(State(stub): State<Stub>) -> Response {
        stub.warm_ups.fetch_add(1, Ordering::SeqCst);
        (
            [(header::SET_COOKIE, "nsit=abc; Path=/")],
            "<html><body>NSE</body></html>",
        )
            .into_response()
    }

    async fn option_chain(State(stub): State<Stub>, headers: HeaderMap) -> Response {
        let has_cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("nsit=abc"));
        if !has_cookie {
            stub.cookieless.fetch_add(1, Ordering::SeqCst);
            return (StatusCode::UNAUTHORIZED, "{}").into_response();
        }

        match stub.reply {
            Reply::Chain => (
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"records":{"underlyingValue":24012.35,"data":[
                    {"strikePrice":24000,"CE":{"openInterest":10},"PE":{"openInterest":12}}
                ]}}<!-- edge -->"#,
            )
                .into_response(),
            Reply::Forbidden => (StatusCode::FORBIDDEN, "Access Denied").into_response(),
            Reply::Html => "<html>Resource not found</html>".into_response(),
        }
    }

    async fn chart() -> &'static str {
        r#"{"chart":{"result":[{"indicators":{"quote":[{"close":[24000.0,24001.5,null,24003.0,24004.2,24006.0]}]}}],"error":null}}"#
    }

    async fn spawn_stub(reply: Reply) -> (String, Stub) {
        let stub = Stub {
            reply,
            warm_ups: Arc::new(AtomicUsize::new(0)),
            cookieless: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new()
            .route("/", get(home))
            .route("/api/option-chain-indices", get(option_chain))
            .route("/v8/finance/chart/{ticker}", get(chart))
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), stub)
    }

    #[tokio::test]
    async fn test_session_is_warmed_once() {
        let (base, stub) = spawn_stub(Reply::Chain).await;
        let client = NSEClient::with_base_url(&base, "NIFTY").unwrap();
        assert!(!client.is_warmed_up().await);

        let first = client.fetch_chain().await.unwrap();
        let second = client.fetch_chain().await.unwrap();

        assert!(client.is_warmed_up().await);
        assert_eq!(stub.warm_ups.load(Ordering::SeqCst), 1);
        assert_eq!(stub.cookieless.load(Ordering::SeqCst), 0);
        assert_eq!(first.records.as_ref().unwrap().data.len(), 1);
        assert_eq!(
            second.records.as_ref().unwrap().underlying_value,
            Some(24012.35)
        );
    }

    #[tokio::test]
    async fn test_reset_forces_fresh_warm_up() {
        let (base, stub) = spawn_stub(Reply::Chain).await;
        let client = NSEClient::with_base_url(&base, "NIFTY").unwrap();

        client.fetch_chain().await.unwrap();
        client.reset_session().await;
        assert!(!client.is_warmed_up().await);
        client.fetch_chain().await.unwrap();

        assert_eq!(stub.warm_ups.load(Ordering::SeqCst), 2);
        assert_eq!(stub.cookieless.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_explicit_warm_up() {
        let (base, stub) = spawn_stub(Reply::Chain).await;
        let client = NSEClient::with_base_url(&base, "NIFTY").unwrap();

        client.warm_up().await.unwrap();
        client.fetch_chain().await.unwrap();

        assert!(client.is_warmed_up().await);
        assert_eq!(stub.warm_ups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let (base, _stub) = spawn_stub(Reply::Forbidden).await;
        let client = NSEClient::with_base_url(&base, "NIFTY").unwrap();

        match client.fetch_chain().await {
            Err(FetchError::Status(code, body)) => {
                assert_eq!(code, 403);
                assert_eq!(body, "Access Denied");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_html_body_is_rejected() {
        let (base, _stub) = spawn_stub(Reply::Html).await;
        let client = NSEClient::with_base_url(&base, "NIFTY").unwrap();

        let err = client.fetch_chain().await.unwrap_err();

        assert!(matches!(err, FetchError::NonJsonResponse(_)));
    }

    #[tokio::test]
    async fn test_chain_url_carries_symbol() {
        let client = NSEClient::with_base_url("http://127.0.0.1:9/", "BANKNIFTY").unwrap();
        assert_eq!(
            client.chain_url(),
            "http://127.0.0.1:9/api/option-chain-indices?symbol=BANKNIFTY"
        );
    }

    #[tokio::test]
    async fn test_trend_from_chart_closes() {
        let (base, _stub) = spawn_stub(Reply::Chain).await;
        let trend = YahooTrend::with_base_url(&base, "^NSEI").unwrap();

        let closes = trend.fetch_closes().await.unwrap();

        assert_eq!(closes, vec![24000.0, 24001.5, 24003.0, 24004.2, 24006.0]);
        assert_eq!(trend.classify_trend().await, Trend::Up);
    }
}
