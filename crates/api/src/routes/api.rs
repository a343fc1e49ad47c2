use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{MarketStatus, SignalResult};

use crate::{auth::require_auth, ApiError, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/signals", get(get_signals))
        .route("/api/signals/:ticker", get(get_signal))
        .route("/api/markets", get(get_markets))
        .route("/api/markets/:exchange", get(get_market))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Deserialize)]
struct SignalsQuery {
    limit: Option<usize>,
}

async fn get_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(state.top_n);
    let signals = state.service.get_top_signals(limit)?;
    Ok(Json(json!({
        "count": signals.len(),
        "signals": signals,
    })))
}

async fn get_signal(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<SignalResult>, ApiError> {
    Ok(Json(state.service.get_ticker_detail(&ticker)?))
}

async fn get_markets(State(state): State<AppState>) -> Result<Json<Vec<MarketStatus>>, ApiError> {
    Ok(Json(state.service.get_all_market_statuses()?))
}

async fn get_market(
    State(state): State<AppState>,
    Path(exchange): Path<String>,
) -> Result<Json<MarketStatus>, ApiError> {
    Ok(Json(state.service.get_market_status(&exchange)?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use tower::ServiceExt;

    use calendar::MarketCalendar;
    use common::{SignalComponents, SignalDetail, TickerRecord, Universe};
    use engine::SignalService;
    use signals::{signal_cache, SignalPublisher, SignalSnapshot};

    use super::*;
    use crate::router;

    const TOKEN: &str = "secret";

    fn state() -> (SignalPublisher, AppState) {
        let universe = Universe::new(vec![
            TickerRecord::new("AAPL", "NASDAQ", "Apple", "test"),
            TickerRecord::new("NVDA", "NASDAQ", "Nvidia", "test"),
        ])
        .unwrap();
        let (publisher, reader) = signal_cache();
        let service = SignalService::new(
            Arc::new(universe),
            reader,
            Arc::new(MarketCalendar::with_defaults().unwrap()),
        );
        let state = AppState {
            service: Arc::new(service),
            dashboard_token: TOKEN.to_string(),
            top_n: 10,
        };
        (publisher, state)
    }

    fn result(ticker: &str, score: f64) -> SignalResult {
        SignalResult {
            ticker: TickerRecord::new(ticker, "NASDAQ", ticker, "test"),
            score,
            components: SignalComponents { momentum: 0.03, rsi: 60.0, volume_factor: 1.5 },
            detail: SignalDetail {
                last_close: 10.0,
                previous_close: 9.8,
                recent_high: 10.1,
                recent_low: 9.6,
                last_volume: 1_000,
                projected_target: 10.14,
                reason: "Momentum breakout".to_string(),
            },
            computed_at: Utc::now(),
        }
    }

    fn authed(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (_publisher, state) = state();
        let resp = router(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["universe"], 2);
        assert!(body["last_refresh"].is_null());
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_token() {
        let (_publisher, state) = state();
        let app = router(state);

        let missing = Request::builder().uri("/api/signals").body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(missing).await.unwrap().status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/api/markets")
            .header("Authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(wrong).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signals_before_first_refresh_are_unavailable() {
        let (_publisher, state) = state();
        let resp = router(state).oneshot(authed("/api/signals")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn serves_signals_and_detail() {
        let (publisher, state) = state();
        publisher.publish(SignalSnapshot {
            computed_at: Utc::now(),
            scored: vec![result("NVDA", 0.7), result("AAPL", 0.3)],
            ranked_len: 2,
            universe_size: 2,
            failures: 0,
        });
        let app = router(state);

        let resp = app.clone().oneshot(authed("/api/signals?limit=1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["signals"][0]["ticker"]["ticker"], "NVDA");

        let resp = app.clone().oneshot(authed("/api/signals/aapl")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["score"], 0.3);

        let resp = app.oneshot(authed("/api/signals/TSLA")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_market_status() {
        let (_publisher, state) = state();
        let app = router(state);

        let resp = app.clone().oneshot(authed("/api/markets")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await.as_array().unwrap().len(), 7);

        let resp = app.clone().oneshot(authed("/api/markets/lse")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["exchange"], "LSE");

        let resp = app.oneshot(authed("/api/markets/XETRA")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
