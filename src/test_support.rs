//! In-process stand-in for the stats API, for tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;

pub const ROWS: &str = r#"[{"username":"A","wagerAmount":1000,"campaignCode":"Red"}]"#;
pub const INVALID_DATE: &str = r#"{"error":"INVALID_DATE"}"#;

/// Scripted upstream: answers windowed and lifetime requests separately
/// and counts both.
#[derive(Clone)]
pub struct Upstream {
    pub windowed: (u16, &'static str),
    pub lifetime: (u16, &'static str),
    pub windowed_hits: Arc<AtomicUsize>,
    pub lifetime_hits: Arc<AtomicUsize>,
    pub delay: Duration,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn new(windowed: (u16, &'static str), lifetime: (u16, &'static str)) -> Self {
        Self {
            windowed,
            lifetime,
            windowed_hits: Arc::new(AtomicUsize::new(0)),
            lifetime_hits: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hits(&self) -> (usize, usize) {
        (
            self.windowed_hits.load(Ordering::SeqCst),
            self.lifetime_hits.load(Ordering::SeqCst),
        )
    }
}

async fn stats(
    State(up): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let now = up.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    up.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(up.delay).await;
    up.in_flight.fetch_sub(1, Ordering::SeqCst);
    let (code, body) = if params.contains_key("startTime") && params.contains_key("endTime") {
        up.windowed_hits.fetch_add(1, Ordering::SeqCst);
        up.windowed
    } else {
        up.lifetime_hits.fetch_add(1, Ordering::SeqCst);
        up.lifetime
    };
    (StatusCode::from_u16(code).unwrap(), body.to_string())
}

pub async fn serve(up: Upstream) -> String {
    let app = Router::new()
        .route("/stats/:key", get(stats))
        .with_state(up);
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
