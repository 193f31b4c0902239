use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::SnapshotStore;
use crate::types::Snapshot;

/// Routes serving the published snapshot.
pub fn router(store: Arc<SnapshotStore>) -> Router {
    Router::new()
        .route("/data", get(current_snapshot))
        .with_state(store)
}

async fn current_snapshot(State(store): State<Arc<SnapshotStore>>) -> Json<Arc<Snapshot>> {
    debug!("Serving cached snapshot");
    Json(store.current())
}

/// Serve `router(store)` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    store: Arc<SnapshotStore>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Serving snapshots on http://{}/data", listener.local_addr()?);
    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    async fn start(store: Arc<SnapshotStore>) -> (String, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();
        tokio::spawn(serve(listener, store, token.clone()));
        (format!("http://{addr}/data"), token)
    }

    #[tokio::test]
    async fn data_returns_current_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        let (url, token) = start(store.clone()).await;

        let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({"top_wagerers": {}, "total_tickets": "0"}));

        store.publish(Snapshot::error("request timed out"));
        let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({"error": "request timed out"}));

        token.cancel();
    }
}
