//! HTTP+SSE tablet panel server (C9).

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::broadcaster::{Broadcaster, LampEvent};
use crate::model::LampId;
use crate::panel::assets::{INDEX_HTML, PANEL_JS};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
/// A subscriber whose SSE stream can't drain a new event within this window
/// is dropped (spec §4.9).
pub const SLOW_CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
struct AppState {
    broadcaster: Broadcaster,
    snapshot: Arc<RwLock<HashMap<LampId, bool>>>,
}

pub fn router(broadcaster: Broadcaster, snapshot: Arc<RwLock<HashMap<LampId, bool>>>) -> Router {
    let state = AppState { broadcaster, snapshot };
    Router::new()
        .route("/", get(index))
        .route("/panel.js", get(panel_js))
        .route("/stream", get(stream))
        .route("/state", get(state_snapshot))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn panel_js() -> impl IntoResponse {
    ([("content-type", "application/javascript")], PANEL_JS)
}

#[derive(serde::Serialize)]
struct StateSnapshotEntry {
    lamp: u8,
    state: u8,
}

#[derive(serde::Serialize)]
struct StateSnapshot {
    lamps: Vec<StateSnapshotEntry>,
}

async fn state_snapshot(State(state): State<AppState>) -> Json<StateSnapshot> {
    let snapshot = state.snapshot.read().await;
    let lamps = LampId::ALL
        .into_iter()
        .map(|lamp| StateSnapshotEntry {
            lamp: lamp.wire_number(),
            state: snapshot.get(&lamp).copied().unwrap_or(false) as u8,
        })
        .collect();
    Json(StateSnapshot { lamps })
}

/// Forward broadcast lamp events into a per-connection bounded channel,
/// timing out each send against `SLOW_CLIENT_TIMEOUT` so a client whose
/// socket buffer never drains gets dropped instead of backing up the
/// broadcast channel for everyone else.
async fn forward_with_slow_client_drop(
    mut rx: tokio::sync::broadcast::Receiver<LampEvent>,
    tx: tokio::sync::mpsc::Sender<LampEvent>,
) {
    loop {
        let lamp_event = match rx.recv().await {
            Ok(e) => e,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "SSE subscriber lagged, some lamp events were dropped");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        };
        if tokio::time::timeout(SLOW_CLIENT_TIMEOUT, tx.send(lamp_event)).await.is_err() {
            warn!("SSE subscriber too slow to drain, dropping connection");
            return;
        }
    }
}

async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let (tx, out_rx) = tokio::sync::mpsc::channel(16);
    tokio::spawn(forward_with_slow_client_drop(rx, tx));

    let events = tokio_stream::wrappers::ReceiverStream::new(out_rx)
        .map(|lamp_event| Ok(to_sse_event(lamp_event)));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text(""))
}

fn to_sse_event(lamp_event: LampEvent) -> Event {
    Event::default().json_data(lamp_event).unwrap_or_else(|_| Event::default().data("{}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_snapshot_reports_twelve_lamps() {
        let broadcaster = Broadcaster::new();
        let snapshot = Arc::new(RwLock::new(HashMap::new()));
        let app_state = AppState { broadcaster, snapshot };
        let resp = state_snapshot(State(app_state)).await;
        assert_eq!(resp.0.lamps.len(), 12);
    }
}
