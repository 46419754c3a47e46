//! Bridge supervisor (C12): owns the active source, the shared TrainState
//! slot, the rule engine tap, the broadcaster, the Arduino writer, the panel
//! server, and (optionally) the EBuLa recorder. Wires every task together
//! and drives graceful shutdown on Ctrl-C.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info, warn};

use crate::arduino::{self, ArduinoPort};
use crate::broadcaster::Broadcaster;
use crate::cli::{Cli, SourceArg};
use crate::error::BridgeError;
use crate::ebula::recorder::{self, RouteRecorder};
use crate::model::{LampId, Profile, SourceKind, TrainState};
use crate::panel;
use crate::rules::engine;
use crate::tsw6::http::Tsw6Client;
use crate::tsw6::poller::Tsw6Poller;
use crate::zusi3::client::Zusi3Client;

const LAMP_EVAL_TICK_MS: u64 = 50;

pub struct Supervisor {
    cli: Cli,
    profile: Profile,
}

impl Supervisor {
    pub fn new(cli: Cli, profile: Profile) -> Self {
        Supervisor { cli, profile }
    }

    /// Run until Ctrl-C or a fatal source error. Returns the error that
    /// ended the run, if any, so `main` can map it onto an exit code.
    pub async fn run(self) -> Result<(), BridgeError> {
        let (stop_tx, stop_rx) = watch::channel(false);
        install_ctrlc_handler(stop_tx.clone());

        let shared_state = Arc::new(RwLock::new(TrainState::default()));
        let snapshot = Arc::new(RwLock::new(HashMap::<LampId, bool>::new()));
        let broadcaster = Broadcaster::new();

        let (state_tx, mut state_rx) = mpsc::channel::<TrainState>(64);
        let (recorder_tx, recorder_rx) = mpsc::channel::<TrainState>(64);

        let source_task = tokio::spawn(run_source_loop(
            self.cli.clone(),
            self.profile.clone(),
            state_tx.clone(),
            shared_state.clone(),
            stop_tx.clone(),
            stop_rx.clone(),
        ));

        let serial_port = self.resolve_serial_port()?;
        let arduino_task = tokio::spawn(run_arduino_writer(
            serial_port,
            broadcaster.clone(),
            snapshot.clone(),
            stop_rx.clone(),
        ));

        let panel_task = tokio::spawn(run_panel_server(
            self.cli.sse_port,
            broadcaster.clone(),
            snapshot.clone(),
            stop_rx.clone(),
        ));

        let recorder_task = if self.cli.record {
            Some(tokio::spawn(recorder::run(RouteRecorder::new(), recorder_rx, stop_rx.clone(), 500)))
        } else {
            None
        };

        let rules = self.profile.rules.clone();
        let mut clock_ms: u64 = 0;
        let mut eval_ticker = tokio::time::interval(std::time::Duration::from_millis(LAMP_EVAL_TICK_MS));
        let mut stop_rx_main = stop_rx.clone();

        let eval_loop = async {
            loop {
                tokio::select! {
                    Some(update) = state_rx.recv() => {
                        *shared_state.write().await = update;
                        if self.cli.record {
                            let _ = recorder_tx.send(update).await;
                        }
                    }
                    _ = eval_ticker.tick() => {
                        clock_ms += LAMP_EVAL_TICK_MS;
                    }
                    _ = stop_rx_main.changed() => {
                        if *stop_rx_main.borrow() {
                            break;
                        }
                    }
                    else => break,
                }

                let current_state = *shared_state.read().await;
                let desired = engine::evaluate(&rules, &current_state, clock_ms);
                let mut snap = snapshot.write().await;
                broadcaster.publish_delta(&snap, &desired);
                *snap = desired;
            }
        };

        eval_loop.await;

        let _ = stop_tx.send(true);
        let _ = panel_task.await;
        let _ = arduino_task.await;
        if let Some(task) = recorder_task {
            match task.await {
                Ok(recorder) => self.persist_recording(recorder),
                Err(e) => error!(error = %e, "recorder task panicked"),
            }
        }

        source_task.await.map_err(|e| BridgeError::TransportClosed(format!("source task panicked: {e}")))?
    }

    /// Convert a finished recording into a timetable document and write it
    /// under `<ebula_dir>/<profile>-<timestamp>.ebula.json` (spec §4.11/§6).
    fn persist_recording(&self, recorder: RouteRecorder) {
        if recorder.samples().is_empty() {
            warn!("recording produced no samples, nothing to convert");
            return;
        }
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let timetable = crate::ebula::convert::convert(
            recorder.samples(),
            &self.profile.name,
            "Station 0",
            "Station N",
            &recorded_at,
        );
        let dir = match crate::ebula::timetable::ebula_dir() {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "could not resolve ebula directory");
                return;
            }
        };
        let filename = format!("{}-{}.ebula.json", self.profile.id, chrono::Utc::now().format("%Y%m%dT%H%M%S"));
        let path = dir.join(filename);
        match crate::ebula::timetable::save_timetable(&timetable, &path) {
            Ok(()) => info!(path = %path.display(), "timetable recorded"),
            Err(e) => error!(error = %e, "failed to save timetable"),
        }
    }

    fn resolve_serial_port(&self) -> Result<String, BridgeError> {
        if self.cli.serial != "auto" {
            return Ok(self.cli.serial.clone());
        }
        arduino::detect_device()?
            .ok_or_else(|| BridgeError::SerialIo("no Arduino detected; pass --serial <port>".into()))
    }
}

async fn run_arduino_writer(
    port_name: String,
    broadcaster: Broadcaster,
    snapshot: Arc<RwLock<HashMap<LampId, bool>>>,
    mut stop: watch::Receiver<bool>,
) {
    let mut port = match ArduinoPort::open(&port_name).await {
        Ok(mut p) => {
            let _ = p.all_off().await;
            p
        }
        Err(e) => {
            error!(port = %port_name, error = %e, "initial arduino open failed");
            match arduino::reconnect_until(&port_name, stop.clone()).await {
                Some(p) => p,
                None => return,
            }
        }
    };

    let mut rx = broadcaster.subscribe();
    loop {
        tokio::select! {
            received = rx.recv() => {
                if received.is_err() {
                    continue;
                }
                let desired = snapshot.read().await.clone();
                if let Err(e) = port.apply(&desired).await {
                    warn!(error = %e, "arduino write failed, reconnecting");
                    match arduino::reconnect_until(&port_name, stop.clone()).await {
                        Some(p) => port = p,
                        None => return,
                    }
                }
            }
            _ = stop.changed() => {
                if *stop.borrow() {
                    let _ = port.all_off().await;
                    return;
                }
            }
        }
    }
}

async fn run_panel_server(
    sse_port: u16,
    broadcaster: Broadcaster,
    snapshot: Arc<RwLock<HashMap<LampId, bool>>>,
    mut stop: watch::Receiver<bool>,
) {
    let app = panel::server::router(broadcaster, snapshot);
    let addr = format!("0.0.0.0:{sse_port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %addr, error = %e, "panel server failed to bind");
            return;
        }
    };
    info!(addr = %addr, "panel server listening");

    let shutdown = async move {
        let _ = stop.changed().await;
    };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        error!(error = %e, "panel server error");
    }
}

/// Connect-and-run once for the configured source, returning whatever
/// error ended the attempt (or `Ok(())` on a clean stop).
async fn run_source_once(
    cli: &Cli,
    profile: &Profile,
    state_tx: mpsc::Sender<TrainState>,
    stop_rx: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    match cli.source {
        SourceArg::Zusi3 => {
            let client = Zusi3Client::new(&cli.zusi_host, cli.zusi_port, "tsw6-bridge");
            let (session, info, conn_watch) = client.connect().await?;
            info!(
                version = %info.server_version,
                connected = conn_watch.connected(),
                "zusi3 connected"
            );
            session.run(TrainState::default(), state_tx, stop_rx).await
        }
        SourceArg::Tsw6 => {
            let key_path = cli
                .tsw6_key_file
                .clone()
                .ok_or_else(|| BridgeError::BadProfile("--tsw6-key-file is required for --source tsw6".into()))?;
            let key = std::fs::read_to_string(&key_path)
                .map_err(|e| BridgeError::IoStorage(format!("reading {key_path}: {e}")))?
                .trim()
                .to_string();
            let client = Tsw6Client::with_base_url(&cli.tsw6_url, key)?;
            let extra = crate::tsw6::profile_map::endpoints_for_rules(&profile.rules);
            let poller = Tsw6Poller::new(client, extra, profile.clamped_poll_interval_ms());
            poller.run(TrainState::default(), state_tx, stop_rx).await
        }
    }
}

/// Keep the active source connected for the life of the bridge (spec §7):
/// transport-closed/timeout blanks the shared state and reconnects with
/// backoff; every other error kind (protocol-violation, auth-failed,
/// bad-profile, io-storage) is fatal and tears the whole bridge down.
async fn run_source_loop(
    cli: Cli,
    profile: Profile,
    state_tx: mpsc::Sender<TrainState>,
    shared_state: Arc<RwLock<TrainState>>,
    stop_tx: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    let mut attempt = 0u32;
    loop {
        if *stop_rx.borrow() {
            return Ok(());
        }

        match run_source_once(&cli, &profile, state_tx.clone(), stop_rx.clone()).await {
            Ok(()) => return Ok(()),
            Err(e @ (BridgeError::TransportClosed(_) | BridgeError::TransportTimeout(_))) => {
                warn!(error = %e, "source disconnected, blanking state and reconnecting");
                shared_state.write().await.blank();
                let _ = state_tx.send(TrainState::default()).await;

                let wait = arduino::backoff_for_attempt(attempt);
                attempt += 1;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            return Ok(());
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "fatal source error, stopping bridge");
                let _ = stop_tx.send(true);
                return Err(e);
            }
        }
    }
}

fn install_ctrlc_handler(stop_tx: watch::Sender<bool>) {
    let result = ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    });
    if let Err(e) = result {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rule;

    #[test]
    fn profile_rules_are_evaluated_with_an_advancing_clock() {
        let profile = Profile {
            id: "x".into(),
            name: "x".into(),
            source: SourceKind::Zusi3,
            rules: Vec::<Rule>::new(),
            poll_interval_ms: 100,
        };
        assert!(profile.rules.is_empty());
    }
}
