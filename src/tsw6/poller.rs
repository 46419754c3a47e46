//! TSW6 poller (C4): periodic fetch of the configured endpoint set, an
//! EndpointValue cache, and train-class detection on reconnect.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::model::{EndpointValue, TrainState};
use crate::tsw6::http::Tsw6Client;
use crate::tsw6::profile_map::{
    detect_profile_id, WellKnownEndpoint, TRAIN_CLASS_ENDPOINT, WELL_KNOWN_ENDPOINTS,
};

pub struct Tsw6Poller {
    client: Tsw6Client,
    extra_endpoints: Vec<WellKnownEndpoint>,
    poll_interval_ms: u64,
}

impl Tsw6Poller {
    pub fn new(client: Tsw6Client, extra_endpoints: Vec<WellKnownEndpoint>, poll_interval_ms: u64) -> Self {
        Tsw6Poller { client, extra_endpoints, poll_interval_ms }
    }

    /// Run the poll loop until `stop` is signalled. Emits one `TrainState`
    /// snapshot per tick that changed a cached value, and logs (without
    /// switching) a detected profile recommendation on the first tick.
    pub async fn run(
        self,
        mut state: TrainState,
        updates: mpsc::Sender<TrainState>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        let mut cache: HashMap<String, EndpointValue> = HashMap::new();
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(
            self.poll_interval_ms.max(50),
        ));
        // Ticks never overlap and never queue (spec §4.4): a slow tick just
        // delays the next one instead of bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut first_tick = true;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return Ok(());
                    }
                    continue;
                }
            }
            if *stop.borrow() {
                return Ok(());
            }

            if first_tick {
                first_tick = false;
                if let Ok(Some(class)) = self.client.get(TRAIN_CLASS_ENDPOINT).await {
                    if let Some(class_str) = class.as_str() {
                        if let Some(profile_id) = detect_profile_id(class_str) {
                            debug!(object_class = class_str, recommended_profile = profile_id,
                                "detected train class on reconnect");
                        }
                    }
                }
            }

            let mut changed = false;
            for endpoint in WELL_KNOWN_ENDPOINTS {
                self.poll_one(endpoint.path, &mut cache, &mut changed, |value| {
                    (endpoint.apply)(&mut state, value)
                })
                .await;
            }
            for endpoint in &self.extra_endpoints {
                self.poll_one(endpoint.path, &mut cache, &mut changed, |value| {
                    (endpoint.apply)(&mut state, value)
                })
                .await;
            }

            if changed {
                if updates.send(state).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    async fn poll_one(
        &self,
        path: &str,
        cache: &mut HashMap<String, EndpointValue>,
        changed: &mut bool,
        apply: impl FnOnce(&serde_json::Value),
    ) {
        let value = match self.client.get(path).await {
            Ok(v) => v,
            Err(e) => {
                warn!(path, error = %e, "tsw6 poll failed");
                None
            }
        };

        let previous = cache.get(path).and_then(|e| e.value.clone());
        if previous != value {
            *changed = true;
            if let Some(v) = &value {
                apply(v);
            }
        }
        cache.insert(
            path.to_string(),
            EndpointValue { path: path.to_string(), value, timestamp: Instant::now() },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_insert_replaces_stale_entry() {
        let mut cache: HashMap<String, EndpointValue> = HashMap::new();
        cache.insert(
            "a".into(),
            EndpointValue { path: "a".into(), value: None, timestamp: Instant::now() },
        );
        let before = cache["a"].timestamp;
        cache.insert(
            "a".into(),
            EndpointValue {
                path: "a".into(),
                value: Some(serde_json::json!(1)),
                timestamp: Instant::now(),
            },
        );
        assert!(cache["a"].timestamp >= before);
        assert_eq!(cache["a"].value, Some(serde_json::json!(1)));
    }
}
