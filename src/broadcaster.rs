//! Broadcaster (C8): bounded multi-consumer fan-out of lamp outputs to SSE
//! panel clients.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::LampId;

/// Matches the SSE endpoint JSON shape in spec §6: `{"lamp": 1..12, "state": 0|1}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LampEvent {
    pub lamp: u8,
    pub state: u8,
}

const CHANNEL_CAPACITY: usize = 256;

/// Fans out lamp-state changes to any number of SSE writer tasks. Each
/// subscriber gets its own lagging-tolerant receiver; a slow subscriber that
/// falls behind the channel capacity sees `RecvError::Lagged` and
/// resynchronizes rather than blocking the sender.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<LampEvent>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Broadcaster { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LampEvent> {
        self.tx.subscribe()
    }

    /// Publish the deltas between `previous` and `current`; a lamp whose
    /// lit state hasn't changed is not re-sent.
    pub fn publish_delta(
        &self,
        previous: &HashMap<LampId, bool>,
        current: &HashMap<LampId, bool>,
    ) {
        for lamp in LampId::ALL {
            let now = current.get(&lamp).copied().unwrap_or(false);
            let before = previous.get(&lamp).copied().unwrap_or(false);
            if now != before {
                let _ = self.tx.send(LampEvent { lamp: lamp.wire_number(), state: now as u8 });
            }
        }
    }

    /// Publish the full current snapshot, used right after a new SSE
    /// subscriber's `/state` read to avoid a blank panel until the next
    /// delta arrives.
    pub fn publish_full(&self, current: &HashMap<LampId, bool>) {
        for lamp in LampId::ALL {
            let state = current.get(&lamp).copied().unwrap_or(false);
            let _ = self.tx.send(LampEvent { lamp: lamp.wire_number(), state: state as u8 });
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scenario_6_two_subscribers_both_receive_the_same_delta() {
        let b = Broadcaster::new();
        let mut a = b.subscribe();
        let mut c = b.subscribe();

        let mut before = HashMap::new();
        before.insert(LampId::Led1, false);
        let mut after = HashMap::new();
        after.insert(LampId::Led1, true);

        b.publish_delta(&before, &after);

        let ea = a.recv().await.unwrap();
        let ec = c.recv().await.unwrap();
        assert_eq!(ea.lamp, 1);
        assert_eq!(ea.state, 1);
        assert_eq!(ec.lamp, ea.lamp);
        assert_eq!(ec.state, ea.state);
    }

    #[tokio::test]
    async fn unchanged_lamp_produces_no_event() {
        let b = Broadcaster::new();
        let mut rx = b.subscribe();
        let mut m = HashMap::new();
        m.insert(LampId::Led1, true);
        b.publish_delta(&m, &m);
        assert!(rx.try_recv().is_err());
    }
}
