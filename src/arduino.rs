//! Arduino serial transport (C7): fire-and-forget `LED:<n>:<s>\n` / `OFF\n`
//! line protocol with a change-detection cache and reconnect backoff.
//!
//! Open/read/write shape generalized from `serial.rs`'s `SerialPort`; the
//! COBS framing there is replaced with the bridge's plain LF-terminated
//! line protocol, since the Arduino sketch here never talks back.

use std::time::Duration;

use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::model::LampId;

const BAUD_RATE: u32 = 115_200;
const WRITE_TIMEOUT: Duration = Duration::from_millis(200);
const BACKOFF_STEPS_MS: [u64; 4] = [1_000, 2_000, 4_000, 16_000];

/// A connected Arduino serial line. Owned exclusively by the writer task
/// (spec §5: "the Arduino serial handle is owned exclusively by C7").
pub struct ArduinoPort {
    port: tokio_serial::SerialStream,
    cache: [Option<bool>; 12],
}

impl ArduinoPort {
    pub async fn open(port_name: &str) -> Result<Self, BridgeError> {
        let port = tokio_serial::new(port_name, BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open_native_async()
            .map_err(|e| BridgeError::SerialIo(format!("opening {port_name}: {e}")))?;

        Ok(ArduinoPort { port, cache: [None; 12] })
    }

    /// Write every lamp whose desired state differs from the cache, then
    /// update the cache. No-op if nothing changed (anti-flap lives here,
    /// per spec §4.6/§4.7: the engine is stateless, C7's cache elides
    /// identical outputs).
    pub async fn apply(&mut self, desired: &std::collections::HashMap<LampId, bool>) -> Result<(), BridgeError> {
        use tokio::io::AsyncWriteExt;

        for lamp in LampId::ALL {
            let wanted = desired.get(&lamp).copied().unwrap_or(false);
            let idx = (lamp.wire_number() - 1) as usize;
            if self.cache[idx] == Some(wanted) {
                continue;
            }
            let line = format!("LED:{}:{}\n", lamp.wire_number(), wanted as u8);
            self.port
                .write_all(line.as_bytes())
                .await
                .map_err(|e| BridgeError::SerialIo(e.to_string()))?;
            self.cache[idx] = Some(wanted);
        }
        self.port.flush().await.map_err(|e| BridgeError::SerialIo(e.to_string()))?;
        Ok(())
    }

    /// Send `OFF\n` and reset the cache so a future reconnect re-sends
    /// every lamp from scratch.
    pub async fn all_off(&mut self) -> Result<(), BridgeError> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(b"OFF\n").await.map_err(|e| BridgeError::SerialIo(e.to_string()))?;
        self.port.flush().await.map_err(|e| BridgeError::SerialIo(e.to_string()))?;
        self.cache = [None; 12];
        Ok(())
    }
}

/// Auto-detect a connected Arduino Leonardo/Micro (or common clone) by USB
/// VID/PID, used when `--serial auto` is given.
pub fn detect_device() -> Result<Option<String>, BridgeError> {
    let ports = serialport::available_ports()
        .map_err(|e| BridgeError::SerialIo(format!("listing ports: {e}")))?;

    for port in ports {
        if let serialport::SerialPortType::UsbPort(info) = port.port_type {
            // Arduino Leonardo / Micro (genuine, Arduino LLC VID).
            if info.vid == 0x2341 && matches!(info.pid, 0x8036 | 0x8037 | 0x0036 | 0x0037) {
                return Ok(Some(port.port_name));
            }
            // SparkFun Pro Micro and similar CH340-based Leonardo clones.
            if info.vid == 0x1a86 && info.pid == 0x7523 {
                return Ok(Some(port.port_name));
            }
            // Adafruit boards built on the same ATmega32u4 bootloader.
            if info.vid == 0x239a {
                return Ok(Some(port.port_name));
            }
        }
    }

    Ok(None)
}

/// The exponential reconnect backoff described in spec §5 (1s/2s/4s, capped
/// at 16s). `attempt` is 0-based.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let idx = (attempt as usize).min(BACKOFF_STEPS_MS.len() - 1);
    Duration::from_millis(BACKOFF_STEPS_MS[idx])
}

/// Reconnect loop: keeps trying `open` with the backoff schedule until it
/// succeeds or `stop` fires. Logs each failed attempt at `warn`.
pub async fn reconnect_until(
    port_name: &str,
    mut stop: tokio::sync::watch::Receiver<bool>,
) -> Option<ArduinoPort> {
    let mut attempt = 0u32;
    loop {
        if *stop.borrow() {
            return None;
        }
        match ArduinoPort::open(port_name).await {
            Ok(port) => {
                info!(port = port_name, "arduino reconnected");
                return Some(port);
            }
            Err(e) => {
                let wait = backoff_for_attempt(attempt);
                warn!(port = port_name, error = %e, wait_ms = wait.as_millis() as u64, "arduino reconnect failed");
                attempt += 1;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            return None;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_16s() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(16));
        assert_eq!(backoff_for_attempt(100), Duration::from_secs(16));
    }

    #[test]
    fn detect_device_does_not_panic_without_hardware() {
        let _ = detect_device();
    }
}
