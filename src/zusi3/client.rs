//! Zusi3 client (C2): handshake, subscription, receive loop.
//!
//! State machine: disconnected -> connecting -> hello-sent -> needed-sent
//! -> running -> {disconnected|failed}.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::model::TrainState;
use crate::zusi3::codec::{decode_message, write_message, Attribute, Node};
use crate::zusi3::decode::apply_data_ftd;
use crate::zusi3::fsdata::{node_id, DEFAULT_SUBSCRIPTION};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(1);

mod msg_type {
    pub const CONNECTING: u16 = 1;
    pub const FAHRPULT: u16 = 2;
}

mod command {
    pub const HELLO: u16 = 1;
    pub const ACK_HELLO: u16 = 2;
    pub const NEEDED_DATA: u16 = 1;
    pub const ACK_NEEDED_DATA: u16 = 2;
    pub const DATA_FTD: u16 = 4;
}

const CLIENT_TYPE_FAHRPULT: u16 = 2;
const PROTOCOL_VERSION: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    HelloSent,
    NeededSent,
    Running,
    Failed,
}

/// The shared last-error slot and change-event channel spec §4.2 requires
/// ("the client exposes both a connected flag and a last-error channel").
/// Backed by a `watch` channel: `.borrow()` is the slot, `.changed()` is
/// the change event.
#[derive(Clone)]
pub struct ConnectionWatch {
    rx: tokio::sync::watch::Receiver<(ConnectionPhase, Option<String>)>,
}

impl ConnectionWatch {
    pub fn connected(&self) -> bool {
        self.rx.borrow().0 == ConnectionPhase::Running
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.rx.borrow().0
    }

    pub fn last_error(&self) -> Option<String> {
        self.rx.borrow().1.clone()
    }

    pub async fn changed(&mut self) -> Result<(), tokio::sync::watch::error::RecvError> {
        self.rx.changed().await
    }
}

type PhaseTx = tokio::sync::watch::Sender<(ConnectionPhase, Option<String>)>;

/// Handshake result surfaced to the caller once ACK_HELLO is parsed.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub server_version: String,
    pub connection_info: String,
}

pub struct Zusi3Client {
    host: String,
    port: u16,
    client_name: String,
}

impl Zusi3Client {
    pub fn new(host: impl Into<String>, port: u16, client_name: impl Into<String>) -> Self {
        Zusi3Client { host: host.into(), port, client_name: client_name.into() }
    }

    /// Connect, perform the HELLO/NEEDED_DATA handshake, and return a
    /// running session, the server's self-reported version info, and a
    /// watch handle tracking the connection's phase and last error.
    pub async fn connect(&self) -> Result<(Zusi3Session, ServerInfo, ConnectionWatch), BridgeError> {
        let (phase_tx, phase_rx) =
            tokio::sync::watch::channel((ConnectionPhase::Connecting, None));
        let watch = ConnectionWatch { rx: phase_rx };

        match self.handshake(&phase_tx).await {
            Ok((stream, info)) => {
                let _ = phase_tx.send((ConnectionPhase::Running, None));
                Ok((Zusi3Session { stream, phase_tx }, info, watch))
            }
            Err(e) => {
                let _ = phase_tx.send((ConnectionPhase::Failed, Some(e.to_string())));
                Err(e)
            }
        }
    }

    async fn handshake(&self, phase_tx: &PhaseTx) -> Result<(TcpStream, ServerInfo), BridgeError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| BridgeError::TransportTimeout(CONNECT_TIMEOUT))?
            .map_err(|e| BridgeError::TransportClosed(e.to_string()))?;

        let mut stream = stream;
        info!(addr = %addr, "connecting to Zusi3");

        let _ = phase_tx.send((ConnectionPhase::HelloSent, None));
        write_message(&mut stream, &self.hello_message()).await?;
        let ack_hello = decode_message(&mut stream).await?;
        let info = parse_ack_hello(&ack_hello)?;
        info!(version = %info.server_version, "received ACK_HELLO");

        let _ = phase_tx.send((ConnectionPhase::NeededSent, None));
        write_message(&mut stream, &self.needed_data_message()).await?;
        let ack_needed = decode_message(&mut stream).await?;
        parse_ack_needed_data(&ack_needed)?;
        debug!("received ACK_NEEDED_DATA");

        Ok((stream, info))
    }

    fn hello_message(&self) -> Node {
        let hello = Node::new(command::HELLO)
            .with_attr(Attribute::u16(1, PROTOCOL_VERSION))
            .with_attr(Attribute::u16(2, CLIENT_TYPE_FAHRPULT))
            .with_attr(Attribute::string(3, &self.client_name))
            .with_attr(Attribute::string(4, "1.0"));
        Node::new(msg_type::CONNECTING).with_child(hello)
    }

    fn needed_data_message(&self) -> Node {
        let mut fs_node = Node::new(node_id::FUEHRERSTAND);
        for fd in DEFAULT_SUBSCRIPTION {
            fs_node = fs_node.with_attr(Attribute::u16(1, fd.id()));
        }
        let needed = Node::new(command::NEEDED_DATA).with_child(fs_node);
        Node::new(msg_type::FAHRPULT).with_child(needed)
    }
}

fn parse_ack_hello(msg: &Node) -> Result<ServerInfo, BridgeError> {
    if msg.id != msg_type::CONNECTING {
        return Err(BridgeError::ProtocolViolation("expected CONNECTING message".into()));
    }
    let ack = msg
        .child(command::ACK_HELLO)
        .ok_or_else(|| BridgeError::ProtocolViolation("missing ACK_HELLO child".into()))?;

    let mut info = ServerInfo::default();
    if let Some(attr) = ack.attr(1) {
        info.server_version = attr.as_string();
    }
    if let Some(attr) = ack.attr(3) {
        info.connection_info = attr.as_string();
    }
    Ok(info)
}

fn parse_ack_needed_data(msg: &Node) -> Result<(), BridgeError> {
    if msg.id != msg_type::FAHRPULT {
        return Err(BridgeError::ProtocolViolation("expected FAHRPULT message".into()));
    }
    msg.child(command::ACK_NEEDED_DATA)
        .ok_or_else(|| BridgeError::ProtocolViolation("missing ACK_NEEDED_DATA child".into()))?;
    Ok(())
}

/// A running, handshaken Zusi3 connection. `run` drives the receive loop
/// until disconnect or a fatal error, emitting one `TrainState` snapshot per
/// message that changed state.
pub struct Zusi3Session {
    stream: TcpStream,
    phase_tx: PhaseTx,
}

impl Zusi3Session {
    /// Drive the receive loop, applying decoded updates onto `state` and
    /// sending a clone through `updates` after each message that changed it.
    /// Returns when the stream closes or a fatal error occurs; cancellation
    /// via `stop` unblocks within the read-timeout bound (~1s).
    pub async fn run(
        mut self,
        mut state: TrainState,
        updates: mpsc::Sender<TrainState>,
        mut stop: tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        loop {
            if *stop.borrow() {
                let _ = self.phase_tx.send((ConnectionPhase::Disconnected, None));
                return Ok(());
            }

            let read = tokio::time::timeout(READ_TIMEOUT, decode_message(&mut self.stream));
            tokio::select! {
                result = read => {
                    let msg = match result {
                        Ok(Ok(m)) => m,
                        Ok(Err(e)) => {
                            let _ = self.phase_tx.send((ConnectionPhase::Failed, Some(e.to_string())));
                            return Err(e);
                        }
                        Err(_) => continue, // read timeout: loop to re-check `stop`
                    };
                    if msg.id != msg_type::FAHRPULT {
                        continue;
                    }
                    if let Some(ftd) = msg.child(command::DATA_FTD) {
                        if apply_data_ftd(&mut state, ftd) {
                            if updates.send(state).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        let _ = self.phase_tx.send((ConnectionPhase::Disconnected, None));
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zusi3::codec::encode_message;

    #[test]
    fn connection_watch_reflects_phase_and_last_error() {
        let (tx, rx) = tokio::sync::watch::channel((ConnectionPhase::Connecting, None));
        let watch = ConnectionWatch { rx };
        assert!(!watch.connected());
        assert_eq!(watch.phase(), ConnectionPhase::Connecting);

        let _ = tx.send((ConnectionPhase::Running, None));
        assert!(watch.connected());

        let _ = tx.send((ConnectionPhase::Failed, Some("boom".into())));
        assert!(!watch.connected());
        assert_eq!(watch.last_error().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn scenario_1_zusi3_hello_handshake() {
        let ack_hello = Node::new(msg_type::CONNECTING).with_child(
            Node::new(command::ACK_HELLO)
                .with_attr(Attribute::string(1, "3.5.0.0"))
                .with_attr(Attribute::string(3, "ok")),
        );
        let parsed = parse_ack_hello(&ack_hello).unwrap();
        assert_eq!(parsed.server_version, "3.5.0.0");
    }

    #[test]
    fn ack_needed_data_requires_fahrpult_message() {
        let bad = Node::new(msg_type::CONNECTING);
        assert!(parse_ack_needed_data(&bad).is_err());
    }

    #[test]
    fn needed_data_message_is_well_formed() {
        let client = Zusi3Client::new("127.0.0.1", 1436, "test");
        let msg = client.needed_data_message();
        assert_eq!(msg.id, msg_type::FAHRPULT);
        let needed = msg.child(command::NEEDED_DATA).unwrap();
        let fs = needed.child(node_id::FUEHRERSTAND).unwrap();
        assert_eq!(fs.attributes.len(), DEFAULT_SUBSCRIPTION.len());
    }

    #[test]
    fn hello_and_needed_messages_round_trip_through_codec() {
        let client = Zusi3Client::new("127.0.0.1", 1436, "test");
        let bytes = encode_message(&client.hello_message());
        assert!(!bytes.is_empty());
    }
}
