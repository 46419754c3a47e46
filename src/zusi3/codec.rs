//! Zusi3 binary wire codec (C1).
//!
//! A Message is a 4-byte `0x00000000` header followed by a Node. A Node is a
//! 2-byte node id followed by a sequence of length-prefixed elements
//! terminated by the `0xFFFFFFFF` End marker: a `0x00000000` length prefix
//! introduces a nested child Node, any other length `L` introduces an
//! Attribute of `L` bytes (2-byte attribute id + `L-2` bytes of payload).
//!
//! Unknown node/attribute ids are preserved as opaque bytes on decode and
//! never cause a decode failure — only truncated reads and header/length
//! violations do.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::BridgeError;

const START_MARKER: u32 = 0x0000_0000;
const END_MARKER: u32 = 0xFFFF_FFFF;
const MESSAGE_HEADER: u32 = 0x0000_0000;

/// Recursion depth cap (spec §9): decoding a Node nested deeper than this
/// is rejected as a protocol violation rather than growing the stack
/// unbounded.
pub const MAX_DEPTH: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub id: u16,
    pub payload: Vec<u8>,
}

impl Attribute {
    pub fn u8(id: u16, value: u8) -> Self {
        Attribute { id, payload: vec![value] }
    }

    pub fn u16(id: u16, value: u16) -> Self {
        Attribute { id, payload: value.to_le_bytes().to_vec() }
    }

    pub fn string(id: u16, value: &str) -> Self {
        Attribute { id, payload: value.as_bytes().to_vec() }
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn as_u16(&self) -> Option<u16> {
        Some(u16::from_le_bytes(self.payload.get(0..2)?.try_into().ok()?))
    }

    pub fn as_i16(&self) -> Option<i16> {
        Some(i16::from_le_bytes(self.payload.get(0..2)?.try_into().ok()?))
    }

    pub fn as_f32(&self) -> Option<f32> {
        Some(f32::from_le_bytes(self.payload.get(0..4)?.try_into().ok()?))
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u16,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: u16) -> Self {
        Node { id, attributes: Vec::new(), children: Vec::new() }
    }

    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn child(&self, id: u16) -> Option<&Node> {
        self.children.iter().find(|c| c.id == id)
    }

    pub fn attr(&self, id: u16) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id == id)
    }
}

/// Encode a full Message (header + Node) ready to write to the socket.
pub fn encode_message(node: &Node) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&MESSAGE_HEADER.to_le_bytes());
    encode_node(node, &mut buf);
    buf
}

fn encode_node(node: &Node, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&node.id.to_le_bytes());
    for attr in &node.attributes {
        let length = (attr.payload.len() + 2) as u32;
        buf.extend_from_slice(&length.to_le_bytes());
        buf.extend_from_slice(&attr.id.to_le_bytes());
        buf.extend_from_slice(&attr.payload);
    }
    for child in &node.children {
        buf.extend_from_slice(&START_MARKER.to_le_bytes());
        encode_node(child, buf);
    }
    buf.extend_from_slice(&END_MARKER.to_le_bytes());
}

async fn read_u16<R: AsyncRead + Unpin>(r: &mut R) -> Result<u16, BridgeError> {
    let mut b = [0u8; 2];
    read_exact(r, &mut b).await?;
    Ok(u16::from_le_bytes(b))
}

async fn read_u32<R: AsyncRead + Unpin>(r: &mut R) -> Result<u32, BridgeError> {
    let mut b = [0u8; 4];
    read_exact(r, &mut b).await?;
    Ok(u32::from_le_bytes(b))
}

async fn read_exact<R: AsyncRead + Unpin>(r: &mut R, buf: &mut [u8]) -> Result<(), BridgeError> {
    r.read_exact(buf).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            BridgeError::TransportClosed("stream ended mid-frame".into())
        }
        _ => BridgeError::TransportClosed(e.to_string()),
    })?;
    Ok(())
}

/// Read one Message (header + Node) from an async stream.
pub async fn decode_message<R: AsyncRead + Unpin>(r: &mut R) -> Result<Node, BridgeError> {
    let header = read_u32(r).await?;
    if header != MESSAGE_HEADER {
        return Err(BridgeError::ProtocolViolation(format!(
            "unexpected message header 0x{:08x}",
            header
        )));
    }
    decode_node(r, 0).await
}

async fn decode_node<R: AsyncRead + Unpin>(
    r: &mut R,
    depth: u32,
) -> Result<Node, BridgeError> {
    if depth > MAX_DEPTH {
        return Err(BridgeError::ProtocolViolation(format!(
            "node recursion exceeded max depth {}",
            MAX_DEPTH
        )));
    }

    let id = read_u16(r).await?;
    let mut node = Node::new(id);

    loop {
        let length = read_u32(r).await?;
        if length == END_MARKER {
            break;
        }
        if length == START_MARKER {
            let child = Box::pin(decode_node(r, depth + 1)).await?;
            node.children.push(child);
            continue;
        }
        if length < 2 {
            return Err(BridgeError::ProtocolViolation(format!(
                "attribute length {} shorter than its own id field",
                length
            )));
        }
        let attr_id = read_u16(r).await?;
        let mut payload = vec![0u8; (length - 2) as usize];
        read_exact(r, &mut payload).await?;
        node.attributes.push(Attribute { id: attr_id, payload });
    }

    Ok(node)
}

/// Write one Message to an async stream.
pub async fn write_message<W: AsyncWrite + Unpin>(
    w: &mut W,
    node: &Node,
) -> Result<(), BridgeError> {
    let bytes = encode_message(node);
    w.write_all(&bytes)
        .await
        .map_err(|e| BridgeError::TransportClosed(e.to_string()))?;
    w.flush().await.map_err(|e| BridgeError::TransportClosed(e.to_string()))?;
    Ok(())
}
