//! TSW6 HTTP control-API client (C3).
//!
//! Grounded on `tsw6_joystick_bridge/tsw6_api.py` (GET `/get`, `/list`,
//! PATCH `/set`, `DTGCommKey` header) and `scan_train.py` (concrete path
//! shapes, `Result`/`Values` response envelope).

use std::collections::VecDeque;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::BridgeError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:31270";

/// Bounded fan-out for `search_endpoints`'s BFS over the `/list` tree.
const MAX_CONCURRENT_LIST_REQUESTS: usize = 8;

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(rename = "Result")]
    result: String,
    #[serde(rename = "Values")]
    values: Option<std::collections::HashMap<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListResponse {
    #[serde(rename = "Result")]
    pub result: Option<String>,
    #[serde(rename = "Nodes")]
    pub nodes: Vec<String>,
    #[serde(rename = "Endpoints")]
    pub endpoints: Vec<String>,
}

/// A discovered endpoint path reported by `search_endpoints`'s progress
/// callback.
pub struct DiscoveryProgress {
    pub path: String,
}

pub struct Tsw6Client {
    client: Client,
    base_url: String,
    comm_key: String,
}

impl Tsw6Client {
    pub fn new(comm_key: impl Into<String>) -> Result<Self, BridgeError> {
        Self::with_base_url(DEFAULT_BASE_URL, comm_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        comm_key: impl Into<String>,
    ) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::ApiFailed(format!("building http client: {e}")))?;
        Ok(Tsw6Client { client, base_url: base_url.into(), comm_key: comm_key.into() })
    }

    /// GET `/get/<path>`; returns the singleton value on `Result = "Success"`
    /// and silently returns `None` for any other result (spec §4.3: `get`
    /// suppresses api errors to null).
    pub async fn get(&self, path: &str) -> Result<Option<Value>, BridgeError> {
        match self.get_raw(path).await {
            Ok(json) => {
                let resp: GetResponse = serde_json::from_value(json)
                    .map_err(|e| BridgeError::ApiFailed(format!("malformed /get response: {e}")))?;
                if resp.result != "Success" {
                    return Ok(None);
                }
                Ok(resp.values.and_then(|v| v.into_values().next()))
            }
            Err(BridgeError::ApiFailed(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET `/get/<path>`, returning the full parsed JSON body and surfacing
    /// api/auth failures instead of suppressing them.
    pub async fn get_raw(&self, path: &str) -> Result<Value, BridgeError> {
        let url = format!("{}/get/{}", self.base_url, encode_path(path));
        self.request_json(self.client.get(&url)).await
    }

    pub async fn list_nodes(&self, path: &str) -> Result<ListResponse, BridgeError> {
        let url = format!("{}/list/{}", self.base_url, encode_path(path));
        let json = self.request_json(self.client.get(&url)).await?;
        serde_json::from_value(json)
            .map_err(|e| BridgeError::ApiFailed(format!("malformed /list response: {e}")))
    }

    pub async fn set(&self, path: &str, value: Value) -> Result<(), BridgeError> {
        let url = format!("{}/set/{}", self.base_url, encode_path(path));
        let body = serde_json::json!({ "Value": value });
        self.request_json(self.client.patch(&url).json(&body)).await?;
        Ok(())
    }

    async fn request_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, BridgeError> {
        let resp = builder
            .header("DTGCommKey", &self.comm_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    BridgeError::TransportClosed(e.to_string())
                } else {
                    BridgeError::ApiFailed(e.to_string())
                }
            })?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(BridgeError::AuthFailed(format!(
                    "TSW6 rejected DTGCommKey (HTTP {})",
                    resp.status()
                )))
            }
            s if !s.is_success() => {
                return Err(BridgeError::ApiFailed(format!("TSW6 returned HTTP {s}")))
            }
            _ => {}
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| BridgeError::ApiFailed(format!("invalid json body: {e}")))?;

        if let Some(result) = json.get("Result").and_then(Value::as_str) {
            if result.eq_ignore_ascii_case("forbidden") {
                return Err(BridgeError::AuthFailed("TSW6 Result=Forbidden".into()));
            }
        }
        Ok(json)
    }

    /// Bounded-depth BFS over the `/list` tree from `root`, collecting every
    /// endpoint whose final segment contains any of `keywords`
    /// case-insensitively. `on_progress` is called once per path visited.
    /// Fan-out of concurrent `/list` requests is capped at
    /// `MAX_CONCURRENT_LIST_REQUESTS`.
    pub async fn search_endpoints(
        &self,
        root: &str,
        keywords: &[&str],
        max_depth: u32,
        on_progress: Option<mpsc::Sender<DiscoveryProgress>>,
    ) -> Result<Vec<String>, BridgeError> {
        let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut found = Vec::new();
        let mut frontier: VecDeque<(String, u32)> = VecDeque::from([(root.to_string(), 0)]);

        while !frontier.is_empty() {
            let mut join_set: JoinSet<(String, Result<ListResponse, BridgeError>)> = JoinSet::new();
            for _ in 0..MAX_CONCURRENT_LIST_REQUESTS {
                let Some((path, depth)) = frontier.pop_front() else { break };
                if let Some(tx) = &on_progress {
                    let _ = tx.send(DiscoveryProgress { path: path.clone() }).await;
                }
                if depth > max_depth {
                    continue;
                }
                let client = self.clone_handle();
                join_set.spawn(async move {
                    let result = client.list_nodes(&path).await;
                    (path, result)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                let (path, result) = joined.map_err(|e| {
                    BridgeError::ApiFailed(format!("discovery task panicked: {e}"))
                })?;
                let depth = path.matches(['/', '.']).count() as u32;
                match result {
                    Ok(listing) => {
                        for endpoint in &listing.endpoints {
                            let name = endpoint.rsplit(['/', '.']).next().unwrap_or(endpoint);
                            if keywords_lower.is_empty()
                                || keywords_lower.iter().any(|k| name.to_lowercase().contains(k))
                            {
                                found.push(join_path(&path, endpoint));
                            }
                        }
                        if depth < max_depth {
                            for node in &listing.nodes {
                                frontier.push_back((join_path(&path, node), depth + 1));
                            }
                        }
                    }
                    Err(e) => warn!(path = %path, error = %e, "list_nodes failed during discovery"),
                }
            }
        }

        debug!(count = found.len(), "search_endpoints finished");
        Ok(found)
    }

    fn clone_handle(&self) -> Tsw6Client {
        Tsw6Client {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            comm_key: self.comm_key.clone(),
        }
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

/// Percent-encode a TSW6 path, preserving `/` and `.` as literal separators
/// (spec §4.3). Unreserved set is `A-Za-z0-9-_~`.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| segment.split('.').map(encode_segment).collect::<Vec<_>>().join("."))
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_path_preserves_slash_and_dot() {
        assert_eq!(
            encode_path("CurrentFormation/0.ObjectClass"),
            "CurrentFormation/0.ObjectClass"
        );
    }

    #[test]
    fn encode_path_escapes_reserved_characters() {
        assert_eq!(encode_path("a b/c&d"), "a%20b/c%26d");
    }

    #[test]
    fn join_path_handles_empty_parent() {
        assert_eq!(join_path("", "root"), "root");
        assert_eq!(join_path("root", "child"), "root/child");
    }
}
