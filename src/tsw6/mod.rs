//! TSW6 HTTP/JSON source: control-API client, well-known endpoint map, and
//! the periodic poller (C3/C4).

pub mod http;
pub mod poller;
pub mod profile_map;
