//! HTTP+SSE tablet panel server and its static assets (C9).

pub mod assets;
pub mod server;
