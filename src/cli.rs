//! CLI argument definitions using clap.
//!
//! Flat surface (no subcommands): this binary has exactly one mode, bridging
//! one configured source to the Arduino panel and the tablet SSE server.

use clap::{Parser, ValueEnum};

#[derive(Parser, Clone)]
#[command(name = "tsw6-bridge")]
#[command(author, version, about = "Bridges TSW6/Zusi3 telemetry to an Arduino MFA panel", long_about = None)]
pub struct Cli {
    /// Telemetry source to bridge from.
    #[arg(long, value_enum, default_value_t = SourceArg::Zusi3)]
    pub source: SourceArg,

    /// Zusi3 server host (only used when --source zusi3).
    #[arg(long, default_value = "127.0.0.1")]
    pub zusi_host: String,

    /// Zusi3 server port.
    #[arg(long, default_value_t = 1436)]
    pub zusi_port: u16,

    /// TSW6 control API base URL (only used when --source tsw6).
    #[arg(long, default_value = "http://127.0.0.1:31270")]
    pub tsw6_url: String,

    /// Path to the file holding the TSW6 DTGCommKey shared secret.
    #[arg(long)]
    pub tsw6_key_file: Option<String>,

    /// Arduino serial port, or "auto" to detect by USB VID/PID.
    #[arg(long, default_value = "auto")]
    pub serial: String,

    /// Name of the lamp-rule profile to load.
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// Port the tablet HTTP+SSE panel server binds to.
    #[arg(long, default_value_t = 8765)]
    pub sse_port: u16,

    /// Start the EBuLa recorder alongside the bridge.
    #[arg(long)]
    pub record: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Zusi3,
    Tsw6,
}
