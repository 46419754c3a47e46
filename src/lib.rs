//! tsw6-zusi3-bridge library crate.
//!
//! Bridges TSW6/Zusi3 telemetry to an Arduino-driven MFA indicator panel.
//! The binary (`main.rs`) is a thin shell over this crate so the codec,
//! rule engine, and conversion logic can be exercised from integration
//! tests under `tests/`.

pub mod arduino;
pub mod broadcaster;
pub mod cli;
pub mod ebula;
pub mod error;
pub mod model;
pub mod panel;
pub mod rules;
pub mod supervisor;
pub mod tsw6;
pub mod zusi3;
