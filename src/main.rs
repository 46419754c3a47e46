//! tsw6-bridge - bridges TSW6/Zusi3 telemetry to an Arduino MFA panel.
//!
//! Connects to exactly one configured simulator source, evaluates a
//! lamp-rule profile against its telemetry, and drives an Arduino-based
//! twelve-lamp indicator panel plus a tablet-accessible HTTP+SSE replica.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tsw6_zusi3_bridge::cli::{self, Cli};
use tsw6_zusi3_bridge::error::BridgeError;
use tsw6_zusi3_bridge::model::{LampId, Profile, Rule, SourceKind};
use tsw6_zusi3_bridge::rules::condition::{Action, Condition};
use tsw6_zusi3_bridge::rules::engine;
use tsw6_zusi3_bridge::supervisor::Supervisor;

const EXIT_OK: i32 = 0;
const EXIT_BAD_ARGS: i32 = 1;
const EXIT_SOURCE_CONNECT_FAILURE: i32 = 2;
const EXIT_SERIAL_FAILURE: i32 = 3;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let profile = match load_profile(&cli.profile, cli.source) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to load profile");
            std::process::exit(EXIT_BAD_ARGS);
        }
    };

    let supervisor = Supervisor::new(cli, profile);
    match supervisor.run().await {
        Ok(()) => std::process::exit(EXIT_OK),
        Err(e @ BridgeError::SerialIo(_)) => {
            tracing::error!(error = %e, "serial failure");
            std::process::exit(EXIT_SERIAL_FAILURE);
        }
        Err(e @ BridgeError::BadProfile(_)) => {
            tracing::error!(error = %e, "bad arguments");
            std::process::exit(EXIT_BAD_ARGS);
        }
        Err(e) => {
            tracing::error!(error = %e, "bridge exited with error");
            std::process::exit(EXIT_SOURCE_CONNECT_FAILURE);
        }
    }
}

/// Load a named profile from `~/.tsw6_arduino_bridge/profiles/<name>.json`,
/// falling back to a small built-in profile covering the well-known SIFA/
/// PZB/door lamps when no file is present. Profile *authoring* is an
/// external collaborator's concern (model.rs); this is just the default
/// the core ships so `tsw6-bridge` runs out of the box. Every rule is
/// checked against the rule engine's known field names before the profile
/// is handed to the supervisor; unknown-field rules are dropped and logged
/// rather than failing the whole load (spec §7 bad-rule policy).
fn load_profile(name: &str, source: cli::SourceArg) -> Result<Profile, BridgeError> {
    if let Some(dir) = dirs::home_dir() {
        let path = dir.join(".tsw6_arduino_bridge").join("profiles").join(format!("{name}.json"));
        if path.exists() {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| BridgeError::IoStorage(format!("reading {}: {e}", path.display())))?;
            let profile: Profile = serde_json::from_str(&json)
                .map_err(|e| BridgeError::BadProfile(format!("{}: {e}", path.display())))?;
            return Ok(validate_profile(profile));
        }
    }

    let source_kind = match source {
        cli::SourceArg::Zusi3 => SourceKind::Zusi3,
        cli::SourceArg::Tsw6 => SourceKind::Tsw6,
    };

    Ok(validate_profile(Profile {
        id: "default".into(),
        name: "default".into(),
        source: source_kind,
        poll_interval_ms: 100,
        rules: vec![
            Rule {
                source_field: "sifa.warning".into(),
                condition: Condition::BlinkValue,
                action: Action::Blink { period_ms: 500 },
                target_lamp: LampId::Led1,
            },
            Rule {
                source_field: "sifa.warning".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led1,
            },
            Rule {
                source_field: "lzb.ende".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led2,
            },
            Rule {
                source_field: "pzb.zugart_70".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led3,
            },
            Rule {
                source_field: "pzb.zugart_85".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led4,
            },
            Rule {
                source_field: "pzb.zugart_55".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led5,
            },
            Rule {
                source_field: "pzb.hz_500".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led6,
            },
            Rule {
                source_field: "pzb.hz_1000".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led7,
            },
            Rule {
                source_field: "doors_left".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led8,
            },
            Rule {
                source_field: "doors_right".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led9,
            },
            Rule {
                source_field: "lzb.lamp_ue".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led10,
            },
            Rule {
                source_field: "lzb.lamp_g".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led11,
            },
            Rule {
                source_field: "lzb.lamp_s".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led12,
            },
        ],
    }))
}

/// Reject rules whose `source_field` the rule engine doesn't recognize,
/// logging each one and keeping the rest of the profile intact.
fn validate_profile(mut profile: Profile) -> Profile {
    let (valid, rejected) = engine::validate_rules(std::mem::take(&mut profile.rules));
    for err in rejected {
        tracing::warn!(error = %err, "rejecting invalid rule at profile load");
    }
    profile.rules = valid;
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profile_covers_every_lamp() {
        let profile = load_profile("nonexistent", cli::SourceArg::Zusi3).unwrap();
        let covered: std::collections::HashSet<_> = profile.rules.iter().map(|r| r.target_lamp).collect();
        assert_eq!(covered.len(), 12);
    }
}
