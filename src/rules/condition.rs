//! The closed condition set a `Rule` can test against a `TrainState` field.
//!
//! Every variant is `Serialize`/`Deserialize` so a `Rule` round-trips
//! through the profile JSON the (external) config collaborator persists.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    IsTrue,
    IsFalse,
    Equals { value: f64 },
    NotEquals { value: f64 },
    GreaterThan { value: f64 },
    LessThan { value: f64 },
    Between { lo: f64, hi: f64 },
    BlinkValue,
}

/// Scalar field value as read from `TrainState` by source-field-path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    /// A lamp-enum field, carried verbatim so `blink_value` can inspect it.
    Lamp(crate::model::LampState),
}

impl FieldValue {
    fn as_number(self) -> f64 {
        match self {
            FieldValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            FieldValue::Number(n) => n,
            FieldValue::Lamp(l) => l as u8 as f64,
        }
    }
}

impl Condition {
    /// Evaluate this condition against a field value read from `TrainState`.
    pub fn matches(&self, field: FieldValue) -> bool {
        match self {
            Condition::IsTrue => match field {
                FieldValue::Bool(b) => b,
                FieldValue::Number(n) => n != 0.0,
                FieldValue::Lamp(l) => l != crate::model::LampState::Off,
            },
            Condition::IsFalse => !Condition::IsTrue.matches(field),
            Condition::Equals { value } => field.as_number() == *value,
            Condition::NotEquals { value } => field.as_number() != *value,
            Condition::GreaterThan { value } => field.as_number() > *value,
            Condition::LessThan { value } => field.as_number() < *value,
            Condition::Between { lo, hi } => {
                let v = field.as_number();
                *lo <= v && v <= *hi
            }
            Condition::BlinkValue => matches!(
                field,
                FieldValue::Lamp(crate::model::LampState::Blink)
                    | FieldValue::Lamp(crate::model::LampState::BlinkInverse)
            ),
        }
    }
}

/// What a matching rule does to its target lamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    On,
    Off,
    Blink { period_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LampState;

    #[test]
    fn is_true_on_nonzero_number() {
        assert!(Condition::IsTrue.matches(FieldValue::Number(2.0)));
        assert!(!Condition::IsTrue.matches(FieldValue::Number(0.0)));
    }

    #[test]
    fn between_is_inclusive() {
        let c = Condition::Between { lo: 1.0, hi: 3.0 };
        assert!(c.matches(FieldValue::Number(1.0)));
        assert!(c.matches(FieldValue::Number(3.0)));
        assert!(!c.matches(FieldValue::Number(3.01)));
    }

    #[test]
    fn blink_value_matches_either_blink_variant() {
        assert!(Condition::BlinkValue.matches(FieldValue::Lamp(LampState::Blink)));
        assert!(Condition::BlinkValue.matches(FieldValue::Lamp(LampState::BlinkInverse)));
        assert!(!Condition::BlinkValue.matches(FieldValue::Lamp(LampState::On)));
    }

    #[test]
    fn condition_round_trips_through_json() {
        let c = Condition::Between { lo: 0.0, hi: 10.0 };
        let json = serde_json::to_string(&c).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
