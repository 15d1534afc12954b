use serde::{Deserialize, Serialize};

/// Where a request is in its approval lifecycle.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MachineState {
    #[default]
    Idle,
    Reviewing,
    Processing,
    Done,
    Failed,
}

impl MachineState {
    /// `done` and `failed` only leave on a fresh `START`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// A request is in flight and a new one must wait.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Reviewing | Self::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::MachineState;
    use std::str::FromStr;

    #[test]
    fn terminal_states() {
        assert!(MachineState::Done.is_terminal());
        assert!(MachineState::Failed.is_terminal());
        assert!(!MachineState::Idle.is_terminal());
        assert!(!MachineState::Reviewing.is_terminal());
        assert!(!MachineState::Processing.is_terminal());
    }

    #[test]
    fn busy_states() {
        assert!(MachineState::Reviewing.is_busy());
        assert!(MachineState::Processing.is_busy());
        assert!(!MachineState::Idle.is_busy());
        assert!(!MachineState::Done.is_busy());
    }

    #[test]
    fn display_and_parse_agree_with_serde() {
        for state in [
            MachineState::Idle,
            MachineState::Reviewing,
            MachineState::Processing,
            MachineState::Done,
            MachineState::Failed,
        ] {
            let text = state.to_string();
            assert_eq!(MachineState::from_str(&text).unwrap(), state);
            assert_eq!(
                serde_json::to_value(state).unwrap(),
                serde_json::Value::String(text)
            );
        }
    }
}
