use std::fmt;

use serde::Deserialize;

/// Lifecycle of one cache manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub state: WorkerState,
    /// Promote to active without waiting for open pages to go away
    pub skip_waiting: bool,
    /// Open pages are controlled without a reload
    pub clients_claimed: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: WorkerState::Parsed,
            skip_waiting: false,
            clients_claimed: false,
        }
    }

    /// Installed and waiting for nothing: the host should activate now.
    pub fn ready_to_activate(&self) -> bool {
        self.state == WorkerState::Installed && self.skip_waiting
    }

    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Activated
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Out-of-band instructions posted to the manager by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
}

impl ControlMessage {
    /// Decode a posted message; anything unrecognised is `None`.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_skip_waiting() {
        assert_eq!(
            ControlMessage::parse(&json!({"type": "SKIP_WAITING"})),
            Some(ControlMessage::SkipWaiting)
        );
    }

    #[test]
    fn test_parse_ignores_unknown_messages() {
        assert_eq!(ControlMessage::parse(&json!({"type": "CLAIM"})), None);
        assert_eq!(ControlMessage::parse(&json!("SKIP_WAITING")), None);
        assert_eq!(ControlMessage::parse(&json!(null)), None);
    }

    #[test]
    fn test_ready_to_activate() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.ready_to_activate());

        lifecycle.state = WorkerState::Installed;
        assert!(!lifecycle.ready_to_activate());

        lifecycle.skip_waiting = true;
        assert!(lifecycle.ready_to_activate());
    }
}
