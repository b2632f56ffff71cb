//! Workflow state and confirmation policy

use std::time::Duration;

use alloy::primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};

/// Progress of a create-option session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    Checking,
    Ready,
    Approving,
    Creating,
    Done,
}

impl PendingAction {
    /// Submit button label for this state
    pub fn label(self) -> &'static str {
        match self {
            PendingAction::Checking => "Checking allowance…",
            PendingAction::Ready => "Create Put Option",
            PendingAction::Approving => "Approving USDC…",
            PendingAction::Creating => "Creating option…",
            PendingAction::Done => "Option placed successfully!",
        }
    }

    pub fn accepts_submit(self) -> bool {
        self == PendingAction::Ready
    }
}

/// Snapshot published on every transition
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    pub state: PendingAction,
    pub label: &'static str,
    /// Last allowance read, `None` while unknown
    pub allowance: Option<U256>,
    pub required_allowance: Option<U256>,
    pub approval_tx: Option<TxHash>,
    pub create_tx: Option<TxHash>,
    pub poll_attempts: u32,
    pub last_error: Option<String>,
}

impl WorkflowStatus {
    pub fn new() -> Self {
        Self {
            state: PendingAction::Checking,
            label: PendingAction::Checking.label(),
            allowance: None,
            required_allowance: None,
            approval_tx: None,
            create_tx: None,
            poll_attempts: 0,
            last_error: None,
        }
    }

    pub(crate) fn set_state(&mut self, state: PendingAction) {
        self.state = state;
        self.label = state.label();
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// How an approval is confirmed before the option is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Re-read the allowance every interval
    Poll,
    /// Wait for the approval receipt, then re-read once
    Receipt,
}

impl std::str::FromStr for ConfirmationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" => Ok(ConfirmationMode::Poll),
            "receipt" => Ok(ConfirmationMode::Receipt),
            other => Err(format!("unknown confirmation mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfirmationPolicy {
    pub mode: ConfirmationMode,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl ConfirmationPolicy {
    /// Worst-case wait for an approval; shared by both modes
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            mode: ConfirmationMode::Poll,
            interval: Duration::from_secs(1),
            max_attempts: 30,
        }
    }
}
