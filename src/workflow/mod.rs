//! Create-put-option workflow

pub mod orchestrator;
pub mod session;
pub mod state;

pub use orchestrator::CreateOptionWorkflow;
pub use session::{SessionManager, WorkflowSession};
pub use state::{ConfirmationMode, ConfirmationPolicy, PendingAction, WorkflowStatus};

use crate::types::WorkflowError;

/// Buying is not part of the deployed contract's ABI
pub async fn buy_option(_id: u64) -> Result<(), WorkflowError> {
    Err(WorkflowError::NotSupported("buying an option"))
}

/// Claiming is not part of the deployed contract's ABI
pub async fn claim_option(_id: u64) -> Result<(), WorkflowError> {
    Err(WorkflowError::NotSupported("claiming an option"))
}
