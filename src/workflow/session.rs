//! Per-user workflow sessions
//!
//! Each session owns one [`CreateOptionWorkflow`]. Submissions run on a
//! spawned task so the HTTP caller can poll the published status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use alloy::primitives::{Address, TxHash};
use tokio::sync::{watch, RwLock};
use tokio::task::{AbortHandle, JoinHandle};

use super::orchestrator::CreateOptionWorkflow;
use super::state::{ConfirmationPolicy, WorkflowStatus};
use crate::chain::OptionContract;
use crate::options::params::{normalize, OptionForm};
use crate::types::{unix_now, WorkflowError};

/// Idle sessions are dropped after this long
pub const SESSION_TTL: Duration = Duration::from_secs(3600);

pub struct WorkflowSession {
    pub id: String,
    pub owner: Option<Address>,
    pub created_at: Instant,
    workflow: Arc<tokio::sync::Mutex<CreateOptionWorkflow>>,
    status: watch::Receiver<WorkflowStatus>,
    task: Mutex<Option<AbortHandle>>,
}

impl WorkflowSession {
    pub fn status(&self) -> WorkflowStatus {
        self.status.borrow().clone()
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= SESSION_TTL
    }

    /// Start a submission in the background.
    ///
    /// Rejected while another submission is running or the workflow is not
    /// `ready`. Input errors are reported here as well as on the status.
    pub fn submit(
        &self,
        form: OptionForm,
    ) -> Result<JoinHandle<Result<TxHash, WorkflowError>>, WorkflowError> {
        let mut workflow = self
            .workflow
            .clone()
            .try_lock_owned()
            .map_err(|_| WorkflowError::NotReady {
                state: self.status().state,
            })?;

        let state = workflow.state();
        if !state.accepts_submit() {
            return Err(WorkflowError::NotReady { state });
        }

        if let Err(e) = normalize(&form, unix_now()) {
            let err = WorkflowError::from(e);
            workflow.record_failure(&err);
            return Err(err);
        }
        if workflow.owner().is_none() {
            let err = WorkflowError::WalletNotConnected;
            workflow.record_failure(&err);
            return Err(err);
        }

        let handle = tokio::spawn(async move { workflow.submit(&form).await });
        *self.lock_task() = Some(handle.abort_handle());
        Ok(handle)
    }

    /// Re-run the allowance check. Only valid while `ready`.
    pub async fn recheck(&self) -> Result<WorkflowStatus, WorkflowError> {
        let mut workflow = self
            .workflow
            .try_lock()
            .map_err(|_| WorkflowError::NotReady {
                state: self.status().state,
            })?;

        let state = workflow.state();
        if !state.accepts_submit() {
            return Err(WorkflowError::NotReady { state });
        }

        workflow.check().await;
        Ok(workflow.status())
    }

    pub fn abort(&self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkflowSession {
    fn drop(&mut self) {
        self.abort();
    }
}

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<WorkflowSession>>>,
    contract: OptionContract,
    usdc: Address,
    policy: ConfirmationPolicy,
}

impl SessionManager {
    pub fn new(contract: OptionContract, usdc: Address, policy: ConfirmationPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            contract,
            usdc,
            policy,
        }
    }

    pub fn usdc(&self) -> Address {
        self.usdc
    }

    pub fn policy(&self) -> ConfirmationPolicy {
        self.policy
    }

    /// Create a session and run its initial allowance check
    pub async fn create_session(&self, owner: Option<Address>) -> Arc<WorkflowSession> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let mut workflow =
            CreateOptionWorkflow::new(self.contract.clone(), self.usdc, owner, self.policy);
        let status = workflow.subscribe();
        workflow.check().await;

        let session = Arc::new(WorkflowSession {
            id: session_id.clone(),
            owner,
            created_at: Instant::now(),
            workflow: Arc::new(tokio::sync::Mutex::new(workflow)),
            status,
            task: Mutex::new(None),
        });

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired());
        sessions.insert(session_id.clone(), session.clone());
        tracing::info!(session = %session_id, owner = ?owner, "Session created");

        session
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<WorkflowSession>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).filter(|s| !s.is_expired()).cloned()
    }

    /// Remove a session, cancelling any running submission
    pub async fn remove_session(&self, session_id: &str) -> Option<Arc<WorkflowSession>> {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(session) = &removed {
            session.abort();
            tracing::info!(session = %session_id, "Session removed");
        }
        removed
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxChain;
    use crate::workflow::PendingAction;
    use alloy::primitives::U256;

    fn owner() -> Address {
        Address::repeat_byte(0x0b)
    }

    fn manager(chain: &Arc<SandboxChain>) -> SessionManager {
        let contract = OptionContract::new(chain.clone(), chain.option_contract());
        SessionManager::new(contract, chain.usdc(), ConfirmationPolicy::default())
    }

    fn form() -> OptionForm {
        OptionForm {
            asset_address: format!("{}", Address::repeat_byte(0x42)),
            amount: "2".into(),
            strike_price: "100".into(),
            premium_price: "5".into(),
            expiration_date: "2099-01-01".into(),
        }
    }

    #[tokio::test]
    async fn test_create_runs_check() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(7u64));
        let manager = manager(&chain);

        let session = manager.create_session(Some(owner())).await;
        let status = session.status();
        assert_eq!(status.state, PendingAction::Ready);
        assert_eq!(status.allowance, Some(U256::from(7u64)));

        let found = manager.get_session(&session.id).await.unwrap();
        assert_eq!(found.owner, Some(owner()));
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_submit_in_background() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(100_000_000u64));
        let manager = manager(&chain);
        let session = manager.create_session(Some(owner())).await;

        let handle = session.submit(form()).unwrap();
        // the running task holds the workflow
        assert!(matches!(
            session.submit(form()),
            Err(WorkflowError::NotReady { .. })
        ));

        handle.await.unwrap().unwrap();
        assert_eq!(session.status().state, PendingAction::Done);
        assert_eq!(chain.stats().creates, 1);

        // done is terminal
        assert!(matches!(
            session.recheck().await,
            Err(WorkflowError::NotReady {
                state: PendingAction::Done
            })
        ));
    }

    #[tokio::test]
    async fn test_recheck_picks_up_new_allowance() {
        let chain = Arc::new(SandboxChain::new());
        let manager = manager(&chain);
        let session = manager.create_session(Some(owner())).await;
        assert_eq!(session.status().allowance, Some(U256::ZERO));

        chain.set_allowance(owner(), U256::from(5u64));
        let status = session.recheck().await.unwrap();
        assert_eq!(status.allowance, Some(U256::from(5u64)));
        assert_eq!(status.state, PendingAction::Ready);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_input_synchronously() {
        let chain = Arc::new(SandboxChain::new());
        let manager = manager(&chain);
        let session = manager.create_session(Some(owner())).await;

        let mut bad = form();
        bad.asset_address = "0x1234".into();
        let err = session.submit(bad).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(session.status().last_error.is_some());
        assert_eq!(session.status().state, PendingAction::Ready);

        let anonymous = manager.create_session(None).await;
        let err = anonymous.submit(form()).unwrap_err();
        assert!(matches!(err, WorkflowError::WalletNotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_aborts_running_submission() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(1));
        chain.hold_approvals(true);
        let manager = manager(&chain);
        let session = manager.create_session(Some(owner())).await;

        let handle = session.submit(form()).unwrap();
        manager.remove_session(&session.id).await.unwrap();

        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(manager.get_session(&session.id).await.is_none());
        assert_eq!(chain.stats().creates, 0);
    }
}
