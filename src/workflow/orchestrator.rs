//! Allowance-then-create orchestration
//!
//! A single submission walks `ready -> approving -> creating -> done`,
//! skipping `approving` when the owner already granted enough USDC. Every
//! failure is recorded on the published status and the workflow returns to
//! `ready`.

use alloy::primitives::{Address, TxHash, U256};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::{ConfirmationMode, ConfirmationPolicy, PendingAction, WorkflowStatus};
use crate::chain::{AllowanceGate, OptionContract, ReceiptStatus};
use crate::options::params::{approval_amount, normalize, NormalizedParams, OptionForm};
use crate::types::{unix_now, ChainError, WorkflowError};

pub struct CreateOptionWorkflow {
    gate: AllowanceGate,
    contract: OptionContract,
    policy: ConfirmationPolicy,
    status: watch::Sender<WorkflowStatus>,
}

impl CreateOptionWorkflow {
    pub fn new(
        contract: OptionContract,
        usdc: Address,
        owner: Option<Address>,
        policy: ConfirmationPolicy,
    ) -> Self {
        let (status, _) = watch::channel(WorkflowStatus::new());
        Self {
            gate: AllowanceGate::new(contract.clone(), usdc, owner),
            contract,
            policy,
            status,
        }
    }

    pub fn owner(&self) -> Option<Address> {
        self.gate.owner()
    }

    pub fn policy(&self) -> ConfirmationPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PendingAction {
        self.status.borrow().state
    }

    fn transition(&self, state: PendingAction) {
        let owner = self.gate.owner();
        self.status.send_modify(|s| s.set_state(state));
        debug!(owner = ?owner, state = ?state, "Workflow transition");
    }

    /// Record `err` and return to `ready`
    pub fn record_failure(&self, err: &WorkflowError) {
        warn!(owner = ?self.gate.owner(), error = %err, "Create option workflow failed");
        let message = err.to_string();
        self.status.send_modify(|s| {
            s.set_state(PendingAction::Ready);
            s.last_error = Some(message);
        });
    }

    /// Fresh allowance read, published on success
    async fn refresh(&mut self) -> Result<U256, ChainError> {
        let value = self.gate.force_refresh().await?;
        self.status.send_modify(|s| s.allowance = Some(value));
        Ok(value)
    }

    /// Initial allowance check. Ends in `ready` whether or not the read
    /// succeeded; a failed read leaves the allowance unknown.
    pub async fn check(&mut self) -> Option<U256> {
        self.transition(PendingAction::Checking);

        let result = self.refresh().await;
        let allowance = match result {
            Ok(value) => {
                self.status.send_modify(|s| s.last_error = None);
                Some(value)
            }
            Err(e) => {
                let err = WorkflowError::AllowanceRead(e);
                warn!(owner = ?self.gate.owner(), error = %err, "Initial allowance check failed");
                let message = err.to_string();
                self.status.send_modify(|s| {
                    s.allowance = None;
                    s.last_error = Some(message);
                });
                None
            }
        };

        self.transition(PendingAction::Ready);
        allowance
    }

    pub async fn submit(&mut self, form: &OptionForm) -> Result<TxHash, WorkflowError> {
        self.submit_at(form, unix_now()).await
    }

    /// Submit with an explicit clock, used to validate the expiry
    pub async fn submit_at(
        &mut self,
        form: &OptionForm,
        now: u64,
    ) -> Result<TxHash, WorkflowError> {
        let state = self.state();
        if !state.accepts_submit() {
            return Err(WorkflowError::NotReady { state });
        }

        match self.execute(form, now).await {
            Ok(tx) => {
                info!(owner = ?self.gate.owner(), tx = %tx, "Put option created");
                self.status.send_modify(|s| {
                    s.set_state(PendingAction::Done);
                    s.create_tx = Some(tx);
                    s.last_error = None;
                });
                Ok(tx)
            }
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn execute(&mut self, form: &OptionForm, now: u64) -> Result<TxHash, WorkflowError> {
        let params = normalize(form, now)?;
        let owner = self.gate.owner().ok_or(WorkflowError::WalletNotConnected)?;
        let required = params.required_allowance();

        self.status.send_modify(|s| {
            s.required_allowance = Some(required);
            s.approval_tx = None;
            s.poll_attempts = 0;
            s.last_error = None;
        });

        let current = self
            .gate
            .current_allowance()
            .await
            .map_err(WorkflowError::AllowanceRead)?;

        if AllowanceGate::needs_approval(current, required) {
            self.transition(PendingAction::Approving);
            self.approve(owner, required).await?;
        } else {
            debug!(
                allowance = %current,
                required = %required,
                "Allowance sufficient, skipping approval"
            );
        }

        self.transition(PendingAction::Creating);
        self.create(owner, &params, required).await
    }

    async fn approve(&mut self, owner: Address, required: U256) -> Result<U256, WorkflowError> {
        let amount = approval_amount(required);
        let tx = self
            .contract
            .approve(owner, self.gate.token(), amount)
            .await
            .map_err(WorkflowError::ApprovalSubmission)?;

        info!(owner = %owner, amount = %amount, tx = ?tx, "USDC approval submitted");
        self.status.send_modify(|s| s.approval_tx = tx);

        match self.policy.mode {
            ConfirmationMode::Poll => self.poll_allowance(required).await,
            ConfirmationMode::Receipt => {
                let tx = tx.ok_or(WorkflowError::ApprovalSubmission(
                    ChainError::MissingTransactionHash,
                ))?;
                self.await_receipt(tx, required).await
            }
        }
    }

    /// Sleep, then read, up to `max_attempts` times. A failed read uses up
    /// its attempt.
    async fn poll_allowance(&mut self, required: U256) -> Result<U256, WorkflowError> {
        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;
            self.status.send_modify(|s| s.poll_attempts = attempt);

            match self.refresh().await {
                Ok(current) if current >= required => {
                    info!(attempt, allowance = %current, "Approval confirmed");
                    return Ok(current);
                }
                Ok(current) => {
                    debug!(attempt, allowance = %current, required = %required, "Approval pending");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Allowance poll failed");
                }
            }
        }

        Err(WorkflowError::ApprovalTimeout {
            waited: self.policy.budget(),
            required,
        })
    }

    async fn await_receipt(&mut self, tx: TxHash, required: U256) -> Result<U256, WorkflowError> {
        let budget = self.policy.budget();
        match tokio::time::timeout(budget, self.contract.wait_for_receipt(tx)).await {
            Err(_) => {
                return Err(WorkflowError::ApprovalTimeout {
                    waited: budget,
                    required,
                })
            }
            Ok(Ok(ReceiptStatus::Reverted)) => {
                return Err(WorkflowError::ApprovalSubmission(ChainError::Reverted(tx)))
            }
            Ok(Ok(ReceiptStatus::Success)) => {
                info!(tx = %tx, "Approval receipt received");
            }
            Ok(Err(e)) => {
                warn!(tx = %tx, error = %e, "Receipt lookup failed, re-reading allowance");
            }
        }

        let current = self.refresh().await.map_err(WorkflowError::AllowanceRead)?;
        if current >= required {
            Ok(current)
        } else {
            warn!(
                tx = %tx,
                allowance = %current,
                required = %required,
                "Allowance still short after receipt"
            );
            Err(WorkflowError::ApprovalTimeout {
                waited: budget,
                required,
            })
        }
    }

    /// Re-check the allowance, then submit `createPutOpt`
    async fn create(
        &mut self,
        owner: Address,
        params: &NormalizedParams,
        required: U256,
    ) -> Result<TxHash, WorkflowError> {
        let current = self.refresh().await.map_err(WorkflowError::AllowanceRead)?;
        if current < required {
            return Err(WorkflowError::InsufficientAllowance { current, required });
        }

        self.contract
            .create_put_option(owner, params)
            .await
            .map_err(WorkflowError::CreateSubmission)?
            .ok_or(WorkflowError::CreateSubmission(
                ChainError::MissingTransactionHash,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxChain;
    use std::sync::Arc;
    use std::time::Duration;

    const NOW: u64 = 1_760_000_000;
    const STRIKE: u64 = 100_000_000;

    fn owner() -> Address {
        Address::repeat_byte(0x0a)
    }

    fn form() -> OptionForm {
        OptionForm {
            asset_address: format!("{}", Address::repeat_byte(0x42)),
            amount: "1".into(),
            strike_price: "100".into(),
            premium_price: "5".into(),
            expiration_date: "2030-12-31".into(),
        }
    }

    fn workflow(chain: &Arc<SandboxChain>, mode: ConfirmationMode) -> CreateOptionWorkflow {
        let contract = OptionContract::new(chain.clone(), chain.option_contract());
        let policy = ConfirmationPolicy {
            mode,
            ..ConfirmationPolicy::default()
        };
        CreateOptionWorkflow::new(contract, chain.usdc(), Some(owner()), policy)
    }

    #[tokio::test(start_paused = true)]
    async fn test_approve_then_create() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(3));
        let mut wf = workflow(&chain, ConfirmationMode::Poll);

        assert_eq!(wf.check().await, Some(U256::ZERO));
        assert_eq!(wf.state(), PendingAction::Ready);

        let tx = wf.submit_at(&form(), NOW).await.unwrap();
        let status = wf.status();
        assert_eq!(status.state, PendingAction::Done);
        assert_eq!(status.label, "Option placed successfully!");
        assert_eq!(status.create_tx, Some(tx));
        assert_eq!(status.poll_attempts, 3);

        let stats = chain.stats();
        assert_eq!(stats.approvals, vec![U256::from(110_000_000u64)]);
        assert_eq!(stats.creates, 1);
        // check + three polls + final re-check
        assert_eq!(stats.allowance_reads, 5);
        assert_eq!(chain.allowance_of(owner()), U256::from(10_000_000u64));

        let created = &chain.options()[0];
        assert_eq!(created.seller, owner());
        assert_eq!(created.strike, U256::from(STRIKE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sufficient_allowance_skips_approval() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(150_000_000u64));
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        let mut rx = wf.subscribe();

        wf.check().await;
        wf.submit_at(&form(), NOW).await.unwrap();

        let stats = chain.stats();
        assert!(stats.approvals.is_empty());
        assert_eq!(stats.creates, 1);
        assert_eq!(stats.allowance_reads, 2);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, PendingAction::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_never_lands_times_out() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(1));
        chain.hold_approvals(true);
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        wf.check().await;

        let started = tokio::time::Instant::now();
        let err = wf.submit_at(&form(), NOW).await.unwrap_err();

        assert!(matches!(err, WorkflowError::ApprovalTimeout { .. }));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30) && waited < Duration::from_secs(31));
        let stats = chain.stats();
        assert_eq!(stats.allowance_reads, 31);
        assert_eq!(stats.creates, 0);

        let status = wf.status();
        assert_eq!(status.state, PendingAction::Ready);
        assert_eq!(status.poll_attempts, 30);
        assert!(status.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_check_leaves_allowance_unknown() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(150_000_000u64));
        chain.fail_allowance_reads(1);
        let mut wf = workflow(&chain, ConfirmationMode::Poll);

        assert_eq!(wf.check().await, None);
        let status = wf.status();
        assert_eq!(status.state, PendingAction::Ready);
        assert_eq!(status.allowance, None);
        assert!(status.last_error.is_some());

        // submit reads through and proceeds
        wf.submit_at(&form(), NOW).await.unwrap();
        assert!(chain.stats().approvals.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_allowance_drop_before_create_is_caught() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(100));
        chain.script_allowance_reads([
            U256::ZERO,
            U256::from(150_000_000u64),
            U256::from(50_000_000u64),
        ]);
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        match err {
            WorkflowError::InsufficientAllowance { current, .. } => {
                assert_eq!(current, U256::from(50_000_000u64))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(chain.stats().creates, 0);
        assert_eq!(wf.state(), PendingAction::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_confirmation() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(50));
        let mut wf = workflow(&chain, ConfirmationMode::Receipt);
        wf.check().await;

        wf.submit_at(&form(), NOW).await.unwrap();
        let stats = chain.stats();
        // check + post-receipt re-read + final re-check
        assert_eq!(stats.allowance_reads, 3);
        assert_eq!(stats.creates, 1);
        assert_eq!(wf.status().poll_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_timeout_and_revert() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(5));
        chain.hold_approvals(true);
        let mut wf = workflow(&chain, ConfirmationMode::Receipt);
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ApprovalTimeout { .. }));

        chain.hold_approvals(false);
        chain.revert_approvals(true);
        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ApprovalSubmission(ChainError::Reverted(_))
        ));
        assert_eq!(chain.stats().creates, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_with_short_allowance_is_a_timeout() {
        let chain = Arc::new(SandboxChain::with_inclusion_reads(50));
        chain.script_allowance_reads([U256::ZERO, U256::ZERO]);
        let mut wf = workflow(&chain, ConfirmationMode::Receipt);
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        match err {
            WorkflowError::ApprovalTimeout { waited, required } => {
                assert_eq!(waited, Duration::from_secs(30));
                assert_eq!(required, U256::from(STRIKE));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let stats = chain.stats();
        assert_eq!(stats.approvals.len(), 1);
        assert_eq!(stats.allowance_reads, 2);
        assert_eq!(stats.creates, 0);
        assert_eq!(wf.state(), PendingAction::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_approval_returns_to_ready() {
        let chain = Arc::new(SandboxChain::new());
        chain.reject_approvals(true);
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ApprovalSubmission(_)));
        assert_eq!(wf.state(), PendingAction::Ready);

        // retry succeeds once the wallet signs
        chain.reject_approvals(false);
        wf.submit_at(&form(), NOW).await.unwrap();
        assert_eq!(wf.state(), PendingAction::Done);
    }

    #[tokio::test]
    async fn test_missing_create_hash_is_an_error() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(STRIKE));
        chain.omit_create_hash(true);
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::CreateSubmission(ChainError::MissingTransactionHash)
        ));
        assert_eq!(wf.state(), PendingAction::Ready);
    }

    #[tokio::test]
    async fn test_rejected_create_returns_to_ready() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(STRIKE));
        chain.reject_creates(true);
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::CreateSubmission(ChainError::Rpc { .. })
        ));
        assert_eq!(wf.state(), PendingAction::Ready);
        assert!(wf.status().last_error.is_some());
        assert_eq!(chain.stats().creates, 0);
        assert_eq!(chain.allowance_of(owner()), U256::from(STRIKE));
    }

    #[tokio::test]
    async fn test_validation_and_wallet_errors() {
        let chain = Arc::new(SandboxChain::new());
        let contract = OptionContract::new(chain.clone(), chain.option_contract());
        let mut wf =
            CreateOptionWorkflow::new(contract, chain.usdc(), None, ConfirmationPolicy::default());
        wf.check().await;

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(err, WorkflowError::WalletNotConnected));

        let mut bad = form();
        bad.strike_price = "0".into();
        let err = wf.submit_at(&bad, NOW).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(chain.stats().allowance_reads, 0);
    }

    #[tokio::test]
    async fn test_past_expiry_fails_before_any_chain_call() {
        let chain = Arc::new(SandboxChain::new());
        let mut wf = workflow(&chain, ConfirmationMode::Poll);
        wf.check().await;
        let reads_after_check = chain.stats().allowance_reads;

        let mut past = form();
        past.expiration_date = "2020-01-01".into();
        let err = wf.submit_at(&past, NOW).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        let stats = chain.stats();
        assert_eq!(stats.allowance_reads, reads_after_check);
        assert!(stats.approvals.is_empty());
        assert_eq!(wf.state(), PendingAction::Ready);
    }

    #[tokio::test]
    async fn test_submit_rejected_unless_ready() {
        let chain = Arc::new(SandboxChain::new());
        chain.set_allowance(owner(), U256::from(STRIKE));
        let mut wf = workflow(&chain, ConfirmationMode::Poll);

        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotReady {
                state: PendingAction::Checking
            }
        ));

        wf.check().await;
        wf.submit_at(&form(), NOW).await.unwrap();
        let err = wf.submit_at(&form(), NOW).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotReady {
                state: PendingAction::Done
            }
        ));
        assert_eq!(chain.stats().creates, 1);
    }
}
