//! In-memory simulated chain
//!
//! Implements [`ChainClient`] for the USDC token and the put-option contract
//! without a node. Approvals are included after a configurable number of
//! allowance reads, which stands in for block production and lets tests
//! exercise the stale-allowance window deterministically. Faults can be
//! injected per call type.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::{address, keccak256, Address, Bytes, TxHash, U256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;

use crate::chain::abi::{IPutOptions, IERC20};
use crate::chain::client::{ChainClient, ReceiptStatus};
use crate::chain::contract::OptionRecord;
use crate::types::ChainError;

/// Address of the deployed option contract, reused as the sandbox default
pub const DEFAULT_OPTION_CONTRACT: Address = address!("C0915573ceCE1E73F5E15A0749875603fbb63746");

/// Synthetic USDC token address
pub const SANDBOX_USDC: Address = address!("00000000000000000000000000000000000005dc");

/// Counters for assertions and diagnostics
#[derive(Debug, Clone, Default)]
pub struct SandboxStats {
    /// Every `allowance` call, including failed ones
    pub allowance_reads: u32,
    /// Amounts of every accepted `approve`
    pub approvals: Vec<U256>,
    /// Accepted `createPutOpt` calls
    pub creates: u32,
}

#[derive(Debug, Default)]
struct Faults {
    failing_allowance_reads: u32,
    scripted_allowances: VecDeque<U256>,
    reject_approvals: bool,
    revert_approvals: bool,
    hold_approvals: bool,
    reject_creates: bool,
    omit_create_hash: bool,
}

#[derive(Debug)]
struct PendingApproval {
    tx: TxHash,
    owner: Address,
    amount: U256,
    reads_remaining: u32,
}

struct SandboxState {
    option_contract: Address,
    usdc: Address,
    inclusion_reads: u32,
    /// (owner, spender) -> allowance on USDC
    allowances: HashMap<(Address, Address), U256>,
    pending: Vec<PendingApproval>,
    receipts: HashMap<TxHash, ReceiptStatus>,
    options: Vec<OptionRecord>,
    nonce: u64,
    faults: Faults,
    stats: SandboxStats,
}

impl SandboxState {
    fn next_tx_hash(&mut self) -> TxHash {
        self.nonce += 1;
        keccak256(self.nonce.to_be_bytes())
    }

    fn apply_approval(&mut self, approval: &PendingApproval) {
        self.allowances
            .insert((approval.owner, self.option_contract), approval.amount);
        self.receipts.insert(approval.tx, ReceiptStatus::Success);
        tracing::debug!(tx = %approval.tx, amount = %approval.amount, "Sandbox: approval included");
    }

    /// Advance pending approvals by one read and include the ones that are due.
    fn tick(&mut self) {
        if self.faults.hold_approvals {
            return;
        }

        let mut due = Vec::new();
        self.pending.retain_mut(|p| {
            p.reads_remaining = p.reads_remaining.saturating_sub(1);
            if p.reads_remaining == 0 {
                due.push(PendingApproval {
                    tx: p.tx,
                    owner: p.owner,
                    amount: p.amount,
                    reads_remaining: 0,
                });
                false
            } else {
                true
            }
        });

        for approval in &due {
            self.apply_approval(approval);
        }
    }

    fn allowance(&self, owner: Address) -> U256 {
        self.allowances
            .get(&(owner, self.option_contract))
            .copied()
            .unwrap_or(U256::ZERO)
    }
}

pub struct SandboxChain {
    state: Mutex<SandboxState>,
}

impl SandboxChain {
    /// Sandbox where approvals are included immediately
    pub fn new() -> Self {
        Self::with_contract(DEFAULT_OPTION_CONTRACT, 0)
    }

    /// Sandbox where each approval becomes visible on the
    /// `inclusion_reads`-th allowance read after submission
    pub fn with_inclusion_reads(inclusion_reads: u32) -> Self {
        Self::with_contract(DEFAULT_OPTION_CONTRACT, inclusion_reads)
    }

    pub fn with_contract(option_contract: Address, inclusion_reads: u32) -> Self {
        Self {
            state: Mutex::new(SandboxState {
                option_contract,
                usdc: SANDBOX_USDC,
                inclusion_reads,
                allowances: HashMap::new(),
                pending: Vec::new(),
                receipts: HashMap::new(),
                options: Vec::new(),
                nonce: 0,
                faults: Faults::default(),
                stats: SandboxStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn option_contract(&self) -> Address {
        self.lock().option_contract
    }

    pub fn usdc(&self) -> Address {
        self.lock().usdc
    }

    pub fn stats(&self) -> SandboxStats {
        self.lock().stats.clone()
    }

    /// Allowance `owner` has granted the option contract, bypassing faults
    pub fn allowance_of(&self, owner: Address) -> U256 {
        self.lock().allowance(owner)
    }

    pub fn set_allowance(&self, owner: Address, amount: U256) {
        let mut state = self.lock();
        let spender = state.option_contract;
        state.allowances.insert((owner, spender), amount);
    }

    /// Make the next `count` allowance reads fail with an RPC error
    pub fn fail_allowance_reads(&self, count: u32) {
        self.lock().faults.failing_allowance_reads = count;
    }

    /// Return these values from the next allowance reads instead of state
    pub fn script_allowance_reads(&self, values: impl IntoIterator<Item = U256>) {
        self.lock().faults.scripted_allowances.extend(values);
    }

    pub fn reject_approvals(&self, reject: bool) {
        self.lock().faults.reject_approvals = reject;
    }

    /// Approvals get a hash but revert when included
    pub fn revert_approvals(&self, revert: bool) {
        self.lock().faults.revert_approvals = revert;
    }

    /// Approvals are accepted but never included
    pub fn hold_approvals(&self, hold: bool) {
        self.lock().faults.hold_approvals = hold;
    }

    pub fn reject_creates(&self, reject: bool) {
        self.lock().faults.reject_creates = reject;
    }

    /// `createPutOpt` succeeds without returning a transaction hash
    pub fn omit_create_hash(&self, omit: bool) {
        self.lock().faults.omit_create_hash = omit;
    }

    /// Insert an option directly, returning its index
    pub fn seed_option(&self, record: OptionRecord) -> u64 {
        let mut state = self.lock();
        state.options.push(record);
        (state.options.len() - 1) as u64
    }

    pub fn options(&self) -> Vec<OptionRecord> {
        self.lock().options.clone()
    }

    fn read_usdc(
        state: &mut SandboxState,
        selector: [u8; 4],
        data: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        if selector != IERC20::allowanceCall::SELECTOR {
            return Err(unsupported(selector));
        }

        let call = IERC20::allowanceCall::abi_decode(data)?;
        state.stats.allowance_reads += 1;
        state.tick();

        if state.faults.failing_allowance_reads > 0 {
            state.faults.failing_allowance_reads -= 1;
            return Err(ChainError::Rpc {
                code: -32603,
                message: "sandbox: allowance read failed".into(),
            });
        }

        let value = match state.faults.scripted_allowances.pop_front() {
            Some(value) => value,
            None if call.spender == state.option_contract => state.allowance(call.owner),
            None => U256::ZERO,
        };

        Ok(value.abi_encode())
    }

    fn read_option_contract(
        state: &SandboxState,
        selector: [u8; 4],
        data: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        if selector == IPutOptions::usdcCall::SELECTOR {
            Ok(state.usdc.abi_encode())
        } else if selector == IPutOptions::optCountCall::SELECTOR {
            Ok(U256::from(state.options.len()).abi_encode())
        } else if selector == IPutOptions::optsCall::SELECTOR {
            let call = IPutOptions::optsCall::abi_decode(data)?;
            let record = usize::try_from(call.index)
                .ok()
                .and_then(|i| state.options.get(i))
                .ok_or_else(|| ChainError::Rpc {
                    code: 3,
                    message: "execution reverted: option does not exist".into(),
                })?;
            let fields = (
                record.strike,
                record.premium,
                record.amount,
                record.expiry,
                record.seller,
                record.buyer,
                record.asset,
                record.asset_sent,
                record.fund_sent,
            );
            Ok(fields.abi_encode_params())
        } else {
            Err(unsupported(selector))
        }
    }

    fn approve(
        state: &mut SandboxState,
        from: Address,
        data: &[u8],
    ) -> Result<Option<TxHash>, ChainError> {
        let call = IERC20::approveCall::abi_decode(data)?;

        if state.faults.reject_approvals {
            return Err(ChainError::Rpc {
                code: 4001,
                message: "user rejected the request".into(),
            });
        }
        if call.spender != state.option_contract {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "sandbox: approvals are only modelled for the option contract".into(),
            });
        }

        let tx = state.next_tx_hash();
        state.stats.approvals.push(call.amount);

        let approval = PendingApproval {
            tx,
            owner: from,
            amount: call.amount,
            reads_remaining: state.inclusion_reads,
        };

        if state.faults.revert_approvals {
            state.receipts.insert(tx, ReceiptStatus::Reverted);
        } else if state.inclusion_reads == 0 && !state.faults.hold_approvals {
            state.apply_approval(&approval);
        } else {
            state.pending.push(approval);
        }

        tracing::info!(
            tx = %tx,
            owner = %from,
            amount = %call.amount,
            "Sandbox: approve submitted"
        );
        Ok(Some(tx))
    }

    fn create_put_option(
        state: &mut SandboxState,
        from: Address,
        data: &[u8],
    ) -> Result<Option<TxHash>, ChainError> {
        let call = IPutOptions::createPutOptCall::abi_decode(data)?;

        if state.faults.reject_creates {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "execution reverted".into(),
            });
        }

        // Same check the deployed contract performs: strike only
        let allowance = state.allowance(from);
        if allowance < call.strike {
            return Err(ChainError::Rpc {
                code: 3,
                message: "execution reverted: insufficient allowance".into(),
            });
        }
        let spender = state.option_contract;
        state
            .allowances
            .insert((from, spender), allowance - call.strike);

        state.options.push(OptionRecord {
            strike: call.strike,
            premium: call.premium,
            amount: call.amount,
            expiry: call.expiry,
            seller: from,
            buyer: Address::ZERO,
            asset: call.asset,
            asset_sent: false,
            fund_sent: false,
        });
        state.stats.creates += 1;

        let tx = state.next_tx_hash();
        state.receipts.insert(tx, ReceiptStatus::Success);
        tracing::info!(
            tx = %tx,
            seller = %from,
            index = state.options.len() - 1,
            "Sandbox: put option created"
        );

        if state.faults.omit_create_hash {
            Ok(None)
        } else {
            Ok(Some(tx))
        }
    }
}

impl Default for SandboxChain {
    fn default() -> Self {
        Self::new()
    }
}

fn selector_of(data: &[u8]) -> Result<[u8; 4], ChainError> {
    data.get(..4)
        .and_then(|s| <[u8; 4]>::try_from(s).ok())
        .ok_or_else(|| ChainError::Rpc {
            code: -32602,
            message: "calldata is shorter than a function selector".into(),
        })
}

fn unsupported(selector: [u8; 4]) -> ChainError {
    ChainError::Rpc {
        code: -32601,
        message: format!(
            "sandbox: unsupported call {}",
            Bytes::copy_from_slice(&selector)
        ),
    }
}

enum ReceiptWait {
    Ready(ReceiptStatus),
    Never,
}

#[async_trait]
impl ChainClient for SandboxChain {
    async fn read_contract(&self, address: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        let selector = selector_of(&calldata)?;
        let mut state = self.lock();

        let out = if address == state.usdc {
            Self::read_usdc(&mut state, selector, &calldata)?
        } else if address == state.option_contract {
            Self::read_option_contract(&state, selector, &calldata)?
        } else {
            return Err(ChainError::Rpc {
                code: -32000,
                message: format!("sandbox: no contract at {}", address),
            });
        };

        Ok(Bytes::from(out))
    }

    async fn write_contract(
        &self,
        from: Address,
        address: Address,
        calldata: Bytes,
    ) -> Result<Option<TxHash>, ChainError> {
        let selector = selector_of(&calldata)?;
        let mut state = self.lock();

        if address == state.usdc && selector == IERC20::approveCall::SELECTOR {
            Self::approve(&mut state, from, &calldata)
        } else if address == state.option_contract
            && selector == IPutOptions::createPutOptCall::SELECTOR
        {
            Self::create_put_option(&mut state, from, &calldata)
        } else {
            Err(unsupported(selector))
        }
    }

    /// Includes a pending approval immediately unless approvals are held, in
    /// which case the receipt never arrives.
    async fn wait_for_receipt(&self, tx: TxHash) -> Result<ReceiptStatus, ChainError> {
        let wait = {
            let mut state = self.lock();
            if let Some(status) = state.receipts.get(&tx) {
                ReceiptWait::Ready(*status)
            } else if let Some(pos) = state.pending.iter().position(|p| p.tx == tx) {
                if state.faults.hold_approvals {
                    ReceiptWait::Never
                } else {
                    let approval = state.pending.remove(pos);
                    state.apply_approval(&approval);
                    ReceiptWait::Ready(ReceiptStatus::Success)
                }
            } else {
                return Err(ChainError::Rpc {
                    code: -32000,
                    message: format!("sandbox: unknown transaction {}", tx),
                });
            }
        };

        match wait {
            ReceiptWait::Ready(status) => Ok(status),
            ReceiptWait::Never => std::future::pending().await,
        }
    }
}
