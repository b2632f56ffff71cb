//! Option view projection
//!
//! Maps on-chain or indexed option records into one display entity and splits
//! a listing into what the viewer can buy and what the viewer holds.

use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use serde::Serialize;

/// Display-ready option, independent of where it was read from.
///
/// Fields that a source does not provide are `None` rather than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: u64,
    pub asset: Option<Address>,
    pub amount: Option<U256>,
    pub strike: U256,
    pub premium: U256,
    pub expiry: u64,
    pub creator: Address,
    pub buyer: Option<Address>,
    pub is_call: bool,
    pub created_at: Option<u64>,
    pub asset_delivered: Option<bool>,
    pub funds_delivered: Option<bool>,
}

impl OptionView {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry <= now
    }

    /// Whether `viewer` bought or wrote this option.
    ///
    /// Addresses are compared as bytes, so hex case never matters.
    pub fn involves(&self, viewer: Address) -> bool {
        self.creator == viewer || self.buyer == Some(viewer)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptionPartition {
    pub available: Vec<OptionView>,
    pub owned: Vec<OptionView>,
}

/// Split options into `available` (unbought, live) and `owned` (live, bought
/// or written by `viewer`).
///
/// An option that qualifies for both goes to `owned` only. Expired options and
/// repeated ids are dropped. Input order is preserved.
pub fn partition<I>(options: I, viewer: Option<Address>, now: u64) -> OptionPartition
where
    I: IntoIterator<Item = OptionView>,
{
    let mut seen = HashSet::new();
    let mut result = OptionPartition::default();

    for option in options {
        if option.is_expired(now) || !seen.insert(option.id) {
            continue;
        }

        if viewer.is_some_and(|v| option.involves(v)) {
            result.owned.push(option);
        } else if option.buyer.is_none() {
            result.available.push(option);
        }
    }

    result
}
