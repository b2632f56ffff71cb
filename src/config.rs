//! Service configuration from `HEDGEHOG_*` environment variables

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::options::params::parse_address;
use crate::sandbox::DEFAULT_OPTION_CONTRACT;
use crate::workflow::{ConfirmationMode, ConfirmationPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Node RPC endpoint; the in-process sandbox chain is used when unset
    pub rpc_url: Option<String>,
    pub option_contract: Address,
    /// Overrides the contract's `usdc()`
    pub usdc_address: Option<Address>,
    pub subgraph_url: Option<String>,
    pub confirmation: ConfirmationPolicy,
    pub sandbox_inclusion_reads: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            rpc_url: None,
            option_contract: DEFAULT_OPTION_CONTRACT,
            usdc_address: None,
            subgraph_url: None,
            confirmation: ConfirmationPolicy::default(),
            sandbox_inclusion_reads: 3,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = match get("HEDGEHOG_BIND_ADDR") {
            Some(v) => parse_value("HEDGEHOG_BIND_ADDR", &v)?,
            None => defaults.bind_addr,
        };

        let option_contract = match get("HEDGEHOG_OPTION_CONTRACT") {
            Some(v) => address_value("HEDGEHOG_OPTION_CONTRACT", &v)?,
            None => defaults.option_contract,
        };

        let usdc_address = get("HEDGEHOG_USDC_ADDRESS")
            .map(|v| address_value("HEDGEHOG_USDC_ADDRESS", &v))
            .transpose()?;

        let interval_ms: u64 = match get("HEDGEHOG_POLL_INTERVAL_MS") {
            Some(v) => parse_value("HEDGEHOG_POLL_INTERVAL_MS", &v)?,
            None => defaults.confirmation.interval.as_millis() as u64,
        };

        let max_attempts: u32 = match get("HEDGEHOG_MAX_POLL_ATTEMPTS") {
            Some(v) => parse_value("HEDGEHOG_MAX_POLL_ATTEMPTS", &v)?,
            None => defaults.confirmation.max_attempts,
        };
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "HEDGEHOG_MAX_POLL_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let interval = Duration::from_millis(interval_ms);
        if interval.checked_mul(max_attempts).is_none() {
            return Err(ConfigError::Invalid {
                var: "HEDGEHOG_POLL_INTERVAL_MS",
                value: interval_ms.to_string(),
                reason: format!("total wait over {} attempts overflows", max_attempts),
            });
        }

        let mode = match get("HEDGEHOG_CONFIRMATION") {
            Some(v) => parse_value::<ConfirmationMode>("HEDGEHOG_CONFIRMATION", &v)?,
            None => defaults.confirmation.mode,
        };

        let sandbox_inclusion_reads = match get("HEDGEHOG_SANDBOX_INCLUSION_READS") {
            Some(v) => parse_value("HEDGEHOG_SANDBOX_INCLUSION_READS", &v)?,
            None => defaults.sandbox_inclusion_reads,
        };

        Ok(Self {
            bind_addr,
            rpc_url: get("HEDGEHOG_RPC_URL"),
            option_contract,
            usdc_address,
            subgraph_url: get("HEDGEHOG_SUBGRAPH_URL"),
            confirmation: ConfirmationPolicy {
                mode,
                interval,
                max_attempts,
            },
            sandbox_inclusion_reads,
        })
    }

    pub fn uses_sandbox(&self) -> bool {
        self.rpc_url.is_none()
    }
}

fn parse_value<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn address_value(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    parse_address(var, value).map_err(|e| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
