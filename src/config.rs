//! Engine configuration

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::env;

use crate::types::{PaymentError, PaymentResult};
use crate::utils::money::{cent, parse_money};

/// Environment variable overriding the reconciliation tolerance
pub const TOLERANCE_ENV: &str = "GROWER_PAYMENTS_TOLERANCE";
/// Environment variable overriding the maximum void reason length
pub const MAX_REASON_LEN_ENV: &str = "GROWER_PAYMENTS_MAX_REASON_LEN";

/// Settings for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest difference between computed and recorded net still treated as equal
    pub reconciliation_tolerance: BigDecimal,
    /// Longest void reason accepted
    pub max_reason_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconciliation_tolerance: cent(),
            max_reason_length: 500,
        }
    }
}

impl EngineConfig {
    /// Load the configuration from the environment, falling back to defaults
    pub fn from_env() -> PaymentResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> PaymentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(TOLERANCE_ENV) {
            let tolerance = parse_money(&raw).ok_or_else(|| {
                PaymentError::Config(format!("{} is not a decimal: {}", TOLERANCE_ENV, raw))
            })?;
            if tolerance < BigDecimal::from(0) {
                return Err(PaymentError::Config(format!(
                    "{} cannot be negative: {}",
                    TOLERANCE_ENV, raw
                )));
            }
            config.reconciliation_tolerance = tolerance;
        }

        if let Some(raw) = lookup(MAX_REASON_LEN_ENV) {
            config.max_reason_length = raw
                .trim()
                .parse()
                .ok()
                .filter(|len: &usize| *len > 0)
                .ok_or_else(|| {
                    PaymentError::Config(format!(
                        "{} is not a positive integer: {}",
                        MAX_REASON_LEN_ENV, raw
                    ))
                })?;
        }

        Ok(config)
    }
}
