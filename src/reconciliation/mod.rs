//! Cheque reconciliation engine
//!
//! Assembles a cheque's financial picture from the provider traits, checks the
//! computed net against the amount recorded at issuance, and runs the receipt
//! void cascade. The engine holds no state between calls beyond its providers
//! and configuration.

pub mod breakdown;
pub mod void;

pub use breakdown::*;
pub use void::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::pricing::{validate_price_table, PriceTable, PriceTableValidation};
use crate::traits::*;

/// Data source feeding one section of a breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSection {
    Batches,
    Receipts,
    Deductions,
    History,
}

impl fmt::Display for DataSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSection::Batches => write!(f, "batch"),
            DataSection::Receipts => write!(f, "receipt"),
            DataSection::Deductions => write!(f, "deduction"),
            DataSection::History => write!(f, "payment history"),
        }
    }
}

/// The collaborators the engine reads from and writes through
#[derive(Clone)]
pub struct Providers {
    pub cheques: Arc<dyn ChequeProvider>,
    pub receipts: Arc<dyn ReceiptProvider>,
    pub deductions: Arc<dyn DeductionProvider>,
    pub batches: Arc<dyn BatchProvider>,
    pub history: Arc<dyn HistoryProvider>,
}

impl Providers {
    /// Use one store for every provider
    pub fn from_store<S>(store: S) -> Self
    where
        S: ChequeProvider
            + ReceiptProvider
            + DeductionProvider
            + BatchProvider
            + HistoryProvider
            + Clone
            + 'static,
    {
        Self {
            cheques: Arc::new(store.clone()),
            receipts: Arc::new(store.clone()),
            deductions: Arc::new(store.clone()),
            batches: Arc::new(store.clone()),
            history: Arc::new(store),
        }
    }
}

/// Reconciliation engine over a set of providers
pub struct ReconciliationEngine {
    providers: Providers,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Create an engine backed by a single store
    pub fn new<S>(store: S) -> Self
    where
        S: ChequeProvider
            + ReceiptProvider
            + DeductionProvider
            + BatchProvider
            + HistoryProvider
            + Clone
            + 'static,
    {
        Self::with_providers(Providers::from_store(store))
    }

    /// Create an engine from separate providers
    pub fn with_providers(providers: Providers) -> Self {
        Self {
            providers,
            config: EngineConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check a price table may be saved
    pub fn validate_price_table(&self, table: &PriceTable) -> PriceTableValidation {
        validate_price_table(table)
    }
}
