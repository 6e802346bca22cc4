//! # Grower Payments Core
//!
//! Payment reconciliation for a produce packing operation: validating grower
//! price tables, breaking cheques down into the receipts, batches and advance
//! deductions behind them, and voiding receipts after payment.
//!
//! ## Features
//!
//! - **Price table validation**: advance and final rates never regress within a cell
//! - **Receipt pricing**: net weight after tare and dock, priced from the schedule in effect
//! - **Cheque breakdowns**: gross, deductions and net, checked against the recorded amount
//! - **Void cascade**: impact analysis, then an all-or-nothing receipt void with batch reassessment
//! - **Provider abstraction**: persistence-agnostic design with async provider traits
//!
//! ## Quick Start
//!
//! ```rust
//! use grower_payments_core::{validate_price_table, CellId, PriceCell, PriceTable, RateField};
//! use bigdecimal::BigDecimal;
//! use std::str::FromStr;
//!
//! let mut table = PriceTable::default();
//! let cell = CellId::new(1, 1).unwrap();
//! table.set_cell(
//!     cell,
//!     PriceCell::new(
//!         BigDecimal::from_str("1.00").unwrap(),
//!         BigDecimal::from_str("1.10").unwrap(),
//!         BigDecimal::from_str("1.05").unwrap(),
//!         BigDecimal::from_str("1.10").unwrap(),
//!     ),
//! );
//!
//! let result = validate_price_table(&table);
//! assert!(!result.is_valid);
//! assert!(result.is_flagged(cell, RateField::Advance3));
//! ```

pub mod config;
pub mod pricing;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use pricing::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
