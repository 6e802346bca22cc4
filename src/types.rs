//! Core types and data structures for grower payments

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Composite cheque key: series plus number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChequeId {
    /// Cheque series (e.g. "A" for advance runs, "F" for final runs)
    pub series: String,
    /// Cheque number within the series
    pub number: i64,
}

impl ChequeId {
    /// Create a new cheque identifier
    pub fn new(series: impl Into<String>, number: i64) -> Self {
        Self {
            series: series.into(),
            number,
        }
    }
}

impl fmt::Display for ChequeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.series, self.number)
    }
}

/// Lifecycle of a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Counted toward batches and cheques
    Active,
    /// Terminal; no longer contributes to any batch or cheque
    Voided,
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptStatus::Active => write!(f, "Active"),
            ReceiptStatus::Voided => write!(f, "Voided"),
        }
    }
}

/// Lifecycle of a payment batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    Draft,
    Finalized,
    Paid,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Draft => write!(f, "Draft"),
            BatchStatus::Finalized => write!(f, "Finalized"),
            BatchStatus::Paid => write!(f, "Paid"),
        }
    }
}

/// Lifecycle of an issued cheque
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChequeStatus {
    Issued,
    Void,
    Cleared,
}

/// A full receipt record as taken on intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub grower_id: String,
    /// Batch the receipt was paid in, if it has been batched
    pub batch_id: Option<String>,
    pub receipt_date: NaiveDate,
    pub product_id: String,
    pub process_id: String,
    /// Quality grade (1-3)
    pub grade: u8,
    pub gross_weight: BigDecimal,
    pub tare_weight: BigDecimal,
    /// Weight after tare and dock
    pub net_weight: BigDecimal,
    /// Percentage docked from the weight for defects
    pub dock_percent: BigDecimal,
    /// Amount owed to the grower for this receipt
    pub amount: BigDecimal,
    pub status: ReceiptStatus,
}

impl Receipt {
    /// Project the receipt onto the line shape used in cheque breakdowns
    pub fn to_line(&self) -> ReceiptLine {
        ReceiptLine {
            receipt_id: self.receipt_id.clone(),
            batch_id: self.batch_id.clone(),
            grower_id: self.grower_id.clone(),
            receipt_date: self.receipt_date,
            product_id: self.product_id.clone(),
            grade: self.grade,
            net_weight: self.net_weight.clone(),
            amount: self.amount.clone(),
            status: self.status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReceiptStatus::Active
    }
}

/// Receipt line item as paid on a cheque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub receipt_id: String,
    pub batch_id: Option<String>,
    pub grower_id: String,
    pub receipt_date: NaiveDate,
    pub product_id: String,
    pub grade: u8,
    pub net_weight: BigDecimal,
    pub amount: BigDecimal,
    pub status: ReceiptStatus,
}

impl ReceiptLine {
    /// Amount this line contributes to a subtotal; voided lines contribute nothing
    pub fn payable_amount(&self) -> BigDecimal {
        match self.status {
            ReceiptStatus::Active => self.amount.clone(),
            ReceiptStatus::Voided => BigDecimal::from(0),
        }
    }
}

/// A named collection of receipts paid in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBatch {
    pub batch_id: String,
    /// Operator-facing batch number
    pub batch_number: String,
    pub status: BatchStatus,
}

impl PaymentBatch {
    pub fn new(
        batch_id: impl Into<String>,
        batch_number: impl Into<String>,
        status: BatchStatus,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            batch_number: batch_number.into(),
            status,
        }
    }
}

/// Repayment of an earlier advance cheque taken from the current cheque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceDeduction {
    /// The advance cheque being repaid
    pub advance_cheque_id: ChequeId,
    /// Amount of the original advance
    pub advance_amount: BigDecimal,
    /// Portion deducted on the current cheque
    pub deduction_amount: BigDecimal,
}

/// Cheque header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cheque {
    pub cheque_id: ChequeId,
    pub grower_id: String,
    pub payee_name: String,
    pub cheque_date: NaiveDate,
    pub gross_amount: BigDecimal,
    /// Net amount fixed at issuance; authoritative
    pub recorded_amount: BigDecimal,
    pub status: ChequeStatus,
    /// Grower's season-to-date running total as kept on the grower record
    pub grower_running_total: BigDecimal,
}

/// Prior cheque shown in a grower's payment history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeSummary {
    pub cheque_id: ChequeId,
    pub cheque_date: NaiveDate,
    pub net_amount: BigDecimal,
    pub status: ChequeStatus,
}

/// Audit record attached to a receipt status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub change_id: Uuid,
    pub reason: String,
    pub actor: String,
    pub changed_at: NaiveDateTime,
}

impl StatusChange {
    /// Create a new status change stamped with the current time
    pub fn new(reason: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            change_id: Uuid::new_v4(),
            reason: reason.into(),
            actor: actor.into(),
            changed_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Outcome reported by the batch provider after a void
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReassessment {
    pub reverted: bool,
    pub batch_number: String,
    pub status: BatchStatus,
}

/// Step of the void sequence, used to report where it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoidStep {
    LoadReceipt,
    MarkVoided,
    ReassessBatch,
}

impl fmt::Display for VoidStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoidStep::LoadReceipt => write!(f, "load receipt"),
            VoidStep::MarkVoided => write!(f, "mark receipt voided"),
            VoidStep::ReassessBatch => write!(f, "reassess batch status"),
        }
    }
}

/// Errors that can occur in the payment core
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Cheque not found: {0}")]
    ChequeNotFound(ChequeId),
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),
    #[error("Batch not found: {0}")]
    BatchNotFound(String),
    #[error("Receipt {receipt_id} is {found}, expected {expected}")]
    InvalidState {
        receipt_id: String,
        expected: ReceiptStatus,
        found: ReceiptStatus,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Malformed price table: {0}")]
    MalformedPriceTable(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Void of receipt {receipt_id} failed at step '{step}': {message}")]
    VoidFailed {
        receipt_id: String,
        step: VoidStep,
        message: String,
    },
}

/// Result type for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
