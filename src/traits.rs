//! Provider traits the payment core reads from and writes through
//!
//! Persistence lives outside this crate. Each trait is a narrow contract over
//! one kind of record so the reconciliation logic can run against any backend
//! (the legacy SQL schema, a service client, or [`crate::utils::MemoryStore`]).

use async_trait::async_trait;

use crate::types::*;

/// Source of cheque headers and the batches paid on them
#[async_trait]
pub trait ChequeProvider: Send + Sync {
    /// Get a cheque header by ID
    async fn get_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Option<Cheque>>;

    /// List the batches associated with a cheque
    async fn get_batches_for_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Vec<PaymentBatch>>;
}

/// Source of receipts and the single point where receipt status changes
#[async_trait]
pub trait ReceiptProvider: Send + Sync {
    /// Get a receipt by ID
    async fn get_receipt(&self, receipt_id: &str) -> PaymentResult<Option<Receipt>>;

    /// List receipt lines paid on a cheque.
    ///
    /// Keyed by cheque rather than batch: legacy batches are sometimes only
    /// linked to their receipts through the cheque.
    async fn get_receipts_for_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Vec<ReceiptLine>>;

    /// List receipt lines belonging to a batch
    async fn get_receipts_for_batch(&self, batch_id: &str) -> PaymentResult<Vec<ReceiptLine>>;

    /// Move a receipt from `expected` to `status`.
    ///
    /// The update must be conditional on the current status being `expected`.
    /// Returns `false` when that condition did not hold and nothing changed.
    async fn set_receipt_status(
        &self,
        receipt_id: &str,
        expected: ReceiptStatus,
        status: ReceiptStatus,
        change: &StatusChange,
    ) -> PaymentResult<bool>;
}

/// Source of advance deductions taken on cheques
#[async_trait]
pub trait DeductionProvider: Send + Sync {
    /// List the advance deductions applied to a cheque
    async fn get_deductions_for_cheque(
        &self,
        cheque_id: &ChequeId,
    ) -> PaymentResult<Vec<AdvanceDeduction>>;
}

/// Owner of batch status rules
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Get a batch by ID
    async fn get_batch(&self, batch_id: &str) -> PaymentResult<Option<PaymentBatch>>;

    /// Re-evaluate a batch after one of its receipts was voided.
    ///
    /// Whether the batch reverts to draft is decided here, not by the caller.
    async fn reassess_batch_status(
        &self,
        batch_id: &str,
        triggering_receipt_id: &str,
    ) -> PaymentResult<BatchReassessment>;
}

/// Source of a grower's payment history
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// List the grower's cheques other than `excluding`, oldest first
    async fn get_prior_cheques(
        &self,
        grower_id: &str,
        excluding: &ChequeId,
    ) -> PaymentResult<Vec<ChequeSummary>>;
}
