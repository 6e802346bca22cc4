//! Receipt void cascade: impact analysis and execution

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{error, info, instrument, warn};

use super::ReconciliationEngine;
use crate::traits::*;
use crate::types::*;
use crate::utils::money::format_money;
use crate::utils::validation::{validate_actor, validate_void_reason};

/// What voiding a receipt would change, computed without changing anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidImpact {
    pub receipt_id: String,
    /// Owner of the receipt
    pub grower_id: String,
    pub receipt_amount: BigDecimal,
    /// Batch the receipt was paid in, if it has been batched
    pub batch: Option<PaymentBatch>,
    pub batch_subtotal_before: BigDecimal,
    pub batch_subtotal_after: BigDecimal,
    /// Amount the batch loses
    pub amount_removed: BigDecimal,
    /// Every grower with active receipts in the batch, plus the owner
    pub affected_growers: BTreeSet<String>,
    /// Summary to show the operator before confirming
    pub message: String,
}

/// Outcome of a completed void
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidResult {
    pub receipt_id: String,
    pub voided_amount: BigDecimal,
    pub batch_id: Option<String>,
    /// Batch number after reassessment
    pub batch_number: Option<String>,
    /// Batch status after reassessment
    pub batch_status: Option<BatchStatus>,
    pub batch_reverted: bool,
    /// Audit record written with the status change
    pub change: StatusChange,
}

impl VoidResult {
    /// Summary suitable for a confirmation message
    pub fn message(&self) -> String {
        let mut message = format!(
            "Receipt {} voided ({})",
            self.receipt_id,
            format_money(&self.voided_amount)
        );
        if let Some(number) = &self.batch_number {
            if self.batch_reverted {
                message.push_str(&format!("; batch {} reverted to draft", number));
            } else {
                message.push_str(&format!("; batch {} unchanged", number));
            }
        }
        message
    }
}

impl ReconciliationEngine {
    /// Work out what voiding a receipt would affect.
    ///
    /// Advisory only: nothing is locked, and [`Self::void_receipt`] checks the
    /// receipt's state again when it runs.
    #[instrument(skip_all, fields(receipt = %receipt_id))]
    pub async fn analyze_void_impact(&self, receipt_id: &str) -> PaymentResult<VoidImpact> {
        let receipt = self
            .providers
            .receipts
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| PaymentError::ReceiptNotFound(receipt_id.to_string()))?;

        if !receipt.is_active() {
            return Err(PaymentError::InvalidState {
                receipt_id: receipt.receipt_id,
                expected: ReceiptStatus::Active,
                found: receipt.status,
            });
        }

        let mut affected_growers = BTreeSet::from([receipt.grower_id.clone()]);
        let (batch, subtotal_before) = match &receipt.batch_id {
            Some(batch_id) => {
                let batch = self
                    .providers
                    .batches
                    .get_batch(batch_id)
                    .await?
                    .ok_or_else(|| PaymentError::BatchNotFound(batch_id.clone()))?;
                let lines = self.providers.receipts.get_receipts_for_batch(batch_id).await?;

                affected_growers.extend(
                    lines
                        .iter()
                        .filter(|l| l.status == ReceiptStatus::Active)
                        .map(|l| l.grower_id.clone()),
                );
                let subtotal: BigDecimal = lines.iter().map(ReceiptLine::payable_amount).sum();
                (Some(batch), subtotal)
            }
            None => (None, BigDecimal::from(0)),
        };

        let amount_removed = if batch.is_some() {
            receipt.amount.clone()
        } else {
            BigDecimal::from(0)
        };
        let subtotal_after = &subtotal_before - &amount_removed;

        let message = impact_message(&receipt, batch.as_ref(), &amount_removed, &affected_growers);

        Ok(VoidImpact {
            receipt_id: receipt.receipt_id,
            grower_id: receipt.grower_id,
            receipt_amount: receipt.amount,
            batch,
            batch_subtotal_before: subtotal_before,
            batch_subtotal_after: subtotal_after,
            amount_removed,
            affected_growers,
            message,
        })
    }

    /// Void a receipt and have its batch reassessed.
    ///
    /// Either the receipt ends up voided with its batch reassessed, or the
    /// receipt is left active and the failing step is reported.
    ///
    /// A receipt that was never batched has no batch to reassess, so it is
    /// voided without a reassessment call and the result carries no batch.
    #[instrument(skip_all, fields(receipt = %receipt_id, actor = %actor))]
    pub async fn void_receipt(
        &self,
        receipt_id: &str,
        reason: &str,
        actor: &str,
    ) -> PaymentResult<VoidResult> {
        validate_void_reason(reason, self.config.max_reason_length)?;
        validate_actor(actor)?;

        let receipts = &self.providers.receipts;
        let receipt = receipts
            .get_receipt(receipt_id)
            .await
            .map_err(|e| PaymentError::VoidFailed {
                receipt_id: receipt_id.to_string(),
                step: VoidStep::LoadReceipt,
                message: e.to_string(),
            })?
            .ok_or_else(|| PaymentError::ReceiptNotFound(receipt_id.to_string()))?;

        if !receipt.is_active() {
            warn!(receipt = %receipt_id, status = %receipt.status, "void refused");
            return Err(PaymentError::InvalidState {
                receipt_id: receipt.receipt_id,
                expected: ReceiptStatus::Active,
                found: receipt.status,
            });
        }

        let change = StatusChange::new(reason.trim(), actor.trim());
        let updated = receipts
            .set_receipt_status(receipt_id, ReceiptStatus::Active, ReceiptStatus::Voided, &change)
            .await
            .map_err(|e| {
                error!(receipt = %receipt_id, error = %e, "marking receipt voided failed");
                PaymentError::VoidFailed {
                    receipt_id: receipt_id.to_string(),
                    step: VoidStep::MarkVoided,
                    message: e.to_string(),
                }
            })?;

        // A failed conditional update means another void got there first.
        if !updated {
            warn!(receipt = %receipt_id, "receipt changed state before void");
            return Err(PaymentError::InvalidState {
                receipt_id: receipt_id.to_string(),
                expected: ReceiptStatus::Active,
                found: ReceiptStatus::Voided,
            });
        }

        let reassessment = match &receipt.batch_id {
            Some(batch_id) => {
                match self
                    .providers
                    .batches
                    .reassess_batch_status(batch_id, receipt_id)
                    .await
                {
                    Ok(reassessment) => Some(reassessment),
                    Err(e) => return Err(self.roll_back_void(receipt_id, actor, &change, e).await),
                }
            }
            None => None,
        };

        let result = VoidResult {
            receipt_id: receipt.receipt_id,
            voided_amount: receipt.amount,
            batch_id: receipt.batch_id,
            batch_reverted: reassessment.as_ref().is_some_and(|r| r.reverted),
            batch_number: reassessment.as_ref().map(|r| r.batch_number.clone()),
            batch_status: reassessment.as_ref().map(|r| r.status),
            change,
        };

        info!(
            receipt = %result.receipt_id,
            amount = %result.voided_amount,
            batch_reverted = result.batch_reverted,
            change_id = %result.change.change_id,
            "receipt voided"
        );
        Ok(result)
    }

    /// Restore a receipt to active after the batch step failed
    async fn roll_back_void(
        &self,
        receipt_id: &str,
        actor: &str,
        change: &StatusChange,
        cause: PaymentError,
    ) -> PaymentError {
        error!(receipt = %receipt_id, error = %cause, "batch reassessment failed, restoring receipt");

        let rollback = StatusChange::new(format!("rollback of void {}", change.change_id), actor);
        let restored = self
            .providers
            .receipts
            .set_receipt_status(receipt_id, ReceiptStatus::Voided, ReceiptStatus::Active, &rollback)
            .await;

        let message = match restored {
            Ok(true) => format!("{}; receipt restored to active", cause),
            Ok(false) => {
                error!(receipt = %receipt_id, "receipt was no longer voided during rollback");
                format!("{}; receipt could not be restored: status changed", cause)
            }
            Err(e) => {
                error!(receipt = %receipt_id, error = %e, "rollback failed");
                format!("{}; receipt could not be restored: {}", cause, e)
            }
        };

        PaymentError::VoidFailed {
            receipt_id: receipt_id.to_string(),
            step: VoidStep::ReassessBatch,
            message,
        }
    }
}

fn impact_message(
    receipt: &Receipt,
    batch: Option<&PaymentBatch>,
    amount_removed: &BigDecimal,
    affected_growers: &BTreeSet<String>,
) -> String {
    let growers = affected_growers
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    match batch {
        Some(batch) => format!(
            "Voiding receipt {} removes {} from batch {} ({}). Affected growers: {}. This cannot be undone.",
            receipt.receipt_id,
            format_money(amount_removed),
            batch.batch_number,
            batch.status,
            growers
        ),
        None => format!(
            "Voiding receipt {} ({}) affects grower {}; it is not in any batch. This cannot be undone.",
            receipt.receipt_id,
            format_money(&receipt.amount),
            receipt.grower_id
        ),
    }
}
