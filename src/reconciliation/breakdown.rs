//! Cheque breakdown assembly and reconciliation check

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{DataSection, ReconciliationEngine};
use crate::traits::*;
use crate::types::*;
use crate::utils::money::amounts_match;

/// Non-fatal condition found while assembling a breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BreakdownWarning {
    /// A data source failed or returned nothing; that section is empty or partial
    IncompleteData { section: DataSection, detail: String },
    /// Computed net differs from the amount recorded on the cheque
    ReconciliationMismatch {
        computed: BigDecimal,
        recorded: BigDecimal,
    },
}

/// Receipts paid on a cheque through one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchBreakdown {
    /// Batch the receipts name, if any
    pub batch_id: Option<String>,
    /// Batch record, when the cheque lists it
    pub batch: Option<PaymentBatch>,
    pub lines: Vec<ReceiptLine>,
    /// Sum of the active receipts' amounts
    pub subtotal: BigDecimal,
}

impl BatchBreakdown {
    fn new(batch_id: Option<String>, batch: Option<PaymentBatch>, lines: Vec<ReceiptLine>) -> Self {
        let subtotal = lines.iter().map(ReceiptLine::payable_amount).sum();
        Self {
            batch_id,
            batch,
            lines,
            subtotal,
        }
    }

    pub fn batch_number(&self) -> Option<&str> {
        self.batch.as_ref().map(|b| b.batch_number.as_str())
    }
}

/// Gross, deduction and net figures for a cheque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeTotals {
    pub gross: BigDecimal,
    pub deductions: BigDecimal,
    /// Gross less deductions
    pub net: BigDecimal,
    /// Net amount recorded on the cheque at issuance
    pub recorded: BigDecimal,
    /// Computed net less recorded
    pub difference: BigDecimal,
}

/// Complete financial picture of one cheque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeBreakdown {
    pub cheque: Cheque,
    pub batches: Vec<BatchBreakdown>,
    pub deductions: Vec<AdvanceDeduction>,
    pub totals: ChequeTotals,
    /// The grower's other cheques, oldest first
    pub history: Vec<ChequeSummary>,
    /// Taken from the grower's running total, not summed from history
    pub season_to_date: BigDecimal,
    pub warnings: Vec<BreakdownWarning>,
}

impl ChequeBreakdown {
    /// True when the computed net agrees with the recorded amount
    pub fn is_reconciled(&self) -> bool {
        self.mismatch().is_none()
    }

    /// Computed and recorded amounts, when they disagree
    pub fn mismatch(&self) -> Option<(&BigDecimal, &BigDecimal)> {
        self.warnings.iter().find_map(|w| match w {
            BreakdownWarning::ReconciliationMismatch { computed, recorded } => {
                Some((computed, recorded))
            }
            _ => None,
        })
    }

    /// Sections that could not be loaded completely
    pub fn incomplete_sections(&self) -> Vec<DataSection> {
        let mut sections: Vec<DataSection> = Vec::new();
        for warning in &self.warnings {
            if let BreakdownWarning::IncompleteData { section, .. } = warning {
                if !sections.contains(section) {
                    sections.push(*section);
                }
            }
        }
        sections
    }

    pub fn receipt_count(&self) -> usize {
        self.batches.iter().map(|b| b.lines.len()).sum()
    }
}

/// Unwrap a section read, recording a warning and falling back to empty on failure
fn degrade<T>(
    result: PaymentResult<Vec<T>>,
    section: DataSection,
    cheque_id: &ChequeId,
    warnings: &mut Vec<BreakdownWarning>,
) -> (Vec<T>, bool) {
    match result {
        Ok(items) => {
            debug!(cheque = %cheque_id, %section, count = items.len(), "loaded section");
            (items, true)
        }
        Err(e) => {
            warn!(cheque = %cheque_id, %section, error = %e, "section unavailable");
            warnings.push(BreakdownWarning::IncompleteData {
                section,
                detail: format!("{} data unavailable: {}", section, e),
            });
            (Vec::new(), false)
        }
    }
}

impl ReconciliationEngine {
    /// Build the breakdown of a cheque.
    ///
    /// `cached_deductions` is used as-is when it holds at least one deduction;
    /// otherwise deductions are fetched from the provider. Only a missing cheque
    /// header aborts; every other gap is reported as a warning.
    #[instrument(skip_all, fields(cheque = %cheque_id))]
    pub async fn build_cheque_breakdown(
        &self,
        cheque_id: &ChequeId,
        cached_deductions: Option<Vec<AdvanceDeduction>>,
    ) -> PaymentResult<ChequeBreakdown> {
        let cheque = self
            .providers
            .cheques
            .get_cheque(cheque_id)
            .await?
            .ok_or_else(|| PaymentError::ChequeNotFound(cheque_id.clone()))?;

        let mut warnings = Vec::new();

        let (batches, batches_loaded) = degrade(
            self.providers.cheques.get_batches_for_cheque(cheque_id).await,
            DataSection::Batches,
            cheque_id,
            &mut warnings,
        );
        let (lines, receipts_loaded) = degrade(
            self.providers.receipts.get_receipts_for_cheque(cheque_id).await,
            DataSection::Receipts,
            cheque_id,
            &mut warnings,
        );

        let batch_breakdowns = group_by_batch(
            cheque_id,
            batches,
            lines,
            batches_loaded,
            receipts_loaded,
            &mut warnings,
        );

        let deductions = match cached_deductions {
            Some(cached) if !cached.is_empty() => cached,
            _ => {
                degrade(
                    self.providers
                        .deductions
                        .get_deductions_for_cheque(cheque_id)
                        .await,
                    DataSection::Deductions,
                    cheque_id,
                    &mut warnings,
                )
                .0
            }
        };

        let gross: BigDecimal = batch_breakdowns.iter().map(|b| &b.subtotal).sum();
        let total_deductions: BigDecimal = deductions.iter().map(|d| &d.deduction_amount).sum();
        let net = &gross - &total_deductions;
        let difference = &net - &cheque.recorded_amount;

        if !amounts_match(&net, &cheque.recorded_amount, &self.config.reconciliation_tolerance) {
            warn!(
                cheque = %cheque_id,
                computed = %net,
                recorded = %cheque.recorded_amount,
                "cheque does not reconcile"
            );
            warnings.push(BreakdownWarning::ReconciliationMismatch {
                computed: net.clone(),
                recorded: cheque.recorded_amount.clone(),
            });
        }

        let (mut history, _) = degrade(
            self.providers
                .history
                .get_prior_cheques(&cheque.grower_id, cheque_id)
                .await,
            DataSection::History,
            cheque_id,
            &mut warnings,
        );
        history.retain(|h| &h.cheque_id != cheque_id);
        history.sort_by_key(|h| h.cheque_date);

        let totals = ChequeTotals {
            gross,
            deductions: total_deductions,
            net,
            recorded: cheque.recorded_amount.clone(),
            difference,
        };
        let season_to_date = cheque.grower_running_total.clone();

        Ok(ChequeBreakdown {
            cheque,
            batches: batch_breakdowns,
            deductions,
            totals,
            history,
            season_to_date,
            warnings,
        })
    }
}

/// Split a cheque's receipt lines across its batches.
///
/// Lines naming a batch the cheque does not list get a section of their own.
fn group_by_batch(
    cheque_id: &ChequeId,
    batches: Vec<PaymentBatch>,
    mut lines: Vec<ReceiptLine>,
    batches_loaded: bool,
    receipts_loaded: bool,
    warnings: &mut Vec<BreakdownWarning>,
) -> Vec<BatchBreakdown> {
    let mut result = Vec::with_capacity(batches.len());

    for batch in batches {
        let (own, rest): (Vec<ReceiptLine>, Vec<ReceiptLine>) = lines
            .into_iter()
            .partition(|l| l.batch_id.as_deref() == Some(batch.batch_id.as_str()));
        lines = rest;

        if own.is_empty() && receipts_loaded {
            warn!(cheque = %cheque_id, batch = %batch.batch_id, "batch has no receipts");
            warnings.push(BreakdownWarning::IncompleteData {
                section: DataSection::Receipts,
                detail: format!("no receipts found for batch {}", batch.batch_number),
            });
        }
        result.push(BatchBreakdown::new(Some(batch.batch_id.clone()), Some(batch), own));
    }

    while let Some(first) = lines.first() {
        let batch_id = first.batch_id.clone();
        let (own, rest): (Vec<ReceiptLine>, Vec<ReceiptLine>) =
            lines.into_iter().partition(|l| l.batch_id == batch_id);
        lines = rest;

        if batches_loaded {
            let label = batch_id.as_deref().unwrap_or("(none)");
            warn!(cheque = %cheque_id, batch = %label, count = own.len(), "receipts outside listed batches");
            warnings.push(BreakdownWarning::IncompleteData {
                section: DataSection::Batches,
                detail: format!(
                    "{} receipt(s) in batch {} are linked only through the cheque",
                    own.len(),
                    label
                ),
            });
        }
        result.push(BatchBreakdown::new(batch_id, None, own));
    }

    result
}
