//! In-memory provider implementation for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::reconciliation::DataSection;
use crate::traits::*;
use crate::types::*;

/// Rule the in-memory batch provider applies when a receipt is voided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversionRule {
    /// Any void sends a finalized or paid batch back to draft
    AnyVoid,
    /// Only revert once the batch has no active receipts left
    WhenEmpty,
}

#[derive(Debug, Default)]
struct State {
    cheques: HashMap<ChequeId, Cheque>,
    cheque_batches: HashMap<ChequeId, Vec<String>>,
    cheque_receipts: HashMap<ChequeId, Vec<String>>,
    batches: HashMap<String, PaymentBatch>,
    receipts: HashMap<String, Receipt>,
    deductions: HashMap<ChequeId, Vec<AdvanceDeduction>>,
    status_log: Vec<(String, ReceiptStatus, StatusChange)>,
    unavailable: HashSet<DataSection>,
    fail_reassessment: bool,
}

/// In-memory store implementing every provider trait, for tests and demos
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    rule: ReversionRule,
    status_updates: Arc<AtomicUsize>,
    reassessments: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create a new store that reverts a batch on any void
    pub fn new() -> Self {
        Self::with_rule(ReversionRule::AnyVoid)
    }

    /// Create a new store with a specific batch reversion rule
    pub fn with_rule(rule: ReversionRule) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            rule,
            status_updates: Arc::new(AtomicUsize::new(0)),
            reassessments: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn read(&self) -> PaymentResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| PaymentError::Provider("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> PaymentResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| PaymentError::Provider("memory store lock poisoned".to_string()))
    }

    fn check_available(state: &State, section: DataSection) -> PaymentResult<()> {
        if state.unavailable.contains(&section) {
            Err(PaymentError::Provider(format!("{} source unavailable", section)))
        } else {
            Ok(())
        }
    }

    /// Insert or replace a cheque header
    pub fn insert_cheque(&self, cheque: Cheque) -> PaymentResult<()> {
        self.write()?.cheques.insert(cheque.cheque_id.clone(), cheque);
        Ok(())
    }

    /// Insert or replace a batch and link it to a cheque
    pub fn insert_batch(&self, cheque_id: &ChequeId, batch: PaymentBatch) -> PaymentResult<()> {
        let mut state = self.write()?;
        let linked = state.cheque_batches.entry(cheque_id.clone()).or_default();
        if !linked.contains(&batch.batch_id) {
            linked.push(batch.batch_id.clone());
        }
        state.batches.insert(batch.batch_id.clone(), batch);
        Ok(())
    }

    /// Insert or replace a receipt and record it as paid on a cheque
    pub fn insert_receipt(&self, cheque_id: &ChequeId, receipt: Receipt) -> PaymentResult<()> {
        let mut state = self.write()?;
        let linked = state.cheque_receipts.entry(cheque_id.clone()).or_default();
        if !linked.contains(&receipt.receipt_id) {
            linked.push(receipt.receipt_id.clone());
        }
        state.receipts.insert(receipt.receipt_id.clone(), receipt);
        Ok(())
    }

    /// Record an advance deduction taken on a cheque
    pub fn insert_deduction(
        &self,
        cheque_id: &ChequeId,
        deduction: AdvanceDeduction,
    ) -> PaymentResult<()> {
        self.write()?
            .deductions
            .entry(cheque_id.clone())
            .or_default()
            .push(deduction);
        Ok(())
    }

    /// Make one data section fail on every read
    pub fn set_unavailable(&self, section: DataSection, unavailable: bool) -> PaymentResult<()> {
        let mut state = self.write()?;
        if unavailable {
            state.unavailable.insert(section);
        } else {
            state.unavailable.remove(&section);
        }
        Ok(())
    }

    /// Make batch reassessment fail
    pub fn set_fail_reassessment(&self, fail: bool) -> PaymentResult<()> {
        self.write()?.fail_reassessment = fail;
        Ok(())
    }

    /// Number of successful or attempted receipt status updates
    pub fn status_update_calls(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    /// Number of batch reassessments requested
    pub fn reassessment_calls(&self) -> usize {
        self.reassessments.load(Ordering::SeqCst)
    }

    /// Status changes applied so far, oldest first
    pub fn status_log(&self) -> PaymentResult<Vec<(String, ReceiptStatus, StatusChange)>> {
        Ok(self.read()?.status_log.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChequeProvider for MemoryStore {
    async fn get_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Option<Cheque>> {
        Ok(self.read()?.cheques.get(cheque_id).cloned())
    }

    async fn get_batches_for_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Vec<PaymentBatch>> {
        let state = self.read()?;
        Self::check_available(&state, DataSection::Batches)?;
        Ok(state
            .cheque_batches
            .get(cheque_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.batches.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReceiptProvider for MemoryStore {
    async fn get_receipt(&self, receipt_id: &str) -> PaymentResult<Option<Receipt>> {
        Ok(self.read()?.receipts.get(receipt_id).cloned())
    }

    async fn get_receipts_for_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Vec<ReceiptLine>> {
        let state = self.read()?;
        Self::check_available(&state, DataSection::Receipts)?;
        Ok(state
            .cheque_receipts
            .get(cheque_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.receipts.get(id))
                    .map(Receipt::to_line)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_receipts_for_batch(&self, batch_id: &str) -> PaymentResult<Vec<ReceiptLine>> {
        let state = self.read()?;
        Self::check_available(&state, DataSection::Receipts)?;
        let mut lines: Vec<ReceiptLine> = state
            .receipts
            .values()
            .filter(|r| r.batch_id.as_deref() == Some(batch_id))
            .map(Receipt::to_line)
            .collect();
        lines.sort_by(|a, b| a.receipt_id.cmp(&b.receipt_id));
        Ok(lines)
    }

    async fn set_receipt_status(
        &self,
        receipt_id: &str,
        expected: ReceiptStatus,
        status: ReceiptStatus,
        change: &StatusChange,
    ) -> PaymentResult<bool> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.write()?;
        let receipt = state
            .receipts
            .get_mut(receipt_id)
            .ok_or_else(|| PaymentError::ReceiptNotFound(receipt_id.to_string()))?;

        if receipt.status != expected {
            return Ok(false);
        }
        receipt.status = status;
        state
            .status_log
            .push((receipt_id.to_string(), status, change.clone()));
        Ok(true)
    }
}

#[async_trait]
impl DeductionProvider for MemoryStore {
    async fn get_deductions_for_cheque(
        &self,
        cheque_id: &ChequeId,
    ) -> PaymentResult<Vec<AdvanceDeduction>> {
        let state = self.read()?;
        Self::check_available(&state, DataSection::Deductions)?;
        Ok(state.deductions.get(cheque_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl BatchProvider for MemoryStore {
    async fn get_batch(&self, batch_id: &str) -> PaymentResult<Option<PaymentBatch>> {
        Ok(self.read()?.batches.get(batch_id).cloned())
    }

    async fn reassess_batch_status(
        &self,
        batch_id: &str,
        _triggering_receipt_id: &str,
    ) -> PaymentResult<BatchReassessment> {
        self.reassessments.fetch_add(1, Ordering::SeqCst);
        let mut state = self.write()?;
        if state.fail_reassessment {
            return Err(PaymentError::Provider(format!(
                "batch {} could not be reassessed",
                batch_id
            )));
        }

        let has_active = state
            .receipts
            .values()
            .any(|r| r.batch_id.as_deref() == Some(batch_id) && r.is_active());
        let batch = state
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| PaymentError::BatchNotFound(batch_id.to_string()))?;

        let should_revert = batch.status != BatchStatus::Draft
            && match self.rule {
                ReversionRule::AnyVoid => true,
                ReversionRule::WhenEmpty => !has_active,
            };
        if should_revert {
            batch.status = BatchStatus::Draft;
        }

        Ok(BatchReassessment {
            reverted: should_revert,
            batch_number: batch.batch_number.clone(),
            status: batch.status,
        })
    }
}

#[async_trait]
impl HistoryProvider for MemoryStore {
    async fn get_prior_cheques(
        &self,
        grower_id: &str,
        excluding: &ChequeId,
    ) -> PaymentResult<Vec<ChequeSummary>> {
        let state = self.read()?;
        Self::check_available(&state, DataSection::History)?;
        let mut history: Vec<ChequeSummary> = state
            .cheques
            .values()
            .filter(|c| c.grower_id == grower_id && &c.cheque_id != excluding)
            .map(|c| ChequeSummary {
                cheque_id: c.cheque_id.clone(),
                cheque_date: c.cheque_date,
                net_amount: c.recorded_amount.clone(),
                status: c.status,
            })
            .collect();
        history.sort_by(|a, b| {
            a.cheque_date
                .cmp(&b.cheque_date)
                .then_with(|| a.cheque_id.cmp(&b.cheque_id))
        });
        Ok(history)
    }
}
