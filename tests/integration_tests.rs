//! Integration tests for grower-payments-core

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use grower_payments_core::{
    utils::{MemoryStore, ReversionRule},
    AdvanceDeduction, BatchStatus, BreakdownWarning, CellId, Cheque, ChequeId, ChequeProvider,
    ChequeStatus, DataSection, PaymentBatch, PaymentError, PaymentResult, PriceCell,
    PriceSchedule, PriceTable, PriceTableValidation, Providers, RateField, Receipt, ReceiptLine,
    ReceiptProvider, ReceiptStatus, ReceiptWeights, ReconciliationEngine, StatusChange,
    RATE_COUNT,
};
use std::str::FromStr;
use std::sync::Arc;

fn d(text: &str) -> BigDecimal {
    BigDecimal::from_str(text).unwrap()
}

fn date(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn blueberry_schedule() -> PriceSchedule {
    let mut table = PriceTable::default();
    table.set_cell(
        CellId::new(1, 1).unwrap(),
        PriceCell::new(d("0.60"), d("0.80"), d("0.90"), d("1.25")),
    );
    table.set_cell(
        CellId::new(1, 2).unwrap(),
        PriceCell::new(d("0.40"), d("0.50"), d("0"), d("0.85")),
    );
    PriceSchedule::new("BLUE", "FRESH", date(6, 1), table)
}

fn priced_receipt(
    schedule: &PriceSchedule,
    id: &str,
    grower: &str,
    batch: &str,
    gross: &str,
    tare: &str,
    grade: u8,
) -> Receipt {
    let weights = ReceiptWeights::new(d(gross), d(tare), d("0"));
    let cell = CellId::new(1, grade).unwrap();
    Receipt {
        receipt_id: id.to_string(),
        grower_id: grower.to_string(),
        batch_id: Some(batch.to_string()),
        receipt_date: date(8, 5),
        product_id: schedule.product_id.clone(),
        process_id: schedule.process_id.clone(),
        grade,
        net_weight: weights.net_weight().unwrap(),
        dock_percent: weights.dock_percent.clone(),
        amount: schedule.receipt_amount(&weights, cell, RateField::Final).unwrap(),
        gross_weight: weights.gross,
        tare_weight: weights.tare,
        status: ReceiptStatus::Active,
    }
}

fn seed_cheque(store: &MemoryStore, id: &ChequeId, recorded: &str) {
    store
        .insert_cheque(Cheque {
            cheque_id: id.clone(),
            grower_id: "G100".to_string(),
            payee_name: "Sumas Ridge Berries".to_string(),
            cheque_date: date(9, 15),
            gross_amount: d("532.18"),
            recorded_amount: d(recorded),
            status: ChequeStatus::Issued,
            grower_running_total: d("1982.18"),
        })
        .unwrap();
}

#[tokio::test]
async fn test_complete_payment_workflow() {
    let schedule = blueberry_schedule();
    assert!(schedule.validate().is_valid);

    let store = MemoryStore::with_rule(ReversionRule::AnyVoid);
    let cheque_id = ChequeId::new("F", 1201);
    seed_cheque(&store, &cheque_id, "382.18");
    store
        .insert_batch(&cheque_id, PaymentBatch::new("B31", "0031", BatchStatus::Paid))
        .unwrap();

    // 1.25 * 300 = 375.00 and 0.85 * 184.92 = 157.18
    let first = priced_receipt(&schedule, "R100", "G100", "B31", "320", "20", 1);
    let second = priced_receipt(&schedule, "R101", "G100", "B31", "194.92", "10", 2);
    assert_eq!(first.amount, d("375.00"));
    assert_eq!(second.amount, d("157.18"));
    store.insert_receipt(&cheque_id, first).unwrap();
    store.insert_receipt(&cheque_id, second).unwrap();

    store
        .insert_deduction(
            &cheque_id,
            AdvanceDeduction {
                advance_cheque_id: ChequeId::new("A", 640),
                advance_amount: d("150.00"),
                deduction_amount: d("150.00"),
            },
        )
        .unwrap();

    let engine = ReconciliationEngine::new(store.clone());

    let breakdown = engine.build_cheque_breakdown(&cheque_id, None).await.unwrap();
    assert_eq!(breakdown.totals.gross, d("532.18"));
    assert_eq!(breakdown.totals.net, d("382.18"));
    assert!(breakdown.is_reconciled());
    assert!(breakdown.warnings.is_empty());
    assert_eq!(breakdown.season_to_date, d("1982.18"));

    let impact = engine.analyze_void_impact("R101").await.unwrap();
    assert_eq!(impact.amount_removed, d("157.18"));
    assert_eq!(impact.batch_subtotal_after, d("375.00"));
    assert_eq!(impact.affected_growers.len(), 1);

    let result = engine
        .void_receipt("R101", "Scale ticket keyed twice", "office")
        .await
        .unwrap();
    assert!(result.batch_reverted);
    assert_eq!(result.batch_status, Some(BatchStatus::Draft));
    assert_eq!(store.reassessment_calls(), 1);

    let log = store.status_log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].2.reason, "Scale ticket keyed twice");
    assert_eq!(log[0].2.actor, "office");

    // The issued cheque no longer matches its receipts once one is voided
    let after = engine.build_cheque_breakdown(&cheque_id, None).await.unwrap();
    assert_eq!(after.totals.net, d("225.00"));
    assert_eq!(after.mismatch(), Some((&d("225.00"), &d("382.18"))));
}

#[tokio::test]
async fn test_recorded_amount_mismatch_example() {
    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 1300);
    seed_cheque(&store, &cheque_id, "380.00");
    store
        .insert_batch(&cheque_id, PaymentBatch::new("B40", "0040", BatchStatus::Paid))
        .unwrap();
    let schedule = blueberry_schedule();
    store
        .insert_receipt(
            &cheque_id,
            priced_receipt(&schedule, "R1", "G100", "B40", "320", "20", 1),
        )
        .unwrap();
    store
        .insert_receipt(
            &cheque_id,
            priced_receipt(&schedule, "R2", "G100", "B40", "194.92", "10", 2),
        )
        .unwrap();

    let engine = ReconciliationEngine::new(store);
    let deductions = vec![AdvanceDeduction {
        advance_cheque_id: ChequeId::new("A", 641),
        advance_amount: d("300.00"),
        deduction_amount: d("150.00"),
    }];

    let breakdown = engine
        .build_cheque_breakdown(&cheque_id, Some(deductions))
        .await
        .unwrap();

    assert_eq!(breakdown.totals.net, d("382.18"));
    assert_eq!(
        breakdown.warnings,
        vec![BreakdownWarning::ReconciliationMismatch {
            computed: d("382.18"),
            recorded: d("380.00"),
        }]
    );
}

#[tokio::test]
async fn test_unavailable_sources_degrade_to_warnings() {
    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 1400);
    seed_cheque(&store, &cheque_id, "0.00");
    store.set_unavailable(DataSection::Receipts, true).unwrap();
    store.set_unavailable(DataSection::Deductions, true).unwrap();
    store.set_unavailable(DataSection::History, true).unwrap();

    let engine = ReconciliationEngine::new(store);
    let breakdown = engine.build_cheque_breakdown(&cheque_id, None).await.unwrap();

    assert_eq!(
        breakdown.incomplete_sections(),
        vec![DataSection::Receipts, DataSection::Deductions, DataSection::History]
    );
    assert!(breakdown.batches.is_empty());
    assert!(breakdown.history.is_empty());
    assert_eq!(breakdown.totals.net, BigDecimal::from(0));
    assert!(breakdown.is_reconciled());
}

#[test]
fn test_price_table_from_flat_rates() {
    let mut rates = vec![BigDecimal::from(0); RATE_COUNT];
    // tier 2 grade 1: A1, A2, A3, Final
    rates[12] = d("0.70");
    rates[13] = d("0.65");
    rates[14] = d("0");
    rates[15] = d("0.60");

    let table = PriceTable::from_rates(&rates).unwrap();
    let result = table.validate();
    let cell = CellId::new(2, 1).unwrap();

    assert!(!result.is_valid);
    assert!(result.is_flagged(cell, RateField::Advance2));
    assert!(result.is_flagged(cell, RateField::Final));
    assert!(!result.is_flagged(cell, RateField::Advance3));
    assert_eq!(result.flagged.len(), 1);

    assert!(matches!(
        PriceTable::from_rates(&rates[..30]),
        Err(PaymentError::MalformedPriceTable(_))
    ));
}

#[tokio::test]
async fn test_breakdown_serializes_for_export() {
    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 1500);
    seed_cheque(&store, &cheque_id, "10.00");
    let engine = ReconciliationEngine::new(store);

    let breakdown = engine.build_cheque_breakdown(&cheque_id, None).await.unwrap();
    let json = serde_json::to_value(&breakdown).unwrap();

    assert_eq!(json["cheque"]["cheque_id"]["series"], "F");
    assert!(json["warnings"][0]["ReconciliationMismatch"].is_object());
}

#[test]
fn test_price_validation_serializes_for_export() {
    let cell = CellId::new(1, 2).unwrap();
    let mut table = PriceTable::default();
    table.set_cell(cell, PriceCell::new(d("1.00"), d("1.10"), d("1.05"), d("1.10")));
    let validation = table.validate();
    assert!(!validation.is_valid);

    let json = serde_json::to_string(&validation).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["flagged"]["1-2"], serde_json::json!(["Advance3"]));

    let restored: PriceTableValidation = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, validation);
    assert!(restored.is_flagged(cell, RateField::Advance3));
}

#[test]
fn test_out_of_range_cell_rejected_on_import() {
    assert!(serde_json::from_str::<CellId>(r#"{"tier":4,"grade":1}"#).is_err());
    assert!(serde_json::from_str::<CellId>(r#""4-1""#).is_err());
    assert!(serde_json::from_str::<CellId>(r#""0-3""#).is_err());
    assert!(serde_json::from_str::<PriceTableValidation>(
        r#"{"flagged":{"9-9":["Final"]},"negative":{},"is_valid":false}"#
    )
    .is_err());

    let id: CellId = serde_json::from_str(r#""3-3""#).unwrap();
    assert_eq!(PriceTable::default().cell(id), &PriceCell::default());
}

/// Cheque source that only knows one header and has no batches
struct SingleCheque(Cheque);

#[async_trait]
impl ChequeProvider for SingleCheque {
    async fn get_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Option<Cheque>> {
        Ok((&self.0.cheque_id == cheque_id).then(|| self.0.clone()))
    }

    async fn get_batches_for_cheque(&self, _cheque_id: &ChequeId) -> PaymentResult<Vec<PaymentBatch>> {
        Err(PaymentError::Provider("batch table offline".to_string()))
    }
}

#[tokio::test]
async fn test_separate_providers() {
    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 1600);
    seed_cheque(&store, &cheque_id, "157.18");
    let schedule = blueberry_schedule();
    store
        .insert_receipt(
            &cheque_id,
            priced_receipt(&schedule, "R7", "G100", "B50", "194.92", "10", 2),
        )
        .unwrap();

    let header = store.get_cheque(&cheque_id).await.unwrap().unwrap();
    let mut providers = Providers::from_store(store.clone());
    providers.cheques = Arc::new(SingleCheque(header));
    let engine = ReconciliationEngine::with_providers(providers);

    let breakdown = engine.build_cheque_breakdown(&cheque_id, None).await.unwrap();

    // Receipts still arrive through the cheque even without the batch list
    assert_eq!(breakdown.batches.len(), 1);
    assert_eq!(breakdown.batches[0].batch_id.as_deref(), Some("B50"));
    assert_eq!(breakdown.incomplete_sections(), vec![DataSection::Batches]);
    assert!(breakdown.is_reconciled());

    assert!(matches!(
        engine.build_cheque_breakdown(&ChequeId::new("F", 9), None).await,
        Err(PaymentError::ChequeNotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_voids_settle_once() {
    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 1700);
    store
        .insert_batch(&cheque_id, PaymentBatch::new("B60", "0060", BatchStatus::Finalized))
        .unwrap();
    let schedule = blueberry_schedule();
    store
        .insert_receipt(
            &cheque_id,
            priced_receipt(&schedule, "R8", "G100", "B60", "320", "20", 1),
        )
        .unwrap();

    let first = ReconciliationEngine::new(store.clone());
    let second = ReconciliationEngine::new(store.clone());
    let (a, b) = tokio::join!(
        first.void_receipt("R8", "Rejected load", "dock-1"),
        second.void_receipt("R8", "Rejected load", "dock-2"),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(failure, PaymentError::InvalidState { .. }));
    assert_eq!(store.reassessment_calls(), 1);
    assert_eq!(
        store.get_receipt("R8").await.unwrap().unwrap().status,
        ReceiptStatus::Voided
    );
}

/// Receipt source that always reports an active receipt but loses every status update
struct LostUpdate(MemoryStore);

#[async_trait]
impl ReceiptProvider for LostUpdate {
    async fn get_receipt(&self, receipt_id: &str) -> PaymentResult<Option<Receipt>> {
        self.0.get_receipt(receipt_id).await
    }

    async fn get_receipts_for_cheque(&self, cheque_id: &ChequeId) -> PaymentResult<Vec<ReceiptLine>> {
        self.0.get_receipts_for_cheque(cheque_id).await
    }

    async fn get_receipts_for_batch(&self, batch_id: &str) -> PaymentResult<Vec<ReceiptLine>> {
        self.0.get_receipts_for_batch(batch_id).await
    }

    async fn set_receipt_status(
        &self,
        _receipt_id: &str,
        _expected: ReceiptStatus,
        _status: ReceiptStatus,
        _change: &StatusChange,
    ) -> PaymentResult<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_lost_conditional_update_reports_invalid_state() {
    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 1800);
    store
        .insert_batch(&cheque_id, PaymentBatch::new("B70", "0070", BatchStatus::Finalized))
        .unwrap();
    let schedule = blueberry_schedule();
    store
        .insert_receipt(
            &cheque_id,
            priced_receipt(&schedule, "R9", "G100", "B70", "150", "10", 1),
        )
        .unwrap();

    let mut providers = Providers::from_store(store.clone());
    providers.receipts = Arc::new(LostUpdate(store.clone()));
    let engine = ReconciliationEngine::with_providers(providers);

    let err = engine
        .void_receipt("R9", "Duplicate ticket", "office")
        .await
        .unwrap_err();

    match err {
        PaymentError::InvalidState {
            receipt_id,
            expected,
            found,
        } => {
            assert_eq!(receipt_id, "R9");
            assert_eq!(expected, ReceiptStatus::Active);
            assert_eq!(found, ReceiptStatus::Voided);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.reassessment_calls(), 0);
    assert_eq!(
        store.get_receipt("R9").await.unwrap().unwrap().status,
        ReceiptStatus::Active
    );
}
