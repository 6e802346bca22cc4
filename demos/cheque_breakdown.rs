//! Cheque breakdown and receipt void example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use grower_payments_core::utils::{format_money, MemoryStore};
use grower_payments_core::{
    AdvanceDeduction, BatchStatus, Cheque, ChequeId, ChequeStatus, EngineConfig, PaymentBatch,
    Receipt, ReceiptStatus, ReconciliationEngine,
};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

fn d(text: &str) -> BigDecimal {
    BigDecimal::from_str(text).expect("valid decimal literal")
}

fn receipt(id: &str, amount: &str) -> Receipt {
    Receipt {
        receipt_id: id.to_string(),
        grower_id: "G100".to_string(),
        batch_id: Some("B12".to_string()),
        receipt_date: NaiveDate::from_ymd_opt(2024, 8, 2).expect("valid date"),
        product_id: "BLUE".to_string(),
        process_id: "FRESH".to_string(),
        grade: 1,
        gross_weight: d("500"),
        tare_weight: d("25"),
        net_weight: d("475"),
        dock_percent: d("0"),
        amount: d(amount),
        status: ReceiptStatus::Active,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Grower Payments Core - Cheque Breakdown Example\n");

    let store = MemoryStore::new();
    let cheque_id = ChequeId::new("F", 2210);
    store.insert_cheque(Cheque {
        cheque_id: cheque_id.clone(),
        grower_id: "G100".to_string(),
        payee_name: "Sumas Ridge Berries".to_string(),
        cheque_date: NaiveDate::from_ymd_opt(2024, 9, 1).ok_or("bad date")?,
        gross_amount: d("532.18"),
        recorded_amount: d("382.18"),
        status: ChequeStatus::Issued,
        grower_running_total: d("4120.55"),
    })?;
    store.insert_batch(&cheque_id, PaymentBatch::new("B12", "0012", BatchStatus::Paid))?;
    store.insert_receipt(&cheque_id, receipt("R500", "300.00"))?;
    store.insert_receipt(&cheque_id, receipt("R501", "232.18"))?;
    store.insert_deduction(
        &cheque_id,
        AdvanceDeduction {
            advance_cheque_id: ChequeId::new("A", 880),
            advance_amount: d("150.00"),
            deduction_amount: d("150.00"),
        },
    )?;

    let engine = ReconciliationEngine::new(store).with_config(EngineConfig::from_env()?);

    let breakdown = engine.build_cheque_breakdown(&cheque_id, None).await?;
    println!("Cheque {} to {}", breakdown.cheque.cheque_id, breakdown.cheque.payee_name);
    for batch in &breakdown.batches {
        println!(
            "  Batch {}: {}",
            batch.batch_number().unwrap_or("?"),
            format_money(&batch.subtotal)
        );
    }
    println!("  Gross:      {}", format_money(&breakdown.totals.gross));
    println!("  Deductions: {}", format_money(&breakdown.totals.deductions));
    println!("  Net:        {}", format_money(&breakdown.totals.net));
    println!("  Reconciled: {}\n", breakdown.is_reconciled());

    let impact = engine.analyze_void_impact("R501").await?;
    println!("{}", impact.message);

    let result = engine.void_receipt("R501", "Duplicate ticket", "office").await?;
    println!("{}\n", result.message());

    let after = engine.build_cheque_breakdown(&cheque_id, None).await?;
    if let Some((computed, recorded)) = after.mismatch() {
        println!(
            "Cheque no longer reconciles: computed {} vs recorded {}",
            format_money(computed),
            format_money(recorded)
        );
    }

    Ok(())
}
