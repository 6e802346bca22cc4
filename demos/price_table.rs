//! Price table validation and receipt pricing example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use grower_payments_core::{
    CellId, PriceCell, PriceSchedule, PriceTable, RateField, ReceiptWeights,
};
use std::str::FromStr;

fn d(text: &str) -> BigDecimal {
    BigDecimal::from_str(text).expect("valid decimal literal")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Grower Payments Core - Price Table Example\n");

    let mut table = PriceTable::default();
    table.set_cell(
        CellId::new(1, 1)?,
        PriceCell::new(d("0.60"), d("0.80"), d("0.90"), d("1.25")),
    );
    // A3 regresses below A2 here
    table.set_cell(
        CellId::new(1, 2)?,
        PriceCell::new(d("1.00"), d("1.10"), d("1.05"), d("1.10")),
    );

    let result = table.validate();
    println!("Table valid: {}", result.is_valid);
    for message in result.messages() {
        println!("  - {}", message);
    }

    // Fix the regressed cell and price a receipt against the schedule
    table.set_cell(
        CellId::new(1, 2)?,
        PriceCell::new(d("1.00"), d("1.10"), d("1.15"), d("1.30")),
    );
    let schedule = PriceSchedule::new(
        "BLUE",
        "FRESH",
        NaiveDate::from_ymd_opt(2024, 6, 1).ok_or("bad date")?,
        table,
    );
    println!("\nCorrected table valid: {}", schedule.validate().is_valid);

    let weights = ReceiptWeights::new(d("1250"), d("50"), d("2.5"));
    let cell = CellId::new(1, 1)?;
    println!("Net weight: {}", weights.net_weight()?);
    for field in RateField::ALL {
        println!(
            "  {:<5} amount {:>10}  (owed at this stage per unit: {})",
            field.to_string(),
            schedule.receipt_amount(&weights, cell, field)?,
            schedule.incremental_rate(cell, field)?
        );
    }

    Ok(())
}
