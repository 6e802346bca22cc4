//! Price schedules and receipt pricing

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pricing::table::{CellId, PriceTable, PriceTableValidation, RateField};
use crate::types::{PaymentError, PaymentResult};
use crate::utils::money::round_money;
use crate::utils::validation::validate_non_negative_amount;

/// Price table in effect for a product and process from a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSchedule {
    pub product_id: String,
    pub process_id: String,
    pub effective_date: NaiveDate,
    pub table: PriceTable,
}

impl PriceSchedule {
    /// Create a new schedule
    pub fn new(
        product_id: impl Into<String>,
        process_id: impl Into<String>,
        effective_date: NaiveDate,
        table: PriceTable,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            process_id: process_id.into(),
            effective_date,
            table,
        }
    }

    /// Validate the schedule's table
    pub fn validate(&self) -> PriceTableValidation {
        self.table.validate()
    }

    /// Get a rate from the table
    pub fn rate(&self, cell: CellId, field: RateField) -> &BigDecimal {
        self.table.cell(cell).rate(field)
    }

    /// Per-unit amount still owed at `field` once every earlier stage was paid.
    ///
    /// Earlier stages with a zero rate were not paid and are skipped.
    pub fn incremental_rate(&self, cell: CellId, field: RateField) -> PaymentResult<BigDecimal> {
        self.ensure_valid()?;
        let prices = self.table.cell(cell);
        let zero = BigDecimal::from(0);

        let paid = RateField::ALL
            .into_iter()
            .take_while(|f| *f != field)
            .map(|f| prices.rate(f))
            .filter(|rate| **rate > zero)
            .fold(zero.clone(), |max, rate| if *rate > max { rate.clone() } else { max });

        let rate = prices.rate(field);
        if *rate == zero {
            return Ok(zero);
        }
        Ok(rate - &paid)
    }

    /// Amount owed for a receipt at a payment stage
    pub fn receipt_amount(
        &self,
        weights: &ReceiptWeights,
        cell: CellId,
        field: RateField,
    ) -> PaymentResult<BigDecimal> {
        self.ensure_valid()?;
        let net = weights.net_weight()?;
        Ok(round_money(&(net * self.rate(cell, field))))
    }

    fn ensure_valid(&self) -> PaymentResult<()> {
        let validation = self.validate();
        if validation.is_valid {
            Ok(())
        } else {
            Err(PaymentError::Validation(format!(
                "price schedule for {}/{} effective {} is invalid: {}",
                self.product_id,
                self.process_id,
                self.effective_date,
                validation.messages().join("; ")
            )))
        }
    }
}

/// Pick the schedule in effect on `date`: the latest one starting on or before it
pub fn select_effective<'a>(
    schedules: &'a [PriceSchedule],
    product_id: &str,
    process_id: &str,
    date: NaiveDate,
) -> Option<&'a PriceSchedule> {
    schedules
        .iter()
        .filter(|s| s.product_id == product_id && s.process_id == process_id)
        .filter(|s| s.effective_date <= date)
        .max_by_key(|s| s.effective_date)
}

/// Scale readings for a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptWeights {
    pub gross: BigDecimal,
    pub tare: BigDecimal,
    /// Percentage of the weight docked for defects
    pub dock_percent: BigDecimal,
}

impl ReceiptWeights {
    /// Create new weights
    pub fn new(gross: BigDecimal, tare: BigDecimal, dock_percent: BigDecimal) -> Self {
        Self {
            gross,
            tare,
            dock_percent,
        }
    }

    /// Weight after tare and dock
    pub fn net_weight(&self) -> PaymentResult<BigDecimal> {
        validate_non_negative_amount(&self.gross, "Gross weight")?;
        validate_non_negative_amount(&self.tare, "Tare weight")?;
        validate_non_negative_amount(&self.dock_percent, "Dock percentage")?;

        let hundred = BigDecimal::from(100);
        if self.tare > self.gross {
            return Err(PaymentError::Validation(format!(
                "Tare weight {} exceeds gross weight {}",
                self.tare, self.gross
            )));
        }
        if self.dock_percent > hundred {
            return Err(PaymentError::Validation(format!(
                "Dock percentage {} exceeds 100",
                self.dock_percent
            )));
        }

        let weighed = &self.gross - &self.tare;
        Ok(weighed * (&hundred - &self.dock_percent) / hundred)
    }
}
