//! Price table structure and monotonicity validation

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::types::{PaymentError, PaymentResult};

/// Number of tiers in a price table
pub const TIERS: u8 = 3;
/// Number of grades in a price table
pub const GRADES: u8 = 3;
/// Total rates in a full table: tiers x grades x four rate fields
pub const RATE_COUNT: usize = (TIERS as usize) * (GRADES as usize) * 4;

/// One of the four rates held in a price cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RateField {
    Advance1,
    Advance2,
    Advance3,
    Final,
}

impl RateField {
    /// All fields in payment order
    pub const ALL: [RateField; 4] = [
        RateField::Advance1,
        RateField::Advance2,
        RateField::Advance3,
        RateField::Final,
    ];
}

impl fmt::Display for RateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateField::Advance1 => write!(f, "A1"),
            RateField::Advance2 => write!(f, "A2"),
            RateField::Advance3 => write!(f, "A3"),
            RateField::Final => write!(f, "Final"),
        }
    }
}

/// Position of a cell in the table.
///
/// Always in range: the only way to build one is [`CellId::new`], and the
/// serialized form `"tier-grade"` (e.g. `"1-2"`) is checked the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellId {
    tier: u8,
    grade: u8,
}

impl CellId {
    /// Create a cell id, rejecting positions outside the table
    pub fn new(tier: u8, grade: u8) -> PaymentResult<Self> {
        if !(1..=TIERS).contains(&tier) || !(1..=GRADES).contains(&grade) {
            return Err(PaymentError::MalformedPriceTable(format!(
                "cell (tier {}, grade {}) is outside the {}x{} table",
                tier, grade, TIERS, GRADES
            )));
        }
        Ok(Self { tier, grade })
    }

    /// Tier, 1-based
    pub fn tier(&self) -> u8 {
        self.tier
    }

    /// Grade, 1-based
    pub fn grade(&self) -> u8 {
        self.grade
    }

    /// Every cell id, tier-major
    pub fn all() -> impl Iterator<Item = CellId> {
        (1..=TIERS).flat_map(|tier| (1..=GRADES).map(move |grade| CellId { tier, grade }))
    }

    fn index(&self) -> (usize, usize) {
        (usize::from(self.tier - 1), usize::from(self.grade - 1))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} grade {}", self.tier, self.grade)
    }
}

impl FromStr for CellId {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PaymentError::MalformedPriceTable(format!("bad cell key: {:?}", s));
        let (tier, grade) = s.split_once('-').ok_or_else(malformed)?;
        let tier = tier.trim().parse().map_err(|_| malformed())?;
        let grade = grade.trim().parse().map_err(|_| malformed())?;
        CellId::new(tier, grade)
    }
}

impl TryFrom<String> for CellId {
    type Error = PaymentError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        key.parse()
    }
}

impl From<CellId> for String {
    fn from(id: CellId) -> Self {
        format!("{}-{}", id.tier, id.grade)
    }
}

/// Rates for one (tier, grade) cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceCell {
    pub advance1: BigDecimal,
    pub advance2: BigDecimal,
    pub advance3: BigDecimal,
    pub final_price: BigDecimal,
}

impl PriceCell {
    /// Create a new cell
    pub fn new(
        advance1: BigDecimal,
        advance2: BigDecimal,
        advance3: BigDecimal,
        final_price: BigDecimal,
    ) -> Self {
        Self {
            advance1,
            advance2,
            advance3,
            final_price,
        }
    }

    /// Get a rate by field
    pub fn rate(&self, field: RateField) -> &BigDecimal {
        match field {
            RateField::Advance1 => &self.advance1,
            RateField::Advance2 => &self.advance2,
            RateField::Advance3 => &self.advance3,
            RateField::Final => &self.final_price,
        }
    }

    /// A cell with all four rates at zero has not been priced
    pub fn is_unset(&self) -> bool {
        let zero = BigDecimal::from(0);
        RateField::ALL.iter().all(|f| *self.rate(*f) == zero)
    }

    /// Highest of the three advance rates
    pub fn max_advance(&self) -> &BigDecimal {
        [&self.advance1, &self.advance2, &self.advance3]
            .into_iter()
            .fold(&self.advance1, |max, rate| if rate > max { rate } else { max })
    }

    /// Fields that break the advance/final ordering
    pub fn monotonicity_violations(&self) -> BTreeSet<RateField> {
        let mut flagged = BTreeSet::new();
        if self.is_unset() {
            return flagged;
        }

        let zero = BigDecimal::from(0);
        if self.advance1 > zero && self.advance2 > zero && self.advance2 < self.advance1 {
            flagged.insert(RateField::Advance2);
        }
        if self.advance2 > zero && self.advance3 > zero && self.advance3 < self.advance2 {
            flagged.insert(RateField::Advance3);
        }
        let max_advance = self.max_advance();
        if *max_advance > zero && self.final_price < *max_advance {
            flagged.insert(RateField::Final);
        }
        flagged
    }

    /// Fields holding a negative rate
    pub fn negative_fields(&self) -> BTreeSet<RateField> {
        let zero = BigDecimal::from(0);
        RateField::ALL
            .into_iter()
            .filter(|f| *self.rate(*f) < zero)
            .collect()
    }
}

/// A complete 3x3 grid of price cells
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceTable {
    cells: [[PriceCell; GRADES as usize]; TIERS as usize],
}

impl PriceTable {
    /// Create a table from a tier-major grid
    pub fn new(cells: [[PriceCell; GRADES as usize]; TIERS as usize]) -> Self {
        Self { cells }
    }

    /// Create a table from identified cells.
    ///
    /// Every (tier, grade) position must appear exactly once.
    pub fn from_cells<I>(cells: I) -> PaymentResult<Self>
    where
        I: IntoIterator<Item = (CellId, PriceCell)>,
    {
        let mut seen = BTreeSet::new();
        let mut table = Self::default();
        for (id, cell) in cells {
            if !seen.insert(id) {
                return Err(PaymentError::MalformedPriceTable(format!(
                    "{} supplied more than once",
                    id
                )));
            }
            let (t, g) = id.index();
            table.cells[t][g] = cell;
        }

        if let Some(missing) = CellId::all().find(|id| !seen.contains(id)) {
            return Err(PaymentError::MalformedPriceTable(format!(
                "{} is missing",
                missing
            )));
        }
        Ok(table)
    }

    /// Create a table from a flat list of 36 rates.
    ///
    /// Order is tier-major, then grade, then A1, A2, A3, Final.
    pub fn from_rates(rates: &[BigDecimal]) -> PaymentResult<Self> {
        if rates.len() != RATE_COUNT {
            return Err(PaymentError::MalformedPriceTable(format!(
                "expected {} rates, got {}",
                RATE_COUNT,
                rates.len()
            )));
        }

        let cells = CellId::all().zip(rates.chunks_exact(4)).map(|(id, chunk)| {
            (
                id,
                PriceCell::new(
                    chunk[0].clone(),
                    chunk[1].clone(),
                    chunk[2].clone(),
                    chunk[3].clone(),
                ),
            )
        });
        Self::from_cells(cells)
    }

    /// Get a cell
    pub fn cell(&self, id: CellId) -> &PriceCell {
        let (t, g) = id.index();
        &self.cells[t][g]
    }

    /// Replace a cell
    pub fn set_cell(&mut self, id: CellId, cell: PriceCell) {
        let (t, g) = id.index();
        self.cells[t][g] = cell;
    }

    /// Iterate over all cells, tier-major
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &PriceCell)> {
        CellId::all().map(move |id| (id, self.cell(id)))
    }

    /// Check the table may be saved
    pub fn validate(&self) -> PriceTableValidation {
        validate_price_table(self)
    }
}

/// Outcome of validating a price table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceTableValidation {
    /// Fields breaking the advance/final ordering, per cell; keyed `"tier-grade"` when serialized
    pub flagged: BTreeMap<CellId, BTreeSet<RateField>>,
    /// Fields holding negative rates, per cell
    pub negative: BTreeMap<CellId, BTreeSet<RateField>>,
    /// True when nothing was flagged
    pub is_valid: bool,
}

impl PriceTableValidation {
    /// Whether a field was flagged for any reason
    pub fn is_flagged(&self, cell: CellId, field: RateField) -> bool {
        [&self.flagged, &self.negative]
            .into_iter()
            .any(|map| map.get(&cell).is_some_and(|fields| fields.contains(&field)))
    }

    /// Human-readable description of each problem, suitable for the pricing screen
    pub fn messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        for (cell, fields) in &self.negative {
            for field in fields {
                messages.push(format!("{} {}: rate cannot be negative", cell, field));
            }
        }
        for (cell, fields) in &self.flagged {
            for field in fields {
                let rule = match field {
                    RateField::Advance1 => "must not exceed later advances",
                    RateField::Advance2 => "must not be less than A1",
                    RateField::Advance3 => "must not be less than A2",
                    RateField::Final => "must not be less than the highest advance",
                };
                messages.push(format!("{} {}: {}", cell, field, rule));
            }
        }
        messages
    }
}

/// Validate every cell of a price table independently
pub fn validate_price_table(table: &PriceTable) -> PriceTableValidation {
    let mut flagged = BTreeMap::new();
    let mut negative = BTreeMap::new();

    for (id, cell) in table.cells() {
        let negatives = cell.negative_fields();
        if !negatives.is_empty() {
            negative.insert(id, negatives);
        }

        let violations = cell.monotonicity_violations();
        if !violations.is_empty() {
            flagged.insert(id, violations);
        }
    }

    let is_valid = flagged.is_empty() && negative.is_empty();
    PriceTableValidation {
        flagged,
        negative,
        is_valid,
    }
}
