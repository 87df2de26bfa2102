use bol_positions::LotKey;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SplitDirection;

/// One key reconciled successfully.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOutcome {
    pub key: LotKey,
    pub symbol: String,
    pub direction: SplitDirection,
    pub local_qty: Decimal,
    pub authoritative_qty: Decimal,
    pub lots_replaced: usize,
}

/// One key that could not be reconciled. The batch carries on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFailure {
    pub account_id: Uuid,
    /// `None` when the symbol could not be resolved.
    pub key: Option<LotKey>,
    pub symbol: String,
    pub error_kind: String,
    pub message: String,
}

/// Summary of one split batch run for a processing date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitBatchReport {
    pub process_date: NaiveDate,
    /// Lots newly flagged in the marking phase.
    pub lots_marked: usize,
    pub unchanged: usize,
    pub reconciled: Vec<KeyOutcome>,
    pub failures: Vec<KeyFailure>,
}

impl SplitBatchReport {
    pub fn new(process_date: NaiveDate) -> Self {
        Self {
            process_date,
            lots_marked: 0,
            unchanged: 0,
            reconciled: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
