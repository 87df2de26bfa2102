//! In-memory position store.
//!
//! Mirrors the persistence contract of the relational store: writes are
//! applied all-or-nothing, every resulting row is invariant-checked, rows are
//! never deleted. Used for offline replay and as the reference store in tests.

use std::collections::BTreeMap;

use bol_schemas::{derived_id, Execution, LedgerError, LedgerResult, Position, PositionStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::projector::{project_execution, LotKey};
use crate::types::{PositionWrite, Projection};

#[derive(Clone, Debug, Default)]
pub struct PositionBook {
    rows: BTreeMap<Uuid, Position>,
    instruments: BTreeMap<String, Uuid>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Instruments
    // -----------------------------------------------------------------------

    /// Instrument id for `symbol`, registering it on first use. Ids are
    /// derived from the symbol, so two books agree on them.
    pub fn instrument_for(&mut self, symbol: &str) -> Uuid {
        *self
            .instruments
            .entry(symbol.to_string())
            .or_insert_with(|| derived_id("instrument", Uuid::nil(), symbol))
    }

    pub fn instrument_id(&self, symbol: &str) -> Option<Uuid> {
        self.instruments.get(symbol).copied()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, id: Uuid) -> Option<&Position> {
        self.rows.get(&id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.rows.values()
    }

    /// Every row for the key, any status, oldest entry first.
    pub fn lots(&self, key: LotKey) -> Vec<Position> {
        let mut v: Vec<Position> = self
            .rows
            .values()
            .filter(|p| p.account_id == key.account_id && p.instrument_id == key.instrument_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.entry_time.cmp(&b.entry_time).then(a.id.cmp(&b.id)));
        v
    }

    pub fn open_lots(&self, key: LotKey) -> Vec<Position> {
        self.lots(key).into_iter().filter(|p| p.is_open()).collect()
    }

    pub fn open_quantity(&self, key: LotKey) -> Decimal {
        self.open_lots(key).iter().map(|p| p.quantity).sum()
    }

    /// Non-closed lots flagged for reconciliation on `as_of`.
    pub fn lots_marked_for_split(&self, key: LotKey, as_of: NaiveDate) -> Vec<Position> {
        self.lots(key)
            .into_iter()
            .filter(|p| p.status != PositionStatus::Closed && p.marked_for_split_at == Some(as_of))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Flag every open lot of `key` for reconciliation on `as_of`, replacing
    /// a stale mark from another date. Returns the number of lots flagged.
    pub fn mark_for_split(&mut self, key: LotKey, as_of: NaiveDate) -> usize {
        let mut n = 0;
        for p in self.rows.values_mut() {
            if p.account_id == key.account_id
                && p.instrument_id == key.instrument_id
                && p.is_open()
                && p.marked_for_split_at != Some(as_of)
            {
                p.marked_for_split_at = Some(as_of);
                n += 1;
            }
        }
        n
    }

    /// Apply a unit of work. On error the book is unchanged.
    pub fn apply(&mut self, writes: &[PositionWrite]) -> LedgerResult<()> {
        let mut staged: BTreeMap<Uuid, Position> = BTreeMap::new();

        for w in writes {
            let id = w.position_id();
            let current = staged.get(&id).or_else(|| self.rows.get(&id)).cloned();
            let next = match (w, current) {
                (PositionWrite::Insert(p), None) => p.clone(),
                (PositionWrite::Insert(p), Some(_)) => {
                    return Err(LedgerError::InvariantViolation(format!(
                        "position {} already exists",
                        p.id
                    )))
                }
                (PositionWrite::Close { .. }, None) | (PositionWrite::Supersede { .. }, None) => {
                    return Err(LedgerError::not_found("position", id))
                }
                (
                    PositionWrite::Close {
                        exit_price,
                        exit_time,
                        closing_order_id,
                        ..
                    },
                    Some(mut p),
                ) => {
                    if !p.is_open() {
                        return Err(LedgerError::InvariantViolation(format!(
                            "cannot close position {id} in status {}",
                            p.status
                        )));
                    }
                    p.status = PositionStatus::Closed;
                    p.exit_price = Some(*exit_price);
                    p.exit_time = Some(*exit_time);
                    p.closing_order_id = Some(*closing_order_id);
                    p
                }
                (PositionWrite::Supersede { .. }, Some(mut p)) => {
                    if p.status == PositionStatus::Split {
                        return Err(LedgerError::InvariantViolation(format!(
                            "position {id} is already split"
                        )));
                    }
                    p.status = PositionStatus::Split;
                    p.marked_for_split_at = None;
                    p
                }
            };
            next.check_invariants()?;
            staged.insert(id, next);
        }

        self.rows.extend(staged);
        Ok(())
    }

    /// Resolve the instrument, plan, and apply one execution.
    pub fn process_execution(
        &mut self,
        account_id: Uuid,
        exec: &Execution,
    ) -> LedgerResult<Projection> {
        let key = LotKey {
            account_id,
            instrument_id: self.instrument_for(&exec.symbol),
        };
        let open = self.open_lots(key);
        let projection = project_execution(key, exec, &open)?;
        self.apply(&projection.writes)?;
        Ok(projection)
    }

    /// Re-check every row.
    pub fn verify(&self) -> LedgerResult<()> {
        for p in self.rows.values() {
            p.check_invariants()?;
        }
        Ok(())
    }
}
