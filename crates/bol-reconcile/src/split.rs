use bol_positions::PositionWrite;
use bol_schemas::{derived_id, LedgerError, LedgerResult, Position, PositionStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Value objects
// ---------------------------------------------------------------------------

/// Input lot for [`handle_split`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitLot {
    pub position_id: Uuid,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Closed lots are carried through untouched and contribute nothing.
    pub closed: bool,
}

impl SplitLot {
    pub fn from_position(p: &Position) -> Self {
        Self {
            position_id: p.id,
            quantity: p.quantity,
            entry_price: p.entry_price,
            closed: p.status == PositionStatus::Closed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitDirection {
    /// Shares added.
    Forward,
    /// Shares removed (reverse split, merger cash-out).
    Reverse,
}

impl SplitDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitDirection::Forward => "forward",
            SplitDirection::Reverse => "reverse",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedLot {
    pub position_id: Uuid,
    pub before_quantity: Decimal,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Closed before the split, or driven to zero by it.
    pub closed: bool,
    /// Changed by this adjustment (quantity or price).
    pub touched: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAdjustment {
    pub direction: SplitDirection,
    pub authoritative_qty: Decimal,
    pub local_qty: Decimal,
    /// Σ quantity × entry price over lots that were not closed.
    pub basis: Decimal,
    /// basis / authoritative quantity. `None` when nothing survives.
    pub pool_price: Option<Decimal>,
    /// Same order as the input.
    pub lots: Vec<AdjustedLot>,
    pub passes: u32,
}

impl SplitAdjustment {
    pub fn surviving_basis(&self) -> Decimal {
        self.lots
            .iter()
            .filter(|l| !l.closed)
            .map(|l| l.quantity * l.entry_price)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Pure split algorithm
// ---------------------------------------------------------------------------

fn per_lot_share(delta: Decimal, live: usize) -> Decimal {
    let share = (delta / Decimal::from(live as u64)).floor();
    if share < Decimal::ONE {
        Decimal::ONE
    } else {
        share
    }
}

/// Force `lots` to sum to `authoritative_qty`.
///
/// Reverse: each pass takes `floor(remaining / live)` shares (at least one)
/// from every live lot in order, never more than the lot holds or than is
/// still owed. A lot emptied early closes and its shortfall rolls into the
/// next pass over the lots still live. Forward adds shares the same way.
/// Afterwards every surviving lot is repriced to `basis / authoritative_qty`.
///
/// # Errors
/// - `DataInconsistency` when the quantity is unchanged ("no split") or when
///   shares must move but no lot is open.
/// - `InvariantViolation` on a negative authoritative quantity, or if the
///   loop fails to settle within its pass bound.
pub fn handle_split(lots: &[SplitLot], authoritative_qty: Decimal) -> LedgerResult<SplitAdjustment> {
    if authoritative_qty < Decimal::ZERO {
        return Err(LedgerError::InvariantViolation(format!(
            "authoritative quantity {authoritative_qty} is negative"
        )));
    }

    let local_qty: Decimal = lots.iter().filter(|l| !l.closed).map(|l| l.quantity).sum();
    let basis: Decimal = lots
        .iter()
        .filter(|l| !l.closed)
        .map(|l| l.quantity * l.entry_price)
        .sum();

    if authoritative_qty == local_qty {
        return Err(LedgerError::DataInconsistency(format!(
            "no split: authoritative quantity {authoritative_qty} equals local quantity"
        )));
    }

    let num_open = lots.iter().filter(|l| !l.closed).count();
    if num_open == 0 {
        return Err(LedgerError::DataInconsistency(format!(
            "no open lots to adjust from {local_qty} to {authoritative_qty}"
        )));
    }

    let mut out: Vec<AdjustedLot> = lots
        .iter()
        .map(|l| AdjustedLot {
            position_id: l.position_id,
            before_quantity: l.quantity,
            quantity: l.quantity,
            entry_price: l.entry_price,
            closed: l.closed,
            touched: false,
        })
        .collect();

    let direction = if authoritative_qty < local_qty {
        SplitDirection::Reverse
    } else {
        SplitDirection::Forward
    };

    // Every non-final pass either closes a lot or leaves fewer than `live`
    // shares owed, so passes are bounded by lot count plus a small constant.
    let max_passes = 4 * lots.len() as u32 + 16;
    let mut passes = 0u32;
    let mut remaining = (authoritative_qty - local_qty).abs();

    while !remaining.is_zero() {
        if passes == max_passes {
            return Err(LedgerError::InvariantViolation(format!(
                "split distribution did not settle after {passes} passes ({remaining} left)"
            )));
        }
        passes += 1;

        let live: Vec<usize> = (0..out.len()).filter(|&i| !out[i].closed).collect();
        if live.is_empty() {
            return Err(LedgerError::InvariantViolation(format!(
                "all lots closed with {remaining} shares still to remove"
            )));
        }
        let share = per_lot_share(remaining, live.len());

        for i in live {
            if remaining.is_zero() {
                break;
            }
            let lot = &mut out[i];
            match direction {
                SplitDirection::Reverse => {
                    let take = share.min(lot.quantity).min(remaining);
                    lot.quantity -= take;
                    remaining -= take;
                    if lot.quantity.is_zero() {
                        lot.closed = true;
                    }
                }
                SplitDirection::Forward => {
                    let add = share.min(remaining);
                    lot.quantity += add;
                    remaining -= add;
                }
            }
            lot.touched = true;
        }
    }

    let pool_price = if authoritative_qty.is_zero() {
        None
    } else {
        Some(basis / authoritative_qty)
    };

    // Reprice survivors and anything this split closed.
    for (lot, src) in out.iter_mut().zip(lots) {
        if src.closed {
            continue;
        }
        if let Some(px) = pool_price {
            lot.entry_price = px;
        }
        lot.touched = true;
    }

    let settled: Decimal = out.iter().filter(|l| !l.closed).map(|l| l.quantity).sum();
    if settled != authoritative_qty {
        return Err(LedgerError::InvariantViolation(format!(
            "split settled at {settled}, expected {authoritative_qty}"
        )));
    }

    Ok(SplitAdjustment {
        direction,
        authoritative_qty,
        local_qty,
        basis,
        pool_price,
        lots: out,
        passes,
    })
}

// ---------------------------------------------------------------------------
// Storage diff
// ---------------------------------------------------------------------------

/// Result of reconciling one (account, instrument) key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitPlan {
    pub adjustment: SplitAdjustment,
    pub writes: Vec<PositionWrite>,
}

/// Reconcile the lots marked for `as_of` against `authoritative_qty` and
/// express the result as position writes.
///
/// Every lot that was not already closed is superseded (status `split`,
/// mark cleared) and replaced by one derived lot carrying the new quantity
/// and the pool price, with `original_position_id` pointing back. A lot the
/// split drives to zero is replaced by a closed derived lot of quantity zero,
/// exiting at the pool price at `effective_at` (at the pre-split average cost
/// when nothing survives). Derived ids hang off the original id and `as_of`,
/// so replanning the same date yields the same rows.
///
/// # Errors
/// Everything [`handle_split`] returns, plus `InvariantViolation` if a
/// non-closed lot is not marked for `as_of`.
pub fn plan_split(
    marked_lots: &[Position],
    authoritative_qty: Decimal,
    as_of: NaiveDate,
    effective_at: DateTime<Utc>,
) -> LedgerResult<SplitPlan> {
    for p in marked_lots {
        if p.status == PositionStatus::Split {
            return Err(LedgerError::InvariantViolation(format!(
                "position {} is already split",
                p.id
            )));
        }
        if p.status == PositionStatus::Open && p.marked_for_split_at != Some(as_of) {
            return Err(LedgerError::InvariantViolation(format!(
                "position {} is not marked for split on {as_of}",
                p.id
            )));
        }
    }

    let inputs: Vec<SplitLot> = marked_lots.iter().map(SplitLot::from_position).collect();
    let adjustment = handle_split(&inputs, authoritative_qty)?;

    let fallback_exit = if adjustment.local_qty.is_zero() {
        Decimal::ZERO
    } else {
        adjustment.basis / adjustment.local_qty
    };
    let exit_price = adjustment.pool_price.unwrap_or(fallback_exit);
    let disc = as_of.to_string();

    let mut writes = Vec::new();
    for (orig, adj) in marked_lots.iter().zip(&adjustment.lots) {
        if orig.status == PositionStatus::Closed {
            continue;
        }
        writes.push(PositionWrite::Supersede { position_id: orig.id });

        let derived = if adj.closed {
            Position {
                id: derived_id("split-closed", orig.id, &disc),
                status: PositionStatus::Closed,
                quantity: Decimal::ZERO,
                entry_price: adj.entry_price,
                exit_price: Some(exit_price),
                exit_time: Some(effective_at),
                closing_order_id: None,
                original_position_id: Some(orig.id),
                marked_for_split_at: None,
                ..orig.clone()
            }
        } else {
            Position {
                id: derived_id("split-open", orig.id, &disc),
                status: PositionStatus::Open,
                quantity: adj.quantity,
                entry_price: adj.entry_price,
                exit_price: None,
                exit_time: None,
                closing_order_id: None,
                original_position_id: Some(orig.id),
                marked_for_split_at: None,
                ..orig.clone()
            }
        };
        derived.check_invariants()?;
        writes.push(PositionWrite::Insert(derived));
    }

    Ok(SplitPlan { adjustment, writes })
}
