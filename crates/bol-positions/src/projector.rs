use bol_schemas::{
    derived_id, Execution, LedgerError, LedgerResult, Position, PositionSide, PositionStatus, Side,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{PositionWrite, Projection, ProjectionKind};

/// (account, instrument) the execution is booked against. Resolved by the
/// caller; the projector never looks symbols up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotKey {
    pub account_id: Uuid,
    pub instrument_id: Uuid,
}

/// Plan the position writes for one execution.
///
/// `open_lots` is whatever the store holds for `key`; lots that are not
/// open long lots of that key are ignored, and the rest are consumed oldest
/// first. Non-fill execution types plan nothing.
///
/// # Errors
/// - `InvariantViolation` if the fill quantity is not positive, the price is
///   negative, or a sell exceeds the total open quantity (short selling is
///   not modelled). Nothing is planned in that case.
pub fn project_execution(
    key: LotKey,
    exec: &Execution,
    open_lots: &[Position],
) -> LedgerResult<Projection> {
    if !exec.exec_type.is_fill() {
        return Ok(Projection::noop(ProjectionKind::Ignored));
    }
    if exec.quantity <= Decimal::ZERO {
        return Err(LedgerError::InvariantViolation(format!(
            "execution {} has non-positive quantity {}",
            exec.execution_id, exec.quantity
        )));
    }
    if exec.avg_price < Decimal::ZERO {
        return Err(LedgerError::InvariantViolation(format!(
            "execution {} has negative price {}",
            exec.execution_id, exec.avg_price
        )));
    }

    match exec.side {
        Side::Buy => Ok(open_lot(key, exec)),
        Side::Sell => consume_fifo(key, exec, open_lots),
    }
}

fn open_lot(key: LotKey, exec: &Execution) -> Projection {
    let lot = Position {
        id: derived_id("fill-lot", exec.execution_id, ""),
        account_id: key.account_id,
        instrument_id: key.instrument_id,
        symbol: exec.symbol.clone(),
        side: PositionSide::Long,
        status: PositionStatus::Open,
        quantity: exec.quantity,
        entry_price: exec.avg_price,
        entry_time: exec.transaction_time,
        exit_price: None,
        exit_time: None,
        originating_order_id: exec.order_id,
        closing_order_id: None,
        original_position_id: None,
        marked_for_split_at: None,
    };
    Projection {
        kind: ProjectionKind::Opened { position_id: lot.id },
        writes: vec![PositionWrite::Insert(lot)],
    }
}

fn consume_fifo(key: LotKey, exec: &Execution, open_lots: &[Position]) -> LedgerResult<Projection> {
    let mut lots: Vec<&Position> = open_lots
        .iter()
        .filter(|p| {
            p.is_open()
                && p.side == PositionSide::Long
                && p.account_id == key.account_id
                && p.instrument_id == key.instrument_id
        })
        .collect();

    if lots.is_empty() {
        return Ok(Projection::noop(ProjectionKind::DroppedNoOpenLots));
    }

    let available: Decimal = lots.iter().map(|p| p.quantity).sum();
    if exec.quantity > available {
        return Err(LedgerError::InvariantViolation(format!(
            "sell execution {} for {} shares exceeds open quantity {}",
            exec.execution_id, exec.quantity, available
        )));
    }

    // Oldest first; id breaks entry-time ties so the walk is deterministic.
    lots.sort_by(|a, b| a.entry_time.cmp(&b.entry_time).then(a.id.cmp(&b.id)));

    let mut remaining = exec.quantity;
    let mut writes = Vec::new();
    let mut closed = Vec::new();
    let mut split = None;

    for lot in lots {
        if remaining.is_zero() {
            break;
        }
        if lot.quantity <= remaining {
            writes.push(PositionWrite::Close {
                position_id: lot.id,
                exit_price: exec.avg_price,
                exit_time: exec.transaction_time,
                closing_order_id: exec.order_id,
            });
            closed.push(lot.id);
            remaining -= lot.quantity;
        } else {
            writes.extend(split_on_fill(lot, remaining, exec));
            split = Some(lot.id);
            remaining = Decimal::ZERO;
        }
    }

    Ok(Projection {
        kind: ProjectionKind::Reduced { closed, split },
        writes,
    })
}

/// Replace `lot` with a closed child of `qty` and an open child holding the
/// rest. Both keep the original entry price and time.
fn split_on_fill(lot: &Position, qty: Decimal, exec: &Execution) -> [PositionWrite; 3] {
    let disc = exec.execution_id.to_string();

    let closed = Position {
        id: derived_id("fill-split-closed", lot.id, &disc),
        status: PositionStatus::Closed,
        quantity: qty,
        exit_price: Some(exec.avg_price),
        exit_time: Some(exec.transaction_time),
        closing_order_id: Some(exec.order_id),
        original_position_id: Some(lot.id),
        marked_for_split_at: None,
        ..lot.clone()
    };

    let open = Position {
        id: derived_id("fill-split-open", lot.id, &disc),
        status: PositionStatus::Open,
        quantity: lot.quantity - qty,
        exit_price: None,
        exit_time: None,
        closing_order_id: None,
        original_position_id: Some(lot.id),
        marked_for_split_at: None,
        ..lot.clone()
    };

    [
        PositionWrite::Supersede { position_id: lot.id },
        PositionWrite::Insert(closed),
        PositionWrite::Insert(open),
    ]
}
