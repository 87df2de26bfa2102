//! Offline replay of execution reports through the FIFO projector into an
//! in-memory [`PositionBook`]. Useful for checking a fill file before it is
//! applied, and for reproducing lot histories outside the database.

use anyhow::{Context, Result};
use bol_positions::{LotKey, PositionBook, ProjectionKind};
use bol_schemas::{Execution, PositionStatus};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use super::read_json;

pub fn kind_label(kind: &ProjectionKind) -> &'static str {
    match kind {
        ProjectionKind::Ignored => "ignored",
        ProjectionKind::Opened { .. } => "opened",
        ProjectionKind::Reduced { split: None, .. } => "closed",
        ProjectionKind::Reduced { split: Some(_), .. } => "split_on_fill",
        ProjectionKind::DroppedNoOpenLots => "dropped_no_open_lots",
    }
}

pub fn replay(file: &Path, account: Uuid, print_lots: bool) -> Result<()> {
    let executions: Vec<Execution> = read_json(file)?;
    let mut book = PositionBook::new();

    for exec in &executions {
        let projection = book
            .process_execution(account, exec)
            .with_context(|| format!("replay stopped at execution_id={}", exec.execution_id))?;
        println!(
            "execution_id={} outcome={} writes={}",
            exec.execution_id,
            kind_label(&projection.kind),
            projection.writes.len()
        );
    }

    book.verify().context("book failed invariant check after replay")?;

    // symbol -> (open lots, open quantity)
    let mut open: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    for p in book.positions() {
        let slot = open.entry(p.symbol.as_str()).or_insert((0, Decimal::ZERO));
        if p.status == PositionStatus::Open {
            slot.0 += 1;
            slot.1 += p.quantity;
        }
    }
    for (symbol, (lots, qty)) in &open {
        println!("symbol={symbol} open_lots={lots} open_quantity={qty}");
    }

    if print_lots {
        for symbol in open.keys() {
            let Some(instrument_id) = book.instrument_id(symbol) else {
                continue;
            };
            let key = LotKey {
                account_id: account,
                instrument_id,
            };
            for p in book.lots(key) {
                println!(
                    "lot id={} symbol={} status={} quantity={} entry_price={} exit_price={}",
                    p.id,
                    p.symbol,
                    p.status,
                    p.quantity,
                    p.entry_price,
                    p.exit_price
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }

    println!("executions={}", executions.len());
    println!("rows={}", book.positions().count());
    println!("invariants=ok");
    Ok(())
}
