//! Database-backed ledger commands: `exec apply`, `splits run`,
//! `balances`, `day-trades`.

use anyhow::{bail, Context, Result};
use bol_runtime::{AuthoritativePosition, ExecutionOutcome, LedgerEngine};
use bol_schemas::{Execution, Order};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::{read_json, replay::kind_label, ConfigArgs};

async fn engine(cfg: &ConfigArgs) -> Result<LedgerEngine> {
    LedgerEngine::connect(cfg.load()?).await
}

// ---------------------------------------------------------------------------
// exec apply
// ---------------------------------------------------------------------------

pub async fn exec_apply(cfg: &ConfigArgs, account: Uuid, file: &Path) -> Result<()> {
    let executions: Vec<Execution> = read_json(file)?;
    let engine = engine(cfg).await?;

    let mut applied = 0usize;
    let mut duplicates = 0usize;
    for exec in &executions {
        match engine.process_execution(account, exec).await {
            Ok(outcome) => {
                let (label, writes) = match &outcome {
                    ExecutionOutcome::Applied { kind, writes } => (kind_label(kind), *writes),
                    ExecutionOutcome::Duplicate => ("duplicate", 0),
                    ExecutionOutcome::Ignored => ("ignored", 0),
                    ExecutionOutcome::DroppedNoOpenLots => ("dropped_no_open_lots", 0),
                };
                match outcome {
                    ExecutionOutcome::Duplicate => duplicates += 1,
                    _ => applied += 1,
                }
                println!(
                    "execution_id={} outcome={} writes={}",
                    exec.execution_id, label, writes
                );
            }
            Err(e) => {
                println!(
                    "execution_id={} outcome=error error_kind={} error={}",
                    exec.execution_id,
                    e.kind(),
                    e
                );
                bail!(
                    "EXECUTION_FAILED execution_id={} kind={} (applied={} duplicates={})",
                    exec.execution_id,
                    e.kind(),
                    applied,
                    duplicates
                );
            }
        }
    }

    info!(applied, duplicates, file = %file.display(), "exec apply finished");
    println!("applied={applied} duplicates={duplicates}");
    Ok(())
}

// ---------------------------------------------------------------------------
// splits run
// ---------------------------------------------------------------------------

pub async fn splits_run(cfg: &ConfigArgs, date: NaiveDate, file: &Path) -> Result<()> {
    let positions: Vec<AuthoritativePosition> = read_json(file)?;
    let engine = engine(cfg).await?;

    let report = engine
        .run_split_batch(date, &positions)
        .await
        .context("split batch aborted")?;
    if !report.is_clean() {
        warn!(
            process_date = %date,
            failures = report.failures.len(),
            "split batch finished with failures"
        );
    }

    println!("process_date={}", report.process_date);
    println!("lots_marked={}", report.lots_marked);
    println!("unchanged={}", report.unchanged);
    println!("reconciled={}", report.reconciled.len());
    println!("failures={}", report.failures.len());
    for k in &report.reconciled {
        println!(
            "reconciled account_id={} symbol={} direction={} local_qty={} authoritative_qty={} lots_replaced={}",
            k.key.account_id,
            k.symbol,
            k.direction.as_str(),
            k.local_qty,
            k.authoritative_qty,
            k.lots_replaced
        );
    }
    for f in &report.failures {
        println!(
            "failure account_id={} symbol={} error_kind={} error={}",
            f.account_id, f.symbol, f.error_kind, f.message
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// balances
// ---------------------------------------------------------------------------

pub async fn balances(cfg: &ConfigArgs, account: Uuid, now: DateTime<Utc>) -> Result<()> {
    let engine = engine(cfg).await?;
    let b = engine.account_balances(account, now).await?;

    println!("account_id={account}");
    println!("as_of={}", now.to_rfc3339());
    println!("trading_date_boundary={}", b.trading_date_boundary);
    println!("withdrawable_cash={}", b.withdrawable_cash);
    println!("total_cash={}", b.total_cash);
    println!("buying_power={}", b.buying_power);
    for id in &b.unpriced_orders {
        println!("unpriced_order={id}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// day-trades
// ---------------------------------------------------------------------------

pub async fn day_trades(
    cfg: &ConfigArgs,
    account: Uuid,
    now: DateTime<Utc>,
    pending_file: Option<&Path>,
    equity: Option<Decimal>,
) -> Result<()> {
    let pending: Option<Order> = pending_file.map(read_json).transpose()?;
    let engine = engine(cfg).await?;

    let count = match equity {
        Some(equity) => {
            let (count, decision) = engine
                .pdt_status(account, now, pending.as_ref(), equity)
                .await?;
            println!("pattern_day_trader={}", decision.pattern_day_trader);
            println!("trading_allowed={}", decision.trading_allowed);
            println!("pdt_reason={}", decision.reason.as_str());
            count
        }
        None => {
            engine
                .pattern_day_trades(account, now, pending.as_ref())
                .await?
        }
    };

    println!("window_start={}", count.window_start.to_rfc3339());
    println!("confirmed={}", count.confirmed);
    println!("potential={}", count.potential);
    println!("total={}", count.total);
    for s in &count.by_symbol {
        println!(
            "symbol={} confirmed={} potential={}",
            s.symbol, s.confirmed, s.potential
        );
    }
    Ok(())
}
