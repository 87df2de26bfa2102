use std::collections::{BTreeMap, BTreeSet};

use bol_audit::{BatchErrorKey, BatchErrorRecord};
use bol_positions::LotKey;
use bol_reconcile::{
    detect_share_drift, plan_split, KeyFailure, KeyOutcome, SplitBatchReport,
};
use bol_schemas::{LedgerError, LedgerResult};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::retry::{classify, retry_on_conflict};
use crate::LedgerEngine;

/// `source_code` of split batch failures.
pub const SPLIT_SOURCE_CODE: &str = "SPLIT_POSITIONS";

/// One row of the clearing broker's end-of-day position file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativePosition {
    pub account_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
}

impl LedgerEngine {
    /// Reconcile local lots against the authoritative end-of-day positions
    /// for `process_date`.
    ///
    /// Phase 1 compares open quantities and marks every open lot of each key
    /// that drifted, replacing marks left by an earlier failed date. Phase 2
    /// reconciles each marked key in its own serializable transaction. A key that fails is recorded (database and, when
    /// configured, the JSONL log) and the batch moves on. Re-running the
    /// same date is a no-op for keys that already reconciled.
    ///
    /// Only storage failures outside any single key (opening the marking
    /// transaction, listing marked keys) abort the run.
    pub async fn run_split_batch(
        &self,
        process_date: NaiveDate,
        positions: &[AuthoritativePosition],
    ) -> LedgerResult<SplitBatchReport> {
        let mut report = SplitBatchReport::new(process_date);
        self.warn_if_uncovered(process_date, "run_split_batch");

        // -- resolve symbols -------------------------------------------------
        let mut authoritative: BTreeMap<LotKey, Decimal> = BTreeMap::new();
        let mut symbols: BTreeMap<LotKey, String> = BTreeMap::new();
        for p in positions {
            match self.resolve_key(p).await {
                Ok(key) => {
                    *authoritative.entry(key).or_insert(Decimal::ZERO) += p.quantity;
                    symbols.insert(key, p.symbol.clone());
                }
                Err(e) => self.fail_key(&mut report, None, p.account_id, &p.symbol, e).await,
            }
        }

        // -- phase 1: mark drifted keys -------------------------------------
        let accounts: Vec<Uuid> = authoritative
            .keys()
            .map(|k| k.account_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (marked, drift) = retry_on_conflict(self.max_retries(), "split_mark", || {
            self.mark_drifted(process_date, &accounts, &authoritative)
        })
        .await?;
        report.lots_marked = marked;
        report.unchanged = drift.unchanged;

        for d in &drift.drifts {
            if d.local_qty.is_zero() {
                let symbol = symbols.get(&d.key).cloned().unwrap_or_default();
                let err = LedgerError::DataInconsistency(format!(
                    "no open lots for {symbol} but authoritative quantity is {}",
                    d.authoritative_qty
                ));
                self.fail_key(&mut report, Some(d.key), d.key.account_id, &symbol, err)
                    .await;
            }
        }

        // -- phase 2: reconcile marked keys ---------------------------------
        let marked_keys = {
            let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::RepeatableReadOnly)
                .await
                .map_err(classify)?;
            bol_db::keys_marked_for_split(&mut tx, process_date)
                .await
                .map_err(classify)?
        };

        for (key, symbol) in marked_keys {
            let Some(&auth) = authoritative.get(&key) else {
                let err = LedgerError::DataInconsistency(format!(
                    "lots of {symbol} are marked for {process_date} but the position file has no quantity"
                ));
                self.fail_key(&mut report, Some(key), key.account_id, &symbol, err)
                    .await;
                continue;
            };

            let res = retry_on_conflict(self.max_retries(), "split_reconcile", || {
                self.reconcile_key(process_date, key, &symbol, auth)
            })
            .await;

            match res {
                Ok(outcome) => {
                    info!(
                        account_id = %key.account_id,
                        symbol = %symbol,
                        direction = ?outcome.direction,
                        local_qty = %outcome.local_qty,
                        authoritative_qty = %outcome.authoritative_qty,
                        lots_replaced = outcome.lots_replaced,
                        "split reconciled"
                    );
                    report.reconciled.push(outcome);
                }
                Err(e) => {
                    self.fail_key(&mut report, Some(key), key.account_id, &symbol, e)
                        .await
                }
            }
        }

        info!(
            process_date = %process_date,
            lots_marked = report.lots_marked,
            unchanged = report.unchanged,
            reconciled = report.reconciled.len(),
            failures = report.failures.len(),
            "split batch finished"
        );
        Ok(report)
    }

    async fn resolve_key(&self, p: &AuthoritativePosition) -> LedgerResult<LotKey> {
        let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::RepeatableReadOnly)
            .await
            .map_err(classify)?;
        let instrument_id = bol_db::resolve_instrument(&mut tx, &p.symbol)
            .await
            .map_err(classify)?
            .ok_or_else(|| LedgerError::not_found("instrument", &p.symbol))?;
        Ok(LotKey {
            account_id: p.account_id,
            instrument_id,
        })
    }

    async fn mark_drifted(
        &self,
        process_date: NaiveDate,
        accounts: &[Uuid],
        authoritative: &BTreeMap<LotKey, Decimal>,
    ) -> LedgerResult<(usize, bol_reconcile::DriftReport)> {
        let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::Serializable)
            .await
            .map_err(classify)?;

        let local = bol_db::open_quantities(&mut tx, accounts)
            .await
            .map_err(classify)?;
        let drift = detect_share_drift(&local, authoritative);

        let mut marked = 0usize;
        for d in &drift.drifts {
            marked += bol_db::mark_lots_for_split(&mut tx, d.key, process_date)
                .await
                .map_err(classify)? as usize;
        }

        tx.commit()
            .await
            .map_err(|e| classify(anyhow::Error::new(e).context("commit failed")))?;
        Ok((marked, drift))
    }

    async fn reconcile_key(
        &self,
        process_date: NaiveDate,
        key: LotKey,
        symbol: &str,
        authoritative_qty: Decimal,
    ) -> LedgerResult<KeyOutcome> {
        let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::Serializable)
            .await
            .map_err(classify)?;

        bol_db::lock_account(&mut tx, key.account_id)
            .await
            .map_err(classify)?
            .ok_or_else(|| LedgerError::not_found("account", key.account_id))?;

        // lots written since phase 1 (split-on-fill children, new buys)
        let late = bol_db::mark_lots_for_split(&mut tx, key, process_date)
            .await
            .map_err(classify)?;
        if late > 0 {
            info!(
                account_id = %key.account_id,
                symbol = %symbol,
                lots = late,
                "marked lots written after the drift check"
            );
        }

        let lots = bol_db::load_lots_marked_for_split(&mut tx, key, process_date)
            .await
            .map_err(classify)?;

        let effective_at = self.calendar.session_close(process_date);
        let plan = plan_split(&lots, authoritative_qty, process_date, effective_at)?;

        bol_db::apply_position_writes(&mut tx, &plan.writes)
            .await
            .map_err(classify)?;
        tx.commit()
            .await
            .map_err(|e| classify(anyhow::Error::new(e).context("commit failed")))?;

        Ok(KeyOutcome {
            key,
            symbol: symbol.to_string(),
            direction: plan.adjustment.direction,
            local_qty: plan.adjustment.local_qty,
            authoritative_qty,
            lots_replaced: lots.len(),
        })
    }

    async fn fail_key(
        &self,
        report: &mut SplitBatchReport,
        key: Option<LotKey>,
        account_id: Uuid,
        symbol: &str,
        err: LedgerError,
    ) {
        error!(
            account_id = %account_id,
            symbol = %symbol,
            error_kind = err.kind(),
            error = %err,
            "split key failed"
        );

        let rec = BatchErrorRecord::from_error(
            BatchErrorKey::new(
                report.process_date,
                SPLIT_SOURCE_CODE,
                account_id.to_string(),
                symbol,
            ),
            &err,
            Utc::now(),
        );
        self.record_batch_error(&rec).await;

        report.failures.push(KeyFailure {
            account_id,
            key,
            symbol: symbol.to_string(),
            error_kind: err.kind().to_string(),
            message: err.to_string(),
        });
    }
}
