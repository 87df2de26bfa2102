use bol_positions::{project_execution, LotKey, Projection, ProjectionKind};
use bol_schemas::{Execution, LedgerError, LedgerResult};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::retry::{classify, retry_on_conflict};
use crate::LedgerEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Position writes committed.
    Applied { kind: ProjectionKind, writes: usize },
    /// Already applied earlier; nothing written.
    Duplicate,
    /// Not a fill; recorded, no position change.
    Ignored,
    /// Sell with no open lot to consume; recorded, no position change.
    DroppedNoOpenLots,
}

impl LedgerEngine {
    /// Apply one execution report for `account_id`.
    ///
    /// Runs in a serializable transaction that first row-locks the account,
    /// so two executions for the same account never interleave. The
    /// execution id is recorded in the inbox in the same transaction:
    /// redelivery yields `Duplicate` and writes nothing.
    ///
    /// # Errors
    /// - `NotFound` for an unknown account or symbol
    /// - `InvariantViolation` for an oversell or a malformed fill
    /// - `TransientConflict` once the configured retries are used up
    pub async fn process_execution(
        &self,
        account_id: Uuid,
        exec: &Execution,
    ) -> LedgerResult<ExecutionOutcome> {
        let outcome = retry_on_conflict(self.max_retries(), "process_execution", || {
            self.process_execution_once(account_id, exec)
        })
        .await?;

        match &outcome {
            ExecutionOutcome::Applied { kind, writes } => info!(
                account_id = %account_id,
                execution_id = %exec.execution_id,
                symbol = %exec.symbol,
                side = %exec.side,
                kind = ?kind,
                writes,
                "execution applied"
            ),
            ExecutionOutcome::Duplicate => debug!(
                execution_id = %exec.execution_id,
                "execution already applied"
            ),
            ExecutionOutcome::Ignored => debug!(
                execution_id = %exec.execution_id,
                exec_type = %exec.exec_type,
                "non-fill execution ignored"
            ),
            ExecutionOutcome::DroppedNoOpenLots => warn!(
                account_id = %account_id,
                execution_id = %exec.execution_id,
                symbol = %exec.symbol,
                quantity = %exec.quantity,
                "sell fill with no open lots dropped"
            ),
        }
        Ok(outcome)
    }

    async fn process_execution_once(
        &self,
        account_id: Uuid,
        exec: &Execution,
    ) -> LedgerResult<ExecutionOutcome> {
        let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::Serializable)
            .await
            .map_err(classify)?;

        bol_db::lock_account(&mut tx, account_id)
            .await
            .map_err(classify)?
            .ok_or_else(|| LedgerError::not_found("account", account_id))?;

        let instrument_id = bol_db::resolve_instrument(&mut tx, &exec.symbol)
            .await
            .map_err(classify)?
            .ok_or_else(|| LedgerError::not_found("instrument", &exec.symbol))?;

        let fresh = bol_db::inbox_insert_execution(&mut tx, account_id, exec.execution_id)
            .await
            .map_err(classify)?;
        if !fresh {
            // nothing was written; dropping `tx` rolls back
            return Ok(ExecutionOutcome::Duplicate);
        }

        bol_db::insert_execution(&mut tx, account_id, exec)
            .await
            .map_err(classify)?;

        let key = LotKey {
            account_id,
            instrument_id,
        };
        let open = bol_db::load_open_long_lots(&mut tx, key)
            .await
            .map_err(classify)?;

        let Projection { kind, writes } = project_execution(key, exec, &open)?;

        bol_db::apply_position_writes(&mut tx, &writes)
            .await
            .map_err(classify)?;
        tx.commit()
            .await
            .map_err(|e| classify(anyhow::Error::new(e).context("commit failed")))?;

        Ok(match kind {
            ProjectionKind::Ignored => ExecutionOutcome::Ignored,
            ProjectionKind::DroppedNoOpenLots => ExecutionOutcome::DroppedNoOpenLots,
            kind => ExecutionOutcome::Applied {
                kind,
                writes: writes.len(),
            },
        })
    }
}
