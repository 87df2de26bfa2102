use bol_risk::{
    account_balances, evaluate_pdt, pattern_day_trades, trading_date_boundary, AccountBalances,
    BalanceInputs, DayTradeCount, DayTradeInputs, PdtDecision, PdtInput,
};
use bol_schemas::{LedgerError, LedgerResult, Order};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::retry::{classify, retry_on_conflict};
use crate::LedgerEngine;

impl LedgerEngine {
    /// Intraday balances as of `now`, read from one repeatable-read snapshot.
    pub async fn account_balances(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<AccountBalances> {
        self.warn_if_uncovered(self.calendar.local_date(now), "account_balances");
        retry_on_conflict(self.max_retries(), "account_balances", || {
            self.account_balances_once(account_id, now)
        })
        .await
    }

    async fn account_balances_once(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<AccountBalances> {
        let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::RepeatableReadOnly)
            .await
            .map_err(classify)?;

        let account = bol_db::fetch_account(&mut tx, account_id)
            .await
            .map_err(classify)?
            .ok_or_else(|| LedgerError::not_found("account", account_id))?;
        let snapshot = bol_db::latest_cash_snapshot(&mut tx, account_id)
            .await
            .map_err(classify)?;

        let boundary = trading_date_boundary(&self.calendar, snapshot.as_ref(), now);
        let since = self.calendar.start_of_day_utc(boundary);

        let transfers = bol_db::pending_outgoing_transfers(&mut tx, account_id)
            .await
            .map_err(classify)?;
        let orders = bol_db::open_orders(&mut tx, account_id)
            .await
            .map_err(classify)?;
        let positions = bol_db::positions_touched_since(&mut tx, account_id, since)
            .await
            .map_err(classify)?;

        Ok(account_balances(
            BalanceInputs {
                account: &account,
                latest_snapshot: snapshot.as_ref(),
                transfers: &transfers,
                open_orders: &orders,
                positions: &positions,
            },
            &self.calendar,
            now,
        ))
    }

    /// Confirmed plus potential day trades in the configured trailing
    /// window. `pending` is a hypothetical order under evaluation.
    pub async fn pattern_day_trades(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        pending: Option<&Order>,
    ) -> LedgerResult<DayTradeCount> {
        self.warn_if_uncovered(self.calendar.local_date(now), "pattern_day_trades");
        retry_on_conflict(self.max_retries(), "pattern_day_trades", || {
            self.pattern_day_trades_once(account_id, now, pending)
        })
        .await
    }

    async fn pattern_day_trades_once(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        pending: Option<&Order>,
    ) -> LedgerResult<DayTradeCount> {
        let window_sessions = self.pdt.window_sessions;
        let window_start = self.calendar.trailing_window_start(now, window_sessions);

        let mut tx = bol_db::begin_isolated(&self.pool, bol_db::Isolation::RepeatableReadOnly)
            .await
            .map_err(classify)?;

        bol_db::fetch_account(&mut tx, account_id)
            .await
            .map_err(classify)?
            .ok_or_else(|| LedgerError::not_found("account", account_id))?;

        let executions = bol_db::executions_since(&mut tx, account_id, window_start, now)
            .await
            .map_err(classify)?;
        let orders = bol_db::open_orders(&mut tx, account_id)
            .await
            .map_err(classify)?;

        Ok(pattern_day_trades(
            DayTradeInputs {
                executions: &executions,
                open_orders: &orders,
                pending_order: pending,
            },
            &self.calendar,
            now,
            window_sessions,
        ))
    }

    /// Day-trade count plus the PDT decision for an account holding `equity`.
    pub async fn pdt_status(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        pending: Option<&Order>,
        equity: Decimal,
    ) -> LedgerResult<(DayTradeCount, PdtDecision)> {
        let count = self.pattern_day_trades(account_id, now, pending).await?;
        let decision = evaluate_pdt(
            &self.pdt,
            &PdtInput {
                day_trade_count: count.total,
                equity,
            },
        );
        Ok((count, decision))
    }
}
