//! Intraday balance projection.
//!
//! The last confirmed end-of-day cash snapshot already reflects everything
//! up to its trading date. Everything from the following trading day on is
//! applied here as a delta:
//!
//! | delta                                | withdrawable | total | buying power |
//! |--------------------------------------|:---:|:---:|:---:|
//! | pending outgoing transfer            |  −  |  −  |  −  |
//! | open buy order (unfilled remainder)  |  −  |     |  −  |
//! | lot opened since the boundary        |  −  |  −  |  −  |
//! | lot closed since the boundary        |     |  +  |  +  |
//!
//! Withdrawable cash is floored at zero; nothing else is clamped.

use bol_calendar::TradingCalendar;
use bol_schemas::{Account, CashSnapshot, Order, Position, PositionStatus, Side, Transfer};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything read from one consistent snapshot of the store.
#[derive(Clone, Copy, Debug)]
pub struct BalanceInputs<'a> {
    pub account: &'a Account,
    /// Most recent confirmed snapshot, if any.
    pub latest_snapshot: Option<&'a CashSnapshot>,
    pub transfers: &'a [Transfer],
    pub open_orders: &'a [Order],
    /// Lots entered or exited since the boundary. Older rows are ignored,
    /// so passing a superset is harmless.
    pub positions: &'a [Position],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub withdrawable_cash: Decimal,
    pub total_cash: Decimal,
    pub buying_power: Decimal,
    /// First trading date not covered by the snapshot.
    pub trading_date_boundary: NaiveDate,
    /// Open buy orders with neither a limit nor an estimated price. Their
    /// cost could not be reserved.
    pub unpriced_orders: Vec<Uuid>,
}

/// First trading date whose activity is not in `snapshot`: the trading day
/// after it, or the current trading date when there is no snapshot.
pub fn trading_date_boundary(
    calendar: &TradingCalendar,
    snapshot: Option<&CashSnapshot>,
    now: DateTime<Utc>,
) -> NaiveDate {
    match snapshot {
        Some(s) => calendar.next_trading_day(s.trading_date),
        None => calendar.current_trading_date(now),
    }
}

pub fn account_balances(
    inputs: BalanceInputs<'_>,
    calendar: &TradingCalendar,
    now: DateTime<Utc>,
) -> AccountBalances {
    let account_id = inputs.account.account_id;
    let boundary = trading_date_boundary(calendar, inputs.latest_snapshot, now);
    let since = calendar.start_of_day_utc(boundary);

    let mut withdrawable = inputs.account.cash_withdrawable;
    let mut buying_power = inputs.account.cash_withdrawable;
    let mut total = inputs
        .latest_snapshot
        .map(|s| s.value)
        .unwrap_or(inputs.account.cash_withdrawable);

    for t in inputs.transfers {
        if t.account_id == account_id && t.is_pending_outflow() {
            withdrawable -= t.amount;
            total -= t.amount;
            buying_power -= t.amount;
        }
    }

    let mut unpriced_orders = Vec::new();
    for o in inputs.open_orders {
        if o.account_id != account_id || o.side != Side::Buy || !o.status.is_open() {
            continue;
        }
        match o.reserved_cost() {
            Some(cost) => {
                withdrawable -= cost;
                buying_power -= cost;
            }
            None => unpriced_orders.push(o.order_id),
        }
    }

    for p in inputs.positions {
        if p.account_id != account_id || p.status == PositionStatus::Split {
            continue;
        }
        if p.entry_time >= since {
            let cost = p.cost_basis();
            withdrawable -= cost;
            total -= cost;
            buying_power -= cost;
        }
        if p.status == PositionStatus::Closed && p.exit_time.is_some_and(|t| t >= since) {
            let proceeds = p.exit_value();
            total += proceeds;
            buying_power += proceeds;
        }
    }

    unpriced_orders.sort();

    AccountBalances {
        withdrawable_cash: withdrawable.max(Decimal::ZERO),
        total_cash: total,
        buying_power,
        trading_date_boundary: boundary,
        unpriced_orders,
    }
}
