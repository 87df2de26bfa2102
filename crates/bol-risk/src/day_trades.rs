//! Pattern day trade counting over a trailing session window.
//!
//! Per symbol:
//! - **confirmed**: adjacent (buy, sell) fill pairs, in time order, on the
//!   same exchange-local date;
//! - **potential**: `min(open buys, open sells)` among open orders, plus one
//!   if the latest fill today was a buy and open sells outnumber open buys.
//!
//! Orders are counted, not shares: one open order is one potential round
//! trip regardless of its size.

use std::collections::{BTreeMap, BTreeSet};

use bol_calendar::TradingCalendar;
use bol_schemas::{Execution, Order, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug)]
pub struct DayTradeInputs<'a> {
    /// Fills for the account; anything outside the window is ignored.
    pub executions: &'a [Execution],
    /// Open orders for the account, any age.
    pub open_orders: &'a [Order],
    /// Hypothetical order under evaluation.
    pub pending_order: Option<&'a Order>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDayTrades {
    pub symbol: String,
    pub confirmed: u32,
    pub potential: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTradeCount {
    /// Fills strictly after this instant are in the window.
    pub window_start: DateTime<Utc>,
    pub confirmed: u32,
    pub potential: u32,
    pub total: u32,
    /// Symbols with a nonzero count, sorted.
    pub by_symbol: Vec<SymbolDayTrades>,
}

pub fn pattern_day_trades(
    inputs: DayTradeInputs<'_>,
    calendar: &TradingCalendar,
    now: DateTime<Utc>,
    window_sessions: u32,
) -> DayTradeCount {
    let window_start = calendar.trailing_window_start(now, window_sessions);
    let today = calendar.local_date(now);

    let mut fills: BTreeMap<&str, Vec<&Execution>> = BTreeMap::new();
    for e in inputs.executions {
        if e.exec_type.is_fill() && e.transaction_time > window_start && e.transaction_time <= now
        {
            fills.entry(e.symbol.as_str()).or_default().push(e);
        }
    }

    // symbol -> (open buys, open sells)
    let mut open: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    let orders = inputs
        .open_orders
        .iter()
        .filter(|o| o.status.is_open())
        .chain(inputs.pending_order);
    for o in orders {
        let slot = open.entry(o.symbol.as_str()).or_default();
        match o.side {
            Side::Buy => slot.0 += 1,
            Side::Sell => slot.1 += 1,
        }
    }

    let symbols: BTreeSet<&str> = fills.keys().chain(open.keys()).copied().collect();

    let mut out = DayTradeCount {
        window_start,
        confirmed: 0,
        potential: 0,
        total: 0,
        by_symbol: Vec::new(),
    };

    for sym in symbols {
        let mut execs = fills.remove(sym).unwrap_or_default();
        execs.sort_by(|a, b| {
            a.transaction_time
                .cmp(&b.transaction_time)
                .then(a.execution_id.cmp(&b.execution_id))
        });

        let confirmed = execs
            .windows(2)
            .filter(|w| {
                w[0].side == Side::Buy
                    && w[1].side == Side::Sell
                    && calendar.local_date(w[0].transaction_time)
                        == calendar.local_date(w[1].transaction_time)
            })
            .count() as u32;

        let (buys, sells) = open.get(sym).copied().unwrap_or((0, 0));
        let mut potential = buys.min(sells);
        let bought_today = execs
            .last()
            .is_some_and(|e| e.side == Side::Buy && calendar.local_date(e.transaction_time) == today);
        if bought_today && sells > buys {
            potential += 1;
        }

        if confirmed + potential > 0 {
            out.by_symbol.push(SymbolDayTrades {
                symbol: sym.to_string(),
                confirmed,
                potential,
            });
        }
        out.confirmed += confirmed;
        out.potential += potential;
    }

    out.total = out.confirmed + out.potential;
    out
}
