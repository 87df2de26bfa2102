//! bol-risk
//!
//! Read-side projections that gate trading.
//! - Intraday balances: last confirmed cash snapshot + same-day deltas
//! - Pattern day trades over a trailing session window, with a worst-case
//!   projection for still-open orders
//! - PDT policy gate over the day-trade count
//!
//! Deterministic, pure logic. No IO; `now` and the calendar are inputs.

mod balances;
mod day_trades;
mod pdt;

pub use balances::{account_balances, trading_date_boundary, AccountBalances, BalanceInputs};
pub use day_trades::{pattern_day_trades, DayTradeCount, DayTradeInputs, SymbolDayTrades};
pub use pdt::{
    evaluate_pdt, PdtDecision, PdtInput, PdtPolicy, PdtReason, PDT_DAY_TRADE_THRESHOLD,
    PDT_DEFAULT_WINDOW_SESSIONS, PDT_MIN_EQUITY_USD,
};
