//! bol-schemas
//!
//! Shared domain model for the position & balance ledger.
//! - Positions are lots: one row per fill, never merged, never deleted
//! - Quantities, prices and cash are `rust_decimal::Decimal`
//! - Engine-created rows get deterministic v5 ids (replay-stable, no RNG)
//! - [`LedgerError`] is the single error taxonomy crossing crate boundaries

mod error;
mod model;

pub use error::{LedgerError, LedgerResult};
pub use model::{
    derived_id, Account, CashSnapshot, Execution, ExecutionType, Order, OrderStatus, OrderType,
    Position, PositionSide, PositionStatus, Side, Transfer, TransferDirection, TransferStatus,
};
