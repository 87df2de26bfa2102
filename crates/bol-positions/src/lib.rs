//! bol-positions
//!
//! Execution projector: fill events -> lot writes.
//! - One buy fill opens exactly one lot (no merging)
//! - Sells consume open long lots FIFO by entry time
//! - A partially consumed lot is split: original marked `split`, closed and
//!   open children inserted with lineage back to it
//! - Pure deterministic planning ([`project_execution`]) separated from
//!   storage; [`PositionBook`] is the in-memory store used for replay

mod book;
mod projector;
mod types;

pub use book::PositionBook;
pub use projector::{project_execution, LotKey};
pub use types::{PositionWrite, Projection, ProjectionKind};
