//! bol-runtime
//!
//! `LedgerEngine` wires the pure planners to the store:
//! - execution processing: one serializable transaction per execution,
//!   account row lock, inbox dedupe, bounded conflict retry
//! - split batch: mark drifted keys, then reconcile each key in its own
//!   transaction; failures become batch-error records and never stop the run
//! - balances and day-trade counts from one repeatable-read snapshot

mod balances;
mod engine;
mod execution;
mod retry;
mod splits;

pub use engine::LedgerEngine;
pub use execution::ExecutionOutcome;
pub use retry::{classify, retry_on_conflict};
pub use splits::{AuthoritativePosition, SPLIT_SOURCE_CODE};
