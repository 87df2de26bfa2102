//! bol-reconcile
//!
//! Corporate-action split reconciliation against authoritative share counts.
//! - [`handle_split`] is a pure function over (quantity, price) value objects
//! - Cost basis is conserved in aggregate and redistributed uniformly
//! - Remainders are distributed by an explicit bounded loop (no recursion)
//! - [`plan_split`] diffs the result against stored lots as position writes
//! - [`detect_share_drift`] picks the keys that need reconciling at all
//!
//! Deterministic: same inputs, same ordering, same writes.

mod drift;
mod report;
mod split;

pub use drift::{detect_share_drift, DriftReport, ShareDrift};
pub use report::{KeyFailure, KeyOutcome, SplitBatchReport};
pub use split::{
    handle_split, plan_split, AdjustedLot, SplitAdjustment, SplitDirection, SplitLot, SplitPlan,
};
