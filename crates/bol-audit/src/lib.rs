//! bol-audit
//!
//! - `BatchErrorKey` / `BatchErrorRecord`: one triage record per failed batch
//!   item, keyed by (process date, source code, primary id, secondary id)
//! - `AuditWriter`: append-only JSONL log with an optional SHA-256 hash chain
//! - `verify_hash_chain`: recompute the chain and report the first break

mod record;
mod writer;

pub use record::{BatchErrorKey, BatchErrorRecord};
pub use writer::{
    compute_event_hash, verify_hash_chain, verify_hash_chain_str, AuditEvent, AuditWriter,
    VerifyResult, BATCH_ERROR_EVENT,
};
