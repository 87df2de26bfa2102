use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::record::BatchErrorRecord;

/// `event_type` of batch-error events.
pub const BATCH_ERROR_EVENT: &str = "BATCH_ERROR";

const EVENT_NAMESPACE: Uuid = Uuid::from_u128(0x91d4_7a2c_e3f0_4b58_a1c6_5e8d_03b7_6f24);

/// Append-only JSONL audit log. With `hash_chain` on, each event carries
/// `hash_prev` (the previous event's `hash_self`) and `hash_self`.
///
/// Opening an existing file replays it: the chain head, the sequence counter
/// and the set of batch-error keys already logged are restored, so a
/// re-run of the same batch appends nothing new for keys it has seen.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
    seen: BTreeSet<Uuid>,
}

impl AuditWriter {
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let mut w = Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
            seen: BTreeSet::new(),
        };

        if w.path.exists() {
            let content = fs::read_to_string(&w.path)
                .with_context(|| format!("read audit log {:?}", w.path))?;
            for (i, line) in content.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let ev: AuditEvent = serde_json::from_str(trimmed)
                    .with_context(|| format!("parse audit event at line {}", i + 1))?;
                if ev.event_type == BATCH_ERROR_EVENT {
                    if let Some(id) = payload_record_id(&ev.payload) {
                        w.seen.insert(id);
                    }
                }
                w.last_hash = ev.hash_self;
                w.seq = ev.seq + 1;
            }
        }

        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Sequence number the next event will get.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn has_record(&self, record_id: Uuid) -> bool {
        self.seen.contains(&record_id)
    }

    pub fn append(&mut self, event_type: &str, payload: Value) -> Result<AuditEvent> {
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;

        let mut ev = AuditEvent {
            event_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            ev.hash_self = Some(compute_event_hash(&ev)?);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        self.seq += 1;
        if self.hash_chain {
            self.last_hash = ev.hash_self.clone();
        }
        Ok(ev)
    }

    /// Log a batch failure once per key. Returns `None` when the key is
    /// already in the log.
    pub fn record_batch_error(&mut self, rec: &BatchErrorRecord) -> Result<Option<AuditEvent>> {
        if self.seen.contains(&rec.record_id) {
            return Ok(None);
        }
        let payload = serde_json::to_value(rec).context("serialize batch error record failed")?;
        let ev = self.append(BATCH_ERROR_EVENT, payload)?;
        self.seen.insert(rec.record_id);
        Ok(Some(ev))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

fn payload_record_id(payload: &Value) -> Option<Uuid> {
    payload
        .get("record_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// v5 over (chain head, seq, canonical payload). No RNG.
fn derive_event_id(prev: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let body = serde_json::to_string(&sort_keys(payload)).context("json stringify failed")?;
    let name = format!("{}|{}|{}", prev.unwrap_or(""), seq, body);
    Ok(Uuid::new_v5(&EVENT_NAMESPACE, name.as_bytes()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Sorted-key compact JSON, one event per line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// SHA-256 of the canonical line with `hash_self` cleared.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut unhashed = ev.clone();
    unhashed.hash_self = None;

    let canonical = canonical_json_line(&unhashed)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Checks, line by line, that `hash_prev` links to the previous
/// `hash_self` and that `hash_self` matches the recomputed hash.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut lines = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;
        lines += 1;

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        if let Some(claimed) = &ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = ev.hash_self;
    }

    Ok(VerifyResult::Valid { lines })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}
