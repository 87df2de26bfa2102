use bol_schemas::LedgerError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BATCH_ERROR_NAMESPACE: Uuid = Uuid::from_u128(0x2f8e_91c4_0b7d_4a16_8e35_d4a0_6c19_f27b);

/// Composite key of a batch failure. Re-running the same batch for the same
/// date produces the same key, so storage can dedupe on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchErrorKey {
    pub process_date: NaiveDate,
    /// Which feed or file the item came from, e.g. `SPLIT_POSITIONS`.
    pub source_code: String,
    /// Usually the account id.
    pub primary_id: String,
    /// Usually the symbol or instrument id. Empty when not applicable.
    pub secondary_id: String,
}

impl BatchErrorKey {
    pub fn new(
        process_date: NaiveDate,
        source_code: impl Into<String>,
        primary_id: impl Into<String>,
        secondary_id: impl Into<String>,
    ) -> Self {
        Self {
            process_date,
            source_code: source_code.into(),
            primary_id: primary_id.into(),
            secondary_id: secondary_id.into(),
        }
    }

    /// Stable v5 id of the key.
    pub fn record_id(&self) -> Uuid {
        let name = format!(
            "{}|{}|{}|{}",
            self.process_date, self.source_code, self.primary_id, self.secondary_id
        );
        Uuid::new_v5(&BATCH_ERROR_NAMESPACE, name.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchErrorRecord {
    pub record_id: Uuid,
    pub key: BatchErrorKey,
    /// `LedgerError::kind()` code.
    pub error_kind: String,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl BatchErrorRecord {
    pub fn new(
        key: BatchErrorKey,
        error_kind: impl Into<String>,
        message: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: key.record_id(),
            key,
            error_kind: error_kind.into(),
            message: message.into(),
            recorded_at,
        }
    }

    pub fn from_error(key: BatchErrorKey, err: &LedgerError, recorded_at: DateTime<Utc>) -> Self {
        Self::new(key, err.kind(), err.to_string(), recorded_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(secondary: &str) -> BatchErrorKey {
        BatchErrorKey::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "SPLIT_POSITIONS",
            "acct-1",
            secondary,
        )
    }

    #[test]
    fn record_id_is_stable_and_key_sensitive() {
        assert_eq!(key("AAPL").record_id(), key("AAPL").record_id());
        assert_ne!(key("AAPL").record_id(), key("MSFT").record_id());
    }

    #[test]
    fn from_error_uses_kind_code() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        let err = LedgerError::DataInconsistency("no open lots".to_string());
        let r = BatchErrorRecord::from_error(key("AAPL"), &err, at);
        assert_eq!(r.error_kind, "DATA_INCONSISTENCY");
        assert!(r.message.contains("no open lots"));
        assert_eq!(r.record_id, key("AAPL").record_id());
    }
}
