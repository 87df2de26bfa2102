use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

/// Typed view of the merged config. Every section and field has a default,
/// so an empty config is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseSection,
    pub ledger: LedgerSection,
    pub calendar: CalendarSection,
    pub day_trades: DayTradeSection,
    pub audit: AuditSection,
}

impl EngineConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        serde_json::from_value(loaded.config_json.clone()).context("CONFIG_INVALID")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// NAME of the env var holding the connection URL.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url_env: "BOL_DATABASE_URL".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Retries after a serialization failure or deadlock; 0 disables retry.
    pub max_conflict_retries: u32,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    /// IANA zone of the exchange.
    pub timezone: String,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayTradeSection {
    pub enabled: bool,
    pub window_sessions: u32,
    pub flag_threshold: u32,
    pub min_equity: Decimal,
}

impl Default for DayTradeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            window_sessions: 5,
            flag_threshold: 4,
            min_equity: Decimal::from(25_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// JSONL file for batch errors. Unset means database only.
    pub batch_error_log: Option<String>,
    pub hash_chain: bool,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            batch_error_log: None,
            hash_chain: true,
        }
    }
}
