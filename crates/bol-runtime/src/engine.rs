use std::sync::Mutex;

use anyhow::{Context, Result};
use bol_audit::{AuditWriter, BatchErrorRecord};
use bol_calendar::TradingCalendar;
use bol_config::{DayTradeSection, EngineConfig};
use bol_risk::PdtPolicy;
use sqlx::PgPool;
use chrono::NaiveDate;
use tracing::{error, warn};

/// Disabling enforcement only turns off the decision; the configured window
/// still drives day-trade counting.
fn policy_from_config(dt: &DayTradeSection) -> PdtPolicy {
    PdtPolicy {
        enabled: dt.enabled,
        window_sessions: dt.window_sessions,
        flag_threshold: dt.flag_threshold,
        min_equity: dt.min_equity,
    }
}

/// The ledger engine. Cheap to share by reference; every operation opens
/// its own transaction(s) on the pool.
pub struct LedgerEngine {
    pub(crate) pool: PgPool,
    pub(crate) cfg: EngineConfig,
    pub(crate) calendar: TradingCalendar,
    pub(crate) pdt: PdtPolicy,
    audit: Option<Mutex<AuditWriter>>,
}

impl LedgerEngine {
    pub fn new(pool: PgPool, cfg: EngineConfig) -> Result<Self> {
        let calendar = TradingCalendar::with_timezone(&cfg.calendar.timezone)?;

        let audit = match &cfg.audit.batch_error_log {
            Some(path) => Some(Mutex::new(
                AuditWriter::open(path, cfg.audit.hash_chain)
                    .with_context(|| format!("open batch error log {path}"))?,
            )),
            None => None,
        };

        let pdt = policy_from_config(&cfg.day_trades);

        Ok(Self {
            pool,
            cfg,
            calendar,
            pdt,
            audit,
        })
    }

    /// Resolve the database URL from the configured env var, connect, and
    /// build the engine.
    pub async fn connect(cfg: EngineConfig) -> Result<Self> {
        let url = bol_config::resolve_database_url(&cfg)?;
        let pool = bol_db::connect(url.expose(), cfg.database.max_connections).await?;
        Self::new(pool, cfg)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn pdt_policy(&self) -> &PdtPolicy {
        &self.pdt
    }

    pub(crate) fn max_retries(&self) -> u32 {
        self.cfg.ledger.max_conflict_retries
    }

    /// Holidays past the calendar table count as trading days, which shifts
    /// balance boundaries, day-trade windows and split close times.
    pub(crate) fn warn_if_uncovered(&self, date: NaiveDate, op: &'static str) {
        if !self.calendar.covers(date) {
            warn!(
                date = %date,
                op,
                "date outside the exchange holiday table; only weekends are closed"
            );
        }
    }

    /// Persist a batch failure to the database and, when configured, the
    /// JSONL log. Recording problems are logged and swallowed so one bad
    /// record cannot stop the batch.
    pub(crate) async fn record_batch_error(&self, rec: &BatchErrorRecord) {
        if let Err(e) = bol_db::upsert_batch_error(&self.pool, rec).await {
            error!(record_id = %rec.record_id, error = %format!("{e:#}"), "batch error upsert failed");
        }

        let Some(audit) = &self.audit else {
            return;
        };
        let res = match audit.lock() {
            Ok(mut w) => w.record_batch_error(rec).map(|_| ()),
            Err(_) => Err(anyhow::anyhow!("audit writer lock poisoned")),
        };
        if let Err(e) = res {
            error!(record_id = %rec.record_id, error = %format!("{e:#}"), "batch error log append failed");
        }
    }
}
