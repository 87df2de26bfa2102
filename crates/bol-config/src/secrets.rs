//! Runtime secret resolution.
//!
//! Config stores the env var NAME of the database URL. The value is read
//! once at startup and carried in [`DatabaseUrl`], whose `Debug` redacts it.
//! Errors name the variable, never the value.

use anyhow::{bail, Result};

use crate::EngineConfig;

#[derive(Clone)]
pub struct DatabaseUrl(String);

impl DatabaseUrl {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DatabaseUrl(<REDACTED>)")
    }
}

pub fn resolve_database_url(cfg: &EngineConfig) -> Result<DatabaseUrl> {
    resolve_with(cfg, |name| std::env::var(name).ok())
}

fn resolve_with(cfg: &EngineConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<DatabaseUrl> {
    let name = cfg.database.url_env.trim();
    if name.is_empty() {
        bail!("CONFIG_MISSING database.url_env is empty");
    }
    match lookup(name).map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(DatabaseUrl(v)),
        _ => bail!("SECRET_MISSING env var {name} is not set"),
    }
}
