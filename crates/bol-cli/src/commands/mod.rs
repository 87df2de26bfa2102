//! Command handler modules for bol-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod ledger;
pub mod replay;

use anyhow::{bail, Context, Result};
use bol_audit::VerifyResult;
use bol_config::{report_unused_keys, EngineConfig, LoadedConfig, UnusedKeyPolicy};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Used when no `--config` is given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "config/base.yaml";

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub struct ConfigArgs {
    pub paths: Vec<String>,
    pub strict: bool,
}

impl ConfigArgs {
    /// Load, check unused keys, and type the layered config.
    pub fn load(&self) -> Result<EngineConfig> {
        let paths: Vec<&str> = if !self.paths.is_empty() {
            self.paths.iter().map(String::as_str).collect()
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            vec![DEFAULT_CONFIG_PATH]
        } else {
            return Ok(EngineConfig::default());
        };

        let loaded = bol_config::load_layered_yaml(&paths)?;
        warn_unused(&loaded, self.strict)?;
        EngineConfig::from_loaded(&loaded)
    }
}

fn policy(strict: bool) -> UnusedKeyPolicy {
    if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    }
}

fn warn_unused(loaded: &LoadedConfig, strict: bool) -> Result<()> {
    let report = report_unused_keys(&loaded.config_json, policy(strict))?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read json file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid json in file: {}", path.display()))
}

// ---------------------------------------------------------------------------
// config-hash
// ---------------------------------------------------------------------------

pub fn config_hash(paths: &[String], strict: bool) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = bol_config::load_layered_yaml(&path_refs)?;
    warn_unused(&loaded, strict)?;
    // Surface type errors here rather than at first use.
    EngineConfig::from_loaded(&loaded)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

// ---------------------------------------------------------------------------
// audit verify
// ---------------------------------------------------------------------------

pub fn audit_verify(path: &Path) -> Result<()> {
    match bol_audit::verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_chain=valid lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_chain=broken line={line} reason={reason}");
            bail!("AUDIT_CHAIN_BROKEN path={} line={line}", path.display())
        }
    }
}
