//! PDT (Pattern Day Trader) gate.
//!
//! # Regulatory Background
//! FINRA Rule 4210 defines a *pattern day trader* as any customer who executes
//! four or more *day trades* within five business days. A flagged account
//! must maintain a minimum equity of $25,000; otherwise the broker restricts
//! it to closing-only orders.
//!
//! # Design
//! The count comes from [`crate::pattern_day_trades`], which already folds in
//! the worst case for open and pending orders. This module only turns that
//! count plus account equity into a decision, so policy stays separate from
//! counting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// FINRA threshold: four or more day trades in five business days flags PDT.
pub const PDT_DAY_TRADE_THRESHOLD: u32 = 4;

/// FINRA minimum equity for a flagged account, in USD.
pub const PDT_MIN_EQUITY_USD: u32 = 25_000;

/// Default trailing window width in trading sessions.
pub const PDT_DEFAULT_WINDOW_SESSIONS: u32 = 5;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdtPolicy {
    /// When `false`, [`evaluate_pdt`] always allows trading.
    pub enabled: bool,

    /// Trailing window in trading sessions. FINRA uses 5.
    pub window_sessions: u32,

    /// Count at which the account is treated as a pattern day trader.
    pub flag_threshold: u32,

    /// Equity a flagged account must hold to keep opening positions.
    pub min_equity: Decimal,
}

impl PdtPolicy {
    pub fn finra_defaults() -> Self {
        Self {
            enabled: true,
            window_sessions: PDT_DEFAULT_WINDOW_SESSIONS,
            flag_threshold: PDT_DAY_TRADE_THRESHOLD,
            min_equity: Decimal::from(PDT_MIN_EQUITY_USD),
        }
    }

    /// Enforcement off (cash accounts, test environments).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            window_sessions: PDT_DEFAULT_WINDOW_SESSIONS,
            flag_threshold: u32::MAX,
            min_equity: Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdtInput {
    /// Confirmed + potential day trades in the window.
    pub day_trade_count: u32,
    /// Current account equity.
    pub equity: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdtDecision {
    pub trading_allowed: bool,
    pub pattern_day_trader: bool,
    pub reason: PdtReason,
    pub window_day_trade_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdtReason {
    EnforcementDisabled,
    /// Below the flag threshold.
    AllowedWithinLimit,
    /// Flagged, but equity covers the minimum.
    AllowedFlaggedAboveMinEquity,
    /// Flagged and under-capitalised: closing-only.
    RestrictedFlaggedBelowMinEquity,
}

impl PdtReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdtReason::EnforcementDisabled => "ENFORCEMENT_DISABLED",
            PdtReason::AllowedWithinLimit => "ALLOWED_WITHIN_LIMIT",
            PdtReason::AllowedFlaggedAboveMinEquity => "ALLOWED_FLAGGED_ABOVE_MIN_EQUITY",
            PdtReason::RestrictedFlaggedBelowMinEquity => "RESTRICTED_FLAGGED_BELOW_MIN_EQUITY",
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn evaluate_pdt(policy: &PdtPolicy, input: &PdtInput) -> PdtDecision {
    let count = input.day_trade_count;

    if !policy.enabled {
        return PdtDecision {
            trading_allowed: true,
            pattern_day_trader: false,
            reason: PdtReason::EnforcementDisabled,
            window_day_trade_count: count,
        };
    }

    if count < policy.flag_threshold {
        return PdtDecision {
            trading_allowed: true,
            pattern_day_trader: false,
            reason: PdtReason::AllowedWithinLimit,
            window_day_trade_count: count,
        };
    }

    if input.equity >= policy.min_equity {
        PdtDecision {
            trading_allowed: true,
            pattern_day_trader: true,
            reason: PdtReason::AllowedFlaggedAboveMinEquity,
            window_day_trade_count: count,
        }
    } else {
        PdtDecision {
            trading_allowed: false,
            pattern_day_trader: true,
            reason: PdtReason::RestrictedFlaggedBelowMinEquity,
            window_day_trade_count: count,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
