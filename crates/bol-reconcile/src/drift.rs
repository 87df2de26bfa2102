use std::collections::BTreeMap;

use bol_positions::LotKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareDrift {
    pub key: LotKey,
    pub local_qty: Decimal,
    pub authoritative_qty: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Keys whose local open quantity disagrees. Sorted by key.
    pub drifts: Vec<ShareDrift>,
    /// Keys that already agree (nothing to do; a re-run lands here).
    pub unchanged: usize,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty()
    }
}

/// Compare local open quantities with the authoritative counts.
///
/// Only keys present in `authoritative` are judged: a key the clearing file
/// does not mention is not evidence of a corporate action. A key with no
/// local lots reads as local quantity zero.
pub fn detect_share_drift(
    local: &BTreeMap<LotKey, Decimal>,
    authoritative: &BTreeMap<LotKey, Decimal>,
) -> DriftReport {
    let mut report = DriftReport::default();

    for (key, &auth) in authoritative {
        let lq = local.get(key).copied().unwrap_or(Decimal::ZERO);
        if lq == auth {
            report.unchanged += 1;
        } else {
            report.drifts.push(ShareDrift {
                key: *key,
                local_qty: lq,
                authoritative_qty: auth,
            });
        }
    }

    report.drifts.sort();
    report
}
