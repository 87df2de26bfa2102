use bol_schemas::Position;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One mutation of the position store. A unit of work is a `Vec` of these,
/// applied all-or-nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionWrite {
    /// New lot row.
    Insert(Position),
    /// Close an open lot in full.
    Close {
        position_id: Uuid,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        closing_order_id: Uuid,
    },
    /// Retire a lot that has been replaced by derived lots. Sets status
    /// `split` and clears `marked_for_split_at`.
    Supersede { position_id: Uuid },
}

impl PositionWrite {
    pub fn position_id(&self) -> Uuid {
        match self {
            PositionWrite::Insert(p) => p.id,
            PositionWrite::Close { position_id, .. } => *position_id,
            PositionWrite::Supersede { position_id } => *position_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionKind {
    /// Not a fill; nothing to do.
    Ignored,
    /// Buy fill opened a new lot.
    Opened { position_id: Uuid },
    /// Sell fill consumed lots. `split` is the lot partially consumed, if any.
    Reduced { closed: Vec<Uuid>, split: Option<Uuid> },
    /// Sell fill with no open lot to consume. Logged upstream as an anomaly.
    DroppedNoOpenLots,
}

/// Planned outcome of one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    pub kind: ProjectionKind,
    pub writes: Vec<PositionWrite>,
}

impl Projection {
    pub(crate) fn noop(kind: ProjectionKind) -> Self {
        Self {
            kind,
            writes: Vec::new(),
        }
    }
}
