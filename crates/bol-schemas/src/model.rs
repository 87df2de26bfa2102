use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::LedgerError;

// ---------------------------------------------------------------------------
// String-coded enums
// ---------------------------------------------------------------------------

/// Enums persisted as lowercase text columns. `as_str` and `parse` are the
/// only conversions the store uses, so the DB spelling lives here.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(anyhow!(concat!("invalid ", stringify!($name), ": {}"), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Order / execution side.
    Side { Buy => "buy", Sell => "sell" }
);

text_enum!(
    /// Lot direction. Short lots are representable but never produced by
    /// the projector.
    PositionSide { Long => "long", Short => "short" }
);

text_enum!(
    /// `Split` is terminal: the lot was replaced by derived lots and is
    /// excluded from all aggregation.
    PositionStatus { Open => "open", Closed => "closed", Split => "split" }
);

text_enum!(
    ExecutionType {
        New => "new",
        PendingNew => "pending_new",
        PartialFill => "partial_fill",
        Fill => "fill",
        DoneForDay => "done_for_day",
        Canceled => "canceled",
        PendingCancel => "pending_cancel",
        Replaced => "replaced",
        PendingReplace => "pending_replace",
        Rejected => "rejected",
        Expired => "expired",
    }
);

impl ExecutionType {
    /// Only fills move shares.
    pub fn is_fill(&self) -> bool {
        matches!(self, ExecutionType::Fill | ExecutionType::PartialFill)
    }
}

text_enum!(
    OrderType {
        Market => "market",
        Limit => "limit",
        Stop => "stop",
        StopLimit => "stop_limit",
    }
);

text_enum!(
    OrderStatus {
        New => "new",
        PendingNew => "pending_new",
        Accepted => "accepted",
        PartiallyFilled => "partially_filled",
        PendingCancel => "pending_cancel",
        PendingReplace => "pending_replace",
        Filled => "filled",
        DoneForDay => "done_for_day",
        Canceled => "canceled",
        Expired => "expired",
        Replaced => "replaced",
        Rejected => "rejected",
    }
);

impl OrderStatus {
    /// Orders that can still produce fills.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::New
                | OrderStatus::PendingNew
                | OrderStatus::Accepted
                | OrderStatus::PartiallyFilled
                | OrderStatus::PendingCancel
                | OrderStatus::PendingReplace
        )
    }
}

text_enum!(
    TransferDirection { Incoming => "incoming", Outgoing => "outgoing" }
);

text_enum!(
    TransferStatus {
        Requested => "requested",
        Pending => "pending",
        Approved => "approved",
        Complete => "complete",
        Canceled => "canceled",
        Rejected => "rejected",
        Returned => "returned",
    }
);

impl TransferStatus {
    pub fn is_dead(&self) -> bool {
        matches!(
            self,
            TransferStatus::Canceled | TransferStatus::Rejected | TransferStatus::Returned
        )
    }
}

// ---------------------------------------------------------------------------
// Deterministic ids
// ---------------------------------------------------------------------------

const LEDGER_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c0e_52a4_4d7e_9a63_0c2d_7e41_b8f5);

/// Deterministic v5 id for an engine-created row.
///
/// `kind` separates id spaces ("fill-lot", "split-closed", ...), `parent` is
/// the execution or lot the row derives from and `disc` disambiguates
/// siblings. Re-deriving from the same inputs yields the same id, so a
/// replayed write collides on the primary key instead of duplicating.
pub fn derived_id(kind: &str, parent: Uuid, disc: &str) -> Uuid {
    let name = format!("{kind}|{parent}|{disc}");
    Uuid::new_v5(&LEDGER_NAMESPACE, name.as_bytes())
}

// ---------------------------------------------------------------------------
// Position (lot)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub account_id: Uuid,
    pub instrument_id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub status: PositionStatus,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub originating_order_id: Uuid,
    pub closing_order_id: Option<Uuid>,
    /// Lineage only: the lot this one was derived from.
    pub original_position_id: Option<Uuid>,
    /// Pending split reconciliation for this date.
    pub marked_for_split_at: Option<NaiveDate>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.entry_price
    }

    pub fn exit_value(&self) -> Decimal {
        self.quantity * self.exit_price.unwrap_or(Decimal::ZERO)
    }

    /// Row-level invariants. Checked before every write.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        if self.quantity < Decimal::ZERO {
            return Err(LedgerError::InvariantViolation(format!(
                "position {} has negative quantity {}",
                self.id, self.quantity
            )));
        }
        match self.status {
            PositionStatus::Open => {
                if self.quantity.is_zero() {
                    return Err(LedgerError::InvariantViolation(format!(
                        "open position {} has zero quantity",
                        self.id
                    )));
                }
                if self.exit_price.is_some() || self.exit_time.is_some() {
                    return Err(LedgerError::InvariantViolation(format!(
                        "open position {} carries exit fields",
                        self.id
                    )));
                }
            }
            PositionStatus::Closed => {
                if self.exit_price.is_none() || self.exit_time.is_none() {
                    return Err(LedgerError::InvariantViolation(format!(
                        "closed position {} is missing exit fields",
                        self.id
                    )));
                }
            }
            PositionStatus::Split => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inputs owned by other systems
// ---------------------------------------------------------------------------

/// One immutable fill event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub order_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub exec_type: ExecutionType,
    /// Shares filled in this event.
    pub quantity: Decimal,
    pub avg_price: Decimal,
    /// Cumulative filled on the order after this event.
    pub cum_quantity: Decimal,
    pub transaction_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub estimated_price: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn remaining_quantity(&self) -> Decimal {
        (self.quantity - self.filled_quantity).max(Decimal::ZERO)
    }

    /// Cash still reserved by the unfilled part of the order. `None` when
    /// the order carries neither a limit nor an estimated price.
    pub fn reserved_cost(&self) -> Option<Decimal> {
        let px = self.limit_price.or(self.estimated_price)?;
        Some(self.remaining_quantity() * px)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: Uuid,
    pub account_id: Uuid,
    pub direction: TransferDirection,
    pub amount: Decimal,
    pub status: TransferStatus,
    /// Set once the end-of-day batch has folded this transfer into a snapshot.
    pub batch_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Outgoing, live, and not yet reflected in any cash snapshot.
    pub fn is_pending_outflow(&self) -> bool {
        self.direction == TransferDirection::Outgoing
            && self.batch_processed_at.is_none()
            && !self.status.is_dead()
    }
}

/// Authoritative end-of-day cash for one trading date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashSnapshot {
    pub account_id: Uuid,
    pub trading_date: NaiveDate,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: Uuid,
    pub cash_withdrawable: Decimal,
}
