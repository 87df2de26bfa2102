//! Row -> model mapping. Text enums go through the model's `parse`.

use anyhow::Result;
use bol_schemas::{
    Execution, ExecutionType, Order, OrderStatus, OrderType, Position, PositionSide,
    PositionStatus, Side, Transfer, TransferDirection, TransferStatus,
};
use sqlx::postgres::PgRow;
use sqlx::Row;

pub(crate) const POSITION_COLUMNS: &str = r#"
    id, account_id, instrument_id, symbol, side, status, quantity,
    entry_price, entry_time, exit_price, exit_time, originating_order_id,
    closing_order_id, original_position_id, marked_for_split_at
"#;

pub(crate) fn position(row: &PgRow) -> Result<Position> {
    Ok(Position {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        instrument_id: row.try_get("instrument_id")?,
        symbol: row.try_get("symbol")?,
        side: PositionSide::parse(&row.try_get::<String, _>("side")?)?,
        status: PositionStatus::parse(&row.try_get::<String, _>("status")?)?,
        quantity: row.try_get("quantity")?,
        entry_price: row.try_get("entry_price")?,
        entry_time: row.try_get("entry_time")?,
        exit_price: row.try_get("exit_price")?,
        exit_time: row.try_get("exit_time")?,
        originating_order_id: row.try_get("originating_order_id")?,
        closing_order_id: row.try_get("closing_order_id")?,
        original_position_id: row.try_get("original_position_id")?,
        marked_for_split_at: row.try_get("marked_for_split_at")?,
    })
}

pub(crate) fn order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        order_id: row.try_get("order_id")?,
        account_id: row.try_get("account_id")?,
        symbol: row.try_get("symbol")?,
        side: Side::parse(&row.try_get::<String, _>("side")?)?,
        order_type: OrderType::parse(&row.try_get::<String, _>("order_type")?)?,
        quantity: row.try_get("quantity")?,
        filled_quantity: row.try_get("filled_quantity")?,
        limit_price: row.try_get("limit_price")?,
        estimated_price: row.try_get("estimated_price")?,
        status: OrderStatus::parse(&row.try_get::<String, _>("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn execution(row: &PgRow) -> Result<Execution> {
    Ok(Execution {
        execution_id: row.try_get("execution_id")?,
        order_id: row.try_get("order_id")?,
        symbol: row.try_get("symbol")?,
        side: Side::parse(&row.try_get::<String, _>("side")?)?,
        exec_type: ExecutionType::parse(&row.try_get::<String, _>("exec_type")?)?,
        quantity: row.try_get("quantity")?,
        avg_price: row.try_get("avg_price")?,
        cum_quantity: row.try_get("cum_quantity")?,
        transaction_time: row.try_get("transaction_time")?,
    })
}

pub(crate) fn transfer(row: &PgRow) -> Result<Transfer> {
    Ok(Transfer {
        transfer_id: row.try_get("transfer_id")?,
        account_id: row.try_get("account_id")?,
        direction: TransferDirection::parse(&row.try_get::<String, _>("direction")?)?,
        amount: row.try_get("amount")?,
        status: TransferStatus::parse(&row.try_get::<String, _>("status")?)?,
        batch_processed_at: row.try_get("batch_processed_at")?,
        created_at: row.try_get("created_at")?,
    })
}
