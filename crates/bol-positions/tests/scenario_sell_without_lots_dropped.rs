use bol_positions::{PositionBook, ProjectionKind};
use bol_schemas::{Execution, ExecutionType, Side};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[test]
fn scenario_sell_with_zero_open_lots_writes_nothing() {
    let mut book = PositionBook::new();

    let sell = Execution {
        execution_id: Uuid::from_u128(1),
        order_id: Uuid::from_u128(2),
        symbol: "TSLA".to_string(),
        side: Side::Sell,
        exec_type: ExecutionType::Fill,
        quantity: dec!(5),
        avg_price: dec!(200),
        cum_quantity: dec!(5),
        transaction_time: Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap(),
    };

    let p = book.process_execution(Uuid::from_u128(9), &sell).unwrap();
    assert_eq!(p.kind, ProjectionKind::DroppedNoOpenLots);
    assert!(p.writes.is_empty());
    assert_eq!(book.positions().count(), 0);
}
