use bol_calendar::TradingCalendar;
use bol_risk::{pattern_day_trades, DayTradeInputs};
use bol_schemas::{Execution, ExecutionType, Order, OrderStatus, OrderType, Side};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn fill(n: u128, sym: &str, side: Side, ts: DateTime<Utc>) -> Execution {
    Execution {
        execution_id: Uuid::from_u128(n),
        order_id: Uuid::from_u128(500 + n),
        symbol: sym.to_string(),
        side,
        exec_type: ExecutionType::Fill,
        quantity: dec!(10),
        avg_price: dec!(50),
        cum_quantity: dec!(10),
        transaction_time: ts,
    }
}

fn order(n: u128, sym: &str, side: Side) -> Order {
    Order {
        order_id: Uuid::from_u128(n),
        account_id: Uuid::from_u128(1),
        symbol: sym.to_string(),
        side,
        order_type: OrderType::Market,
        quantity: dec!(1),
        filled_quantity: dec!(0),
        limit_price: None,
        estimated_price: Some(dec!(50)),
        status: OrderStatus::New,
        created_at: Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap(),
    }
}

#[test]
fn scenario_same_day_round_trip_counts_next_day_does_not() {
    let cal = TradingCalendar::nyse();
    let now = Utc.with_ymd_and_hms(2024, 1, 12, 20, 0, 0).unwrap(); // Fri 15:00 ET

    let execs = [
        // Mon: buy -> sell (day trade)
        fill(1, "AAPL", Side::Buy, Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap()),
        fill(2, "AAPL", Side::Sell, Utc.with_ymd_and_hms(2024, 1, 8, 17, 0, 0).unwrap()),
        // Tue buy -> Wed sell (not a day trade)
        fill(3, "AAPL", Side::Buy, Utc.with_ymd_and_hms(2024, 1, 9, 15, 0, 0).unwrap()),
        fill(4, "AAPL", Side::Sell, Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap()),
    ];

    let c = pattern_day_trades(
        DayTradeInputs {
            executions: &execs,
            open_orders: &[],
            pending_order: None,
        },
        &cal,
        now,
        5,
    );
    assert_eq!(c.confirmed, 1);
    assert_eq!(c.potential, 0);
    assert_eq!(c.total, 1);
}

#[test]
fn scenario_counts_are_summed_across_symbols() {
    let cal = TradingCalendar::nyse();
    let now = Utc.with_ymd_and_hms(2024, 1, 12, 20, 0, 0).unwrap();
    let day = Utc.with_ymd_and_hms(2024, 1, 11, 15, 0, 0).unwrap();

    let execs = [
        fill(1, "AAPL", Side::Buy, day),
        fill(2, "AAPL", Side::Sell, day + Duration::minutes(5)),
        fill(3, "MSFT", Side::Buy, day),
        fill(4, "MSFT", Side::Sell, day + Duration::minutes(5)),
    ];
    let orders = [order(10, "TSLA", Side::Buy), order(11, "TSLA", Side::Sell)];

    let c = pattern_day_trades(
        DayTradeInputs {
            executions: &execs,
            open_orders: &orders,
            pending_order: None,
        },
        &cal,
        now,
        5,
    );
    assert_eq!(c.total, 3);
    let syms: Vec<_> = c.by_symbol.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(syms, vec!["AAPL", "MSFT", "TSLA"]);
}

proptest! {
    /// Evaluating a hypothetical order never lowers the count.
    #[test]
    fn pending_order_never_decreases_count(
        fills in prop::collection::vec((any::<bool>(), 0u8..2, 0i64..(5 * 24 * 60)), 0..20),
        open in prop::collection::vec((any::<bool>(), 0u8..2), 0..8),
        pending_buy in any::<bool>(),
        pending_sym in 0u8..2,
    ) {
        let cal = TradingCalendar::nyse();
        let start = Utc.with_ymd_and_hms(2024, 1, 8, 14, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 12, 20, 0, 0).unwrap();
        let sym = |s: u8| if s == 0 { "AAA" } else { "BBB" };
        let side = |b: bool| if b { Side::Buy } else { Side::Sell };

        let execs: Vec<Execution> = fills
            .iter()
            .enumerate()
            .map(|(i, (b, s, m))| fill(i as u128, sym(*s), side(*b), start + Duration::minutes(*m)))
            .collect();
        let orders: Vec<Order> = open
            .iter()
            .enumerate()
            .map(|(i, (b, s))| order(1000 + i as u128, sym(*s), side(*b)))
            .collect();
        let pending = order(9999, sym(pending_sym), side(pending_buy));

        let without = pattern_day_trades(
            DayTradeInputs { executions: &execs, open_orders: &orders, pending_order: None },
            &cal, now, 5,
        );
        let with = pattern_day_trades(
            DayTradeInputs { executions: &execs, open_orders: &orders, pending_order: Some(&pending) },
            &cal, now, 5,
        );
        prop_assert!(with.total >= without.total);
    }
}
