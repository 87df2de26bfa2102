use bol_calendar::TradingCalendar;
use bol_risk::{account_balances, BalanceInputs};
use bol_schemas::{
    Account, CashSnapshot, Order, OrderStatus, OrderType, Side, Transfer, TransferDirection,
    TransferStatus,
};
use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[test]
fn scenario_pending_transfer_and_open_buy_reduce_withdrawable() {
    let cal = TradingCalendar::nyse();
    // Wed 2024-01-10, snapshot from Mon 2024-01-08 (two trading days ago)
    let now = Utc.with_ymd_and_hms(2024, 1, 10, 16, 0, 0).unwrap();
    let account = Account {
        account_id: Uuid::from_u128(1),
        cash_withdrawable: dec!(10000),
    };
    let snapshot = CashSnapshot {
        account_id: account.account_id,
        trading_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        value: dec!(10000),
    };
    let transfers = [Transfer {
        transfer_id: Uuid::from_u128(2),
        account_id: account.account_id,
        direction: TransferDirection::Outgoing,
        amount: dec!(3000),
        status: TransferStatus::Pending,
        batch_processed_at: None,
        created_at: now,
    }];
    let orders = [Order {
        order_id: Uuid::from_u128(3),
        account_id: account.account_id,
        symbol: "AAPL".to_string(),
        side: Side::Buy,
        order_type: OrderType::Limit,
        quantity: dec!(10),
        filled_quantity: dec!(0),
        limit_price: Some(dec!(100)),
        estimated_price: None,
        status: OrderStatus::Accepted,
        created_at: now,
    }];

    let b = account_balances(
        BalanceInputs {
            account: &account,
            latest_snapshot: Some(&snapshot),
            transfers: &transfers,
            open_orders: &orders,
            positions: &[],
        },
        &cal,
        now,
    );

    assert_eq!(b.withdrawable_cash, dec!(6000));
    assert_eq!(b.total_cash, dec!(7000));
    assert_eq!(b.buying_power, dec!(6000));
    assert_eq!(b.trading_date_boundary, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
}

proptest! {
    #[test]
    fn withdrawable_cash_is_never_negative(
        base in 0i64..50_000,
        outflows in prop::collection::vec(1i64..20_000, 0..6),
        buys in prop::collection::vec((1u32..200, 1i64..500), 0..6),
    ) {
        let cal = TradingCalendar::nyse();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 16, 0, 0).unwrap();
        let account = Account { account_id: Uuid::from_u128(1), cash_withdrawable: Decimal::from(base) };

        let transfers: Vec<Transfer> = outflows
            .iter()
            .enumerate()
            .map(|(i, amt)| Transfer {
                transfer_id: Uuid::from_u128(100 + i as u128),
                account_id: account.account_id,
                direction: TransferDirection::Outgoing,
                amount: Decimal::from(*amt),
                status: TransferStatus::Requested,
                batch_processed_at: None,
                created_at: now,
            })
            .collect();
        let orders: Vec<Order> = buys
            .iter()
            .enumerate()
            .map(|(i, (q, px))| Order {
                order_id: Uuid::from_u128(200 + i as u128),
                account_id: account.account_id,
                symbol: "SPY".to_string(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                quantity: Decimal::from(*q),
                filled_quantity: Decimal::ZERO,
                limit_price: Some(Decimal::from(*px)),
                estimated_price: None,
                status: OrderStatus::New,
                created_at: now,
            })
            .collect();

        let b = account_balances(
            BalanceInputs {
                account: &account,
                latest_snapshot: None,
                transfers: &transfers,
                open_orders: &orders,
                positions: &[],
            },
            &cal,
            now,
        );
        prop_assert!(b.withdrawable_cash >= Decimal::ZERO);
        prop_assert!(b.buying_power <= account.cash_withdrawable);
    }
}
