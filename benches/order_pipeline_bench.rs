//! Order Pipeline Benchmarks - Hot-Path Performance Validation
//!
//! Benchmarks the domain functions that run on every order submission
//! and every oracle update.
//!
//! Run with: cargo bench --bench order_pipeline_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;

use alloy::primitives::Address;
use perp_order_client::domain::classifier::classify;
use perp_order_client::domain::fees::FeeCalculator;
use perp_order_client::domain::market::{AssetSpec, Direction, Market, MarketCatalog};
use perp_order_client::domain::order::{OrderBuilder, OrderDraft};
use perp_order_client::domain::price::OracleUpdate;
use perp_order_client::domain::units::parse_units;

fn catalog() -> MarketCatalog {
    MarketCatalog::new(
        vec![Market {
            id: "ETH-USD".to_string(),
            oracle_feed: "ca80ba6d".to_string(),
            fee_bps: 10,
            max_leverage: dec!(50),
        }],
        vec![AssetSpec::native_eth(), AssetSpec::usdc(Address::repeat_byte(0x11))],
    )
}

/// Benchmark a full draft → order build with a trigger and TP/SL, plus
/// the native value.
fn bench_build_order(c: &mut Criterion) {
    let catalog = catalog();
    let builder = OrderBuilder::new(&catalog);
    let market = catalog.market("ETH-USD").cloned().unwrap();
    let asset = catalog.asset("ETH").cloned().unwrap();
    let fees = FeeCalculator::for_market(&market);
    let draft = OrderDraft {
        market: "ETH-USD".to_string(),
        asset: "ETH".to_string(),
        direction: Direction::Long,
        margin: Some(dec!(0.123456789012)),
        size: Some(dec!(12.3456789)),
        price: Some(dec!(3000)),
        tp_price: Some(dec!(3500)),
        sl_price: Some(dec!(2500)),
        has_trigger: true,
        has_tp: true,
        has_sl: true,
        ..OrderDraft::default()
    };

    c.bench_function("build_trigger_order", |b| {
        b.iter(|| {
            let order = builder.build(black_box(&draft), Some(dec!(3100))).unwrap();
            let _value = fees.order_value(&order, &asset);
        });
    });
}

/// Benchmark order type classification.
fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_trigger", |b| {
        b.iter(|| {
            let _ty = classify(
                black_box(true),
                black_box(dec!(3000)),
                black_box(false),
                black_box(dec!(3100)),
            );
        });
    });
}

/// Benchmark decimal → 18-decimal fixed point.
fn bench_parse_units(c: &mut Criterion) {
    c.bench_function("parse_units_18", |b| {
        b.iter(|| {
            let _units = parse_units(black_box(dec!(65432.123456789)), black_box(18));
        });
    });
}

/// Benchmark oracle price decoding with the staleness check.
fn bench_oracle_price(c: &mut Criterion) {
    let update = OracleUpdate {
        feed_id: "f9c0".to_string(),
        mantissa: 6_543_212_345_678,
        exponent: -8,
        publish_time: 1_700_000_000,
    };

    c.bench_function("oracle_price_fresh", |b| {
        b.iter(|| {
            let _price = black_box(&update).price_no_older_than(black_box(1_700_000_030), 60);
        });
    });
}

criterion_group!(
    benches,
    bench_build_order,
    bench_classify,
    bench_parse_units,
    bench_oracle_price,
);
criterion_main!(benches);
