//! Cycle integration tests.
//!
//! Tests the per-asset pipeline end to end:
//! - Price read, band and candidate classification
//! - Dispatch with skip verification
//! - Abort and isolation paths
//! - Dropped attempts while a cycle is in flight

mod integration;
use integration::common::Harness;

use std::time::Duration;

use alloy::primitives::Bytes;
use keeper_bot::AppConfig;
use keeper_core::{Asset, AssetId, BatchMode, MarketGroup, PriceSample, SignatureVariant};
use keeper_executor::abi;
use rust_decimal_macros::dec;
use serde_json::json;

fn btc() -> Asset {
    Asset::new(0, "BTC_USDT", MarketGroup::Crypto)
}

fn eth() -> Asset {
    Asset::new(1, "ETH_USDT", MarketGroup::Crypto)
}

fn scenario_body() -> serde_json::Value {
    json!({
        "items_orders": [{"id": 7}, {"id": 3}, {"id": 7}],
        "items_stops": [{"id": 9, "type": "SL"}, {"id": 4, "type": "TP"}]
    })
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_cycle() {
    let h = Harness::new(&[0, 1]);
    h.oracle.set_price_18(AssetId(0), 65_000);
    h.matching.set_range_body(scenario_body());
    h.contract
        .accept(abi::selector(BatchMode::Limit, false), abi::encode_counts(2, 0));
    h.contract
        .accept(abi::selector(BatchMode::StopLoss, false), abi::encode_counts(1, 0));

    let report = h.pipeline.run_cycle(&btc()).await.unwrap();

    assert_eq!(report.price, Some(dec!(65000)));
    assert_eq!(report.candidates.orders, vec![3, 7]);
    assert_eq!(report.candidates.stop_loss, vec![9]);
    assert_eq!(report.candidates.take_profit, vec![4]);
    assert!(report.candidates.liquidation.is_empty());

    let requests = h.matching.range_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.from, dec!(64987));
    assert_eq!(requests[0].1.to, dec!(65013));

    // Limit, then stop-loss, then take-profit; liquidation bucket is empty.
    let modes: Vec<BatchMode> = report.outcomes.iter().map(|o| o.mode).collect();
    assert_eq!(
        modes,
        vec![BatchMode::Limit, BatchMode::StopLoss, BatchMode::TakeProfit]
    );
    assert_eq!(report.outcomes[0].ids, vec![3, 7]);
    assert_eq!(report.outcomes[0].processed_count, 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.variant == Some(SignatureVariant::NarrowWithReturns)));
    assert_eq!(h.contract.submits().len(), 3);
    assert!(h.matching.verify_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_contract_skips_trigger_single_verification() {
    let h = Harness::new(&[0]);
    h.oracle.set_price_18(AssetId(0), 100);
    h.matching.set_range_body(json!({
        "items_stops": [
            {"id": 12, "type": "sl"},
            {"id": 10, "type": "SL"},
            {"id": "11", "type": "SL"}
        ]
    }));
    h.contract
        .accept(abi::selector(BatchMode::StopLoss, false), abi::encode_counts(0, 3));

    let report = h.pipeline.run_cycle(&btc()).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].skipped_count, 3);
    assert_eq!(h.matching.verify_requests(), vec![vec![10, 11, 12]]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_submissions_still_verify_every_bucket() {
    let h = Harness::new(&[0]);
    h.oracle.set_price_18(AssetId(0), 65_000);
    h.matching.set_range_body(scenario_body());
    h.contract
        .accept(abi::selector(BatchMode::Limit, true), Bytes::new());
    h.contract
        .accept(abi::selector(BatchMode::StopLoss, true), Bytes::new());
    h.contract.fail_submissions("nonce too low");

    let report = h.pipeline.run_cycle(&btc()).await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.processed_count == 0 && o.skipped_count as usize == o.ids.len()));
    assert_eq!(
        h.matching.verify_requests(),
        vec![vec![3, 7], vec![9], vec![4]]
    );
}

#[tokio::test]
async fn test_oracle_failure_aborts_cycle() {
    let h = Harness::new(&[0]);

    assert!(h.pipeline.run_cycle(&btc()).await.is_err());
    assert_eq!(h.matching.range_call_count(), 0);
    assert_eq!(h.contract.call_count(), 0);
}

#[tokio::test]
async fn test_fetch_failure_aborts_cycle() {
    let h = Harness::new(&[0]);
    h.oracle.set_price_18(AssetId(0), 65_000);
    h.matching.fail_range(true);

    assert!(h.pipeline.run_cycle(&btc()).await.is_err());
    assert_eq!(h.contract.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_price_aborts_cycle() {
    let h = Harness::new(&[0]);
    h.oracle.set_sample(
        AssetId(0),
        PriceSample {
            round: 1,
            decimals: 0,
            time: 0,
            raw_price: 79_228_162_514_264_337_593_543_950_335,
        },
    );
    h.matching.set_range_body(scenario_body());

    assert!(h.pipeline.run_cycle(&btc()).await.is_err());
    assert_eq!(h.matching.range_call_count(), 0);
    assert_eq!(h.contract.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_assets_sharing_a_key_submit_one_at_a_time() {
    let h = Harness::new(&[0, 1]);
    h.oracle.set_price_18(AssetId(0), 65_000);
    h.oracle.set_price_18(AssetId(1), 3_000);
    h.matching.set_range_body(scenario_body());
    h.contract
        .accept(abi::selector(BatchMode::Limit, false), abi::encode_counts(2, 0));
    h.contract
        .accept(abi::selector(BatchMode::StopLoss, false), abi::encode_counts(1, 0));
    h.contract.set_submit_delay(Duration::from_secs(10));

    let handles = h.app.fire();
    assert_eq!(handles.len(), 2);
    for handle in handles {
        handle.await.unwrap();
    }

    // Three buckets per asset, all through the same signer.
    assert_eq!(h.contract.submits().len(), 6);
    assert_eq!(h.contract.peak_concurrent_submits(), 1);
}

#[tokio::test]
async fn test_missing_key_skips_dispatch() {
    let h = Harness::new(&[0]);
    h.oracle.set_price_18(AssetId(1), 3_000);
    h.matching.set_range_body(scenario_body());

    let report = h.pipeline.run_cycle(&eth()).await.unwrap();

    assert_eq!(report.candidates.total(), 4);
    assert!(report.outcomes.is_empty());
    assert_eq!(h.contract.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_running_cycle_drops_next_attempt() {
    let h = Harness::new(&[0, 1]);
    h.oracle.set_price_18(AssetId(0), 65_000);
    h.oracle.set_price_18(AssetId(1), 3_000);
    h.oracle.set_delay(Duration::from_secs(20));

    let first = h.app.fire();
    assert_eq!(first.len(), 2);
    assert!(h.app.in_flight().contains(AssetId(0)));

    // Next trigger while both cycles are still reading the oracle.
    let second = h.app.fire();
    assert!(second.is_empty());

    for handle in first {
        handle.await.unwrap();
    }
    assert!(h.app.in_flight().is_empty());
    assert_eq!(h.oracle.call_count(), 2);

    let third = h.app.fire();
    assert_eq!(third.len(), 2);
    for handle in third {
        handle.await.unwrap();
    }
    assert_eq!(h.oracle.call_count(), 4);
}

#[tokio::test]
async fn test_failing_cycle_releases_in_flight_entry() {
    let h = Harness::new(&[0, 1]);

    for handle in h.app.fire() {
        handle.await.unwrap();
    }
    assert!(h.app.in_flight().is_empty());
    assert_eq!(h.app.fire().len(), 2);
}

#[test]
fn test_default_config_file_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");
    let mut config = AppConfig::from_file(path).unwrap();
    config.apply_env_overrides(|name| match name {
        "EXECUTOR_ADDR" => Some("0x1111111111111111111111111111111111111111".to_string()),
        "ORACLE_ADDR" => Some("0x2222222222222222222222222222222222222222".to_string()),
        _ => None,
    });
    config.validate().unwrap();
    assert_eq!(config.trigger_seconds, vec![3, 15, 27, 39, 51]);
    assert_eq!(config.range_rate, dec!(0.0002));
    assert!(config.assets.iter().any(|a| a.key == "XAU_USD"));
}

#[tokio::test(start_paused = true)]
async fn test_run_until_returns_on_shutdown() {
    let h = Harness::new(&[0]);

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        h.app.run_until(tokio::time::sleep(Duration::from_secs(5))),
    )
    .await;

    assert!(matches!(result, Ok(Ok(()))));
}
