//! 真实时钟下的来源限流场景

use fetch_governor::{RateGovernor, Strategy};
use std::thread::sleep;
use std::time::Duration;

#[test]
fn test_token_bucket_recovers_after_window() {
    let governor = RateGovernor::new(Strategy::TokenBucket);
    governor
        .set_limit("x", 5, Duration::from_millis(200), Some(5))
        .unwrap();

    for _ in 0..5 {
        assert!(governor.check_limit("x", 1));
    }
    assert!(!governor.check_limit("x", 1));

    sleep(Duration::from_millis(250));
    assert!(governor.check_limit("x", 1));
}

#[test]
fn test_sliding_window_recovers_after_oldest_entry_expires() {
    let governor = RateGovernor::new(Strategy::SlidingWindow);
    governor
        .set_limit("s", 3, Duration::from_millis(200), None)
        .unwrap();

    for _ in 0..3 {
        assert!(governor.check_limit("s", 1));
    }
    sleep(Duration::from_millis(50));
    assert!(!governor.check_limit("s", 1));

    sleep(Duration::from_millis(200));
    assert!(governor.check_limit("s", 1));
}

#[test]
fn test_fixed_window_reset_time_and_rollover() {
    let governor = RateGovernor::new(Strategy::FixedWindow);
    governor
        .set_limit("f", 2, Duration::from_millis(200), None)
        .unwrap();

    assert!(governor.check_limit("f", 2));
    assert!(!governor.check_limit("f", 1));

    let reset = governor.get_reset_time("f").unwrap();
    let until_reset = reset - chrono::Utc::now();
    assert!(until_reset <= chrono::TimeDelta::milliseconds(200));

    sleep(Duration::from_millis(220));
    assert!(governor.check_limit("f", 2));
}

#[test]
fn test_blocking_wait_admits_after_refill() {
    let governor = RateGovernor::new(Strategy::SlidingWindow);
    governor
        .set_limit("w", 1, Duration::from_millis(150), None)
        .unwrap();
    assert!(governor.check_limit("w", 1));

    let start = std::time::Instant::now();
    assert!(governor.wait_if_needed("w", 1, Some(Duration::from_secs(2))));
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_unconfigured_sources_bypass_limits() {
    let governor = RateGovernor::new(Strategy::FixedWindow);
    governor
        .set_limit("reddit", 1, Duration::from_secs(60), None)
        .unwrap();

    for _ in 0..1000 {
        assert!(governor.check_limit("google_news", 1));
    }
    assert!(governor.wait_if_needed("google_news", 50, Some(Duration::ZERO)));
    assert_eq!(governor.stats().unconfigured, 1001);
}
