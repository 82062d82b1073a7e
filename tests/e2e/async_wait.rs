//! 异步等待场景

use fetch_governor::{RateGovernor, Strategy};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_async_wait_admits_after_refill() {
    let governor = RateGovernor::new(Strategy::TokenBucket);
    governor
        .set_limit("x", 2, Duration::from_millis(200), None)
        .unwrap();
    assert!(governor.check_limit("x", 2));

    let start = Instant::now();
    assert!(
        governor
            .wait_if_needed_async("x", 1, Some(Duration::from_secs(2)))
            .await
    );
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_async_wait_times_out() {
    let governor = RateGovernor::new(Strategy::FixedWindow);
    governor
        .set_limit("x", 1, Duration::from_secs(3600), None)
        .unwrap();
    assert!(governor.check_limit("x", 1));

    assert!(
        !governor
            .wait_if_needed_async("x", 1, Some(Duration::from_millis(100)))
            .await
    );
    assert_eq!(governor.stats().wait_timeouts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_waiters_woken_by_set_limit() {
    let governor = Arc::new(RateGovernor::new(Strategy::FixedWindow));
    governor
        .set_limit("x", 1, Duration::from_secs(3600), None)
        .unwrap();
    assert!(governor.check_limit("x", 1));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let governor = Arc::clone(&governor);
            tokio::spawn(async move {
                governor
                    .wait_if_needed_async("x", 1, Some(Duration::from_secs(10)))
                    .await
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let start = Instant::now();
    governor
        .set_limit("x", 3, Duration::from_secs(3600), None)
        .unwrap();

    for waiter in waiters {
        assert!(waiter.await.unwrap());
    }
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(governor.get_remaining_quota("x"), Some(0));
}
