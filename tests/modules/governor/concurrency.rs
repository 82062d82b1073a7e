//! Governor 并发集成测试

use crate::common::{concurrent_checks, ALL_STRATEGIES};
use fetch_governor::{RateGovernor, Strategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_hundred_threads_admit_exactly_limit() {
    for strategy in ALL_STRATEGIES {
        let governor = Arc::new(RateGovernor::new(strategy));
        governor
            .set_limit("x", 10, Duration::from_secs(60), None)
            .unwrap();

        let admitted = concurrent_checks(&governor, "x", 100);
        assert_eq!(admitted, 10, "strategy {}", strategy);
        assert_eq!(governor.get_remaining_quota("x"), Some(0));
        assert_eq!(governor.stats().admitted, 10);
        assert_eq!(governor.stats().rejected, 90);
    }
}

#[test]
fn test_sources_are_isolated_under_contention() {
    let governor = Arc::new(RateGovernor::new(Strategy::SlidingWindow));
    governor
        .set_limit("a", 5, Duration::from_secs(60), None)
        .unwrap();
    governor
        .set_limit("b", 20, Duration::from_secs(60), None)
        .unwrap();

    let a = {
        let governor = Arc::clone(&governor);
        thread::spawn(move || concurrent_checks(&governor, "a", 50))
    };
    let b = {
        let governor = Arc::clone(&governor);
        thread::spawn(move || concurrent_checks(&governor, "b", 50))
    };

    assert_eq!(a.join().unwrap(), 5);
    assert_eq!(b.join().unwrap(), 20);
}

#[test]
fn test_blocking_waiters_are_serialized_by_refill() {
    // 10 token/s，初始 2 个令牌
    let governor = Arc::new(RateGovernor::new(Strategy::TokenBucket));
    governor
        .set_limit("slow", 2, Duration::from_millis(200), None)
        .unwrap();

    let admitted = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let governor = Arc::clone(&governor);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                if governor.wait_if_needed("slow", 1, Some(Duration::from_secs(5))) {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 6);
    // 其余 4 个需要等待补充约 400ms
    assert!(start.elapsed() >= Duration::from_millis(350));
}

#[test]
fn test_reset_wakes_blocked_waiter() {
    let governor = Arc::new(RateGovernor::new(Strategy::FixedWindow));
    governor
        .set_limit("x", 1, Duration::from_secs(3600), None)
        .unwrap();
    assert!(governor.check_limit("x", 1));

    let waiter = {
        let governor = Arc::clone(&governor);
        thread::spawn(move || {
            let start = Instant::now();
            let admitted = governor.wait_if_needed("x", 1, Some(Duration::from_secs(10)));
            (admitted, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(governor.reset_limit("x"));

    let (admitted, waited) = waiter.join().unwrap();
    assert!(admitted);
    assert!(waited < Duration::from_secs(2));
}

#[test]
fn test_wait_times_out() {
    let governor = RateGovernor::new(Strategy::SlidingWindow);
    governor
        .set_limit("x", 1, Duration::from_secs(3600), None)
        .unwrap();
    assert!(governor.check_limit("x", 1));

    let start = Instant::now();
    assert!(!governor.wait_if_needed("x", 1, Some(Duration::from_millis(100))));
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(100));
    assert!(waited < Duration::from_secs(2));
    assert_eq!(governor.stats().wait_timeouts, 1);
}
