//! End-to-end admission scenarios exercised through the public API
//! (`Factory` + `Limiter`) rather than each limiter's own unit tests —
//! these are the exact E1-E6 numbers from the engine's scenario table.

use std::sync::Arc;

use ratelimit_engine::clock::MockClock;
use ratelimit_engine::policy::{Algorithm, Policy};
use ratelimit_engine::{Clock, Factory};

fn factory(clock: Arc<MockClock>) -> Factory {
    Factory::new(clock as Arc<dyn Clock>)
}

#[tokio::test]
async fn e1_token_bucket_basic() {
    let clock = Arc::new(MockClock::new());
    let factory = factory(clock.clone());
    let policy = Policy::new(10, 60.0, Algorithm::TokenBucket, None, None, false, None).unwrap();
    let limiter = factory.create(&policy).await.unwrap();

    for expected_remaining in (0..10).rev() {
        let d = limiter.decide("c1").await.unwrap();
        assert!(d.admitted);
        assert_eq!(d.remaining, expected_remaining);
    }
    for _ in 0..5 {
        let d = limiter.decide("c1").await.unwrap();
        assert!(!d.admitted);
        assert_eq!(d.retry_after, Some(6));
    }
}

#[tokio::test]
async fn e2_sliding_window_expiry() {
    let clock = Arc::new(MockClock::new());
    let factory = factory(clock.clone());
    let policy = Policy::new(5, 10.0, Algorithm::SlidingWindow, None, None, false, None).unwrap();
    let limiter = factory.create(&policy).await.unwrap();

    let mut admitted = 0;
    for _ in 0..7 {
        if limiter.decide("c2").await.unwrap().admitted {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);

    clock.set(11.0);
    for _ in 0..2 {
        assert!(limiter.decide("c2").await.unwrap().admitted);
    }
}

#[tokio::test]
async fn e3_leaky_bucket_burst_smoothing() {
    let clock = Arc::new(MockClock::new());
    let factory = factory(clock.clone());
    let policy = Policy::new(5, 10.0, Algorithm::LeakyBucket, None, None, false, None).unwrap();
    let limiter = factory.create(&policy).await.unwrap();

    let mut admitted = 0;
    for _ in 0..7 {
        if limiter.decide("c3").await.unwrap().admitted {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);

    clock.advance(2.0);
    assert!(limiter.decide("c3").await.unwrap().admitted);
}

#[tokio::test]
async fn e4_per_client_independence() {
    let clock = Arc::new(MockClock::new());
    let factory = factory(clock.clone());
    let policy = Policy::new(5, 10.0, Algorithm::TokenBucket, None, None, false, None).unwrap();
    let limiter = factory.create(&policy).await.unwrap();

    let mut admitted = 0;
    for _ in 0..6 {
        if limiter.decide("A").await.unwrap().admitted {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);

    let d = limiter.decide("B").await.unwrap();
    assert!(d.admitted);
    assert_eq!(d.remaining, 4);
}

#[tokio::test]
async fn e5_fixed_window_boundary_burst() {
    let clock = Arc::new(MockClock::new());
    let factory = factory(clock.clone());
    let policy = Policy::new(10, 5.0, Algorithm::FixedWindow, None, None, false, None).unwrap();
    let limiter = factory.create(&policy).await.unwrap();

    clock.set(4.9);
    for _ in 0..10 {
        assert!(limiter.decide("c5").await.unwrap().admitted);
    }
    clock.set(5.0);
    for _ in 0..10 {
        assert!(limiter.decide("c5").await.unwrap().admitted);
    }
}

#[tokio::test]
async fn e6_distributed_fail_open() {
    let clock = Arc::new(MockClock::new());
    let factory = factory(clock.clone());
    let policy = Policy::new(
        10,
        60.0,
        Algorithm::FixedWindow,
        None,
        None,
        true,
        Some("redis://127.0.0.1:1".to_string()),
    )
    .unwrap();

    // Nothing listens at this endpoint. `Factory::create` still succeeds —
    // the store only parses its URL at construction — and the unreachable
    // Redis surfaces on the first `decide()` call, where the distributed
    // limiter fails open: admit, log, bump the error counter.
    let limiter = factory.create(&policy).await.unwrap();
    let decision = limiter.decide("c6").await.unwrap();
    assert!(decision.admitted);
    assert_eq!(decision.remaining, 9);
}
