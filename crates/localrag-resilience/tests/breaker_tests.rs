use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use localrag_core::Error;
use localrag_resilience::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};

fn breaker(threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new("generator", BreakerConfig { failure_threshold: threshold, reset_timeout: Duration::from_secs(60) })
}

async fn fail(b: &CircuitBreaker, calls: &AtomicU32) -> Result<(), Error> {
    b.call(|| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(Error::TransientIo("connection reset".into())) }
    })
    .await
}

async fn succeed(b: &CircuitBreaker, calls: &AtomicU32) -> Result<(), Error> {
    b.call(|| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<(), Error>(()) }
    })
    .await
}

#[tokio::test(start_paused = true)]
async fn opens_after_threshold_and_fails_fast() {
    let b = breaker(3);
    let calls = AtomicU32::new(0);
    for _ in 0..3 {
        assert!(matches!(fail(&b, &calls).await, Err(Error::TransientIo(_))));
    }
    assert_eq!(b.state(), CircuitState::Open);

    let err = succeed(&b, &calls).await.unwrap_err();
    assert!(matches!(err, Error::CircuitOpen { ref name } if name == "generator"));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "wrapped function not invoked while open");
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_failure_count() {
    let b = breaker(3);
    let calls = AtomicU32::new(0);
    let _ = fail(&b, &calls).await;
    let _ = fail(&b, &calls).await;
    succeed(&b, &calls).await.unwrap();
    let _ = fail(&b, &calls).await;
    let _ = fail(&b, &calls).await;
    assert_eq!(b.state(), CircuitState::Closed);
    assert_eq!(b.snapshot().consecutive_failures, 2);
}

#[tokio::test(start_paused = true)]
async fn contract_errors_do_not_trip() {
    let b = breaker(1);
    let r = b.call(|| async { Err::<(), _>(Error::DimensionMismatch { expected: 3, actual: 2 }) }).await;
    assert!(r.is_err());
    assert_eq!(b.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_exactly_one_trial() {
    let b = breaker(1);
    let calls = AtomicU32::new(0);
    let _ = fail(&b, &calls).await;
    assert_eq!(b.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(b.state(), CircuitState::HalfOpen);

    let trial = b.try_acquire().expect("trial admitted");
    assert!(trial.is_trial());
    assert!(matches!(b.try_acquire(), Err(Error::CircuitOpen { .. })), "second caller rejected during trial");

    trial.record(&Ok::<(), Error>(()));
    assert_eq!(b.state(), CircuitState::Closed);
    assert_eq!(b.snapshot().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_reopens_and_restarts_the_timer() {
    let b = breaker(1);
    let calls = AtomicU32::new(0);
    let _ = fail(&b, &calls).await;
    tokio::time::advance(Duration::from_secs(60)).await;

    assert!(matches!(fail(&b, &calls).await, Err(Error::TransientIo(_))));
    assert_eq!(b.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(matches!(succeed(&b, &calls).await, Err(Error::CircuitOpen { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::advance(Duration::from_secs(30)).await;
    succeed(&b, &calls).await.expect("trial after the restarted timeout");
    assert_eq!(b.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn abandoned_trial_reopens() {
    let b = breaker(1);
    let calls = AtomicU32::new(0);
    let _ = fail(&b, &calls).await;
    tokio::time::advance(Duration::from_secs(60)).await;

    drop(b.try_acquire().expect("trial"));
    assert_eq!(b.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_race_for_a_single_trial() {
    let b = breaker(1);
    let calls = AtomicU32::new(0);
    let _ = fail(&b, &calls).await;
    tokio::time::advance(Duration::from_secs(60)).await;

    let invoked = AtomicU32::new(0);
    let (b_ref, invoked_ref) = (&b, &invoked);
    let results = futures::future::join_all((0..10).map(move |_| {
        b_ref.call(move || {
            invoked_ref.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<(), Error>(())
            }
        })
    }))
    .await;

    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(r, Err(Error::CircuitOpen { .. }))));
    assert_eq!(b.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reset_closes_immediately() {
    let b = breaker(1);
    let calls = AtomicU32::new(0);
    let _ = fail(&b, &calls).await;
    b.reset();
    assert_eq!(b.state(), CircuitState::Closed);
    succeed(&b, &calls).await.expect("closed after reset");
}

#[test]
fn registry_shares_breakers_by_name() {
    let registry = BreakerRegistry::new();
    let a = registry.get_or_create("store", BreakerConfig::default());
    let again = registry.get_or_create("store", BreakerConfig { failure_threshold: 99, ..BreakerConfig::default() });
    assert!(std::sync::Arc::ptr_eq(&a, &again));
    assert_eq!(again.config().failure_threshold, 5);
    registry.get_or_create("cache", BreakerConfig::default());

    let names: Vec<String> = registry.snapshots().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["cache", "store"]);
    assert!(registry.get("missing").is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_failures_past_the_threshold_open_once() {
    let b = breaker(3);
    let start = tokio::time::Instant::now();
    let b_ref = &b;
    // All eleven calls are admitted while closed. Failures land at 1s..10s,
    // the lone success at 5s, after the circuit opened at 3s.
    let results = futures::future::join_all((1..=11u64).map(move |i| {
        b_ref.call(move || async move {
            tokio::time::sleep(Duration::from_secs(if i == 11 { 5 } else { i })).await;
            if i == 11 { Ok(()) } else { Err(Error::TransientIo("connection reset".into())) }
        })
    }))
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(b.state(), CircuitState::Open);
    assert_eq!(b.snapshot().consecutive_failures, 10, "late success from the closed period does not reset");

    tokio::time::sleep_until(start + Duration::from_secs(62)).await;
    assert_eq!(b.state(), CircuitState::Open, "later failures do not restart the open period");
    tokio::time::sleep_until(start + Duration::from_secs(63)).await;
    assert_eq!(b.state(), CircuitState::HalfOpen);
}
