//! Fixed-window rate limiter behavior on the memory path (no
//! distributed store configured).

use std::time::Duration;

use docent_core::GovernanceConfig;
use docent_govern::RateLimiter;

fn memory_only() -> RateLimiter {
    RateLimiter::new(&GovernanceConfig::default())
}

#[tokio::test]
async fn test_allows_within_limit() {
    let limiter = memory_only();
    let (allowed, remaining) = limiter.hit("test:key:1", 5, 60).await;
    assert!(allowed);
    assert_eq!(remaining, 4);
}

#[tokio::test]
async fn test_remaining_decreases_to_zero_then_blocks() {
    let limiter = memory_only();

    // limit=5, window=60s: five hits allowed with remaining 4,3,2,1,0.
    for expected in [4, 3, 2, 1, 0] {
        let (allowed, remaining) = limiter.hit("test:key:2", 5, 60).await;
        assert!(allowed);
        assert_eq!(remaining, expected);
    }

    // Sixth hit is blocked with remaining 0.
    let (allowed, remaining) = limiter.hit("test:key:2", 5, 60).await;
    assert!(!allowed);
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_over_limit_hits_keep_counting() {
    let limiter = memory_only();
    for _ in 0..5 {
        limiter.hit("test:key:3", 2, 60).await;
    }
    // The counter was not rolled back on rejection; still blocked.
    let (allowed, _) = limiter.hit("test:key:3", 2, 60).await;
    assert!(!allowed);
}

#[tokio::test(start_paused = true)]
async fn test_window_reset_after_elapse() {
    let limiter = memory_only();

    for _ in 0..3 {
        limiter.hit("test:key:4", 3, 60).await;
    }
    let (allowed, _) = limiter.hit("test:key:4", 3, 60).await;
    assert!(!allowed);

    tokio::time::advance(Duration::from_secs(61)).await;

    // Fresh window: counter resets to 1 as if this were a first hit.
    let (allowed, remaining) = limiter.hit("test:key:4", 3, 60).await;
    assert!(allowed);
    assert_eq!(remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn test_window_is_fixed_not_sliding() {
    let limiter = memory_only();

    limiter.hit("test:key:5", 2, 60).await;
    tokio::time::advance(Duration::from_secs(30)).await;
    // A hit mid-window must not extend the window.
    limiter.hit("test:key:5", 2, 60).await;
    tokio::time::advance(Duration::from_secs(31)).await;

    // 61s after the first hit the window anchored there has elapsed.
    let (allowed, remaining) = limiter.hit("test:key:5", 2, 60).await;
    assert!(allowed);
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_distinct_keys_count_independently() {
    let limiter = memory_only();
    for _ in 0..3 {
        limiter.hit("user:a:chat", 3, 60).await;
    }
    let (allowed_a, _) = limiter.hit("user:a:chat", 3, 60).await;
    let (allowed_b, remaining_b) = limiter.hit("user:b:chat", 3, 60).await;
    assert!(!allowed_a);
    assert!(allowed_b);
    assert_eq!(remaining_b, 2);
}

#[tokio::test]
async fn test_clear_resets_counters() {
    let limiter = memory_only();
    for _ in 0..5 {
        limiter.hit("test:key:6", 5, 60).await;
    }
    limiter.clear().await;

    let (allowed, remaining) = limiter.hit("test:key:6", 5, 60).await;
    assert!(allowed);
    assert_eq!(remaining, 4);
}

#[tokio::test]
async fn test_enforce_unknown_category_uses_default_policy() {
    let limiter = memory_only();
    let policy = docent_govern::resolve_policy("never-registered");
    let remaining = limiter
        .enforce("user:x", "never-registered")
        .await
        .expect("first hit within default policy");
    assert_eq!(remaining, policy.limit - 1);
}
