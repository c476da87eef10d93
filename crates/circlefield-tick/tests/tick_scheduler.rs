//! Integration tests for the fixed-timestep tick scheduler.
//!
//! Time-based tests run with `start_paused = true`, so Tokio auto-advances
//! the clock whenever every task is idle and `sleep_until` resolves
//! instantly.

use std::time::Duration;

use circlefield_tick::{TickConfig, TickPolicy, TickScheduler};

// =========================================================================
// Helpers
// =========================================================================

fn config_20hz() -> TickConfig {
    TickConfig {
        initial_jitter_us: 0,
        ..TickConfig::with_rate(20)
    }
}

/// Paused-clock deadlines land on whole milliseconds.
fn assert_elapsed(since: tokio::time::Instant, expected_ms: u64) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= Duration::from_millis(expected_ms)
            && elapsed <= Duration::from_millis(expected_ms + 1),
        "expected ~{expected_ms}ms, got {elapsed:?}"
    );
}

fn started(config: TickConfig) -> TickScheduler {
    let mut s = TickScheduler::new(config);
    assert!(s.start());
    s
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_60hz_skip() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 60);
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.tick_duration(), Duration::from_secs_f64(1.0 / 60.0));
}

#[test]
fn test_with_rate_sets_duration() {
    assert_eq!(
        TickConfig::with_rate(20).tick_duration(),
        Duration::from_millis(50)
    );
}

#[test]
fn test_validated_clamps_rate_into_range() {
    assert_eq!(TickConfig::with_rate(500).validated().tick_rate_hz, 128);
    assert_eq!(TickConfig::with_rate(0).validated().tick_rate_hz, 1);
}

#[test]
fn test_validated_orders_thresholds() {
    let cfg = TickConfig {
        budget_warn_threshold: 0.9,
        budget_critical_threshold: 0.5,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 0.5);
}

// =========================================================================
// Idle / start / stop
// =========================================================================

#[test]
fn test_new_scheduler_is_idle() {
    let s = TickScheduler::with_rate(20);
    assert!(!s.is_running());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_duration(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_idle_scheduler_never_fires() {
    let mut s = TickScheduler::new(config_20hz());
    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(result.is_err(), "idle scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_noop() {
    let mut s = started(config_20hz());
    assert!(!s.start());
    assert!(s.is_running());

    // Still one tick per period.
    let begin = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_elapsed(begin, 50);
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_ticks() {
    let mut s = started(config_20hz());
    s.wait_for_tick().await;
    s.stop();
    assert!(!s.is_running());

    let result = tokio::time::timeout(Duration::from_secs(1), s.wait_for_tick()).await;
    assert!(result.is_err(), "stopped scheduler should pend");
}

#[tokio::test(start_paused = true)]
async fn test_restart_continues_tick_numbering() {
    let mut s = started(config_20hz());
    s.wait_for_tick().await;
    s.stop();
    s.stop();
    assert!(s.start());

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 2);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_and_increments() {
    let mut s = started(config_20hz());

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.dt, Duration::from_millis(50));
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_fixed_period() {
    let mut s = started(config_20hz());
    let begin = tokio::time::Instant::now();

    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_elapsed(begin, 250);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_first_tick_within_bound() {
    let mut s = started(TickConfig {
        initial_jitter_us: 5_000,
        ..TickConfig::with_rate(20)
    });
    let begin = tokio::time::Instant::now();
    s.wait_for_tick().await;
    let elapsed = begin.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed <= Duration::from_millis(55));
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_counts_skipped_ticks() {
    let mut s = started(config_20hz());
    s.wait_for_tick().await;

    // Simulate a stall of three and a half periods.
    tokio::time::advance(Duration::from_millis(225)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 3);
    assert_eq!(s.metrics().total_skipped, 3);
    assert_eq!(s.metrics().total_overruns, 1);

    // Rescheduled a full period from the late tick.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_elapsed(before, 50);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_original_cadence() {
    let mut s = started(TickConfig {
        policy: TickPolicy::Drop,
        ..config_20hz()
    });
    s.wait_for_tick().await;

    tokio::time::advance(Duration::from_millis(80)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);

    // Tick 2 was due at 100ms and fired at 130ms; tick 3 is due at 150ms.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_elapsed(before, 20);
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(config_20hz());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_overruns, 0);
    assert_eq!(m.total_skipped, 0);
    assert_eq!(m.avg_tick_time, Duration::ZERO);
    assert_eq!(m.max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_total_ticks_increments() {
    let mut s = started(config_20hz());
    for _ in 0..3 {
        s.wait_for_tick().await;
        s.record_tick_end();
    }
    assert_eq!(s.metrics().total_ticks, 3);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = started(config_20hz());
    s.record_tick_end();
    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().budget_utilization, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_max_tick_time_tracked() {
    let mut s = started(config_20hz());

    // record_tick_end measures wall-clock time, which the paused Tokio
    // clock does not control.
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert!(s.metrics().max_tick_time > Duration::ZERO);
    let util = s.metrics().budget_utilization;
    assert!(util > 0.0 && util < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_avg_update() {
    let mut s = started(TickConfig {
        metrics_enabled: false,
        ..config_20hz()
    });
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert_eq!(s.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// select! loop, the way a room actor drives it
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_start_and_stop_commands() {
    let mut s = TickScheduler::new(config_20hz());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("start").await.ok();
        // Three ticks at 20 Hz, then stop.
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send("quit").await.ok();
    });

    let mut ticks_fired = 0u64;
    loop {
        tokio::select! {
            biased;
            Some(cmd) = rx.recv() => match cmd {
                "start" => { s.start(); }
                "stop" => s.stop(),
                _ => break,
            },
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                s.record_tick_end();
                assert_eq!(info.tick, ticks_fired);
            }
        }
    }

    assert_eq!(ticks_fired, 3);
}
