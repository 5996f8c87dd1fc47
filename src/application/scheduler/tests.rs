use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::application::edge::EdgeConfig;
use crate::domain::edge::{EdgeType, EdgeUpdate};
use crate::domain::recompute::{DecisionReason, FailureKind, RecomputePriority};
use crate::port::outbound::valuation::Valuation;
use crate::testkit::config;
use crate::testkit::domain::new_edge;
use crate::testkit::valuation::{ScriptedStep, ScriptedValuationEngine};

struct Harness {
    scheduler: Arc<RecomputeScheduler>,
    engine: Arc<ScriptedValuationEngine>,
    edges: Arc<EdgePersistenceModel>,
    cache: Arc<MetricsCache>,
}

fn harness(config: SchedulerConfig, engine: ScriptedValuationEngine) -> Harness {
    let cache = Arc::new(MetricsCache::default());
    let edges = Arc::new(EdgePersistenceModel::new(
        EdgeConfig::default(),
        Arc::clone(&cache),
    ));
    let engine = Arc::new(engine);
    let scheduler = Arc::new(RecomputeScheduler::new(
        config,
        Arc::clone(&engine) as Arc<dyn ValuationEngine>,
        Arc::clone(&edges),
        Arc::clone(&cache),
    ));
    Harness {
        scheduler,
        engine,
        edges,
        cache,
    }
}

fn idle() -> Harness {
    harness(SchedulerConfig::default(), ScriptedValuationEngine::new())
}

fn line_change(game: &str, magnitude: f64) -> RecomputeRequest {
    RecomputeRequest::new(game, RecomputeTrigger::LineChange)
        .with_context(TriggerContext::line_change(magnitude))
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test]
async fn major_line_move_schedules_full_job() {
    let h = idle();
    let id = h
        .scheduler
        .schedule_recompute(
            "G1",
            RecomputeTrigger::LineChange,
            None,
            Some(TriggerContext::line_change(0.6)),
            None,
        )
        .expect("job should be accepted");

    let job = h.scheduler.next_job().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.recompute_type, RecomputeType::Full);
    assert_eq!(job.decision_reason, DecisionReason::MajorLineMove);
    assert_eq!(job.priority, RecomputePriority::High);
}

#[tokio::test]
async fn half_point_move_stays_fast() {
    let h = idle();
    h.scheduler.try_schedule(line_change("G1", 0.5)).unwrap();

    let job = h.scheduler.next_job().unwrap();
    assert_eq!(job.recompute_type, RecomputeType::Fast);
    assert_eq!(job.decision_reason, DecisionReason::MinorLineMove);
}

#[tokio::test]
async fn repeated_trigger_within_window_is_debounced() {
    let h = idle();
    assert!(h.scheduler.try_schedule(line_change("G1", 0.6)).is_ok());
    assert_eq!(
        h.scheduler
            .schedule_recompute("G1", RecomputeTrigger::LineChange, None, None, None),
        None
    );
    assert_eq!(
        h.scheduler.try_schedule(line_change("G1", 0.2)),
        Err(Rejection::Debounced {
            game_id: GameId::new("G1")
        })
    );

    let status = h.scheduler.get_status();
    assert_eq!(status.queue_depth, 1);
    assert_eq!(status.metrics.debounce_hits, 2);
    assert_eq!(status.metrics.jobs_rejected, 2);
    assert_eq!(status.metrics.jobs_queued, 1);

    // Other games are unaffected.
    assert!(h.scheduler.try_schedule(line_change("G2", 0.1)).is_ok());
}

#[tokio::test]
async fn manual_trigger_bypasses_debounce() {
    let h = idle();
    h.scheduler.try_schedule(line_change("G1", 0.1)).unwrap();
    let manual = RecomputeRequest::new("G1", RecomputeTrigger::Manual);
    assert!(h.scheduler.try_schedule(manual).is_ok());
    assert_eq!(h.scheduler.queue_depth(), 2);
}

#[tokio::test(start_paused = true)]
async fn debounce_window_expires() {
    let h = idle();
    h.scheduler.try_schedule(line_change("G1", 0.1)).unwrap();

    tokio::time::advance(Duration::from_millis(1999)).await;
    assert!(h.scheduler.try_schedule(line_change("G1", 0.1)).is_err());

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(h.scheduler.try_schedule(line_change("G1", 0.1)).is_ok());
}

#[tokio::test]
async fn priority_follows_prop_patterns() {
    let h = harness(config::scheduler_without_debounce(1), ScriptedValuationEngine::new());
    let s = &h.scheduler;
    s.try_schedule(
        RecomputeRequest::new("G1", RecomputeTrigger::LineupUpdate).with_props(["futures_ws"]),
    )
    .unwrap();
    s.try_schedule(
        RecomputeRequest::new("G2", RecomputeTrigger::LineupUpdate).with_props(["team_total"]),
    )
    .unwrap();
    s.try_schedule(RecomputeRequest::new("G3", RecomputeTrigger::LineupUpdate))
        .unwrap();
    s.try_schedule(
        RecomputeRequest::new("G4", RecomputeTrigger::LineupUpdate)
            .with_props(["team_total", "pitcher_strikeouts_cole"]),
    )
    .unwrap();

    let order: Vec<(String, RecomputePriority)> = std::iter::from_fn(|| s.next_job())
        .map(|job| (job.game_id.to_string(), job.priority))
        .collect();
    assert_eq!(
        order,
        vec![
            ("G4".to_string(), RecomputePriority::Critical),
            ("G3".to_string(), RecomputePriority::High),
            ("G2".to_string(), RecomputePriority::Medium),
            ("G1".to_string(), RecomputePriority::Low),
        ]
    );
}

#[tokio::test]
async fn forced_type_is_recorded_as_override() {
    let h = idle();
    h.scheduler
        .try_schedule(
            RecomputeRequest::new("G1", RecomputeTrigger::InjuryUpdate)
                .with_force_type(RecomputeType::Fast),
        )
        .unwrap();
    let job = h.scheduler.next_job().unwrap();
    assert_eq!(job.recompute_type, RecomputeType::Fast);
    assert_eq!(job.decision_reason, DecisionReason::ForcedOverride);
}

#[tokio::test]
async fn open_breaker_rejects_until_reset() {
    let h = idle();
    {
        let mut breaker = h.scheduler.breaker.lock();
        for _ in 0..10 {
            breaker.record_failure(&[], Instant::now());
        }
    }

    assert_eq!(
        h.scheduler.try_schedule(line_change("G1", 0.1)),
        Err(Rejection::CircuitOpen)
    );
    assert!(h.scheduler.get_status().breaker.open);
    assert_eq!(h.scheduler.get_status().metrics.breaker_blocks, 1);

    h.scheduler.reset_circuit_breaker();
    assert!(h.scheduler.try_schedule(line_change("G1", 0.1)).is_ok());
}

#[tokio::test]
async fn blocked_prop_rejects_only_its_requests() {
    let h = harness(config::scheduler_without_debounce(1), ScriptedValuationEngine::new());
    let prop = PropId::new("player_hits_judge");
    {
        let mut breaker = h.scheduler.breaker.lock();
        for _ in 0..3 {
            breaker.record_failure(std::slice::from_ref(&prop), Instant::now());
        }
    }

    let blocked = RecomputeRequest::new("G1", RecomputeTrigger::LineChange)
        .with_props(["team_total", "player_hits_judge"]);
    assert_eq!(
        h.scheduler.try_schedule(blocked.clone()),
        Err(Rejection::PropBlocked {
            prop_id: prop.clone(),
            failures: 3
        })
    );
    assert!(h
        .scheduler
        .try_schedule(RecomputeRequest::new("G1", RecomputeTrigger::LineChange))
        .is_ok());

    assert!(h.scheduler.reset_prop_breaker(&prop));
    assert!(!h.scheduler.reset_prop_breaker(&prop));
    assert!(h.scheduler.try_schedule(blocked).is_ok());
}

#[tokio::test]
async fn purge_oldest_keeps_queue_bounded() {
    let h = idle();
    for i in 0..95 {
        h.scheduler
            .try_schedule(RecomputeRequest::new(format!("H{i}"), RecomputeTrigger::Scheduled))
            .unwrap();
    }
    assert_eq!(h.scheduler.queue_depth(), 95);

    for i in 0..6 {
        let request = RecomputeRequest::new(format!("L{i}"), RecomputeTrigger::Scheduled)
            .with_props(["futures_world_series"]);
        assert!(h.scheduler.try_schedule(request).is_ok());
        assert!(h.scheduler.queue_depth() <= 100);
    }

    let status = h.scheduler.get_status();
    assert!(status.metrics.jobs_purged >= 1);
    assert!(status.metrics.saturation_events >= 6);
    assert!(status.queue_depth <= 100);
}

#[tokio::test]
async fn purge_never_touches_high_priority_jobs() {
    let config = SchedulerConfig {
        queue_max_size: 10,
        ..SchedulerConfig::default()
    };
    let h = harness(config, ScriptedValuationEngine::new());
    for i in 0..10 {
        h.scheduler
            .try_schedule(RecomputeRequest::new(format!("H{i}"), RecomputeTrigger::Scheduled))
            .unwrap();
    }
    assert_eq!(
        h.scheduler
            .try_schedule(RecomputeRequest::new("X", RecomputeTrigger::Scheduled)),
        Err(Rejection::QueueSaturated { depth: 10 })
    );
    assert_eq!(h.scheduler.get_status().metrics.jobs_purged, 0);
}

#[tokio::test]
async fn reject_new_admits_until_full() {
    let config = SchedulerConfig {
        saturation_action: SaturationAction::RejectNew,
        ..SchedulerConfig::default()
    };
    let h = harness(config, ScriptedValuationEngine::new());
    for i in 0..90 {
        h.scheduler
            .try_schedule(RecomputeRequest::new(format!("G{i}"), RecomputeTrigger::Scheduled))
            .unwrap();
    }
    assert_eq!(h.scheduler.get_status().metrics.saturation_events, 0);

    for i in 90..100 {
        assert!(h
            .scheduler
            .try_schedule(RecomputeRequest::new(format!("G{i}"), RecomputeTrigger::Scheduled))
            .is_ok());
    }
    assert_eq!(h.scheduler.queue_depth(), 100);
    assert_eq!(h.scheduler.get_status().metrics.saturation_events, 10);

    assert_eq!(
        h.scheduler
            .try_schedule(RecomputeRequest::new("late", RecomputeTrigger::Scheduled)),
        Err(Rejection::QueueSaturated { depth: 100 })
    );
    assert_eq!(h.scheduler.queue_depth(), 100);
    assert_eq!(h.scheduler.get_status().metrics.saturation_events, 11);
}

#[tokio::test]
async fn downgrade_converts_queued_line_changes() {
    let config = SchedulerConfig {
        queue_max_size: 10,
        saturation_threshold: 0.5,
        saturation_action: SaturationAction::DowngradePriority,
        ..SchedulerConfig::default()
    };
    let h = harness(config, ScriptedValuationEngine::new());
    for i in 0..5 {
        h.scheduler
            .try_schedule(line_change(&format!("G{i}"), 0.8).with_props(["team_total"]))
            .unwrap();
    }
    h.scheduler
        .try_schedule(line_change("G5", 0.8).with_props(["team_total"]))
        .unwrap();

    let mut accepted = 6;
    for i in 6..20 {
        if h.scheduler
            .try_schedule(line_change(&format!("G{i}"), 0.8).with_props(["team_total"]))
            .is_ok()
        {
            accepted += 1;
        }
        assert!(h.scheduler.queue_depth() <= 10);
    }
    assert_eq!(accepted, 10);
    assert!(h.scheduler.get_status().metrics.jobs_downgraded >= 5);

    let fast = std::iter::from_fn(|| h.scheduler.next_job())
        .filter(|job| job.recompute_type == RecomputeType::Fast)
        .count();
    assert!(fast >= 5);
}

#[tokio::test]
async fn worker_applies_edge_updates() {
    let valuation = Valuation {
        props_updated: 3,
        edge_updates: vec![EdgeUpdate::Create(new_edge(
            "e1",
            EdgeType::PlayerProp,
            0.05,
            0.8,
            1.5,
        ))],
    };
    let h = harness(
        config::scheduler(),
        ScriptedValuationEngine::new().with_steps(vec![ScriptedStep::Succeed(valuation)]),
    );
    h.scheduler.start();
    let id = h.scheduler.try_schedule(line_change("G1", 0.1)).unwrap();

    wait_for(|| h.scheduler.get_job_history(10).len() == 1).await;
    let record = h.scheduler.get_job_history(1).remove(0);
    assert_eq!(record.job.id, id);
    assert_eq!(record.job.attempts, 1);
    assert!(record.result.success);
    assert_eq!(record.result.props_updated, 3);
    assert_eq!(record.result.edges_created, 1);
    assert_eq!(h.edges.active_count(), 1);
    assert_eq!(h.engine.call_count(), 1);

    let status = h.scheduler.get_status();
    assert_eq!(status.metrics.jobs_completed, 1);
    assert_eq!(status.metrics.fast_recomputes, 1);
    assert_eq!(status.metrics.fast_latency.sample_count, 1);
    h.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_engine_times_out() {
    let h = harness(
        config::scheduler(),
        ScriptedValuationEngine::with_fallback(ScriptedStep::Delay(
            Duration::from_secs(5),
            Valuation::default(),
        )),
    );
    h.scheduler.start();
    h.scheduler.try_schedule(line_change("G1", 0.1)).unwrap();

    wait_for(|| h.scheduler.get_job_history(1).len() == 1).await;
    let record = h.scheduler.get_job_history(1).remove(0);
    assert!(!record.result.success);
    assert_eq!(record.result.failure, Some(FailureKind::Timeout));
    assert!(record.result.duration_ms >= 400.0);
    assert!(record.result.duration_ms < 5000.0);

    let status = h.scheduler.get_status();
    assert_eq!(status.metrics.timeout_failures, 1);
    assert_eq!(status.breaker.recent_failures, 1);
    h.scheduler.stop().await;
}

#[tokio::test]
async fn repeated_prop_failures_block_the_prop() {
    let h = harness(
        config::scheduler_without_debounce(1),
        ScriptedValuationEngine::with_fallback(ScriptedStep::fail("model unavailable")),
    );
    h.scheduler.start();
    let request = || {
        RecomputeRequest::new("G1", RecomputeTrigger::LineChange).with_props(["player_hits_judge"])
    };

    for expected in 1..=3 {
        h.scheduler.try_schedule(request()).unwrap();
        wait_for(|| h.scheduler.get_job_history(10).len() == expected).await;
    }

    assert!(matches!(
        h.scheduler.try_schedule(request()),
        Err(Rejection::PropBlocked { failures: 3, .. })
    ));
    let status = h.scheduler.get_status();
    assert_eq!(status.metrics.engine_failures, 3);
    assert_eq!(status.breaker.blocked_props, vec![PropId::new("player_hits_judge")]);
    assert!(!status.breaker.open);
    h.scheduler.stop().await;
}

#[tokio::test]
async fn failures_trip_global_breaker() {
    let mut config = config::scheduler_without_debounce(1);
    config.breaker.failure_threshold = 2;
    let h = harness(
        config,
        ScriptedValuationEngine::with_fallback(ScriptedStep::fail("boom")),
    );
    h.scheduler.start();

    for (i, game) in ["G1", "G2"].into_iter().enumerate() {
        h.scheduler
            .try_schedule(RecomputeRequest::new(game, RecomputeTrigger::Scheduled))
            .unwrap();
        wait_for(|| h.scheduler.get_job_history(10).len() == i + 1).await;
    }

    assert_eq!(
        h.scheduler
            .try_schedule(RecomputeRequest::new("G3", RecomputeTrigger::Scheduled)),
        Err(Rejection::CircuitOpen)
    );
    let status = h.scheduler.get_status();
    assert_eq!(status.metrics.breaker_trips, 1);
    assert!((status.metrics.error_rate() - 1.0).abs() < 1e-9);
    h.scheduler.stop().await;
}

#[tokio::test]
async fn engine_panic_is_isolated() {
    let h = harness(
        config::scheduler_without_debounce(1),
        ScriptedValuationEngine::new()
            .with_steps(vec![ScriptedStep::Panic("engine bug".into()), ScriptedStep::ok()]),
    );
    h.scheduler.start();
    h.scheduler
        .try_schedule(RecomputeRequest::new("G1", RecomputeTrigger::Scheduled))
        .unwrap();
    h.scheduler
        .try_schedule(RecomputeRequest::new("G2", RecomputeTrigger::Scheduled))
        .unwrap();

    wait_for(|| h.scheduler.get_job_history(10).len() == 2).await;
    let history = h.scheduler.get_job_history(10);
    assert_eq!(history[0].result.failure, Some(FailureKind::Panicked));
    assert!(history[1].result.success);
    assert_eq!(h.scheduler.get_status().metrics.panicked_jobs, 1);
    h.scheduler.stop().await;
}

#[tokio::test]
async fn workers_run_in_parallel() {
    let h = harness(
        config::scheduler_without_debounce(4),
        ScriptedValuationEngine::with_fallback(ScriptedStep::Delay(
            Duration::from_millis(50),
            Valuation::default(),
        )),
    );
    h.scheduler.start();
    for i in 0..8 {
        h.scheduler
            .try_schedule(
                RecomputeRequest::new(format!("G{i}"), RecomputeTrigger::LineupUpdate)
                    .with_force_type(RecomputeType::Fast),
            )
            .unwrap();
    }

    wait_for(|| h.scheduler.get_job_history(100).len() == 8).await;
    assert!(h.engine.max_in_flight() > 1);
    assert!(h.engine.max_in_flight() <= 4);
    h.scheduler.stop().await;
}

#[tokio::test]
async fn stop_abandons_queued_jobs_and_refuses_new_ones() {
    let h = idle();
    for i in 0..3 {
        h.scheduler
            .try_schedule(RecomputeRequest::new(format!("G{i}"), RecomputeTrigger::Scheduled))
            .unwrap();
    }
    h.scheduler.stop().await;

    assert_eq!(
        h.scheduler
            .try_schedule(RecomputeRequest::new("G9", RecomputeTrigger::Manual)),
        Err(Rejection::ShuttingDown)
    );
    let status = h.scheduler.get_status();
    assert_eq!(status.queue_depth, 0);
    assert_eq!(status.metrics.jobs_abandoned, 3);
    assert!(!status.running);
    assert!(!status.accepting);
}

#[tokio::test]
async fn history_is_bounded_and_chronological() {
    let config = SchedulerConfig {
        history_size: 3,
        ..config::scheduler_without_debounce(1)
    };
    let h = harness(config, ScriptedValuationEngine::new());
    h.scheduler.start();
    for i in 0..5 {
        h.scheduler
            .try_schedule(RecomputeRequest::new(format!("G{i}"), RecomputeTrigger::Scheduled))
            .unwrap();
    }

    wait_for(|| h.scheduler.get_status().metrics.jobs_completed == 5).await;
    let games: Vec<String> = h
        .scheduler
        .get_job_history(10)
        .iter()
        .map(|r| r.job.game_id.to_string())
        .collect();
    assert_eq!(games, vec!["G2", "G3", "G4"]);
    assert_eq!(h.scheduler.get_job_history(1)[0].job.game_id.as_str(), "G4");
    h.scheduler.stop().await;
}

#[tokio::test]
async fn export_caches_status() {
    let h = idle();
    h.scheduler.try_schedule(line_change("G1", 0.1)).unwrap();
    let status = h.scheduler.export_metrics();
    assert_eq!(status.queue_depth, 1);

    let cached = h.cache.get(RECOMPUTE_METRICS_KEY).unwrap();
    assert_eq!(cached["queue_depth"], 1);
    assert_eq!(cached["metrics"]["jobs_queued"], 1);
}
