//! End-to-end flows through the composed services.

mod support;

use edgeguard::application::cache::metrics::EDGE_METRICS_KEY;
use edgeguard::domain::edge::{EdgeStatus, EdgeType, EdgeUpdate};
use edgeguard::domain::id::{EdgeId, GameId, PredictionId};
use edgeguard::domain::prediction::PropType;
use edgeguard::domain::recompute::{RecomputeTrigger, RecomputeType, TriggerContext};
use edgeguard::domain::settlement::SettlementStatus;
use edgeguard::port::Valuation;
use edgeguard::testkit::domain::{game_result, new_edge, prediction};
use edgeguard::testkit::valuation::{ScriptedStep, ScriptedValuationEngine};

use support::{services, wait_for};

#[tokio::test]
async fn line_move_recompute_opens_an_edge() {
    let engine = ScriptedValuationEngine::with_fallback(ScriptedStep::Succeed(Valuation {
        props_updated: 1,
        edge_updates: vec![EdgeUpdate::Create(new_edge(
            "e1",
            EdgeType::GameTotal,
            0.06,
            0.8,
            8.5,
        ))],
    }));
    let mut t = services::build(&services::config(), engine);
    t.services.start();

    let job = t.services.scheduler.schedule_recompute(
        "G1",
        RecomputeTrigger::LineChange,
        Some(vec!["total".into()]),
        Some(TriggerContext::line_change(1.0)),
        None,
    );
    assert!(job.is_some());

    let scheduler = t.services.scheduler.clone();
    wait_for(|| scheduler.get_status().metrics.jobs_completed == 1).await;

    let calls = t.engine.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].recompute_type, RecomputeType::Full);

    let edge = t.services.edges.get_edge(&EdgeId::from("e1")).unwrap();
    assert_eq!(edge.status, EdgeStatus::Active);
    assert_eq!(t.services.edges.active_count(), 1);

    t.services.edges.export_metrics();
    assert!(t.services.cache.get(EDGE_METRICS_KEY).is_some());

    t.services.shutdown().await;
    assert!(!t.services.scheduler.is_running());
}

#[tokio::test]
async fn confident_miss_settles_flags_the_edge_and_shows_in_telemetry() {
    let t = services::build(&services::config(), ScriptedValuationEngine::new());
    let s = &t.services;

    s.edges
        .create_edge(new_edge("e1", EdgeType::GameTotal, 0.06, 0.8, 8.5))
        .unwrap();
    s.calibration
        .record_prediction(prediction("p1", "G1", PropType::GameTotal, 8.5, 0.7, 0.9))
        .unwrap();
    assert!(s.settlement.register_prediction_for_settlement(
        PredictionId::from("p1"),
        GameId::from("G1"),
        Some(EdgeId::from("e1")),
    ));

    // Still in progress: nothing settles.
    let report = s.settlement.process_completed_games().await;
    assert_eq!(report.predictions_settled, 0);
    assert_eq!(s.settlement.pending_predictions(), 1);

    // 3-2 final, well under 8.5.
    t.results.insert(game_result("G1", 3, 2));
    let report = s.settlement.process_completed_games().await;
    assert_eq!(report.games_settled, 1);
    assert_eq!(report.predictions_settled, 1);
    assert_eq!(s.settlement.pending_predictions(), 0);

    let settled = s.calibration.get_prediction(&PredictionId::from("p1")).unwrap();
    assert!(settled.is_settled());
    assert_eq!(settled.was_correct(), Some(false));

    let mismatches = s.settlement.get_mismatch_details(10);
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].status, SettlementStatus::Mismatched);
    assert_eq!(
        s.edges
            .get_edge(&EdgeId::from("e1"))
            .unwrap()
            .false_positive_signals,
        1
    );

    let snapshot = s.telemetry.collect();
    assert_eq!(snapshot.settlements_24h, 1);
    assert!((snapshot.false_positive_proxy - 1.0).abs() < 1e-9);
    assert_eq!(snapshot.calibration_accuracy, 0.0);
}
