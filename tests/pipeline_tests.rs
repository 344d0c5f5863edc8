mod utils;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use clanstats::{
    achievement::AchievementRepository,
    client::FetchError,
    delta::DeltaRepository,
    notification::NotificationEvent,
    period::PeriodType,
    shared::AppError,
};
use utils::{day, FailingSink, PayloadBuilder, TestSetup, TestSetupBuilder};

fn tags(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("#P{}", i)).collect()
}

/// Two consecutive days of snapshots for one bound player: 1.5M gold and
/// 50 donations gained on the second day
async fn seed_two_days(setup: &TestSetup, player_tag: &str) {
    let cancel = CancellationToken::new();

    setup
        .client
        .set_player(
            player_tag,
            PayloadBuilder::new(player_tag)
                .gold(1_000_000)
                .donations(100)
                .build(),
        )
        .await;
    setup
        .pipeline
        .ingest_all_on(&[player_tag.to_string()], day(2024, 3, 4), &cancel)
        .await;

    setup
        .client
        .set_player(
            player_tag,
            PayloadBuilder::new(player_tag)
                .gold(2_500_000)
                .donations(150)
                .trophies(3040)
                .build(),
        )
        .await;
    setup
        .pipeline
        .ingest_all_on(&[player_tag.to_string()], day(2024, 3, 5), &cancel)
        .await;
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn one_failing_player_does_not_stop_the_batch() {
    let setup = TestSetupBuilder::new().build();
    let players = tags(10);

    for tag in &players {
        setup
            .client
            .set_player(tag, PayloadBuilder::new(tag).build())
            .await;
    }
    setup
        .client
        .fail_always("#P5", FetchError::Transient("connection reset".to_string()))
        .await;

    let report = setup
        .pipeline
        .ingest_all_on(&players, day(2024, 3, 4), &CancellationToken::new())
        .await;

    assert_eq!(report.total, 10);
    assert_eq!(report.succeeded, 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].player_tag, "#P5");
    assert_eq!(report.failures[0].attempts, 3);
    assert_eq!(setup.client.calls("#P5").await, 3);
    assert_eq!(setup.snapshot_repo.snapshot_count().await, 9);
}

#[tokio::test(start_paused = true)]
async fn ingestion_never_exceeds_the_configured_concurrency() {
    let setup = TestSetupBuilder::new().with_concurrency(3).build();
    let players = tags(20);

    for tag in &players {
        setup
            .client
            .set_player(tag, PayloadBuilder::new(tag).build())
            .await;
    }
    setup.client.set_latency(Duration::from_millis(50)).await;

    let report = setup
        .pipeline
        .ingest_all_on(&players, day(2024, 3, 4), &CancellationToken::new())
        .await;

    assert_eq!(report.succeeded, 20);
    assert_eq!(setup.client.total_calls().await, 20);
    assert_eq!(setup.client.peak_in_flight(), 3);
}

#[tokio::test]
async fn transient_failures_stop_after_max_attempts() {
    let setup = TestSetupBuilder::new().with_max_attempts(5).build();
    setup
        .client
        .fail_always("#P1", FetchError::Transient("bad gateway".to_string()))
        .await;

    let report = setup
        .pipeline
        .ingest_all_on(&tags(2)[1..], day(2024, 3, 4), &CancellationToken::new())
        .await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].attempts, 5);
    assert_eq!(setup.client.calls("#P1").await, 5);
}

#[tokio::test]
async fn rate_limited_player_is_retried_until_it_succeeds() {
    let setup = TestSetupBuilder::new().build();
    setup
        .client
        .set_player("#P1", PayloadBuilder::new("#P1").build())
        .await;
    setup
        .client
        .fail_next("#P1", 2, FetchError::RateLimited)
        .await;

    let report = setup
        .pipeline
        .ingest_all_on(&tags(2)[1..], day(2024, 3, 4), &CancellationToken::new())
        .await;

    assert_eq!(report.succeeded, 1);
    assert!(report.failures.is_empty());
    assert_eq!(setup.client.calls("#P1").await, 3);
}

#[tokio::test]
async fn unknown_player_is_reported_and_not_retried() {
    let setup = TestSetupBuilder::new().build();

    let report = setup
        .pipeline
        .ingest_all_on(
            &["#gone".to_string()],
            day(2024, 3, 4),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.not_found, vec!["#GONE".to_string()]);
    assert_eq!(report.succeeded, 0);
    assert!(report.failures.is_empty());
    assert_eq!(setup.client.calls("#GONE").await, 1);
}

#[tokio::test]
async fn malformed_payload_fails_without_retry() {
    let setup = TestSetupBuilder::new().build();
    setup
        .client
        .set_player("#P1", PayloadBuilder::new("#P1").without_name().build())
        .await;

    let report = setup
        .pipeline
        .ingest_all_on(
            &["#P1".to_string()],
            day(2024, 3, 4),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].attempts, 1);
    assert_eq!(setup.snapshot_repo.snapshot_count().await, 0);
}

#[tokio::test]
async fn ingesting_the_same_day_twice_keeps_one_snapshot() {
    let setup = TestSetupBuilder::new().build();
    setup
        .client
        .set_player("#P1", PayloadBuilder::new("#P1").build())
        .await;
    let players = vec!["#P1".to_string(), "p1".to_string()];
    let cancel = CancellationToken::new();

    let first = setup
        .pipeline
        .ingest_all_on(&players, day(2024, 3, 4), &cancel)
        .await;
    let second = setup
        .pipeline
        .ingest_all_on(&players, day(2024, 3, 4), &cancel)
        .await;

    // both spellings normalize to one player
    assert_eq!(first.total, 1);
    assert_eq!(first.changed, 1);
    assert_eq!(second.succeeded, 1);
    assert_eq!(second.changed, 0);
    assert_eq!(setup.snapshot_repo.snapshot_count().await, 1);
}

#[tokio::test]
async fn cancelled_batch_fetches_nothing() {
    let setup = TestSetupBuilder::new().build();
    let players = tags(5);
    for tag in &players {
        setup
            .client
            .set_player(tag, PayloadBuilder::new(tag).build())
            .await;
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = setup
        .pipeline
        .ingest_all_on(&players, day(2024, 3, 4), &cancel)
        .await;

    assert_eq!(report.cancelled, 5);
    assert_eq!(report.succeeded, 0);
    assert_eq!(setup.client.total_calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let setup = TestSetupBuilder::new()
        .with_backoff(Duration::from_secs(60))
        .build();
    setup
        .client
        .fail_always("#P1", FetchError::Transient("timeout".to_string()))
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let report = setup
        .pipeline
        .ingest_all_on(&["#P1".to_string()], day(2024, 3, 4), &cancel)
        .await;

    assert_eq!(report.cancelled, 1);
    assert!(report.failures.is_empty());
    assert_eq!(setup.client.calls("#P1").await, 1);
}

// ============================================================================
// Deltas, achievements and rollups
// ============================================================================

#[tokio::test]
async fn daily_flow_awards_achievements_and_reports_the_week() {
    let setup = TestSetupBuilder::new().build();
    setup.directory.bind("#P1", "subject-1").await;
    seed_two_days(&setup, "#P1").await;
    let cancel = CancellationToken::new();

    let first_day = setup
        .pipeline
        .compute_deltas_all(day(2024, 3, 4), &cancel)
        .await
        .unwrap();
    assert_eq!(first_day.skipped, 1);
    assert_eq!(first_day.computed, 0);

    let second_day = setup
        .pipeline
        .compute_deltas_all(day(2024, 3, 5), &cancel)
        .await
        .unwrap();
    assert_eq!(second_day.computed, 1);
    assert_eq!(second_day.achievements_awarded, 1);
    assert_eq!(setup.sink.unlocked_keys().await, vec!["gold_digger"]);

    let delta = setup
        .delta_repo
        .get_delta("#P1", day(2024, 3, 5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delta.gold_farmed, 1_500_000);
    assert_eq!(delta.donations_made, 50);
    assert_eq!(delta.trophy_delta, 40);

    let counters = setup.tracker.counters("subject-1").await.unwrap();
    assert_eq!(counters.gold_farmed, 1_500_000);
    assert_eq!(counters.donations_made, 50);

    let rollup = setup
        .pipeline
        .aggregate_period(PeriodType::Week, day(2024, 3, 4), &cancel)
        .await
        .unwrap();
    assert_eq!(rollup.aggregated, 1);
    assert_eq!(rollup.reports_sent, 1);
    assert_eq!(setup.summary_repo.summary_count().await, 1);

    let reports = setup.sink.period_reports().await;
    assert_eq!(reports.len(), 1);
    match &reports[0] {
        NotificationEvent::PeriodReport {
            subject_id,
            period_type,
            summary,
        } => {
            assert_eq!(subject_id, "subject-1");
            assert_eq!(*period_type, PeriodType::Week);
            assert_eq!(summary.days_recorded, 1);
            assert_eq!(summary.gold_farmed, 1_500_000);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn recomputing_a_day_counts_it_once() {
    let setup = TestSetupBuilder::new().build();
    setup.directory.bind("#P1", "subject-1").await;
    seed_two_days(&setup, "#P1").await;
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        setup
            .pipeline
            .compute_deltas_all(day(2024, 3, 5), &cancel)
            .await
            .unwrap();
    }

    let counters = setup.tracker.counters("subject-1").await.unwrap();
    assert_eq!(counters.gold_farmed, 1_500_000);
    assert_eq!(setup.delta_repo.delta_count().await, 1);
    assert_eq!(setup.activity_repo.ledger_len().await, 1);
    assert_eq!(
        setup.award_repo.list_awards("subject-1").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn unbound_player_gets_deltas_but_no_counters_or_reports() {
    let setup = TestSetupBuilder::new().build();
    seed_two_days(&setup, "#P1").await;
    let cancel = CancellationToken::new();

    let deltas = setup
        .pipeline
        .compute_deltas_all(day(2024, 3, 5), &cancel)
        .await
        .unwrap();
    assert_eq!(deltas.computed, 1);
    assert_eq!(deltas.achievements_awarded, 0);
    assert_eq!(setup.activity_repo.ledger_len().await, 0);

    let rollup = setup
        .pipeline
        .aggregate_period(PeriodType::Month, day(2024, 3, 1), &cancel)
        .await
        .unwrap();
    assert_eq!(rollup.aggregated, 1);
    assert_eq!(rollup.reports_sent, 0);
    assert!(setup.sink.events().await.is_empty());
}

#[tokio::test]
async fn failing_sink_does_not_undo_awards_or_summaries() {
    let setup = TestSetupBuilder::new()
        .with_sink(Arc::new(FailingSink))
        .build();
    setup.directory.bind("#P1", "subject-1").await;
    seed_two_days(&setup, "#P1").await;
    let cancel = CancellationToken::new();

    let deltas = setup
        .pipeline
        .compute_deltas_all(day(2024, 3, 5), &cancel)
        .await
        .unwrap();
    assert_eq!(deltas.achievements_awarded, 1);
    assert!(deltas.failures.is_empty());

    let rollup = setup
        .pipeline
        .aggregate_period(PeriodType::Week, day(2024, 3, 4), &cancel)
        .await
        .unwrap();
    assert_eq!(rollup.aggregated, 1);
    assert_eq!(rollup.reports_sent, 0);
    assert!(rollup.failures.is_empty());
    assert_eq!(setup.summary_repo.summary_count().await, 1);
}

#[tokio::test]
async fn rollup_rejects_misaligned_period_start() {
    let setup = TestSetupBuilder::new().build();

    let result = setup
        .pipeline
        .aggregate_period(PeriodType::Week, day(2024, 3, 5), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn retention_removes_only_old_snapshots() {
    let setup = TestSetupBuilder::new().build();
    setup
        .client
        .set_player("#P1", PayloadBuilder::new("#P1").build())
        .await;
    let cancel = CancellationToken::new();
    let players = vec!["#P1".to_string()];

    for d in [1, 10, 20] {
        setup
            .pipeline
            .ingest_all_on(&players, day(2024, 3, d), &cancel)
            .await;
    }

    // default retention keeps 30 days
    let removed = setup
        .pipeline
        .cleanup_snapshots(day(2024, 4, 15))
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(setup.snapshot_repo.snapshot_count().await, 1);
}
