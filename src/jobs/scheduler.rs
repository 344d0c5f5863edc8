use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use super::Pipeline;
use crate::period::{PeriodType, PeriodWindow};
use crate::shared::{calendar_day, AppError};

/// Next instant that is `delay` past a local midnight and strictly after `now`.
pub fn next_run_at(now: DateTime<Utc>, offset: FixedOffset, delay: Duration) -> DateTime<Utc> {
    let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    let local_midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    let midnight_utc = (local_midnight
        - chrono::Duration::seconds(i64::from(offset.local_minus_utc())))
    .and_utc();

    let candidate = midnight_utc + delay;
    if candidate > now {
        candidate
    } else {
        candidate + chrono::Duration::days(1)
    }
}

/// Sleeps until the next daily slot and returns the local day that slot
/// belongs to; `None` when cancelled first.
///
/// The day comes from the slot itself, not from the wall clock after
/// waking, so a clock running slightly behind the timer cannot file a run
/// under the previous day.
async fn wait_for_slot(
    offset: FixedOffset,
    delay: Duration,
    cancel: &CancellationToken,
) -> Option<NaiveDate> {
    let next = next_run_at(Utc::now(), offset, delay);
    let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    info!(next_run = %next, "Waiting for next run");

    tokio::select! {
        _ = cancel.cancelled() => None,
        _ = tokio::time::sleep(wait) => Some(calendar_day(next, offset)),
    }
}

/// Days the delta loop covers on `day`: the previous day is recomputed so
/// snapshots that landed after its slot still get a delta.
pub(crate) fn delta_days(day: NaiveDate) -> Vec<NaiveDate> {
    day.pred_opt().into_iter().chain(std::iter::once(day)).collect()
}

/// Spawns the daily ingestion, delta and rollup loops.
///
/// Each loop runs independently; a failed run is logged and the loop
/// waits for its next slot.
pub fn spawn_schedulers(pipeline: Arc<Pipeline>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(run_ingest_loop(pipeline.clone(), cancel.clone())),
        tokio::spawn(run_delta_loop(pipeline.clone(), cancel.clone())),
        tokio::spawn(run_rollup_loop(pipeline, cancel)),
    ]
}

#[instrument(skip_all)]
async fn run_ingest_loop(pipeline: Arc<Pipeline>, cancel: CancellationToken) {
    let offset = pipeline.schedule().day_offset;
    info!("Starting daily ingestion task");

    while let Some(day) = wait_for_slot(offset, Duration::ZERO, &cancel).await {
        match pipeline.ingest_tracked_on(day, &cancel).await {
            Ok(report) => info!(
                run_id = %report.run_id,
                succeeded = report.succeeded,
                failed = report.failures.len(),
                "Scheduled ingestion completed"
            ),
            Err(e) => error!(error = %e, "Scheduled ingestion failed"),
        }

        if let Err(e) = pipeline.cleanup_snapshots(day).await {
            error!(error = %e, "Snapshot retention cleanup failed");
        }
    }
    info!("Daily ingestion task stopped");
}

#[instrument(skip_all)]
async fn run_delta_loop(pipeline: Arc<Pipeline>, cancel: CancellationToken) {
    let schedule = pipeline.schedule().clone();
    info!("Starting daily delta task");

    while let Some(today) =
        wait_for_slot(schedule.day_offset, schedule.delta_delay, &cancel).await
    {
        for day in delta_days(today) {
            match pipeline.compute_deltas_all(day, &cancel).await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    day = %day,
                    computed = report.computed,
                    awarded = report.achievements_awarded,
                    "Scheduled delta computation completed"
                ),
                Err(e) => error!(day = %day, error = %e, "Scheduled delta computation failed"),
            }
        }
    }
    info!("Daily delta task stopped");
}

#[instrument(skip_all)]
async fn run_rollup_loop(pipeline: Arc<Pipeline>, cancel: CancellationToken) {
    let schedule = pipeline.schedule().clone();
    info!("Starting period rollup task");

    while let Some(today) =
        wait_for_slot(schedule.day_offset, schedule.rollup_delay, &cancel).await
    {
        let due = match due_rollups(today) {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Could not determine due rollups");
                continue;
            }
        };

        for window in due {
            match pipeline
                .aggregate_period(window.period_type, window.start, &cancel)
                .await
            {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    period_type = %window.period_type,
                    period_start = %window.start,
                    aggregated = report.aggregated,
                    "Scheduled rollup completed"
                ),
                Err(e) => error!(
                    period_type = %window.period_type,
                    error = %e,
                    "Scheduled rollup failed"
                ),
            }
        }
    }
    info!("Period rollup task stopped");
}

/// Periods that closed right before `today`: last week on Mondays, last
/// month on the first of the month
pub(crate) fn due_rollups(today: NaiveDate) -> Result<Vec<PeriodWindow>, AppError> {
    let mut due = Vec::new();
    if today.weekday() == Weekday::Mon {
        due.push(PeriodWindow::containing(PeriodType::Week, today)?.previous()?);
    }
    if today.day() == 1 {
        due.push(PeriodWindow::containing(PeriodType::Month, today)?.previous()?);
    }
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn moscow() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    #[rstest]
    // 12:00 UTC is 15:00 in Moscow; next Moscow midnight is 21:00 UTC
    #[case(at(12, 0), 0, at(21, 0))]
    #[case(at(12, 0), 30, at(21, 30))]
    // 21:10 UTC is 00:10 local; the +30min slot of that night is still ahead
    #[case(at(21, 10), 30, at(21, 30))]
    // exactly on the slot means the next day
    #[case(at(21, 30), 30, Utc.with_ymd_and_hms(2024, 3, 11, 21, 30, 0).unwrap())]
    fn next_run_is_after_local_midnight(
        #[case] now: DateTime<Utc>,
        #[case] delay_minutes: u64,
        #[case] expected: DateTime<Utc>,
    ) {
        let next = next_run_at(now, moscow(), Duration::from_secs(delay_minutes * 60));
        assert_eq!(next, expected);
    }

    #[test]
    fn next_run_in_utc() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let next = next_run_at(at(23, 59), utc, Duration::ZERO);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[rstest]
    // Monday the 1st closes both a week and a month
    #[case(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(), vec![
        (PeriodType::Week, NaiveDate::from_ymd_opt(2024, 3, 25).unwrap()),
        (PeriodType::Month, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
    ])]
    #[case(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(), vec![
        (PeriodType::Week, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()),
    ])]
    #[case(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap(), vec![])]
    fn rollups_due_after_period_ends(
        #[case] today: NaiveDate,
        #[case] expected: Vec<(PeriodType, NaiveDate)>,
    ) {
        let due: Vec<(PeriodType, NaiveDate)> = due_rollups(today)
            .unwrap()
            .into_iter()
            .map(|w| (w.period_type, w.start))
            .collect();
        assert_eq!(due, expected);
    }

    #[tokio::test]
    async fn waiting_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(wait_for_slot(moscow(), Duration::ZERO, &cancel).await, None);
    }

    #[test]
    fn slot_day_comes_from_the_slot_not_the_wake_time() {
        // woken a moment before the Moscow midnight slot at 21:00 UTC
        let woken = Utc.with_ymd_and_hms(2024, 3, 10, 20, 59, 59).unwrap();
        let slot = next_run_at(woken, moscow(), Duration::ZERO);

        assert_eq!(calendar_day(woken, moscow()), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(calendar_day(slot, moscow()), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn delta_days_include_the_previous_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            delta_days(day),
            vec![NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), day]
        );
    }
}
