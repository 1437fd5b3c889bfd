// src/services/user_data_service_tests.rs
//
// Watched-state engine behavior against a real database, with the stats
// aggregator and sync dispatcher mocked out.

use chrono::{TimeDelta, TimeZone, Utc};
use mockall::predicate::eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::{FileUserData, ImportSource, SaveReason};
use crate::error::AppError;
use crate::events::{
    register_import_handlers, EpisodeUserDataChanged, FileUserDataChanged, WatchStateImported,
};
use crate::services::statistics_service::MockStatsAggregator;
use crate::services::sync_dispatcher::{HistoryAction, SyncJob};
use crate::services::test_fixtures::{
    forbidden_stats, permissive_stats, recording_dispatcher, Fixture,
};
use crate::services::{SetEpisodeWatchedRequest, SetFileWatchedRequest};

fn evening() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
}

fn my_list_jobs(jobs: &[SyncJob]) -> usize {
    jobs.iter()
        .filter(|job| matches!(job, SyncJob::UpdateMyListFileStatus { .. }))
        .count()
}

fn history_jobs(jobs: &[SyncJob]) -> usize {
    jobs.iter()
        .filter(|job| matches!(job, SyncJob::SendEpisodeWatchState { .. }))
        .count()
}

// ============================================================================
// EPISODE AGGREGATION & STATS BATCHING
// ============================================================================

#[test]
fn test_single_file_marks_episode_and_recomputes_stats_once() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let group = fx.group(None);
    let series = fx.series(Some(group.id));
    let episode = fx.episode(Some(series.id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let mut stats = MockStatsAggregator::new();
    stats
        .expect_recompute_series_stats()
        .with(eq(series.id), eq(false), eq(false))
        .times(1)
        .returning(|_, _, _| Ok(()));
    stats
        .expect_recompute_group_stats()
        .with(eq(group.id), eq(false), eq(false))
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(Arc::new(stats), dispatcher);

    let t = evening();
    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();

    assert_eq!(record.watched_at, Some(t));
    assert_eq!(record.watched_count, 1);

    let episode_record = engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap();
    assert_eq!(episode_record.watched_at, Some(t));
    assert_eq!(episode_record.series_id, Some(series.id));
}

#[test]
fn test_nested_group_recomputes_top_level_group() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let top = fx.group(None);
    let child = fx.group(Some(top.id));
    let series = fx.series(Some(child.id));
    let episode = fx.episode(Some(series.id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let mut stats = MockStatsAggregator::new();
    stats
        .expect_recompute_series_stats()
        .with(eq(series.id), eq(false), eq(false))
        .times(1)
        .returning(|_, _, _| Ok(()));
    stats
        .expect_recompute_group_stats()
        .with(eq(top.id), eq(false), eq(false))
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(Arc::new(stats), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();
}

#[test]
fn test_file_spanning_two_episodes_batches_one_series() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let group = fx.group(None);
    let series = fx.series(Some(group.id));
    let first = fx.episode(Some(series.id));
    let second = fx.episode(Some(series.id));
    let file = fx.file(48);
    fx.link(&file, first.id, 100);
    fx.link(&file, second.id, 100);

    let mut stats = MockStatsAggregator::new();
    stats
        .expect_recompute_series_stats()
        .times(1)
        .returning(|_, _, _| Ok(()));
    stats
        .expect_recompute_group_stats()
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(Arc::new(stats), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert!(engine.get_episode_user_data(user.id, first.id).unwrap().unwrap().is_watched());
    assert!(engine.get_episode_user_data(user.id, second.id).unwrap().unwrap().is_watched());
}

#[test]
fn test_split_episode_needs_both_halves() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let series = fx.series(None);
    let episode = fx.episode(Some(series.id));
    let part_one = fx.file(12);
    let part_two = fx.file(12);
    fx.link(&part_one, episode.id, 50);
    fx.link(&part_two, episode.id, 50);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, part_one.id, true))
        .unwrap();
    assert!(engine.get_episode_user_data(user.id, episode.id).unwrap().is_none());

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, part_two.id, true))
        .unwrap();
    assert!(engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap().is_watched());

    // One half unwatched drops the aggregate to 50, below the threshold
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, part_one.id, false))
        .unwrap();
    assert!(!engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap().is_watched());
}

#[test]
fn test_coverage_at_threshold_is_not_enough() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 95);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert!(record.is_watched());
    assert!(engine.get_episode_user_data(user.id, episode.id).unwrap().is_none());
}

#[test]
fn test_zero_percentage_counts_as_full_coverage() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 0);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert!(engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap().is_watched());
}

#[test]
fn test_episode_without_series_skips_stats() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let episode = fx.episode(None);
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    let record = engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap();
    assert!(record.is_watched());
    assert_eq!(record.series_id, None);
}

#[test]
fn test_episode_with_missing_series_stops_at_episode() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let episode = fx.episode(Some(uuid::Uuid::new_v4()));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let file_events = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&file_events);
    let _sub = fx.bus.subscribe::<FileUserDataChanged, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(fx.statistics(), dispatcher);

    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();
    assert!(record.is_watched());
    assert_eq!(file_events.load(Ordering::SeqCst), 1);

    let episode_record = engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap();
    assert!(episode_record.is_watched());

    let marked = engine
        .set_episode_watched_state(SetEpisodeWatchedRequest::new(user.id, episode.id, false))
        .unwrap();
    assert!(marked);
    assert!(!engine.get_file_user_data(user.id, file.id).unwrap().unwrap().is_watched());
}

#[test]
fn test_stats_failure_does_not_swallow_change_events() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let series = fx.series(None);
    let episode = fx.episode(Some(series.id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let file_events = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&file_events);
    let _sub = fx.bus.subscribe::<FileUserDataChanged, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut stats = MockStatsAggregator::new();
    stats
        .expect_recompute_series_stats()
        .times(1)
        .returning(|_, _, _| Err(AppError::InternalInconsistency("stats store offline".into())));
    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(Arc::new(stats), dispatcher);

    let err = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap_err();

    assert!(matches!(err, AppError::InternalInconsistency(_)));
    assert_eq!(file_events.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unknown_episode_reference_is_skipped() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);
    let missing_episode = uuid::Uuid::new_v4();
    fx.link(&file, missing_episode, 100);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert!(record.is_watched());
    assert!(engine.get_episode_user_data(user.id, missing_episode).unwrap().is_none());
}

#[test]
fn test_deferred_stats_are_not_recomputed() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let series = fx.series(Some(fx.group(None).id));
    let episode = fx.episode(Some(series.id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, true).deferring_stats(),
        )
        .unwrap();

    assert!(engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap().is_watched());
}

// ============================================================================
// FILE RECORDS
// ============================================================================

#[test]
fn test_repeating_same_timestamp_is_idempotent() {
    let fx = Fixture::new();
    let user = fx.shared_user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let t = evening();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();
    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();

    assert_eq!(record.watched_count, 1);
    assert_eq!(
        engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap().watched_count,
        1
    );
    assert_eq!(my_list_jobs(&jobs.lock()), 1);
}

#[test]
fn test_rewatch_with_new_timestamp_increments_count() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let t = evening();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();
    let record = engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, true).at(t + TimeDelta::days(1)),
        )
        .unwrap();

    assert_eq!(record.watched_count, 2);
    assert_eq!(record.watched_at, Some(t + TimeDelta::days(1)));
}

#[test]
fn test_unwatch_keeps_watch_count() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();
    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, false))
        .unwrap();

    assert_eq!(record.watched_at, None);
    assert_eq!(record.watched_count, 1);
}

#[test]
fn test_explicit_watch_count_replaces_and_clamps() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let record = engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, true).with_watched_count(7),
        )
        .unwrap();
    assert_eq!(record.watched_count, 7);

    let record = engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, false).with_watched_count(-3),
        )
        .unwrap();
    assert_eq!(record.watched_count, 0);
}

#[test]
fn test_resume_position_is_clamped_to_file_duration() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let record = engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, false)
                .with_resume_position(TimeDelta::minutes(30)),
        )
        .unwrap();
    assert_eq!(record.resume_position, TimeDelta::minutes(24));

    let record = engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, false)
                .with_resume_position(TimeDelta::seconds(-5)),
        )
        .unwrap();
    assert_eq!(record.resume_position, TimeDelta::zero());
}

#[test]
fn test_resume_position_survives_watched_change_by_default() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .save_resume_position(user.id, file.id, TimeDelta::minutes(5))
        .unwrap();
    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert_eq!(record.resume_position, TimeDelta::minutes(5));
}

#[test]
fn test_resume_position_reset_when_configured() {
    let fx = Fixture::new();
    fx.settings.write().playback.reset_resume_on_watched_change = true;
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .save_resume_position(user.id, file.id, TimeDelta::minutes(5))
        .unwrap();
    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert_eq!(record.resume_position, TimeDelta::zero());
}

#[test]
fn test_unknown_user_or_file_is_rejected_without_writes() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    let stranger = uuid::Uuid::new_v4();
    let err = engine
        .set_file_watched_state(SetFileWatchedRequest::new(stranger, file.id, true))
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, uuid::Uuid::new_v4(), true))
        .unwrap_err();
    assert!(err.is_invalid_argument());

    assert!(engine.list_file_user_data_for_user(user.id).unwrap().is_empty());
    assert!(jobs.lock().is_empty());
}

// ============================================================================
// SHARED REMOTE ACCOUNT FAN-OUT
// ============================================================================

#[test]
fn test_change_fans_out_to_shared_account_users() {
    let fx = Fixture::new();
    let alice = fx.shared_user("alice");
    let bob = fx.shared_user("bob");
    let carol = fx.user("carol");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let t = evening();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(alice.id, file.id, true).at(t))
        .unwrap();

    let bob_record = engine.get_file_user_data(bob.id, file.id).unwrap().unwrap();
    assert_eq!(bob_record.watched_at, Some(t));
    let bob_episode = engine.get_episode_user_data(bob.id, episode.id).unwrap().unwrap();
    assert_eq!(bob_episode.watched_at, Some(t));

    assert!(engine.get_file_user_data(carol.id, file.id).unwrap().is_none());
    assert!(engine.get_episode_user_data(carol.id, episode.id).unwrap().is_none());

    // One remote list update for the shared account, not one per user
    assert_eq!(my_list_jobs(&jobs.lock()), 1);
}

#[test]
fn test_local_user_change_stays_local() {
    let fx = Fixture::new();
    let shared = fx.shared_user("alice");
    let carol = fx.user("carol");
    let file = fx.file(24);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(carol.id, file.id, true))
        .unwrap();

    assert!(engine.get_file_user_data(shared.id, file.id).unwrap().is_none());
    assert_eq!(my_list_jobs(&jobs.lock()), 0);
}

#[test]
fn test_change_events_emitted_per_written_record() {
    let fx = Fixture::new();
    let alice = fx.shared_user("alice");
    fx.shared_user("bob");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let file_events = Arc::new(AtomicUsize::new(0));
    let episode_events = Arc::new(AtomicUsize::new(0));
    let file_counter = Arc::clone(&file_events);
    let episode_counter = Arc::clone(&episode_events);
    let _file_sub = fx.bus.subscribe::<FileUserDataChanged, _>(move |event| {
        assert_eq!(event.reason, SaveReason::UserInteraction);
        file_counter.fetch_add(1, Ordering::SeqCst);
    });
    let _episode_sub = fx.bus.subscribe::<EpisodeUserDataChanged, _>(move |_| {
        episode_counter.fetch_add(1, Ordering::SeqCst);
    });

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(alice.id, file.id, true))
        .unwrap();

    assert_eq!(file_events.load(Ordering::SeqCst), 2);
    assert_eq!(episode_events.load(Ordering::SeqCst), 2);
}

#[test]
fn test_panicking_listener_does_not_abort_save() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);
    let _sub = fx
        .bus
        .subscribe::<FileUserDataChanged, _>(|_| panic!("listener failure"));

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let record = engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert!(record.is_watched());
}

#[test]
fn test_concurrent_users_on_same_file_each_get_a_record() {
    let fx = Fixture::new();
    let users: Vec<_> = (0..6).map(|i| fx.user(&format!("user-{}", i))).collect();
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    std::thread::scope(|scope| {
        for user in &users {
            let engine = &engine;
            let file_id = file.id;
            scope.spawn(move || {
                engine
                    .set_file_watched_state(SetFileWatchedRequest::new(user.id, file_id, true))
                    .unwrap();
            });
        }
    });

    for user in &users {
        let record = engine.get_file_user_data(user.id, file.id).unwrap().unwrap();
        assert_eq!(record.watched_count, 1);
    }
}

// ============================================================================
// REMOTE SYNC
// ============================================================================

#[test]
fn test_my_list_job_carries_file_hash() {
    let fx = Fixture::new();
    let user = fx.shared_user("alice");
    let file = fx.file(24);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let t = evening();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();

    assert_eq!(
        *jobs.lock(),
        vec![SyncJob::UpdateMyListFileStatus {
            file_id: file.id,
            hash: file.hash.clone(),
            watched: true,
            watched_at: Some(t),
        }]
    );
}

#[test]
fn test_my_list_unwatch_respects_setting() {
    let fx = Fixture::new();
    fx.settings.write().anidb.my_list_set_unwatched = false;
    let user = fx.shared_user("alice");
    let file = fx.file(24);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, false))
        .unwrap();

    assert_eq!(my_list_jobs(&jobs.lock()), 1);
}

#[test]
fn test_anidb_import_is_not_echoed_back() {
    let fx = Fixture::new();
    fx.enable_trakt();
    let user = fx.shared_user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, true)
                .with_reason(SaveReason::Import(ImportSource::AniDb)),
        )
        .unwrap();

    let jobs = jobs.lock();
    assert_eq!(my_list_jobs(&jobs), 0);
    assert_eq!(history_jobs(&jobs), 1);
}

#[test]
fn test_trakt_import_is_not_echoed_back() {
    let fx = Fixture::new();
    fx.enable_trakt();
    let user = fx.shared_user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(
            SetFileWatchedRequest::new(user.id, file.id, true)
                .with_reason(SaveReason::Import(ImportSource::Trakt)),
        )
        .unwrap();

    let jobs = jobs.lock();
    assert_eq!(history_jobs(&jobs), 0);
    assert_eq!(my_list_jobs(&jobs), 1);
}

#[test]
fn test_history_job_only_for_changed_episodes() {
    let fx = Fixture::new();
    fx.enable_trakt();
    let user = fx.user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let t = evening();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true).at(t))
        .unwrap();
    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, false))
        .unwrap();

    assert_eq!(
        *jobs.lock(),
        vec![
            SyncJob::SendEpisodeWatchState {
                user_id: user.id,
                episode_id: episode.id,
                remote_episode_id: episode.remote_episode_id,
                action: HistoryAction::HistoryAdd,
                watched_at: Some(t),
            },
            SyncJob::SendEpisodeWatchState {
                user_id: user.id,
                episode_id: episode.id,
                remote_episode_id: episode.remote_episode_id,
                action: HistoryAction::HistoryRemove,
                watched_at: None,
            },
        ]
    );
}

#[test]
fn test_history_job_requires_token() {
    let fx = Fixture::new();
    fx.settings.write().trakt.enabled = true;
    let user = fx.user("alice");
    let episode = fx.episode(Some(fx.series(None).id));
    let file = fx.file(24);
    fx.link(&file, episode.id, 100);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    engine
        .set_file_watched_state(SetFileWatchedRequest::new(user.id, file.id, true))
        .unwrap();

    assert!(jobs.lock().is_empty());
}

#[test]
fn test_imported_event_routes_through_engine() {
    let fx = Fixture::new();
    let user = fx.shared_user("alice");
    let file = fx.file(24);

    let (dispatcher, jobs) = recording_dispatcher();
    let engine = Arc::new(fx.engine(permissive_stats(), dispatcher));
    let _subscription = register_import_handlers(&fx.bus, Arc::clone(&engine));

    let t = evening();
    fx.bus.emit(WatchStateImported::new(
        ImportSource::AniDb,
        user.id,
        file.id,
        true,
        Some(t),
    ));

    let record = engine.get_file_user_data(user.id, file.id).unwrap().unwrap();
    assert_eq!(record.watched_at, Some(t));
    assert!(jobs.lock().is_empty());
}

// ============================================================================
// EPISODE-LEVEL ENTRY POINT
// ============================================================================

#[test]
fn test_episode_without_files_reports_false() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let episode = fx.episode(Some(fx.series(None).id));

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    let applied = engine
        .set_episode_watched_state(SetEpisodeWatchedRequest::new(user.id, episode.id, true))
        .unwrap();

    assert!(!applied);
}

#[test]
fn test_episode_entry_marks_every_file_with_one_stats_pass() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let group = fx.group(None);
    let series = fx.series(Some(group.id));
    let episode = fx.episode(Some(series.id));
    let part_one = fx.file(12);
    let part_two = fx.file(12);
    fx.link(&part_one, episode.id, 50);
    fx.link(&part_two, episode.id, 50);

    let mut stats = MockStatsAggregator::new();
    stats
        .expect_recompute_series_stats()
        .with(eq(series.id), eq(false), eq(false))
        .times(1)
        .returning(|_, _, _| Ok(()));
    stats
        .expect_recompute_group_stats()
        .with(eq(group.id), eq(false), eq(false))
        .times(1)
        .returning(|_, _, _| Ok(()));
    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(Arc::new(stats), dispatcher);

    let mut request = SetEpisodeWatchedRequest::new(user.id, episode.id, true);
    request.watched_at = Some(evening());
    let applied = engine.set_episode_watched_state(request).unwrap();

    assert!(applied);
    for file in [&part_one, &part_two] {
        let record = engine.get_file_user_data(user.id, file.id).unwrap().unwrap();
        assert_eq!(record.watched_at, Some(evening()));
        assert_eq!(record.resume_position, TimeDelta::zero());
    }
    assert!(engine.get_episode_user_data(user.id, episode.id).unwrap().unwrap().is_watched());
}

#[test]
fn test_unknown_episode_is_rejected() {
    let fx = Fixture::new();
    let user = fx.user("alice");

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    let err = engine
        .set_episode_watched_state(SetEpisodeWatchedRequest::new(
            user.id,
            uuid::Uuid::new_v4(),
            true,
        ))
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// PLAYBACK
// ============================================================================

#[test]
fn test_progress_near_end_marks_watched() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(permissive_stats(), dispatcher);

    let record = engine
        .record_playback_progress(
            user.id,
            file.id,
            TimeDelta::minutes(23) + TimeDelta::seconds(50),
            SaveReason::PlaybackEnd,
        )
        .unwrap();

    assert!(record.is_watched());
    assert_eq!(record.resume_position, TimeDelta::zero());
    assert!(record.last_played_at.is_some());
}

#[test]
fn test_progress_midway_stores_resume_position() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    let record = engine
        .record_playback_progress(user.id, file.id, TimeDelta::minutes(10), SaveReason::PlaybackPause)
        .unwrap();

    assert!(!record.is_watched());
    assert_eq!(record.resume_position, TimeDelta::minutes(10));
    assert!(record.last_played_at.is_some());
}

#[test]
fn test_save_resume_position_leaves_watched_state() {
    let fx = Fixture::new();
    let user = fx.user("alice");
    let file = fx.file(24);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    let record = engine
        .save_resume_position(user.id, file.id, TimeDelta::hours(2))
        .unwrap();

    assert!(!record.is_watched());
    assert_eq!(record.resume_position, TimeDelta::minutes(24));
    assert_eq!(record.last_played_at, None);
}

// ============================================================================
// BACKFILL
// ============================================================================

#[test]
fn test_backfill_derives_episode_records_from_files() {
    let fx = Fixture::new();
    let alice = fx.user("alice");
    let bob = fx.user("bob");
    let carol = fx.user("carol");
    let series = fx.series(None);
    let episode = fx.episode(Some(series.id));
    let first = fx.file(24);
    let second = fx.file(24);

    let t = evening();
    let mut records = Vec::new();
    for (user, file, at) in [
        (alice.id, first.id, Some(t)),
        (bob.id, first.id, Some(t)),
        (bob.id, second.id, Some(t + TimeDelta::hours(2))),
        (carol.id, first.id, None),
    ] {
        let mut record = FileUserData::new(user, file);
        if let Some(at) = at {
            record.mark_watched(at);
        }
        records.push(record);
    }
    for record in &records {
        fx.repos.user_data.save_file_user_data(record).unwrap();
    }
    fx.link(&first, episode.id, 100);
    fx.link(&second, episode.id, 100);

    let (dispatcher, _) = recording_dispatcher();
    let engine = fx.engine(forbidden_stats(), dispatcher);

    assert_eq!(engine.backfill_episode_user_data(episode.id).unwrap(), 2);

    let alice_record = engine.get_episode_user_data(alice.id, episode.id).unwrap().unwrap();
    assert_eq!(alice_record.watched_at, Some(t));
    assert_eq!(alice_record.watched_count, 1);
    assert_eq!(alice_record.series_id, Some(series.id));

    let bob_record = engine.get_episode_user_data(bob.id, episode.id).unwrap().unwrap();
    assert_eq!(bob_record.watched_at, Some(t + TimeDelta::hours(2)));
    assert_eq!(bob_record.watched_count, 2);

    assert!(engine.get_episode_user_data(carol.id, episode.id).unwrap().is_none());

    // Existing records are left alone
    assert_eq!(engine.backfill_episode_user_data(episode.id).unwrap(), 0);
}
