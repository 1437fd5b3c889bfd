// src/services/user_data_service.rs
//
// Watched-State Engine
//
// Takes one watched/unwatched change on a file and:
// 1. fans it out to every local user sharing the remote identity
// 2. decides whether it is a change for the originating user
// 3. folds the files of each cross-referenced episode into one
//    episode-level state
// 4. batches statistics recomputation for the touched series and groups
// 5. schedules remote sync without echoing imports back to their source
//
// CRITICAL RULES:
// - Record creation for a (user, file) pair is serialized per file
// - Only the get-or-create-and-upsert step holds the file lock
// - Remote jobs are scheduled after local state is committed

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SharedSettings;
use crate::domain::{
    validate_file_user_data, Episode, EpisodeUserData, File, FileUserData, ImportSource,
    RemoteIdentity, SaveReason, User, WATCHED_THRESHOLD,
};
use crate::error::{AppError, AppResult};
use crate::events::{EpisodeUserDataChanged, EventBus, FileUserDataChanged};
use crate::infrastructure::KeyedLocks;
use crate::repositories::RepositorySet;
use crate::services::statistics_service::StatsAggregator;
use crate::services::sync_dispatcher::{HistoryAction, SyncDispatcher, SyncJob};

/// Request to set the watched state of a file
#[derive(Debug, Clone)]
pub struct SetFileWatchedRequest {
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub watched: bool,
    /// Defaults to the time of the call
    pub watched_at: Option<DateTime<Utc>>,
    /// Clamped to [0, duration]
    pub resume_position: Option<TimeDelta>,
    /// Replaces the stored count; negatives clamp to 0
    pub watched_count: Option<i32>,
    pub reason: SaveReason,
    pub update_stats_now: bool,
}

impl SetFileWatchedRequest {
    pub fn new(user_id: Uuid, file_id: Uuid, watched: bool) -> Self {
        Self {
            user_id,
            file_id,
            watched,
            watched_at: None,
            resume_position: None,
            watched_count: None,
            reason: SaveReason::UserInteraction,
            update_stats_now: true,
        }
    }

    pub fn at(mut self, watched_at: DateTime<Utc>) -> Self {
        self.watched_at = Some(watched_at);
        self
    }

    pub fn with_reason(mut self, reason: SaveReason) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_resume_position(mut self, position: TimeDelta) -> Self {
        self.resume_position = Some(position);
        self
    }

    pub fn with_watched_count(mut self, count: i32) -> Self {
        self.watched_count = Some(count);
        self
    }

    pub fn deferring_stats(mut self) -> Self {
        self.update_stats_now = false;
        self
    }
}

/// Request to set the watched state of every file of an episode
#[derive(Debug, Clone)]
pub struct SetEpisodeWatchedRequest {
    pub user_id: Uuid,
    pub episode_id: Uuid,
    pub watched: bool,
    pub watched_at: Option<DateTime<Utc>>,
    pub reason: SaveReason,
    pub update_stats_now: bool,
}

impl SetEpisodeWatchedRequest {
    pub fn new(user_id: Uuid, episode_id: Uuid, watched: bool) -> Self {
        Self {
            user_id,
            episode_id,
            watched,
            watched_at: None,
            reason: SaveReason::UserInteraction,
            update_stats_now: true,
        }
    }
}

pub struct UserDataService {
    repos: RepositorySet,
    stats: Arc<dyn StatsAggregator>,
    dispatcher: Arc<dyn SyncDispatcher>,
    event_bus: Arc<EventBus>,
    settings: SharedSettings,
    file_locks: KeyedLocks<Uuid>,
}

impl UserDataService {
    pub fn new(
        repos: RepositorySet,
        stats: Arc<dyn StatsAggregator>,
        dispatcher: Arc<dyn SyncDispatcher>,
        event_bus: Arc<EventBus>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            repos,
            stats,
            dispatcher,
            event_bus,
            settings,
            file_locks: KeyedLocks::new(),
        }
    }

    // ========================================================================
    // WATCHED STATE
    // ========================================================================

    /// Set the watched state of a file and propagate it to episodes,
    /// statistics and remote services.
    ///
    /// Returns the originating user's record as stored after the call.
    pub fn set_file_watched_state(&self, request: SetFileWatchedRequest) -> AppResult<FileUserData> {
        let settings = self.settings.read().clone();
        let user = self.require_user(request.user_id)?;
        let file = self.require_file(request.file_id)?;

        let now = Utc::now();
        let watched_at = request.watched_at.unwrap_or(now);
        let resume_position = request
            .resume_position
            .map(|position| file.clamp_resume_position(position));

        let fan_out = self.fan_out_users(&user)?;

        let existing = self.repos.user_data.get_file_user_data(user.id, file.id)?;
        let status_changed = watched_status_changed(existing.as_ref(), request.watched, watched_at);

        // Per-user file records
        let mut written = Vec::with_capacity(fan_out.len());
        for &user_id in &fan_out {
            let record = self.file_locks.with_lock(&file.id, || {
                let mut record = self
                    .repos
                    .user_data
                    .get_file_user_data(user_id, file.id)?
                    .unwrap_or_else(|| FileUserData::new(user_id, file.id));
                let previous_watched_at = record.watched_at;

                if request.watched {
                    record.mark_watched(watched_at);
                } else {
                    record.mark_unwatched();
                }
                if let Some(count) = request.watched_count {
                    record.set_watched_count(count);
                }

                match resume_position {
                    Some(position) => record.resume_position = position,
                    None if settings.playback.reset_resume_on_watched_change
                        && previous_watched_at != record.watched_at =>
                    {
                        record.resume_position = TimeDelta::zero();
                    }
                    None => record.resume_position = file.clamp_resume_position(record.resume_position),
                }

                record.touch(now);
                validate_file_user_data(&record, &file)?;
                self.repos.user_data.save_file_user_data(&record)?;
                Ok::<_, AppError>(record)
            })?;
            written.push(record);
        }

        // Episode aggregation
        let mut dirty_series = BTreeSet::new();
        let mut changed_episodes = Vec::new();

        for xref in self.repos.cross_references.episodes_for_file(file.id)? {
            let Some(episode) = self.repos.episodes.get_by_id(xref.episode_id)? else {
                log::debug!(
                    "Episode {} referenced by file {} is not known locally",
                    xref.episode_id,
                    file.id
                );
                continue;
            };

            let percentage = self.aggregate_watched_percentage(user.id, episode.id)?;
            let target = if request.watched && percentage > WATCHED_THRESHOLD {
                true
            } else if !request.watched && percentage < WATCHED_THRESHOLD {
                false
            } else {
                continue;
            };

            let mut changed_for_originator = false;
            for &user_id in &fan_out {
                let changed = self.apply_episode_state(user_id, &episode, target, watched_at, now)?;
                if changed && user_id == user.id {
                    changed_for_originator = true;
                }
            }

            if request.update_stats_now {
                if let Some(series_id) = self.local_series_id(&episode)? {
                    dirty_series.insert(series_id);
                }
            }
            if changed_for_originator {
                changed_episodes.push(episode);
            }
        }

        // Remote sync
        if settings.trakt.can_sync() && !request.reason.is_import_from(&ImportSource::Trakt) {
            for episode in &changed_episodes {
                self.dispatcher.enqueue(SyncJob::SendEpisodeWatchState {
                    user_id: user.id,
                    episode_id: episode.id,
                    remote_episode_id: episode.remote_episode_id,
                    action: if request.watched {
                        HistoryAction::HistoryAdd
                    } else {
                        HistoryAction::HistoryRemove
                    },
                    watched_at: request.watched.then_some(watched_at),
                });
            }
        }

        if status_changed
            && user.is_remote_shared_account()
            && !request.reason.is_import_from(&ImportSource::AniDb)
            && settings.anidb.allows(request.watched)
        {
            self.dispatcher.enqueue(SyncJob::UpdateMyListFileStatus {
                file_id: file.id,
                hash: file.hash.clone(),
                watched: request.watched,
                watched_at: request.watched.then_some(watched_at),
            });
        }

        log::debug!(
            "Saved file user data: file={} user={} watched={} changed={} reason={:?} fan_out={} episodes_changed={}",
            file.id,
            user.id,
            request.watched,
            status_changed,
            request.reason,
            fan_out.len(),
            changed_episodes.len()
        );

        for record in written {
            self.event_bus
                .emit(FileUserDataChanged::new(request.reason.clone(), record));
        }

        // Statistics, once per batch
        if request.update_stats_now && !dirty_series.is_empty() {
            self.recompute_stats(&dirty_series)?;
        }

        self.repos
            .user_data
            .get_file_user_data(user.id, file.id)?
            .ok_or_else(|| {
                AppError::InternalInconsistency(format!(
                    "File user data for user {} and file {} missing after save",
                    user.id, file.id
                ))
            })
    }

    /// Set the watched state of every local file of an episode.
    ///
    /// Returns false if the episode has no known files.
    pub fn set_episode_watched_state(&self, request: SetEpisodeWatchedRequest) -> AppResult<bool> {
        let user = self.require_user(request.user_id)?;
        let episode = self
            .repos
            .episodes
            .get_by_id(request.episode_id)?
            .ok_or_else(|| {
                AppError::invalid_argument(format!("Episode {} not found", request.episode_id))
            })?;

        let mut files = Vec::new();
        for xref in self.repos.cross_references.files_for_episode(episode.id)? {
            if let Some(file) = self.repos.files.get_by_id(xref.file_id)? {
                files.push(file);
            }
        }

        if files.is_empty() {
            log::debug!("Episode {} has no known files", episode.id);
            return Ok(false);
        }

        let watched_at = request.watched_at.unwrap_or_else(Utc::now);
        for file in &files {
            let file_request = SetFileWatchedRequest::new(user.id, file.id, request.watched)
                .at(watched_at)
                .with_resume_position(TimeDelta::zero())
                .with_reason(request.reason.clone())
                .deferring_stats();
            self.set_file_watched_state(file_request)?;
        }

        if request.update_stats_now {
            if let Some(series_id) = self.local_series_id(&episode)? {
                self.stats.recompute_series_stats(series_id, false, false)?;
                if let Some(top_group) = self.top_level_group_for_series(series_id)? {
                    self.stats.recompute_group_stats(top_group, false, false)?;
                }
            }
        }

        Ok(true)
    }

    // ========================================================================
    // PLAYBACK
    // ========================================================================

    /// Record playback progress. Past the auto-watch threshold the file is
    /// marked watched and its resume position reset.
    pub fn record_playback_progress(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        position: TimeDelta,
        reason: SaveReason,
    ) -> AppResult<FileUserData> {
        let threshold = self.settings.read().playback.auto_watch_threshold;
        let file = self.require_file(file_id)?;

        let past_threshold = file
            .progress_ratio(position)
            .map_or(false, |ratio| ratio > threshold);

        if past_threshold {
            let request = SetFileWatchedRequest::new(user_id, file_id, true)
                .with_resume_position(TimeDelta::zero())
                .with_reason(reason);
            let record = self.set_file_watched_state(request)?;
            return self.mark_played(record);
        }

        self.write_resume_position(user_id, &file, position, reason, true)
    }

    /// Store a resume position for the user without touching watched state.
    pub fn save_resume_position(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        position: TimeDelta,
    ) -> AppResult<FileUserData> {
        let file = self.require_file(file_id)?;
        self.write_resume_position(user_id, &file, position, SaveReason::None, false)
    }

    // ========================================================================
    // BACKFILL & QUERIES
    // ========================================================================

    /// Derive episode records for an episode that just became known locally,
    /// from the file records of its files. Existing or empty records are
    /// left alone. Returns the number of records created.
    pub fn backfill_episode_user_data(&self, episode_id: Uuid) -> AppResult<usize> {
        let episode = self
            .repos
            .episodes
            .get_by_id(episode_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("Episode {} not found", episode_id)))?;

        let mut per_user: BTreeMap<Uuid, EpisodeUserData> = BTreeMap::new();
        for xref in self.repos.cross_references.files_for_episode(episode.id)? {
            for record in self.repos.user_data.list_file_user_data_for_file(xref.file_id)? {
                let Some(watched_at) = record.watched_at else {
                    continue;
                };
                let entry = per_user.entry(record.user_id).or_insert_with(|| {
                    EpisodeUserData::new(record.user_id, episode.id, episode.series_id)
                });
                entry.watched_count += 1;
                if entry.watched_at.map_or(true, |current| watched_at > current) {
                    entry.watched_at = Some(watched_at);
                }
            }
        }

        let mut created = 0;
        for (user_id, record) in per_user {
            if self
                .repos
                .user_data
                .get_episode_user_data(user_id, episode.id)?
                .is_some()
            {
                continue;
            }
            self.repos.user_data.save_episode_user_data(&record)?;
            created += 1;
        }

        log::debug!("Backfilled {} episode records for {}", created, episode.id);
        Ok(created)
    }

    pub fn get_file_user_data(&self, user_id: Uuid, file_id: Uuid) -> AppResult<Option<FileUserData>> {
        self.repos.user_data.get_file_user_data(user_id, file_id)
    }

    pub fn get_episode_user_data(
        &self,
        user_id: Uuid,
        episode_id: Uuid,
    ) -> AppResult<Option<EpisodeUserData>> {
        self.repos.user_data.get_episode_user_data(user_id, episode_id)
    }

    pub fn list_file_user_data_for_user(&self, user_id: Uuid) -> AppResult<Vec<FileUserData>> {
        self.repos.user_data.list_file_user_data_for_user(user_id)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn require_user(&self, user_id: Uuid) -> AppResult<User> {
        self.repos
            .users
            .get_by_id(user_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("User {} not found", user_id)))
    }

    fn require_file(&self, file_id: Uuid) -> AppResult<File> {
        self.repos
            .files
            .get_by_id(file_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("File {} not found", file_id)))
    }

    /// Originating user first, then every other user on the shared account
    fn fan_out_users(&self, user: &User) -> AppResult<Vec<Uuid>> {
        let mut user_ids = vec![user.id];
        if user.is_remote_shared_account() {
            for other in self.repos.users.list_remote_shared_users()? {
                if other.id != user.id {
                    user_ids.push(other.id);
                }
            }
        }
        Ok(user_ids)
    }

    /// Sum of the coverage of the user's watched files for an episode.
    /// Zero or negative percentages count as 100.
    fn aggregate_watched_percentage(&self, user_id: Uuid, episode_id: Uuid) -> AppResult<i32> {
        let mut total = 0;
        for xref in self.repos.cross_references.files_for_episode(episode_id)? {
            let watched = self
                .repos
                .user_data
                .get_file_user_data(user_id, xref.file_id)?
                .map_or(false, |record| record.is_watched());
            if watched {
                total += xref.effective_percentage();
                if total > WATCHED_THRESHOLD {
                    break;
                }
            }
        }
        Ok(total)
    }

    /// Returns true if the stored record changed
    fn apply_episode_state(
        &self,
        user_id: Uuid,
        episode: &Episode,
        watched: bool,
        watched_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut record = self
            .repos
            .user_data
            .get_episode_user_data(user_id, episode.id)?
            .unwrap_or_else(|| EpisodeUserData::new(user_id, episode.id, episode.series_id));
        record.series_id = episode.series_id;

        if !record.apply(watched, watched_at) {
            return Ok(false);
        }

        record.last_updated_at = now;
        self.repos.user_data.save_episode_user_data(&record)?;
        self.event_bus.emit(EpisodeUserDataChanged::new(record));
        Ok(true)
    }

    /// The episode's series, if it is stored locally
    fn local_series_id(&self, episode: &Episode) -> AppResult<Option<Uuid>> {
        let Some(series_id) = episode.series_id else {
            return Ok(None);
        };
        if self.repos.series.get_by_id(series_id)?.is_none() {
            log::debug!(
                "Series {} of episode {} is not known locally",
                series_id,
                episode.id
            );
            return Ok(None);
        }
        Ok(Some(series_id))
    }

    fn top_level_group_for_series(&self, series_id: Uuid) -> AppResult<Option<Uuid>> {
        let Some(series) = self.repos.series.get_by_id(series_id)? else {
            return Ok(None);
        };
        let Some(group_id) = series.group_id else {
            return Ok(None);
        };
        Ok(self.repos.groups.top_level_group(group_id)?.map(|g| g.id))
    }

    /// Each dirty series once, then each distinct top-level group once
    fn recompute_stats(&self, dirty_series: &BTreeSet<Uuid>) -> AppResult<()> {
        let mut top_groups = BTreeSet::new();
        for &series_id in dirty_series {
            self.stats.recompute_series_stats(series_id, false, false)?;
            if let Some(group_id) = self.top_level_group_for_series(series_id)? {
                top_groups.insert(group_id);
            }
        }

        for group_id in top_groups {
            self.stats.recompute_group_stats(group_id, false, false)?;
        }
        Ok(())
    }

    fn write_resume_position(
        &self,
        user_id: Uuid,
        file: &File,
        position: TimeDelta,
        reason: SaveReason,
        played: bool,
    ) -> AppResult<FileUserData> {
        self.require_user(user_id)?;
        let position = file.clamp_resume_position(position);
        let now = Utc::now();

        let record = self.file_locks.with_lock(&file.id, || {
            let mut record = self
                .repos
                .user_data
                .get_file_user_data(user_id, file.id)?
                .unwrap_or_else(|| FileUserData::new(user_id, file.id));
            record.resume_position = position;
            if played {
                record.last_played_at = Some(now);
            }
            record.touch(now);
            self.repos.user_data.save_file_user_data(&record)?;
            Ok::<_, AppError>(record)
        })?;

        self.event_bus
            .emit(FileUserDataChanged::new(reason, record.clone()));
        Ok(record)
    }

    fn mark_played(&self, record: FileUserData) -> AppResult<FileUserData> {
        let file_id = record.file_id;
        self.file_locks.with_lock(&file_id, move || {
            let mut latest = self
                .repos
                .user_data
                .get_file_user_data(record.user_id, file_id)?
                .unwrap_or(record);
            latest.last_played_at = Some(Utc::now());
            self.repos.user_data.save_file_user_data(&latest)?;
            Ok::<_, AppError>(latest)
        })
    }
}

/// Compares a request with the originating user's stored record
fn watched_status_changed(
    existing: Option<&FileUserData>,
    watched: bool,
    watched_at: DateTime<Utc>,
) -> bool {
    let stored = existing.and_then(|record| record.watched_at);
    if watched {
        stored != Some(watched_at)
    } else {
        stored.is_some()
    }
}
