// src/services/statistics_service.rs
//
// Stats Aggregator
//
// Recomputes per-user series and group counters from episode and file
// records. Always a full recomputation; rows are rewritten only when a
// counter actually differs, so repeated calls are idempotent.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Episode, Group, GroupUserStats, SeriesUserStats};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StatisticsScope, StatisticsUpdated};
use crate::repositories::RepositorySet;

/// Recalculation entry points used by the watched-state engine
#[cfg_attr(test, mockall::automock)]
pub trait StatsAggregator: Send + Sync {
    /// Recompute one series for every user; optionally continue with its
    /// group, and with `cascade_to_top_level` up to the top-level group.
    fn recompute_series_stats(
        &self,
        series_id: Uuid,
        recurse_to_group: bool,
        cascade_to_top_level: bool,
    ) -> AppResult<()>;

    /// Recompute a group and its descendant groups for every user;
    /// optionally continue with the parent, or every ancestor.
    fn recompute_group_stats(
        &self,
        group_id: Uuid,
        recurse_up: bool,
        cascade_to_top_level: bool,
    ) -> AppResult<()>;
}

pub struct StatisticsService {
    repos: RepositorySet,
    event_bus: Arc<EventBus>,
}

impl StatisticsService {
    pub fn new(repos: RepositorySet, event_bus: Arc<EventBus>) -> Self {
        Self { repos, event_bus }
    }

    pub fn get_series_stats(
        &self,
        user_id: Uuid,
        series_id: Uuid,
    ) -> AppResult<Option<SeriesUserStats>> {
        self.repos.statistics.get_series_stats(user_id, series_id)
    }

    pub fn get_group_stats(&self, user_id: Uuid, group_id: Uuid) -> AppResult<Option<GroupUserStats>> {
        self.repos.statistics.get_group_stats(user_id, group_id)
    }

    /// Latest timestamp at which the user finished the episode, looking at
    /// the episode record and every contributing file record, with the
    /// watch count to report for it. The episode record's count wins; without
    /// one, the most recently watched file record's count is used.
    fn episode_watched_at(&self, user_id: Uuid, episode: &Episode) -> AppResult<(Option<DateTime<Utc>>, u32)> {
        let record = self.repos.user_data.get_episode_user_data(user_id, episode.id)?;
        let mut watched_at = record.as_ref().and_then(|r| r.watched_at);
        let mut file_watch: Option<(DateTime<Utc>, u32)> = None;

        for xref in self.repos.cross_references.files_for_episode(episode.id)? {
            let Some(file_record) = self.repos.user_data.get_file_user_data(user_id, xref.file_id)? else {
                continue;
            };
            let Some(at) = file_record.watched_at else {
                continue;
            };
            watched_at = latest(watched_at, Some(at));
            if file_watch.map_or(true, |(seen, _)| at > seen) {
                file_watch = Some((at, file_record.watched_count));
            }
        }

        let watched_count = match (&record, file_watch) {
            (Some(r), _) => r.watched_count,
            (None, Some((_, count))) => count,
            (None, None) => 0,
        };

        Ok((watched_at, watched_count))
    }

    fn compute_series_stats(
        &self,
        user_id: Uuid,
        series_id: Uuid,
        episodes: &[Episode],
    ) -> AppResult<SeriesUserStats> {
        let mut stats = SeriesUserStats::empty(user_id, series_id);

        for episode in episodes {
            let (watched_at, watched_count) = self.episode_watched_at(user_id, episode)?;
            match watched_at {
                Some(at) => {
                    stats.watched_episode_count += 1;
                    stats.watched_count += watched_count;
                    stats.last_watched_at = latest(stats.last_watched_at, Some(at));
                }
                None if episode.is_hidden => stats.hidden_unwatched_episode_count += 1,
                None => stats.unwatched_episode_count += 1,
            }
        }

        Ok(stats)
    }

    /// Totals of the group's own series plus its (already stored) child groups
    fn compute_group_stats(&self, user_id: Uuid, group: &Group) -> AppResult<GroupUserStats> {
        let mut totals = GroupUserStats::empty(user_id, group.id);

        for series in self.repos.series.list_by_group(group.id)? {
            if let Some(stats) = self.repos.statistics.get_series_stats(user_id, series.id)? {
                totals.accumulate(&stats);
            }
        }

        for child in self.repos.groups.list_children(group.id)? {
            if let Some(child_stats) = self.repos.statistics.get_group_stats(user_id, child.id)? {
                totals.accumulate_group(&child_stats);
            }
        }

        Ok(totals)
    }

    fn store_series_stats(&self, stats: SeriesUserStats) -> AppResult<()> {
        let existing = self
            .repos
            .statistics
            .get_series_stats(stats.user_id, stats.series_id)?;

        if existing.map_or(false, |e| e.same_counters(&stats)) {
            return Ok(());
        }

        self.repos.statistics.save_series_stats(&stats)?;
        self.event_bus.emit(StatisticsUpdated::new(
            stats.user_id,
            StatisticsScope::Series(stats.series_id),
        ));
        Ok(())
    }

    fn store_group_stats(&self, stats: GroupUserStats) -> AppResult<()> {
        let existing = self
            .repos
            .statistics
            .get_group_stats(stats.user_id, stats.group_id)?;

        let unchanged = existing.map_or(false, |e| {
            e.unwatched_episode_count == stats.unwatched_episode_count
                && e.watched_episode_count == stats.watched_episode_count
                && e.watched_count == stats.watched_count
                && e.last_watched_at == stats.last_watched_at
        });
        if unchanged {
            return Ok(());
        }

        self.repos.statistics.save_group_stats(&stats)?;
        self.event_bus.emit(StatisticsUpdated::new(
            stats.user_id,
            StatisticsScope::Group(stats.group_id),
        ));
        Ok(())
    }

    fn recompute_single_group(&self, group: &Group, user_ids: &[Uuid]) -> AppResult<()> {
        for &user_id in user_ids {
            let stats = self.compute_group_stats(user_id, group)?;
            self.store_group_stats(stats)?;
        }
        Ok(())
    }

    /// Children first so each parent sums fresh child totals
    fn recompute_group_tree(
        &self,
        group: &Group,
        user_ids: &[Uuid],
        visited: &mut HashSet<Uuid>,
    ) -> AppResult<()> {
        if !visited.insert(group.id) {
            return Err(AppError::InternalInconsistency(format!(
                "Group hierarchy cycle at {}",
                group.id
            )));
        }

        for child in self.repos.groups.list_children(group.id)? {
            self.recompute_group_tree(&child, user_ids, visited)?;
        }

        self.recompute_single_group(group, user_ids)
    }

    fn recompute_ancestors(&self, group: &Group, user_ids: &[Uuid], all_the_way: bool) -> AppResult<()> {
        let mut visited = HashSet::from([group.id]);
        let mut parent_id = group.parent_group_id;

        while let Some(id) = parent_id {
            if !visited.insert(id) {
                return Err(AppError::InternalInconsistency(format!(
                    "Group hierarchy cycle at {}",
                    id
                )));
            }
            let Some(parent) = self.repos.groups.get_by_id(id)? else {
                break;
            };
            self.recompute_single_group(&parent, user_ids)?;
            if !all_the_way {
                break;
            }
            parent_id = parent.parent_group_id;
        }

        Ok(())
    }

    fn user_ids(&self) -> AppResult<Vec<Uuid>> {
        Ok(self.repos.users.list_all()?.into_iter().map(|u| u.id).collect())
    }

    fn require_group(&self, group_id: Uuid) -> AppResult<Group> {
        self.repos
            .groups
            .get_by_id(group_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("Group {} not found", group_id)))
    }
}

impl StatsAggregator for StatisticsService {
    fn recompute_series_stats(
        &self,
        series_id: Uuid,
        recurse_to_group: bool,
        cascade_to_top_level: bool,
    ) -> AppResult<()> {
        let series = self
            .repos
            .series
            .get_by_id(series_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("Series {} not found", series_id)))?;

        let episodes = self.repos.episodes.list_by_series(series.id)?;
        for user_id in self.user_ids()? {
            let stats = self.compute_series_stats(user_id, series.id, &episodes)?;
            self.store_series_stats(stats)?;
        }

        log::debug!(
            "Recomputed series stats for {} ({} episodes)",
            series.id,
            episodes.len()
        );

        if recurse_to_group {
            if let Some(group_id) = series.group_id {
                let group = self.require_group(group_id)?;
                let user_ids = self.user_ids()?;
                self.recompute_single_group(&group, &user_ids)?;
                if cascade_to_top_level {
                    self.recompute_ancestors(&group, &user_ids, true)?;
                }
            }
        }

        Ok(())
    }

    fn recompute_group_stats(
        &self,
        group_id: Uuid,
        recurse_up: bool,
        cascade_to_top_level: bool,
    ) -> AppResult<()> {
        let group = self.require_group(group_id)?;
        let user_ids = self.user_ids()?;

        self.recompute_group_tree(&group, &user_ids, &mut HashSet::new())?;
        log::debug!("Recomputed group stats for {}", group.id);

        if recurse_up {
            self.recompute_ancestors(&group, &user_ids, cascade_to_top_level)?;
        }

        Ok(())
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
