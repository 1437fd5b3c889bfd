// src/services/test_fixtures.rs
//
// Shared setup for service tests: an on-disk database with a small
// library and helpers to build services around it.

use chrono::TimeDelta;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::config::{Settings, SharedSettings};
use crate::db::test_support::test_pool;
use crate::domain::{CrossReference, Episode, File, Group, Series, User};
use crate::events::EventBus;
use crate::repositories::RepositorySet;
use crate::services::statistics_service::{MockStatsAggregator, StatsAggregator};
use crate::services::sync_dispatcher::{MockSyncDispatcher, SyncDispatcher, SyncJob};
use crate::services::{StatisticsService, UserDataService, VoteService};

pub struct Fixture {
    _dir: TempDir,
    pub repos: RepositorySet,
    pub bus: Arc<EventBus>,
    pub settings: SharedSettings,
    next_remote_id: Mutex<i64>,
}

impl Fixture {
    pub fn new() -> Self {
        let (dir, pool) = test_pool();
        Self {
            _dir: dir,
            repos: RepositorySet::sqlite(pool),
            bus: Arc::new(EventBus::new()),
            settings: Settings::default().shared(),
            next_remote_id: Mutex::new(1000),
        }
    }

    fn remote_id(&self) -> i64 {
        let mut next = self.next_remote_id.lock();
        *next += 1;
        *next
    }

    pub fn user(&self, name: &str) -> User {
        let user = User::new(name);
        self.repos.users.save(&user).unwrap();
        user
    }

    pub fn shared_user(&self, name: &str) -> User {
        let user = User::new(name).shared_remote_account();
        self.repos.users.save(&user).unwrap();
        user
    }

    pub fn admin(&self, name: &str) -> User {
        let user = User::new(name).admin();
        self.repos.users.save(&user).unwrap();
        user
    }

    /// A file of the given length with a content hash
    pub fn file(&self, minutes: i64) -> File {
        let file = File::new(Some(TimeDelta::minutes(minutes)))
            .with_hash(format!("hash-{}", self.remote_id()));
        self.repos.files.save(&file).unwrap();
        file
    }

    pub fn group(&self, parent: Option<Uuid>) -> Group {
        let group = Group::new(format!("group-{}", self.remote_id()), parent);
        self.repos.groups.save(&group).unwrap();
        group
    }

    pub fn series(&self, group: Option<Uuid>) -> Series {
        let series = Series::new(format!("series-{}", self.remote_id()), group)
            .with_remote_id(self.remote_id());
        self.repos.series.save(&series).unwrap();
        series
    }

    pub fn episode(&self, series: Option<Uuid>) -> Episode {
        let episode = Episode::new(series).with_remote_id(self.remote_id());
        self.repos.episodes.save(&episode).unwrap();
        episode
    }

    pub fn link(&self, file: &File, episode_id: Uuid, percentage: i32) {
        self.repos
            .cross_references
            .save(&CrossReference::new(file.id, episode_id, percentage))
            .unwrap();
    }

    pub fn enable_trakt(&self) {
        let mut settings = self.settings.write();
        settings.trakt.enabled = true;
        settings.trakt.auth_token = "token".to_string();
    }

    pub fn statistics(&self) -> Arc<StatisticsService> {
        Arc::new(StatisticsService::new(self.repos.clone(), Arc::clone(&self.bus)))
    }

    pub fn engine(
        &self,
        stats: Arc<dyn StatsAggregator>,
        dispatcher: Arc<dyn SyncDispatcher>,
    ) -> UserDataService {
        UserDataService::new(
            self.repos.clone(),
            stats,
            dispatcher,
            Arc::clone(&self.bus),
            Arc::clone(&self.settings),
        )
    }

    pub fn votes(&self, dispatcher: Arc<dyn SyncDispatcher>) -> VoteService {
        VoteService::new(self.repos.clone(), dispatcher, Arc::clone(&self.bus))
    }
}

/// Dispatcher mock that records every enqueued job
pub fn recording_dispatcher() -> (Arc<MockSyncDispatcher>, Arc<Mutex<Vec<SyncJob>>>) {
    let jobs = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&jobs);
    let mut mock = MockSyncDispatcher::new();
    mock.expect_enqueue().returning(move |job| sink.lock().push(job));
    (Arc::new(mock), jobs)
}

/// Stats mock accepting any number of calls
pub fn permissive_stats() -> Arc<MockStatsAggregator> {
    let mut mock = MockStatsAggregator::new();
    mock.expect_recompute_series_stats()
        .returning(|_, _, _| Ok(()));
    mock.expect_recompute_group_stats()
        .returning(|_, _, _| Ok(()));
    Arc::new(mock)
}

/// Stats mock that fails the test on any call
pub fn forbidden_stats() -> Arc<MockStatsAggregator> {
    let mut mock = MockStatsAggregator::new();
    mock.expect_recompute_series_stats().times(0);
    mock.expect_recompute_group_stats().times(0);
    Arc::new(mock)
}
