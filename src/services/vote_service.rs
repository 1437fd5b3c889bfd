// src/services/vote_service.rs
//
// Vote Service - Ratings on series and episodes
//
// Same shape as the watched-state engine: validate, write locally, notify
// listeners, then schedule exactly one remote job.
//
// Stored values use a 0-1000 fixed-point scale; remote jobs and events
// carry the original decimal.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    validate_vote_value, SeriesVoteType, User, Vote, VoteKind, DELETE_VOTE,
};
use crate::error::{AppError, AppResult};
use crate::events::{EpisodeVoted, EventBus, SeriesVoted};
use crate::repositories::RepositorySet;
use crate::services::sync_dispatcher::{SyncDispatcher, SyncJob};

pub struct VoteService {
    repos: RepositorySet,
    dispatcher: Arc<dyn SyncDispatcher>,
    event_bus: Arc<EventBus>,
}

impl VoteService {
    pub fn new(
        repos: RepositorySet,
        dispatcher: Arc<dyn SyncDispatcher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repos,
            dispatcher,
            event_bus,
        }
    }

    /// Vote on a series. `value` is a rating in [0, 10], or -1 to delete.
    /// Without a user the first admin votes.
    pub fn vote_on_series(
        &self,
        series_id: Uuid,
        value: f64,
        vote_type: SeriesVoteType,
        user_id: Option<Uuid>,
    ) -> AppResult<()> {
        validate_vote_value(value).map_err(|e| AppError::InvalidArgument(e.to_string()))?;

        let series = self
            .repos
            .series
            .get_by_id(series_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("Series {} not found", series_id)))?;
        let remote_anime_id = series.remote_anime_id.ok_or_else(|| {
            AppError::invalid_argument(format!("Series {} has no remote anime id", series_id))
        })?;
        let user = self.resolve_user(user_id)?;

        if value == DELETE_VOTE {
            // Temporary votes take precedence over permanent ones
            let existing = match self
                .repos
                .votes
                .get_by_entity_and_kind(remote_anime_id, VoteKind::AnimeTemporary)?
            {
                Some(vote) => Some(vote),
                None => self
                    .repos
                    .votes
                    .get_by_entity_and_kind(remote_anime_id, VoteKind::Anime)?,
            };

            let Some(vote) = existing else {
                log::debug!("No vote to delete for series {}", series.id);
                return Ok(());
            };

            let vote_type = match vote.kind {
                VoteKind::AnimeTemporary => SeriesVoteType::Temporary,
                _ => SeriesVoteType::Permanent,
            };

            self.repos.votes.delete(vote.id)?;
            self.event_bus.emit(SeriesVoted::new(
                series.id,
                remote_anime_id,
                user.id,
                0.0,
                vote_type,
            ));
            self.dispatcher.enqueue(SyncJob::VoteSeries {
                remote_anime_id,
                value: DELETE_VOTE,
                vote_type,
            });
            return Ok(());
        }

        let kind = VoteKind::from(vote_type);
        let mut vote = self
            .repos
            .votes
            .get_by_entity_and_kind(remote_anime_id, kind)?
            .unwrap_or_else(|| Vote::new(remote_anime_id, kind, value));
        vote.value = Vote::scale(value);
        self.repos.votes.save(&vote)?;

        self.event_bus.emit(SeriesVoted::new(
            series.id,
            remote_anime_id,
            user.id,
            value,
            vote_type,
        ));
        self.dispatcher.enqueue(SyncJob::VoteSeries {
            remote_anime_id,
            value,
            vote_type,
        });

        log::debug!("Series {} voted {} ({:?})", series.id, value, vote_type);
        Ok(())
    }

    /// Vote on an episode. `value` is a rating in [0, 10], or -1 to delete.
    pub fn vote_on_episode(&self, episode_id: Uuid, value: f64, user_id: Option<Uuid>) -> AppResult<()> {
        validate_vote_value(value).map_err(|e| AppError::InvalidArgument(e.to_string()))?;

        let episode = self
            .repos
            .episodes
            .get_by_id(episode_id)?
            .ok_or_else(|| AppError::invalid_argument(format!("Episode {} not found", episode_id)))?;
        let remote_episode_id = episode.remote_episode_id.ok_or_else(|| {
            AppError::invalid_argument(format!("Episode {} has no remote episode id", episode_id))
        })?;
        let user = self.resolve_user(user_id)?;

        let existing = self
            .repos
            .votes
            .get_by_entity_and_kind(remote_episode_id, VoteKind::Episode)?;

        if value == DELETE_VOTE {
            let Some(vote) = existing else {
                return Ok(());
            };
            self.repos.votes.delete(vote.id)?;
            self.event_bus
                .emit(EpisodeVoted::new(episode.id, remote_episode_id, user.id, 0.0));
            self.dispatcher.enqueue(SyncJob::VoteEpisode {
                remote_episode_id,
                value: DELETE_VOTE,
            });
            return Ok(());
        }

        let mut vote =
            existing.unwrap_or_else(|| Vote::new(remote_episode_id, VoteKind::Episode, value));
        vote.value = Vote::scale(value);
        self.repos.votes.save(&vote)?;

        self.event_bus
            .emit(EpisodeVoted::new(episode.id, remote_episode_id, user.id, value));
        self.dispatcher.enqueue(SyncJob::VoteEpisode {
            remote_episode_id,
            value,
        });
        Ok(())
    }

    fn resolve_user(&self, user_id: Option<Uuid>) -> AppResult<User> {
        match user_id {
            Some(id) => self
                .repos
                .users
                .get_by_id(id)?
                .ok_or_else(|| AppError::invalid_argument(format!("User {} not found", id))),
            None => self
                .repos
                .users
                .first_admin()?
                .ok_or_else(|| AppError::invalid_argument("No admin user to vote as")),
        }
    }
}
