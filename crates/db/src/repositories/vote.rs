//! Vote repository.

use std::sync::Arc;

use chrono::Utc;
use pollbooth_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::{Vote, vote};

/// Number of votes cast for one option.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct OptionVoteCount {
    /// Option the votes were cast for.
    pub option_id: String,
    /// Number of votes.
    pub count: i64,
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Check if a user has voted on a poll.
    pub async fn has_voted(&self, poll_id: &str, voter_id: &str) -> AppResult<bool> {
        let count = Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .filter(vote::Column::VoterId.eq(voter_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Record one vote row per selected option.
    pub async fn create_many(
        &self,
        poll_id: &str,
        voter_id: &str,
        option_ids: &[String],
    ) -> AppResult<()> {
        if option_ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let models = option_ids.iter().map(|option_id| vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll_id.to_string()),
            option_id: Set(option_id.clone()),
            voter_id: Set(voter_id.to_string()),
            created_at: Set(now.into()),
        });

        Vote::insert_many(models)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Get all votes on a poll, oldest first.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .order_by_asc(vote::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the votes a user cast on a poll.
    pub async fn find_by_poll_and_voter(
        &self,
        poll_id: &str,
        voter_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .filter(vote::Column::VoterId.eq(voter_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count votes per option. Options without votes are absent.
    pub async fn count_by_option(&self, poll_id: &str) -> AppResult<Vec<OptionVoteCount>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .select_only()
            .column(vote::Column::OptionId)
            .column_as(vote::Column::Id.count(), "count")
            .group_by(vote::Column::OptionId)
            .into_model::<OptionVoteCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count distinct voters on a poll.
    pub async fn count_voters(&self, poll_id: &str) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .select_only()
            .column(vote::Column::VoterId)
            .distinct()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
