//! Poll repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Poll, PollOption, Vote, poll, poll_option, vote};
use pollbooth_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Number of options and votes attached to a poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCounts {
    /// Number of options.
    pub options: i64,
    /// Number of vote rows (a multiple-choice ballot counts once per option).
    pub votes: i64,
}

#[derive(Debug, FromQueryResult)]
struct PollIdCount {
    poll_id: String,
    count: i64,
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(id.to_string()))
    }

    /// Create a new poll.
    pub async fn create(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a poll. Options and votes go with it through the cascading
    /// foreign keys.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Poll::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get polls (paginated, newest first).
    pub async fn find_recent(
        &self,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<poll::Model>> {
        let mut query = Poll::find().order_by_desc(poll::Column::Id).limit(limit);

        if let Some(until) = until_id {
            query = query.filter(poll::Column::Id.lt(until));
        }

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count options and votes for each of the given polls.
    ///
    /// Polls with no options or votes are present in the map with zero counts.
    pub async fn count_for_polls(
        &self,
        poll_ids: &[String],
    ) -> AppResult<HashMap<String, PollCounts>> {
        let mut counts: HashMap<String, PollCounts> = poll_ids
            .iter()
            .map(|id| (id.clone(), PollCounts::default()))
            .collect();

        if poll_ids.is_empty() {
            return Ok(counts);
        }

        let option_counts = PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.to_vec()))
            .select_only()
            .column(poll_option::Column::PollId)
            .column_as(poll_option::Column::Id.count(), "count")
            .group_by(poll_option::Column::PollId)
            .into_model::<PollIdCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let vote_counts = Vote::find()
            .filter(vote::Column::PollId.is_in(poll_ids.to_vec()))
            .select_only()
            .column(vote::Column::PollId)
            .column_as(vote::Column::Id.count(), "count")
            .group_by(vote::Column::PollId)
            .into_model::<PollIdCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for row in option_counts {
            counts.entry(row.poll_id).or_default().options = row.count;
        }
        for row in vote_counts {
            counts.entry(row.poll_id).or_default().votes = row.count;
        }

        Ok(counts)
    }
}
