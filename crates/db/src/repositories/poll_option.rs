//! Poll option repository.
//!
//! These three calls are everything option reconciliation needs from storage:
//! list the current options, delete stale ones by id, insert new texts.

use std::sync::Arc;

use chrono::Utc;
use pollbooth_common::{AppError, AppResult, IdGenerator};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::{PollOption, poll_option};

/// Poll option repository for database operations.
#[derive(Clone)]
pub struct PollOptionRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl PollOptionRepository {
    /// Create a new poll option repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// List the options of a poll in creation order.
    pub async fn list_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::CreatedAt)
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete options by id. Votes cast for them are removed by the cascade.
    ///
    /// Returns the number of deleted rows; an empty id list issues no query.
    pub async fn delete_by_ids(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = PollOption::delete_many()
            .filter(poll_option::Column::Id.is_in(ids.to_vec()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Insert one option per text, in the given order.
    ///
    /// All rows share one timestamp and get monotonic ids, so
    /// [`list_by_poll`](Self::list_by_poll) returns them in submission order.
    /// An empty text list issues no query.
    pub async fn insert_texts(&self, poll_id: &str, texts: &[String]) -> AppResult<()> {
        if texts.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let ids = self.id_gen.generate_sequence(texts.len());
        let models = ids
            .into_iter()
            .zip(texts)
            .map(|(id, text)| poll_option::ActiveModel {
                id: Set(id),
                poll_id: Set(poll_id.to_string()),
                text: Set(text.clone()),
                created_at: Set(now.into()),
            });

        PollOption::insert_many(models)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
