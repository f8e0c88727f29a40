//! Poll service.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pollbooth_common::{AppError, AppResult, IdGenerator, config::PollConfig};
use pollbooth_db::{
    entities::{poll, poll_option},
    repositories::{PollOptionRepository, PollRepository, VoteRepository},
};
use sea_orm::Set;
use tracing::{debug, info};
use validator::Validate;

use crate::reconcile::{OptionDiff, reconcile};

/// Upper bound for a single page of the poll listing.
const MAX_LIST_LIMIT: u64 = 100;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: VoteRepository,
    limits: PollConfig,
    id_gen: IdGenerator,
}

/// Input for creating or editing a poll.
///
/// An edit replaces every field, the option list included.
#[derive(Debug, Clone, Validate)]
pub struct PollInput {
    #[validate(length(min = 3, max = 200, message = "Title must be 3 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(length(min = 2, message = "A poll needs at least 2 options"))]
    pub options: Vec<String>,

    pub is_multiple_choice: bool,
    pub is_anonymous: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PollInput {
    /// Trim the title, the description and every option text.
    ///
    /// A description that is blank after trimming is dropped.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            options: self
                .options
                .iter()
                .map(|o| o.trim().to_string())
                .collect(),
            ..self
        }
    }

    /// Check the rules that depend on configuration or on the current time.
    ///
    /// Expects a [`normalized`](Self::normalized) input.
    pub fn check_limits(&self, limits: &PollConfig) -> AppResult<()> {
        if self.options.len() > limits.max_options {
            return Err(AppError::Validation(format!(
                "A poll cannot have more than {} options",
                limits.max_options
            )));
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if option.is_empty() {
                return Err(AppError::Validation(
                    "Poll options cannot be empty".to_string(),
                ));
            }
            if option.chars().count() > limits.max_option_length {
                return Err(AppError::Validation(format!(
                    "Poll option is too long (max {} chars)",
                    limits.max_option_length
                )));
            }
            if !seen.insert(option.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate poll option: {option}"
                )));
            }
        }

        if let Some(expires_at) = self.expires_at
            && expires_at <= Utc::now()
        {
            return Err(AppError::Validation(
                "Expiration must be in the future".to_string(),
            ));
        }

        Ok(())
    }
}

/// A poll and its options in creation order.
#[derive(Debug, Clone)]
pub struct PollWithOptions {
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
}

/// Result of an edit: the stored poll and the option changes applied to it.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    pub poll: PollWithOptions,
    pub diff: OptionDiff,
}

/// Tally for one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionResult {
    pub id: String,
    pub text: String,
    pub votes: i64,
    /// Who voted for this option; `None` on anonymous polls.
    pub voter_ids: Option<Vec<String>>,
}

/// Poll results as seen by one viewer.
#[derive(Debug, Clone)]
pub struct PollResults {
    pub poll: poll::Model,
    pub options: Vec<OptionResult>,
    /// Vote rows across all options.
    pub total_votes: i64,
    /// Distinct users who voted.
    pub total_voters: u64,
    /// Options the viewer picked; empty for guests and non-voters.
    pub user_votes: Vec<String>,
    pub is_expired: bool,
}

impl PollResults {
    /// Whether the viewer has voted.
    #[must_use]
    pub fn has_voted(&self) -> bool {
        !self.user_votes.is_empty()
    }
}

/// Listing entry.
#[derive(Debug, Clone)]
pub struct PollSummary {
    pub poll: poll::Model,
    pub options_count: i64,
    pub votes_count: i64,
}

fn is_expired(poll: &poll::Model) -> bool {
    expired_at(poll, Utc::now())
}

/// A poll closes at `expires_at` itself, matching the creation check.
fn expired_at(poll: &poll::Model, now: DateTime<Utc>) -> bool {
    poll.expires_at.as_ref().is_some_and(|exp| *exp <= now)
}

fn ensure_owner(poll: &poll::Model, user_id: &str) -> AppResult<()> {
    if poll.created_by == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the creator can modify this poll".to_string(),
        ))
    }
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: VoteRepository,
        limits: PollConfig,
    ) -> Self {
        Self {
            poll_repo,
            option_repo,
            vote_repo,
            limits,
            id_gen: IdGenerator::new(),
        }
    }

    fn prepare(&self, input: PollInput) -> AppResult<PollInput> {
        let input = input.normalized();
        input.validate()?;
        input.check_limits(&self.limits)?;
        Ok(input)
    }

    /// Delete stale options, then insert new ones.
    ///
    /// A failing delete aborts before anything is inserted. The two steps are
    /// not atomic: a failing insert leaves the deletions in place.
    async fn apply_diff(&self, poll_id: &str, diff: &OptionDiff) -> AppResult<()> {
        if !diff.to_delete.is_empty() {
            self.option_repo.delete_by_ids(&diff.to_delete).await?;
        }
        if !diff.to_insert.is_empty() {
            self.option_repo
                .insert_texts(poll_id, &diff.to_insert)
                .await?;
        }
        Ok(())
    }

    /// Create a poll owned by `user_id`.
    pub async fn create_poll(&self, user_id: &str, input: PollInput) -> AppResult<PollWithOptions> {
        let input = self.prepare(input)?;

        let model = poll::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            description: Set(input.description),
            created_by: Set(user_id.to_string()),
            is_multiple_choice: Set(input.is_multiple_choice),
            is_anonymous: Set(input.is_anonymous),
            expires_at: Set(input.expires_at.map(Into::into)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let poll = self.poll_repo.create(model).await?;

        let diff = reconcile(std::iter::empty(), &input.options);
        self.apply_diff(&poll.id, &diff).await?;
        let options = self.option_repo.list_by_poll(&poll.id).await?;

        info!(poll_id = %poll.id, options = options.len(), "Poll created");

        Ok(PollWithOptions { poll, options })
    }

    /// Edit a poll.
    ///
    /// Options whose text is still present keep their id and votes; options
    /// whose text was removed are deleted together with their votes.
    pub async fn update_poll(
        &self,
        poll_id: &str,
        user_id: &str,
        input: PollInput,
    ) -> AppResult<PollUpdate> {
        let input = self.prepare(input)?;

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_owner(&poll, user_id)?;

        let mut active: poll::ActiveModel = poll.into();
        active.title = Set(input.title);
        active.description = Set(input.description);
        active.is_multiple_choice = Set(input.is_multiple_choice);
        active.is_anonymous = Set(input.is_anonymous);
        active.expires_at = Set(input.expires_at.map(Into::into));
        active.updated_at = Set(Some(Utc::now().into()));
        let poll = self.poll_repo.update(active).await?;

        let existing = self.option_repo.list_by_poll(poll_id).await?;
        let diff = reconcile(
            existing.iter().map(|o| (o.id.as_str(), o.text.as_str())),
            &input.options,
        );
        self.apply_diff(poll_id, &diff).await?;

        info!(
            poll_id,
            deleted = diff.to_delete.len(),
            inserted = diff.to_insert.len(),
            "Poll options reconciled"
        );

        let options = if diff.is_empty() {
            existing
        } else {
            self.option_repo.list_by_poll(poll_id).await?
        };

        Ok(PollUpdate {
            poll: PollWithOptions { poll, options },
            diff,
        })
    }

    /// Get a poll with its options.
    pub async fn get_poll(&self, poll_id: &str) -> AppResult<PollWithOptions> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let options = self.option_repo.list_by_poll(poll_id).await?;
        Ok(PollWithOptions { poll, options })
    }

    /// Tally a poll for `viewer` (`None` for guests).
    pub async fn get_poll_results(
        &self,
        poll_id: &str,
        viewer: Option<&str>,
    ) -> AppResult<PollResults> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let options = self.option_repo.list_by_poll(poll_id).await?;

        let counts: HashMap<String, i64> = self
            .vote_repo
            .count_by_option(poll_id)
            .await?
            .into_iter()
            .map(|c| (c.option_id, c.count))
            .collect();
        let total_voters = self.vote_repo.count_voters(poll_id).await?;

        let user_votes = match viewer {
            Some(uid) => self
                .vote_repo
                .find_by_poll_and_voter(poll_id, uid)
                .await?
                .into_iter()
                .map(|v| v.option_id)
                .collect(),
            None => vec![],
        };

        let mut voters_by_option = if poll.is_anonymous {
            None
        } else {
            let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
            for vote in self.vote_repo.find_by_poll(poll_id).await? {
                grouped.entry(vote.option_id).or_default().push(vote.voter_id);
            }
            Some(grouped)
        };

        let options: Vec<OptionResult> = options
            .into_iter()
            .map(|o| OptionResult {
                votes: counts.get(&o.id).copied().unwrap_or(0),
                voter_ids: voters_by_option
                    .as_mut()
                    .map(|m| m.remove(&o.id).unwrap_or_default()),
                id: o.id,
                text: o.text,
            })
            .collect();
        let total_votes = options.iter().map(|o| o.votes).sum();
        let is_expired = is_expired(&poll);

        Ok(PollResults {
            poll,
            options,
            total_votes,
            total_voters,
            user_votes,
            is_expired,
        })
    }

    /// List polls, newest first.
    pub async fn list_polls(
        &self,
        limit: Option<u64>,
        until_id: Option<&str>,
    ) -> AppResult<Vec<PollSummary>> {
        let limit = limit
            .unwrap_or(self.limits.default_list_limit)
            .clamp(1, MAX_LIST_LIMIT);

        let polls = self.poll_repo.find_recent(limit, until_id).await?;
        let ids: Vec<String> = polls.iter().map(|p| p.id.clone()).collect();
        let counts = self.poll_repo.count_for_polls(&ids).await?;

        Ok(polls
            .into_iter()
            .map(|poll| {
                let c = counts.get(&poll.id).copied().unwrap_or_default();
                PollSummary {
                    poll,
                    options_count: c.options,
                    votes_count: c.votes,
                }
            })
            .collect())
    }

    /// Delete a poll together with its options and votes.
    pub async fn delete_poll(&self, poll_id: &str, user_id: &str) -> AppResult<()> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_owner(&poll, user_id)?;

        self.poll_repo.delete(poll_id).await?;
        info!(poll_id, "Poll deleted");
        Ok(())
    }

    /// Cast a ballot. Each user votes once per poll; on multiple-choice polls
    /// that one ballot may name several options.
    pub async fn submit_vote(
        &self,
        poll_id: &str,
        user_id: &str,
        option_ids: &[String],
    ) -> AppResult<()> {
        if option_ids.is_empty() {
            return Err(AppError::Validation(
                "Select at least one option".to_string(),
            ));
        }
        let unique: HashSet<&str> = option_ids.iter().map(String::as_str).collect();
        if unique.len() != option_ids.len() {
            return Err(AppError::Validation(
                "The same option was selected twice".to_string(),
            ));
        }

        let poll = self.poll_repo.get_by_id(poll_id).await?;

        if is_expired(&poll) {
            return Err(AppError::BadRequest("Poll has expired".to_string()));
        }
        if !poll.is_multiple_choice && option_ids.len() > 1 {
            return Err(AppError::Validation(
                "This poll accepts a single choice".to_string(),
            ));
        }

        let options = self.option_repo.list_by_poll(poll_id).await?;
        let valid: HashSet<&str> = options.iter().map(|o| o.id.as_str()).collect();
        if let Some(bad) = option_ids.iter().find(|id| !valid.contains(id.as_str())) {
            return Err(AppError::BadRequest(format!(
                "Option {bad} does not belong to this poll"
            )));
        }

        if self.vote_repo.has_voted(poll_id, user_id).await? {
            return Err(AppError::Conflict(
                "You have already voted on this poll".to_string(),
            ));
        }

        self.vote_repo
            .create_many(poll_id, user_id, option_ids)
            .await?;
        debug!(poll_id, user_id, choices = option_ids.len(), "Vote recorded");
        Ok(())
    }

    /// Check whether a user has voted on a poll.
    pub async fn has_user_voted(&self, poll_id: &str, user_id: &str) -> AppResult<bool> {
        self.poll_repo.get_by_id(poll_id).await?;
        self.vote_repo.has_voted(poll_id, user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pollbooth_db::entities::vote;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> PollService {
        let db = Arc::new(db.into_connection());
        PollService::new(
            PollRepository::new(Arc::clone(&db)),
            PollOptionRepository::new(Arc::clone(&db)),
            VoteRepository::new(db),
            PollConfig::default(),
        )
    }

    fn input(options: &[&str]) -> PollInput {
        PollInput {
            title: "Lunch today?".to_string(),
            description: None,
            options: options.iter().map(ToString::to_string).collect(),
            is_multiple_choice: false,
            is_anonymous: false,
            expires_at: None,
        }
    }

    fn create_test_poll(id: &str, owner: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            title: "Lunch today?".to_string(),
            description: None,
            created_by: owner.to_string(),
            is_multiple_choice: false,
            is_anonymous: false,
            expires_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_option(id: &str, text: &str) -> poll_option::Model {
        poll_option::Model {
            id: id.to_string(),
            poll_id: "poll1".to_string(),
            text: text.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_vote(id: &str, option_id: &str, voter_id: &str) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            poll_id: "poll1".to_string(),
            option_id: option_id.to_string(),
            voter_id: voter_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    // Validation

    #[test]
    fn test_normalized_trims_texts() {
        let mut raw = input(&["  Pizza ", "Sushi\n"]);
        raw.title = "  Lunch today?  ".to_string();
        raw.description = Some("   ".to_string());

        let normalized = raw.normalized();

        assert_eq!(normalized.title, "Lunch today?");
        assert_eq!(normalized.description, None);
        assert_eq!(normalized.options, ids(&["Pizza", "Sushi"]));
    }

    #[test]
    fn test_validate_accepts_valid_input() {
        let mut valid = input(&["Pizza", "Sushi"]);
        valid.expires_at = Some(Utc::now() + Duration::hours(1));

        assert!(valid.validate().is_ok());
        assert!(valid.check_limits(&PollConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_short_title() {
        let mut invalid = input(&["Pizza", "Sushi"]);
        invalid.title = "Hi".to_string();

        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_single_option() {
        assert!(input(&["Pizza"]).validate().is_err());
    }

    #[test]
    fn test_check_limits_rejects_too_many_options() {
        let limits = PollConfig {
            max_options: 3,
            ..PollConfig::default()
        };
        let result = input(&["A", "B", "C", "D"]).check_limits(&limits);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_check_limits_rejects_blank_option() {
        let result = input(&["Pizza", "   "])
            .normalized()
            .check_limits(&PollConfig::default());

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_check_limits_rejects_long_option() {
        let limits = PollConfig {
            max_option_length: 5,
            ..PollConfig::default()
        };
        assert!(input(&["Pizza", "Sushi"]).check_limits(&limits).is_ok());
        assert!(input(&["Pizza", "Burrito"]).check_limits(&limits).is_err());
    }

    #[test]
    fn test_check_limits_rejects_duplicates_after_trim() {
        let result = input(&["Pizza", " Pizza "])
            .normalized()
            .check_limits(&PollConfig::default());

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_check_limits_rejects_past_expiry() {
        let mut invalid = input(&["Pizza", "Sushi"]);
        invalid.expires_at = Some(Utc::now() - Duration::minutes(1));

        assert!(invalid.check_limits(&PollConfig::default()).is_err());
    }

    // Create

    #[tokio::test]
    async fn test_create_poll_inserts_all_options() {
        let poll = create_test_poll("poll1", "alice");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll]])
            .append_exec_results([exec(2)])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]]);

        let created = service(db)
            .create_poll("alice", input(&["Pizza", "Sushi"]))
            .await
            .unwrap();

        assert_eq!(created.poll.id, "poll1");
        assert_eq!(created.options.len(), 2);
    }

    #[tokio::test]
    async fn test_create_poll_invalid_input_issues_no_queries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);

        let result = service(db).create_poll("alice", input(&["Pizza"])).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    // Update

    #[tokio::test]
    async fn test_update_poll_unchanged_options_touch_nothing() {
        let poll = create_test_poll("poll1", "alice");
        let options = vec![
            create_test_option("opt1", "Pizza"),
            create_test_option("opt2", "Sushi"),
        ];
        // No exec results: a delete or insert would fail the call.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[poll]])
            .append_query_results([options]);

        let update = service(db)
            .update_poll("poll1", "alice", input(&["Sushi", " Pizza"]))
            .await
            .unwrap();

        assert!(update.diff.is_empty());
        assert_eq!(update.poll.options.len(), 2);
        assert_eq!(update.poll.options[0].id, "opt1");
    }

    #[tokio::test]
    async fn test_update_poll_replaces_changed_option() {
        let poll = create_test_poll("poll1", "alice");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[poll]])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt3", "Tacos"),
            ]]);

        let update = service(db)
            .update_poll("poll1", "alice", input(&["Pizza", "Tacos"]))
            .await
            .unwrap();

        assert_eq!(update.diff.to_delete, ids(&["opt2"]));
        assert_eq!(update.diff.to_insert, ids(&["Tacos"]));
        assert_eq!(update.poll.options[0].id, "opt1");
        assert_eq!(update.poll.options[1].text, "Tacos");
    }

    #[tokio::test]
    async fn test_update_poll_only_additions_skip_delete() {
        let poll = create_test_poll("poll1", "alice");
        // A single exec result: it must be consumed by the insert.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[poll]])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]])
            .append_exec_results([exec(1)])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
                create_test_option("opt3", "Tacos"),
            ]]);

        let update = service(db)
            .update_poll("poll1", "alice", input(&["Pizza", "Sushi", "Tacos"]))
            .await
            .unwrap();

        assert!(update.diff.to_delete.is_empty());
        assert_eq!(update.diff.to_insert, ids(&["Tacos"]));
        assert_eq!(update.poll.options.len(), 3);
    }

    #[tokio::test]
    async fn test_update_poll_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<poll::Model>::new()]);

        let result = service(db)
            .update_poll("missing", "alice", input(&["Pizza", "Sushi"]))
            .await;

        assert!(matches!(result, Err(AppError::PollNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_poll_by_other_user_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]]);

        let result = service(db)
            .update_poll("poll1", "mallory", input(&["Pizza", "Sushi"]))
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_poll_delete_failure_aborts() {
        let poll = create_test_poll("poll1", "alice");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll.clone()]])
            .append_query_results([[poll]])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]])
            .append_exec_errors([DbErr::Custom("connection reset".to_string())]);

        let result = service(db)
            .update_poll("poll1", "alice", input(&["Pizza", "Tacos"]))
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_poll_insert_failure_keeps_deletions() {
        let poll = create_test_poll("poll1", "alice");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll.clone()]])
                .append_query_results([[poll]])
                .append_query_results([[
                    create_test_option("opt1", "Pizza"),
                    create_test_option("opt2", "Sushi"),
                ]])
                .append_exec_results([exec(1)])
                .append_exec_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );
        let service = PollService::new(
            PollRepository::new(Arc::clone(&db)),
            PollOptionRepository::new(Arc::clone(&db)),
            VoteRepository::new(Arc::clone(&db)),
            PollConfig::default(),
        );

        let result = service
            .update_poll("poll1", "alice", input(&["Pizza", "Tacos"]))
            .await;
        drop(service);

        assert!(matches!(result, Err(AppError::Database(_))));

        // find, update, list, delete, failed insert; no re-list afterwards.
        let log: Vec<String> = Arc::try_unwrap(db)
            .unwrap()
            .into_transaction_log()
            .iter()
            .map(|t| format!("{t:?}"))
            .collect();
        assert_eq!(log.len(), 5);
        assert_eq!(log.iter().filter(|s| s.contains("DELETE")).count(), 1);
        assert!(log[3].contains("DELETE"));
        assert!(log[4].contains("INSERT"));
        assert!(log[4].contains("Tacos"));
    }

    // Results

    #[tokio::test]
    async fn test_results_hide_voters_on_anonymous_poll() {
        let mut poll = create_test_poll("poll1", "alice");
        poll.is_anonymous = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll]])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]])
            .append_query_results([[maplit::btreemap! {
                "option_id" => sea_orm::Value::from("opt1"),
                "count" => sea_orm::Value::BigInt(Some(3)),
            }]])
            .append_query_results([[count_row(3)]]);

        let results = service(db).get_poll_results("poll1", None).await.unwrap();

        assert_eq!(results.options[0].votes, 3);
        assert_eq!(results.options[1].votes, 0);
        assert_eq!(results.total_votes, 3);
        assert_eq!(results.total_voters, 3);
        assert!(results.options.iter().all(|o| o.voter_ids.is_none()));
        assert!(!results.has_voted());
    }

    #[tokio::test]
    async fn test_results_list_voters_on_public_poll() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]])
            .append_query_results([vec![
                maplit::btreemap! {
                    "option_id" => sea_orm::Value::from("opt1"),
                    "count" => sea_orm::Value::BigInt(Some(1)),
                },
                maplit::btreemap! {
                    "option_id" => sea_orm::Value::from("opt2"),
                    "count" => sea_orm::Value::BigInt(Some(1)),
                },
            ]])
            .append_query_results([[count_row(2)]])
            .append_query_results([[create_test_vote("v2", "opt2", "carol")]])
            .append_query_results([[
                create_test_vote("v1", "opt1", "bob"),
                create_test_vote("v2", "opt2", "carol"),
            ]]);

        let results = service(db)
            .get_poll_results("poll1", Some("carol"))
            .await
            .unwrap();

        assert_eq!(results.options[0].voter_ids, Some(ids(&["bob"])));
        assert_eq!(results.options[1].voter_ids, Some(ids(&["carol"])));
        assert_eq!(results.user_votes, ids(&["opt2"]));
        assert!(results.has_voted());
        assert!(!results.is_expired);
    }

    // Voting

    #[tokio::test]
    async fn test_vote_rejects_empty_selection() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);

        let result = service(db).submit_vote("poll1", "bob", &[]).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_vote_rejects_duplicate_selection() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);

        let result = service(db)
            .submit_vote("poll1", "bob", &ids(&["opt1", "opt1"]))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_vote_rejects_expired_poll() {
        let mut poll = create_test_poll("poll1", "alice");
        poll.expires_at = Some((Utc::now() - Duration::hours(1)).into());

        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[poll]]);

        let result = service(db)
            .submit_vote("poll1", "bob", &ids(&["opt1"]))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_poll_is_expired_at_its_deadline() {
        let deadline = Utc::now();
        let mut poll = create_test_poll("poll1", "alice");
        poll.expires_at = Some(deadline.into());

        assert!(!expired_at(&poll, deadline - Duration::seconds(1)));
        assert!(expired_at(&poll, deadline));
        assert!(expired_at(&poll, deadline + Duration::seconds(1)));

        poll.expires_at = None;
        assert!(!expired_at(&poll, deadline));
    }

    #[tokio::test]
    async fn test_vote_rejects_several_choices_on_single_choice_poll() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]]);

        let result = service(db)
            .submit_vote("poll1", "bob", &ids(&["opt1", "opt2"]))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_vote_rejects_foreign_option() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]])
            .append_query_results([[create_test_option("opt1", "Pizza")]]);

        let result = service(db)
            .submit_vote("poll1", "bob", &ids(&["elsewhere"]))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_vote_rejects_second_ballot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]])
            .append_query_results([[create_test_option("opt1", "Pizza")]])
            .append_query_results([[count_row(1)]]);

        let result = service(db)
            .submit_vote("poll1", "bob", &ids(&["opt1"]))
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_vote_multiple_choice() {
        let mut poll = create_test_poll("poll1", "alice");
        poll.is_multiple_choice = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[poll]])
            .append_query_results([[
                create_test_option("opt1", "Pizza"),
                create_test_option("opt2", "Sushi"),
            ]])
            .append_query_results([[count_row(0)]])
            .append_exec_results([exec(2)]);

        let result = service(db)
            .submit_vote("poll1", "bob", &ids(&["opt1", "opt2"]))
            .await;

        assert!(result.is_ok());
    }

    // Listing and deletion

    #[tokio::test]
    async fn test_list_polls_attaches_counts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                create_test_poll("poll2", "alice"),
                create_test_poll("poll1", "bob"),
            ]])
            .append_query_results([vec![
                maplit::btreemap! {
                    "poll_id" => sea_orm::Value::from("poll2"),
                    "count" => sea_orm::Value::BigInt(Some(3)),
                },
                maplit::btreemap! {
                    "poll_id" => sea_orm::Value::from("poll1"),
                    "count" => sea_orm::Value::BigInt(Some(2)),
                },
            ]])
            .append_query_results([[maplit::btreemap! {
                "poll_id" => sea_orm::Value::from("poll2"),
                "count" => sea_orm::Value::BigInt(Some(5)),
            }]]);

        let polls = service(db).list_polls(None, None).await.unwrap();

        assert_eq!(polls.len(), 2);
        assert_eq!(polls[0].options_count, 3);
        assert_eq!(polls[0].votes_count, 5);
        assert_eq!(polls[1].options_count, 2);
        assert_eq!(polls[1].votes_count, 0);
    }

    #[tokio::test]
    async fn test_delete_poll_by_owner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]])
            .append_exec_results([exec(1)]);

        assert!(service(db).delete_poll("poll1", "alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_poll_by_other_user_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]]);

        let result = service(db).delete_poll("poll1", "bob").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_has_user_voted() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_poll("poll1", "alice")]])
            .append_query_results([[count_row(1)]]);

        assert!(service(db).has_user_voted("poll1", "bob").await.unwrap());
    }
}
