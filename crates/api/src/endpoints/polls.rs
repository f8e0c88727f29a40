//! Poll endpoints.

#![allow(missing_docs)]

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use chrono::{DateTime, Utc};
use pollbooth_common::AppResult;
use pollbooth_core::{
    OptionResult, PollInput, PollResults, PollSummary, PollUpdate, PollWithOptions,
};
use pollbooth_db::entities::{poll, poll_option};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

// Responses

/// Option response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResponse {
    pub id: String,
    pub text: String,
}

impl From<poll_option::Model> for OptionResponse {
    fn from(option: poll_option::Model) -> Self {
        Self {
            id: option.id,
            text: option.text,
        }
    }
}

/// Poll fields shared by every poll response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollMetaResponse {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub is_multiple_choice: bool,
    pub is_anonymous: bool,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<poll::Model> for PollMetaResponse {
    fn from(poll: poll::Model) -> Self {
        Self {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            created_by: poll.created_by,
            is_multiple_choice: poll.is_multiple_choice,
            is_anonymous: poll.is_anonymous,
            expires_at: poll.expires_at.map(|dt| dt.to_rfc3339()),
            created_at: poll.created_at.to_rfc3339(),
            updated_at: poll.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Poll with its options.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    #[serde(flatten)]
    pub poll: PollMetaResponse,
    pub options: Vec<OptionResponse>,
}

impl From<PollWithOptions> for PollResponse {
    fn from(p: PollWithOptions) -> Self {
        Self {
            poll: p.poll.into(),
            options: p.options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Edited poll with the number of options removed and added.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollResponse {
    #[serde(flatten)]
    pub poll: PollResponse,
    pub options_deleted: usize,
    pub options_inserted: usize,
}

impl From<PollUpdate> for UpdatePollResponse {
    fn from(update: PollUpdate) -> Self {
        Self {
            options_deleted: update.diff.to_delete.len(),
            options_inserted: update.diff.to_insert.len(),
            poll: update.poll.into(),
        }
    }
}

/// Listing entry.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummaryResponse {
    #[serde(flatten)]
    pub poll: PollMetaResponse,
    pub options_count: i64,
    pub votes_count: i64,
}

impl From<PollSummary> for PollSummaryResponse {
    fn from(s: PollSummary) -> Self {
        Self {
            poll: s.poll.into(),
            options_count: s.options_count,
            votes_count: s.votes_count,
        }
    }
}

/// Per-option tally.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResultResponse {
    pub id: String,
    pub text: String,
    pub votes: i64,
    pub is_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voter_ids: Option<Vec<String>>,
}

/// Poll results.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResultsResponse {
    #[serde(flatten)]
    pub poll: PollMetaResponse,
    pub options: Vec<OptionResultResponse>,
    pub total_votes: i64,
    pub total_voters: u64,
    pub has_voted: bool,
    pub is_expired: bool,
}

impl From<PollResults> for PollResultsResponse {
    fn from(results: PollResults) -> Self {
        let has_voted = results.has_voted();
        let options = results
            .options
            .into_iter()
            .map(|o: OptionResult| OptionResultResponse {
                is_voted: results.user_votes.contains(&o.id),
                id: o.id,
                text: o.text,
                votes: o.votes,
                voter_ids: o.voter_ids,
            })
            .collect();

        Self {
            poll: results.poll.into(),
            options,
            total_votes: results.total_votes,
            total_voters: results.total_voters,
            has_voted,
            is_expired: results.is_expired,
        }
    }
}

/// Vote status response.
#[derive(Serialize)]
pub struct HasVotedResponse {
    pub voted: bool,
}

// Requests

/// Poll fields accepted by create and update.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PollFields {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 2))]
    pub options: Vec<String>,
    #[serde(default)]
    pub is_multiple_choice: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<PollFields> for PollInput {
    fn from(f: PollFields) -> Self {
        Self {
            title: f.title,
            description: f.description,
            options: f.options,
            is_multiple_choice: f.is_multiple_choice,
            is_anonymous: f.is_anonymous,
            expires_at: f.expires_at,
        }
    }
}

/// Update poll request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollRequest {
    pub poll_id: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: PollFields,
}

/// Request addressing a single poll.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollIdRequest {
    pub poll_id: String,
}

/// List polls request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListPollsRequest {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_id: String,
    #[validate(length(min = 1))]
    pub option_ids: Vec<String>,
}

// Handlers

/// Create a poll.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PollFields>,
) -> AppResult<ApiResponse<PollResponse>> {
    req.validate()?;

    let poll = state.poll_service.create_poll(&user.id, req.into()).await?;
    Ok(ApiResponse::ok(poll.into()))
}

/// Edit a poll. Options whose text is unchanged keep their votes.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdatePollRequest>,
) -> AppResult<ApiResponse<UpdatePollResponse>> {
    req.validate()?;

    let update = state
        .poll_service
        .update_poll(&req.poll_id, &user.id, req.fields.into())
        .await?;
    Ok(ApiResponse::ok(update.into()))
}

/// Get a poll with its options.
async fn show(
    State(state): State<AppState>,
    Json(req): Json<PollIdRequest>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.get_poll(&req.poll_id).await?;
    Ok(ApiResponse::ok(poll.into()))
}

/// Get poll results for the caller.
async fn results(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<PollIdRequest>,
) -> AppResult<ApiResponse<PollResultsResponse>> {
    let viewer = maybe_user.map(|u| u.id);
    let results = state
        .poll_service
        .get_poll_results(&req.poll_id, viewer.as_deref())
        .await?;
    Ok(ApiResponse::ok(results.into()))
}

/// List polls, newest first.
async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListPollsRequest>,
) -> AppResult<ApiResponse<Vec<PollSummaryResponse>>> {
    req.validate()?;

    let polls = state
        .poll_service
        .list_polls(req.limit, req.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(polls.into_iter().map(Into::into).collect()))
}

/// Delete a poll.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PollIdRequest>,
) -> AppResult<impl IntoResponse> {
    state.poll_service.delete_poll(&req.poll_id, &user.id).await?;
    Ok(no_content())
}

/// Vote on a poll. Returns the updated results.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<PollResultsResponse>> {
    req.validate()?;

    state
        .poll_service
        .submit_vote(&req.poll_id, &user.id, &req.option_ids)
        .await?;

    let results = state
        .poll_service
        .get_poll_results(&req.poll_id, Some(&user.id))
        .await?;
    Ok(ApiResponse::ok(results.into()))
}

/// Check whether the caller has voted.
async fn has_voted(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PollIdRequest>,
) -> AppResult<ApiResponse<HasVotedResponse>> {
    let voted = state
        .poll_service
        .has_user_voted(&req.poll_id, &user.id)
        .await?;
    Ok(ApiResponse::ok(HasVotedResponse { voted }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/show", post(show))
        .route("/results", post(results))
        .route("/list", post(list))
        .route("/delete", post(delete))
        .route("/vote", post(vote))
        .route("/has-voted", post(has_voted))
}
