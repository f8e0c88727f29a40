//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `pollbooth_test`)
//!   `TEST_DB_PASSWORD` (default: `pollbooth_test`)
//!   `TEST_DB_NAME` (default: `pollbooth_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use pollbooth_db::entities::poll;
use pollbooth_db::repositories::{PollOptionRepository, PollRepository, VoteRepository};
use pollbooth_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

fn new_poll(id: &str, owner: &str) -> poll::ActiveModel {
    poll::ActiveModel {
        id: Set(id.to_string()),
        title: Set("Where should we eat?".to_string()),
        description: Set(None),
        created_by: Set(owner.to_string()),
        is_multiple_choice: Set(false),
        is_anonymous: Set(false),
        expires_at: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_options_keep_insertion_order() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    db.seed_user("owner", "owner-token").await.unwrap();

    let conn = Arc::new(db.conn.clone());
    let polls = PollRepository::new(Arc::clone(&conn));
    let options = PollOptionRepository::new(Arc::clone(&conn));

    polls.create(new_poll("poll1", "owner")).await.unwrap();
    let texts: Vec<String> = ["Zucchini", "Apple", "Mango", "Banana"]
        .iter()
        .map(ToString::to_string)
        .collect();
    options.insert_texts("poll1", &texts).await.unwrap();

    let stored: Vec<String> = options
        .list_by_poll("poll1")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.text)
        .collect();
    assert_eq!(stored, texts);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_deleting_option_removes_its_votes_only() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    db.seed_user("owner", "owner-token").await.unwrap();
    db.seed_user("voter", "voter-token").await.unwrap();

    let conn = Arc::new(db.conn.clone());
    let polls = PollRepository::new(Arc::clone(&conn));
    let options = PollOptionRepository::new(Arc::clone(&conn));
    let votes = VoteRepository::new(Arc::clone(&conn));

    polls.create(new_poll("poll1", "owner")).await.unwrap();
    options
        .insert_texts("poll1", &["A".to_string(), "B".to_string()])
        .await
        .unwrap();
    let stored = options.list_by_poll("poll1").await.unwrap();
    let (a, b) = (stored[0].id.clone(), stored[1].id.clone());

    votes.create_many("poll1", "voter", &[a.clone()]).await.unwrap();
    votes.create_many("poll1", "owner", &[b.clone()]).await.unwrap();

    assert_eq!(options.delete_by_ids(&[b]).await.unwrap(), 1);

    let remaining = votes.find_by_poll("poll1").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].option_id, a);
    assert_eq!(votes.count_voters("poll1").await.unwrap(), 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_deleting_poll_cascades() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    db.seed_user("owner", "owner-token").await.unwrap();

    let conn = Arc::new(db.conn.clone());
    let polls = PollRepository::new(Arc::clone(&conn));
    let options = PollOptionRepository::new(Arc::clone(&conn));
    let votes = VoteRepository::new(Arc::clone(&conn));

    polls.create(new_poll("poll1", "owner")).await.unwrap();
    options
        .insert_texts("poll1", &["A".to_string(), "B".to_string()])
        .await
        .unwrap();
    let stored = options.list_by_poll("poll1").await.unwrap();
    votes
        .create_many("poll1", "owner", &[stored[0].id.clone()])
        .await
        .unwrap();

    polls.delete("poll1").await.unwrap();

    assert!(polls.find_by_id("poll1").await.unwrap().is_none());
    assert!(options.list_by_poll("poll1").await.unwrap().is_empty());
    assert!(votes.find_by_poll("poll1").await.unwrap().is_empty());

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
