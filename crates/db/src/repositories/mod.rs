//! Repositories for database access.
//!
//! Each repository owns a shared handle to the connection pool and maps
//! storage failures to [`AppError::Database`](pollbooth_common::AppError::Database).

mod poll;
mod poll_option;
mod user;
mod vote;

pub use poll::{PollCounts, PollRepository};
pub use poll_option::PollOptionRepository;
pub use user::UserRepository;
pub use vote::{OptionVoteCount, VoteRepository};
