//! Business logic services.

#![allow(missing_docs)]

pub mod poll;
pub mod user;

pub use poll::{
    OptionResult, PollInput, PollResults, PollService, PollSummary, PollUpdate, PollWithOptions,
};
pub use user::UserService;
