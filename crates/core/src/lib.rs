//! Core business logic for pollbooth.
//!
//! [`reconcile`] holds the pure option diffing used when a poll is edited;
//! [`services`] wires it to the repositories of `pollbooth-db`.

pub mod reconcile;
pub mod services;

pub use reconcile::{OptionDiff, reconcile};
pub use services::*;
