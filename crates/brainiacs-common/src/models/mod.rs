//! Core domain models shared across all Brainiacs services.
//!
//! These are the "truth" types — what the store persists and the API serializes.
//! The board is the aggregate; members, messages and polls only exist inside it.

pub mod board;
pub mod join_request;
pub mod member;
pub mod message;
pub mod poll;
pub mod user;

/// Re-export all model types for convenience.
pub use board::*;
pub use join_request::*;
pub use member::*;
pub use message::*;
pub use poll::*;
pub use user::*;
