//! API route modules.

pub mod boards;
pub mod health;
pub mod join_requests;
pub mod messages;
pub mod polls;
