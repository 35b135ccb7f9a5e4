//! Repository layer — query functions organized by domain.

pub mod boards;
pub mod join_requests;
pub mod users;
