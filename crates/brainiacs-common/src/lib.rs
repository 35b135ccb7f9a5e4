//! # brainiacs-common
//!
//! Shared types, configuration, error handling, presence and fan-out used across
//! all Brainiacs crates. The board aggregate and its mutation rules live in
//! [`models`]; nothing in this crate talks to the store.

pub mod config;
pub mod error;
pub mod expiry;
pub mod fanout;
pub mod gateway_event;
pub mod models;
pub mod presence;
pub mod snowflake;
pub mod validation;
