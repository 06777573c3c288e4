//! API handlers for the gateway.
//!
//! Handlers stay thin: they extract input, call [`crate::gateway::Gateway`]
//! and turn its result into a response.

pub mod auth;
pub mod health;
pub mod requests;
