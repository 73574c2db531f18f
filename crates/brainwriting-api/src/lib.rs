//! Brainwriting API — HTTP surface over the session engine.

pub mod error;
pub mod routes;
pub mod state;
