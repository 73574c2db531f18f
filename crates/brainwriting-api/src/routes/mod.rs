//! Route modules: lobby administration, round play, health.

pub mod health;
pub mod round;
pub mod session;
