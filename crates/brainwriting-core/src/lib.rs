//! Brainwriting Core — shared abstractions.
//!
//! This crate defines the traits and types every other crate depends on:
//! the clock and document-store seams, the identifier newtypes, and the
//! engine-wide error taxonomy. It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod generator;
pub mod ids;
pub mod store;
