//! Test utilities and helpers for meshtable
//!
//! Fixtures, recording collaborators and seeded randomness shared by the
//! unit and scenario tests.

pub mod deterministic_rng;
pub mod fixtures;

pub use deterministic_rng::*;
pub use fixtures::*;
