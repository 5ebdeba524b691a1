//! Shared type definitions for the Crossing intersection simulation.
//!
//! # Modules
//!
//! - [`phase`] -- The two-valued signal phase shown by the light.

pub mod phase;

pub use phase::Phase;
