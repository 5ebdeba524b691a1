//! Phase channel, intersection controller, and toggle task for the Crossing
//! simulation.
//!
//! A single traffic light flips between Stop and Go on a randomized timer.
//! Observers block until the light turns green without ever acting on a
//! phase that has already been replaced.
//!
//! # Modules
//!
//! - [`channel`] -- Latest-value [`Mailbox`] and the [`PhaseChannel`] alias.
//! - [`config`] -- Configuration loading from `crossing-config.yaml` into
//!   strongly-typed structs.
//! - [`controller`] -- [`IntersectionController`] and its toggle task.
//! - [`cycle`] -- Cycle duration sampling and elapsed-time tracking.
//!
//! [`Mailbox`]: channel::Mailbox
//! [`PhaseChannel`]: channel::PhaseChannel
//! [`IntersectionController`]: controller::IntersectionController

pub mod channel;
pub mod config;
pub mod controller;
pub mod cycle;

pub use crossing_types::Phase;
