//! `kennel-kernel` – Reflexes & Fail-safe
//!
//! The reflex layer of the kennel edge controller. It does not look at
//! camera frames; it turns already-classified gestures into locomotion
//! commands and guarantees that a robot left without instructions is parked
//! upright.
//!
//! # Modules
//!
//! - [`catalog`] – the fixed gesture-to-command table. Pure lookups; every
//!   call returns a fresh [`ControlCommand`][kennel_types::ControlCommand]
//!   built from the shared template.
//! - [`watchdog`] – [`WatchdogRegistry`][watchdog::WatchdogRegistry]: one
//!   self-re-arming countdown per robot. A robot that falls silent for a
//!   full window receives the fail-safe stand command, once per window,
//!   until it speaks again or is retired.

pub mod catalog;
pub mod watchdog;

pub use watchdog::{ArmOutcome, WatchdogRegistry};
