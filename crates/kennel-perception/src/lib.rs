//! `kennel-perception` – Gesture Understanding layer.
//!
//! Turns camera frames into the discrete [`Gesture`][kennel_types::Gesture]
//! labels the rest of the controller acts on. The heavy lifting happens in
//! an external vision model; this crate owns the seam.
//!
//! # Modules
//!
//! - [`classifier`] – [`GestureClassifier`][classifier::GestureClassifier]:
//!   the trait every classification backend implements, plus its error type.
//! - [`remote`] – [`HttpClassifier`][remote::HttpClassifier]: posts frames
//!   to a remote vision service over HTTP.
//! - [`scripted`] – [`ScriptedClassifier`][scripted::ScriptedClassifier]:
//!   replays a canned gesture sequence for offline runs and tests.

pub mod classifier;
pub mod remote;
pub mod scripted;

pub use classifier::{ClassifierError, GestureClassifier};
pub use remote::HttpClassifier;
pub use scripted::ScriptedClassifier;
