//! `kennel-runtime` – The Edge Controller (Receive–Classify–Command Engine)
//!
//! The execution engine that turns inbound robot uploads into outbound
//! control frames and keeps the fleet fail-safe when uploads stop.
//!
//! # Modules
//!
//! - [`service`] – [`EdgeService`][service::EdgeService]:
//!   the supervised controller loop that subscribes to the upload topic,
//!   dispatches every event on its own task, and funnels gesture commands
//!   and watchdog stands through a single publisher onto the control topic.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]:
//!   the stateless per-event pipeline: parse the upload, decode the frame,
//!   classify the gesture, look up the motion command, and re-arm the
//!   robot's watchdog.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter for Jaeger, Grafana Tempo, or any OTLP-compatible collector.
//!
//! # Fail-safe
//!
//! Every dispatched command re-arms the robot's countdown in the
//! [`WatchdogRegistry`]. A robot whose uploads stop is parked upright once
//! per window until traffic resumes or the service shuts down.
//! [`WatchdogRegistry`] is re-exported here so orchestration code can hold
//! one without an additional explicit dependency on `kennel-kernel`.

pub mod dispatcher;
pub mod service;
pub mod telemetry;

pub use dispatcher::Dispatcher;
pub use service::{EdgeService, EdgeServiceConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};

pub use kennel_kernel::WatchdogRegistry;
