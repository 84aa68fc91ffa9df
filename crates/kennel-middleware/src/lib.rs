//! `kennel-middleware` – The Nervous System
//!
//! Routes raw payloads between remote robots, the dispatcher, and the
//! watchdog without caring about what the payloads mean.
//!
//! # Modules
//!
//! - [`transport`] – [`Transport`][transport::Transport]: the trait every
//!   message carrier implements.
//! - [`bus`] – [`LocalBus`][bus::LocalBus]: headless topic-based
//!   publish/subscribe built on Tokio broadcast channels.
//! - [`ws_bridge`] – [`WsBridge`][ws_bridge::WsBridge]: WebSocket gateway
//!   that extends the bus to remote robots as raw JSON frames.

pub mod bus;
pub mod transport;
pub mod ws_bridge;

pub use bus::LocalBus;
pub use transport::Transport;
pub use ws_bridge::WsBridge;
