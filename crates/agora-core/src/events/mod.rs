//! EventBus - broadcast-based event system for coordination events.
//!
//! Publishes events as the channel, proposal manager, and controllers make
//! progress, so the workflow runner and external observers can react without
//! polling.

/// Core event bus implementation (broadcast channel).
pub mod bus;
/// Event type definitions for the coordination lifecycle.
pub mod types;

pub use bus::EventBus;
pub use types::CoordinationEvent;
