//! EventBus - broadcast-based event system for real-time orchestrator events.
//!
//! Publishes agent, chat, plan, workflow, settings and memory events so that
//! UI layers and the CLI can observe a turn while it runs.

/// Core event bus implementation (broadcast channel).
pub mod bus;
/// Event type definitions.
pub mod types;

pub use bus::EventBus;
pub use types::{MemoryAction, OrchestratorEvent};
