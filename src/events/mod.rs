//! Graph mutation event system
//!
//! This module provides:
//! - `GraphEvent`: typed events emitted after every committed mutation
//! - `EventEmitter`: the observer port injected into the store
//! - `EventBus`: broadcast channel for distributing events to subscribers
//! - `CallbackEmitter`: closure adapter for in-process listeners

mod bus;
mod types;

pub use bus::{EventBus, DEFAULT_CAPACITY};
pub use types::{
    CallbackEmitter, EventEmitter, ExternalEntityType, GraphEvent, GraphEventKind, RelatedEntity,
};
