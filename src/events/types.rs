//! Graph mutation event types

use serde::{Deserialize, Serialize};
use std::fmt;

/// The mutation that was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphEventKind {
    #[serde(rename = "graph:created")]
    GraphCreated,
    #[serde(rename = "graph:updated")]
    GraphUpdated,
    #[serde(rename = "graph:deleted")]
    GraphDeleted,
    #[serde(rename = "graph:node:added")]
    NodeAdded,
    #[serde(rename = "graph:node:updated")]
    NodeUpdated,
    #[serde(rename = "graph:node:deleted")]
    NodeDeleted,
    #[serde(rename = "graph:link:added")]
    LinkAdded,
    #[serde(rename = "graph:link:updated")]
    LinkUpdated,
    #[serde(rename = "graph:link:deleted")]
    LinkDeleted,
    #[serde(rename = "graph:node:linked:note")]
    NodeLinkedNote,
    #[serde(rename = "graph:node:linked:task")]
    NodeLinkedTask,
    #[serde(rename = "graph:node:unlinked:note")]
    NodeUnlinkedNote,
    #[serde(rename = "graph:node:unlinked:task")]
    NodeUnlinkedTask,
}

impl GraphEventKind {
    /// Wire name of the event, e.g. `graph:node:added`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GraphCreated => "graph:created",
            Self::GraphUpdated => "graph:updated",
            Self::GraphDeleted => "graph:deleted",
            Self::NodeAdded => "graph:node:added",
            Self::NodeUpdated => "graph:node:updated",
            Self::NodeDeleted => "graph:node:deleted",
            Self::LinkAdded => "graph:link:added",
            Self::LinkUpdated => "graph:link:updated",
            Self::LinkDeleted => "graph:link:deleted",
            Self::NodeLinkedNote => "graph:node:linked:note",
            Self::NodeLinkedTask => "graph:node:linked:task",
            Self::NodeUnlinkedNote => "graph:node:unlinked:note",
            Self::NodeUnlinkedTask => "graph:node:unlinked:task",
        }
    }
}

impl fmt::Display for GraphEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of external entity a node can be associated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalEntityType {
    Note,
    Task,
}

/// An external entity for linked/unlinked events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity_type: ExternalEntityType,
    pub entity_id: String,
}

/// An event emitted after a successful graph mutation
///
/// Must be Clone for `tokio::sync::broadcast`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEvent {
    pub kind: GraphEventKind,
    /// The graph the mutation happened in
    pub graph_id: String,
    /// Node or link id; absent for graph-level events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// External entity (for linked/unlinked events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedEntity>,
    /// The affected entity as JSON
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl GraphEvent {
    /// Create a new GraphEvent with the current timestamp
    pub fn new(kind: GraphEventKind, graph_id: impl Into<String>) -> Self {
        Self {
            kind,
            graph_id: graph_id.into(),
            entity_id: None,
            related: None,
            payload: serde_json::Value::Null,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_related(
        mut self,
        entity_type: ExternalEntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        self.related = Some(RelatedEntity {
            entity_type,
            entity_id: entity_id.into(),
        });
        self
    }

    /// Serialize `entity` into the payload. Serialization failures leave it null.
    pub fn with_payload<T: Serialize>(mut self, entity: &T) -> Self {
        self.payload = serde_json::to_value(entity).unwrap_or(serde_json::Value::Null);
        self
    }
}

/// Sink for graph events.
///
/// Fire-and-forget: implementations must not block. The store catches panics
/// raised by an emitter so a failing subscriber never aborts a mutation.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: GraphEvent);
}

/// Adapter turning a closure into an [`EventEmitter`].
pub struct CallbackEmitter<F>
where
    F: Fn(GraphEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackEmitter<F>
where
    F: Fn(GraphEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventEmitter for CallbackEmitter<F>
where
    F: Fn(GraphEvent) + Send + Sync,
{
    fn emit(&self, event: GraphEvent) {
        (self.callback)(event)
    }
}
