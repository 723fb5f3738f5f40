//! Connection types for the pipeline graph.

use crate::core::error::{ConnectionId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An endpoint of a connection (node + slot index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// The node ID.
    pub node_id: NodeId,
    /// The slot index on that node.
    pub slot: usize,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(node_id: NodeId, slot: usize) -> Self {
        Self { node_id, slot }
    }
}

/// A directed edge from an output slot to an input slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique identifier for this connection.
    pub id: ConnectionId,
    /// Producing endpoint (output slot).
    pub from: Endpoint,
    /// Consuming endpoint (input slot).
    pub to: Endpoint,
}

impl Connection {
    /// Create a new connection.
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self {
            id: ConnectionId::new(),
            from,
            to,
        }
    }
}

/// A slot addressed by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotKey {
    Index(usize),
    Name(String),
}

impl Default for SlotKey {
    fn default() -> Self {
        SlotKey::Index(0)
    }
}

impl From<usize> for SlotKey {
    fn from(index: usize) -> Self {
        SlotKey::Index(index)
    }
}

impl From<&str> for SlotKey {
    fn from(name: &str) -> Self {
        SlotKey::Name(name.to_string())
    }
}

impl From<String> for SlotKey {
    fn from(name: String) -> Self {
        SlotKey::Name(name)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Index(i) => write!(f, "#{}", i),
            SlotKey::Name(name) => f.write_str(name),
        }
    }
}
