//! Pipeline descriptions for saving and loading.
//!
//! A description names nodes by string keys local to the file, so the same
//! description can be instantiated any number of times.

use crate::core::error::{GraphError, GraphResult, NodeId, StrataResult};
use crate::core::region::Region;
use crate::core::types::Value;
use crate::filters::registry::FilterRegistry;
use crate::graph::connection::SlotKey;
use crate::graph::structure::{Pipeline, PipelineMetadata, PipelineNode};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Serializable representation of a pipeline node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Key used by connections and the target to refer to this node
    pub key: String,
    /// Filter id (to look up in registry)
    pub filter: String,
    /// Parameter values (override defaults)
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Serializable representation of a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescription {
    /// Producing node key
    pub from: String,
    /// Output slot, by index or name
    #[serde(default)]
    pub from_slot: SlotKey,
    /// Consuming node key
    pub to: String,
    /// Input slot, by index or name
    #[serde(default)]
    pub to_slot: SlotKey,
}

/// The output an update of the description should produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDescription {
    /// Node key
    pub node: String,
    /// Output slot, by index or name
    #[serde(default)]
    pub output: SlotKey,
    /// Region to produce, the largest possible region if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

/// Serializable representation of a complete pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDescription {
    /// Description format version
    #[serde(default = "PipelineDescription::default_version")]
    pub version: String,
    /// Pipeline metadata
    #[serde(default)]
    pub metadata: PipelineMetadata,
    /// All nodes
    pub nodes: Vec<NodeDescription>,
    /// All connections
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
    /// Output to update when the description is run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDescription>,
}

impl PipelineDescription {
    /// Current format version.
    pub const VERSION: &'static str = "1.0.0";

    fn default_version() -> String {
        Self::VERSION.to_string()
    }

    /// Create a new empty description.
    pub fn new() -> Self {
        Self {
            version: Self::default_version(),
            metadata: PipelineMetadata::default(),
            nodes: Vec::new(),
            connections: Vec::new(),
            target: None,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for PipelineDescription {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipeline built from a description, with its node keys resolved.
#[derive(Debug)]
pub struct LoadedPipeline {
    /// The pipeline.
    pub pipeline: Pipeline,
    /// Node IDs by description key, in description order.
    pub keys: IndexMap<String, NodeId>,
    /// Resolved target: node, output slot and optional region.
    pub target: Option<(NodeId, SlotKey, Option<Region>)>,
}

impl Pipeline {
    /// Build a pipeline from a description, creating filters through
    /// `registry`.
    pub fn from_description(
        description: &PipelineDescription,
        registry: &FilterRegistry,
    ) -> GraphResult<LoadedPipeline> {
        let mut pipeline = Pipeline::new();
        pipeline.metadata = description.metadata.clone();
        let mut keys: IndexMap<String, NodeId> = IndexMap::new();

        for node_desc in &description.nodes {
            if keys.contains_key(&node_desc.key) {
                return Err(GraphError::InvalidDescription(format!(
                    "duplicate node key '{}'",
                    node_desc.key
                )));
            }
            let filter = registry
                .create(&node_desc.filter)
                .ok_or_else(|| GraphError::UnknownFilter(node_desc.filter.clone()))?;
            let mut node = PipelineNode::new(filter);
            node.label = node_desc.label.clone();
            let id = pipeline.add_node(node);
            for (name, value) in &node_desc.parameters {
                pipeline.set_parameter(id, name, value.clone())?;
            }
            keys.insert(node_desc.key.clone(), id);
        }

        let lookup = |key: &str| {
            keys.get(key).copied().ok_or_else(|| {
                GraphError::InvalidDescription(format!("unknown node key '{}'", key))
            })
        };

        for conn in &description.connections {
            let from = lookup(&conn.from)?;
            let to = lookup(&conn.to)?;
            pipeline.connect(from, conn.from_slot.clone(), to, conn.to_slot.clone())?;
        }

        let target = match &description.target {
            Some(t) => {
                let node = lookup(&t.node)?;
                pipeline.output(node, t.output.clone())?;
                Some((node, t.output.clone(), t.region.clone()))
            }
            None => None,
        };

        debug!(
            "Loaded pipeline with {} node(s) and {} connection(s)",
            pipeline.node_count(),
            pipeline.connection_count()
        );
        Ok(LoadedPipeline {
            pipeline,
            keys,
            target,
        })
    }

    /// Parse a JSON description and build the pipeline.
    pub fn from_json(json: &str, registry: &FilterRegistry) -> StrataResult<LoadedPipeline> {
        let description = PipelineDescription::from_json(json)?;
        Ok(Self::from_description(&description, registry)?)
    }

    /// Describe the pipeline. Nodes get the keys `n0`, `n1`, ... in
    /// insertion order and slots are named.
    pub fn to_description(&self) -> PipelineDescription {
        let keys: IndexMap<NodeId, String> = self
            .node_ids()
            .enumerate()
            .map(|(i, id)| (id, format!("n{}", i)))
            .collect();

        let nodes = self
            .nodes()
            .map(|node| NodeDescription {
                key: keys[&node.id()].clone(),
                filter: node.metadata().id.clone(),
                parameters: node.parameter_overrides().clone(),
                label: node.label.clone(),
            })
            .collect();

        let slot_name = |id: NodeId, slot: usize, output: bool| -> SlotKey {
            let name = self.get_node(id).ok().and_then(|n| {
                let slots = if output {
                    &n.metadata().outputs
                } else {
                    &n.metadata().inputs
                };
                slots.get(slot).map(|s| s.name.clone())
            });
            name.map_or(SlotKey::Index(slot), SlotKey::Name)
        };

        let connections = self
            .connections()
            .iter()
            .map(|conn| ConnectionDescription {
                from: keys[&conn.from.node_id].clone(),
                from_slot: slot_name(conn.from.node_id, conn.from.slot, true),
                to: keys[&conn.to.node_id].clone(),
                to_slot: slot_name(conn.to.node_id, conn.to.slot, false),
            })
            .collect();

        PipelineDescription {
            version: PipelineDescription::VERSION.to_string(),
            metadata: self.metadata.clone(),
            nodes,
            connections,
            target: None,
        }
    }
}
