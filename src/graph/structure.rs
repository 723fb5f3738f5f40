//! Pipeline structure and node management.
//!
//! The [`Pipeline`] owns every node and the connections between them. Each
//! node owns one [`DataHandle`] per output slot, created empty when the node
//! is added, and holds a handle per bound input slot. Connections mirror the
//! input bindings that point at outputs of nodes in the same pipeline, so
//! the graph can be walked without touching any data object.

use crate::core::context::Parameters;
use crate::core::data::{DataHandle, DataKind, DataObject, OutputRef};
use crate::core::error::{ConnectionId, GraphError, GraphResult, NodeId, StrataResult};
use crate::core::node::{Filter, FilterMetadata};
use crate::core::region::Region;
use crate::core::time::ModifiedTime;
use crate::core::types::Value;
use crate::execution::engine::{UpdateEngine, UpdateReport};
use crate::graph::connection::{Connection, Endpoint, SlotKey};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// A filter instance in the pipeline together with its wiring and state.
pub struct PipelineNode {
    id: NodeId,
    filter: Box<dyn Filter>,
    metadata: FilterMetadata,
    /// Parameter values overriding the defaults
    parameters: IndexMap<String, Value>,
    /// Optional display name override
    pub label: Option<String>,
    inputs: Vec<Option<DataHandle>>,
    outputs: Vec<DataHandle>,
    modified: ModifiedTime,
    last_executed: ModifiedTime,
}

impl std::fmt::Debug for PipelineNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineNode")
            .field("id", &self.id)
            .field("filter", &self.metadata.id)
            .field("parameters", &self.parameters)
            .field("label", &self.label)
            .field("modified", &self.modified)
            .field("last_executed", &self.last_executed)
            .finish()
    }
}

impl PipelineNode {
    /// Create a node for `filter` with a fresh ID.
    pub fn new(filter: Box<dyn Filter>) -> Self {
        Self::with_id(NodeId::new(), filter)
    }

    /// Create a node with a specific ID.
    pub fn with_id(id: NodeId, filter: Box<dyn Filter>) -> Self {
        let metadata = filter.metadata();
        let inputs = vec![None; metadata.inputs.len()];
        let outputs = (0..metadata.outputs.len())
            .map(|index| DataHandle::new(DataObject::for_output(OutputRef { node_id: id, index })))
            .collect();
        Self {
            id,
            filter,
            metadata,
            parameters: IndexMap::new(),
            label: None,
            inputs,
            outputs,
            modified: ModifiedTime::tick(),
            last_executed: ModifiedTime::NEVER,
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Unique identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The filter implementation.
    pub fn filter(&self) -> &dyn Filter {
        self.filter.as_ref()
    }

    /// Metadata of the filter, captured when the node was created.
    pub fn metadata(&self) -> &FilterMetadata {
        &self.metadata
    }

    /// Get the display name (label or filter name).
    pub fn display_name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.metadata.name.clone())
    }

    /// Parameter values set explicitly on this node.
    pub fn parameter_overrides(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    /// Get a parameter value, falling back to default.
    pub fn get_parameter(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.parameters.get(name) {
            return Some(value.clone());
        }
        self.metadata
            .get_parameter(name)
            .map(|p| p.default_value.clone())
    }

    /// Every parameter with overrides applied.
    pub fn resolved_parameters(&self) -> Parameters {
        let mut values = self.metadata.default_parameters();
        for (name, value) in &self.parameters {
            values.insert(name.clone(), value.clone());
        }
        Parameters::new(self.id, values)
    }

    /// Input bindings, one per input slot.
    pub fn inputs(&self) -> &[Option<DataHandle>] {
        &self.inputs
    }

    /// Output handles, one per output slot.
    pub fn outputs(&self) -> &[DataHandle] {
        &self.outputs
    }

    /// Time of the last change to parameters or input bindings.
    pub fn modified(&self) -> ModifiedTime {
        self.modified
    }

    /// Time of the last successful execution.
    pub fn last_executed(&self) -> ModifiedTime {
        self.last_executed
    }

    /// Record a change that invalidates previous results.
    pub fn touch(&mut self) {
        self.modified = ModifiedTime::tick();
    }

    pub(crate) fn mark_executed(&mut self, at: ModifiedTime) {
        self.last_executed = at;
    }

    /// Forget the last execution and drop the output buffers.
    pub(crate) fn invalidate(&mut self) {
        self.last_executed = ModifiedTime::NEVER;
        for output in &self.outputs {
            output.write().release();
        }
    }

    fn input_index(&self, key: &SlotKey) -> GraphResult<usize> {
        let index = match key {
            SlotKey::Index(i) if *i < self.inputs.len() => Some(*i),
            SlotKey::Index(_) => None,
            SlotKey::Name(name) => self.metadata.input_index(name),
        };
        index.ok_or_else(|| GraphError::InvalidSlot {
            node_id: self.id,
            slot: key.to_string(),
            reason: format!(
                "no such input on '{}' (inputs: {:?})",
                self.metadata.id,
                self.metadata.input_names()
            ),
        })
    }

    fn output_index(&self, key: &SlotKey) -> GraphResult<usize> {
        let index = match key {
            SlotKey::Index(i) if *i < self.outputs.len() => Some(*i),
            SlotKey::Index(_) => None,
            SlotKey::Name(name) => self.metadata.output_index(name),
        };
        index.ok_or_else(|| GraphError::InvalidSlot {
            node_id: self.id,
            slot: key.to_string(),
            reason: format!(
                "no such output on '{}' (outputs: {:?})",
                self.metadata.id,
                self.metadata.output_names()
            ),
        })
    }
}

/// Metadata about the pipeline itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineMetadata {
    /// Optional name for this pipeline.
    pub name: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Additional tags.
    pub tags: Vec<String>,
}

/// A directed acyclic graph of filters.
///
/// Uses IndexMap to maintain insertion order for consistent iteration.
#[derive(Debug, Default)]
pub struct Pipeline {
    /// All nodes in the pipeline, indexed by ID.
    nodes: IndexMap<NodeId, PipelineNode>,
    /// All connections in the pipeline.
    connections: Vec<Connection>,
    /// Pipeline metadata.
    pub metadata: PipelineMetadata,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = Some(name.into());
        self
    }

    // ========================================================================
    // Node Management
    // ========================================================================

    /// Add a node to the pipeline.
    pub fn add_node(&mut self, node: PipelineNode) -> NodeId {
        let id = node.id;
        debug!("Adding node {} ({})", id, node.metadata.id);
        self.nodes.insert(id, node);
        id
    }

    /// Add a node from a filter and return the node ID.
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) -> NodeId {
        self.add_node(PipelineNode::new(filter))
    }

    /// Remove a node from the pipeline.
    ///
    /// Consumers bound to its outputs are unbound. Handles to its outputs
    /// held elsewhere stay valid and become external data.
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<PipelineNode> {
        let node = self.nodes.shift_remove(&id).ok_or(GraphError::NodeNotFound(id))?;

        let (removed, kept): (Vec<Connection>, Vec<Connection>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|conn| conn.from.node_id == id || conn.to.node_id == id);
        self.connections = kept;

        for conn in removed.iter().filter(|c| c.from.node_id == id) {
            if let Some(consumer) = self.nodes.get_mut(&conn.to.node_id) {
                consumer.inputs[conn.to.slot] = None;
                consumer.touch();
            }
        }
        for output in &node.outputs {
            output.write().disconnect_source();
        }
        debug!("Removed node {} and {} connection(s)", id, removed.len());
        Ok(node)
    }

    /// Get a reference to a node.
    pub fn get_node(&self, id: NodeId) -> GraphResult<&PipelineNode> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn get_node_mut(&mut self, id: NodeId) -> GraphResult<&mut PipelineNode> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Check if a node exists.
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.nodes.values()
    }

    /// Get all node IDs.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    /// Bind `handle` to an input slot of `node`.
    ///
    /// The slot may be given by index or by name. When the handle is an
    /// output of a node in this pipeline the binding is recorded as a
    /// connection; handles from outside any pipeline are external data.
    /// Rebinding the handle already bound is a no-op.
    pub fn set_input(
        &mut self,
        node_id: NodeId,
        slot: impl Into<SlotKey>,
        handle: DataHandle,
    ) -> GraphResult<()> {
        self.bind_input(node_id, slot.into(), handle).map(|_| ())
    }

    fn bind_input(
        &mut self,
        node_id: NodeId,
        key: SlotKey,
        handle: DataHandle,
    ) -> GraphResult<Option<ConnectionId>> {
        let node = self.get_node(node_id)?;
        let slot = node.input_index(&key)?;
        let slot_def = &node.metadata.inputs[slot];

        if let Some(bound) = &node.inputs[slot] {
            if bound.ptr_eq(&handle) {
                return Ok(self
                    .connections
                    .iter()
                    .find(|c| c.to == Endpoint::new(node_id, slot))
                    .map(|c| c.id));
            }
        }

        let (source, known_kind) = {
            let object = handle.read();
            (object.source(), object.kind())
        };

        let kind = match (source, known_kind) {
            (_, Some(kind)) => Some(kind),
            (Some(src), None) => {
                let producer = self.nodes.get(&src.node_id).ok_or_else(|| GraphError::InvalidSlot {
                    node_id,
                    slot: slot_def.name.clone(),
                    reason: format!("data produced by node {} outside this pipeline", src.node_id),
                })?;
                producer
                    .metadata
                    .outputs
                    .get(src.index)
                    .map(|o| o.kind)
                    .filter(|k| *k != DataKind::Any)
            }
            (None, None) => None,
        };
        if let Some(kind) = kind {
            if !slot_def.kind.accepts(kind) {
                return Err(GraphError::SlotTypeMismatch {
                    node_id,
                    slot: slot_def.name.clone(),
                    expected: slot_def.kind,
                    got: kind,
                });
            }
        }

        if let Some(src) = source {
            if !self.nodes.contains_key(&src.node_id) {
                return Err(GraphError::InvalidSlot {
                    node_id,
                    slot: slot_def.name.clone(),
                    reason: format!("data produced by node {} outside this pipeline", src.node_id),
                });
            }
            if self.is_reachable(node_id, src.node_id) {
                return Err(GraphError::CycleDetected {
                    nodes: vec![src.node_id, node_id],
                });
            }
        }

        let to = Endpoint::new(node_id, slot);
        self.connections.retain(|c| c.to != to);
        let connection_id = source.map(|src| {
            let connection = Connection::new(Endpoint::new(src.node_id, src.index), to);
            let id = connection.id;
            self.connections.push(connection);
            id
        });

        let node = self.get_node_mut(node_id)?;
        node.inputs[slot] = Some(handle);
        node.touch();
        debug!("Bound input {} of node {} (source: {:?})", slot, node_id, source);
        Ok(connection_id)
    }

    /// Bind an output of one node to an input of another.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_slot: impl Into<SlotKey>,
        to_node: NodeId,
        to_slot: impl Into<SlotKey>,
    ) -> GraphResult<ConnectionId> {
        let from = self.get_node(from_node)?;
        let index = from.output_index(&from_slot.into())?;
        let handle = from.outputs[index].clone();
        self.get_node(to_node)?;
        self.bind_input(to_node, to_slot.into(), handle)?
            .ok_or(GraphError::NodeNotFound(from_node))
    }

    /// Remove a connection by ID, unbinding the input it feeds.
    pub fn disconnect(&mut self, id: ConnectionId) -> GraphResult<Connection> {
        let pos = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or(GraphError::ConnectionNotFound(id))?;
        let connection = self.connections.remove(pos);
        if let Some(node) = self.nodes.get_mut(&connection.to.node_id) {
            node.inputs[connection.to.slot] = None;
            node.touch();
        }
        Ok(connection)
    }

    /// Unbind an input slot, returning the handle that was bound.
    pub fn disconnect_input(
        &mut self,
        node_id: NodeId,
        slot: impl Into<SlotKey>,
    ) -> GraphResult<Option<DataHandle>> {
        let node = self.get_node_mut(node_id)?;
        let slot = node.input_index(&slot.into())?;
        let previous = node.inputs[slot].take();
        if previous.is_some() {
            node.touch();
        }
        let to = Endpoint::new(node_id, slot);
        self.connections.retain(|c| c.to != to);
        Ok(previous)
    }

    /// The handle of an output slot. Never triggers computation.
    pub fn output(&self, node_id: NodeId, slot: impl Into<SlotKey>) -> GraphResult<DataHandle> {
        let node = self.get_node(node_id)?;
        let index = node.output_index(&slot.into())?;
        Ok(node.outputs[index].clone())
    }

    /// The handle bound to an input slot, if any.
    pub fn input(
        &self,
        node_id: NodeId,
        slot: impl Into<SlotKey>,
    ) -> GraphResult<Option<DataHandle>> {
        let node = self.get_node(node_id)?;
        let index = node.input_index(&slot.into())?;
        Ok(node.inputs[index].clone())
    }

    // ========================================================================
    // Parameters and Modification
    // ========================================================================

    /// Set a parameter value after checking it against its definition.
    ///
    /// Setting the value a parameter already has changes nothing.
    pub fn set_parameter(
        &mut self,
        node_id: NodeId,
        name: &str,
        value: impl Into<Value>,
    ) -> GraphResult<()> {
        let value = value.into();
        let node = self.get_node_mut(node_id)?;
        let definition = node
            .metadata
            .get_parameter(name)
            .ok_or_else(|| GraphError::InvalidParameter {
                node_id,
                parameter: name.to_string(),
                error: format!("'{}' has no such parameter", node.metadata.id),
            })?;
        definition
            .validate(&value)
            .map_err(|error| GraphError::InvalidParameter {
                node_id,
                parameter: name.to_string(),
                error,
            })?;

        if node.get_parameter(name).as_ref() == Some(&value) {
            return Ok(());
        }
        debug!("Node {} parameter '{}' = {}", node_id, name, value);
        node.parameters.insert(name.to_string(), value);
        node.touch();
        Ok(())
    }

    /// Get a parameter value, falling back to default.
    pub fn get_parameter(&self, node_id: NodeId, name: &str) -> GraphResult<Value> {
        let node = self.get_node(node_id)?;
        node.get_parameter(name)
            .ok_or_else(|| GraphError::InvalidParameter {
                node_id,
                parameter: name.to_string(),
                error: format!("'{}' has no such parameter", node.metadata.id),
            })
    }

    /// Mark a node as changed so its next update recomputes.
    pub fn modified(&mut self, node_id: NodeId) -> GraphResult<()> {
        self.get_node_mut(node_id)?.touch();
        Ok(())
    }

    /// Pin the region the next updates of an output should produce.
    pub fn set_requested_region(
        &mut self,
        node_id: NodeId,
        output: impl Into<SlotKey>,
        region: Region,
    ) -> GraphResult<()> {
        self.output(node_id, output)?.write().pin_region(Some(region));
        Ok(())
    }

    /// Remove pinned regions from every output of a node.
    pub fn clear_requested_region(&mut self, node_id: NodeId) -> GraphResult<()> {
        for output in self.get_node(node_id)?.outputs() {
            output.write().pin_region(None);
        }
        Ok(())
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Bring every output of a node up to date.
    pub fn update(&mut self, node_id: NodeId) -> StrataResult<UpdateReport> {
        UpdateEngine::new().update(self, node_id)
    }

    /// Bring one output up to date.
    pub fn update_output(
        &mut self,
        node_id: NodeId,
        output: usize,
    ) -> StrataResult<UpdateReport> {
        UpdateEngine::new().update_output(self, node_id, output)
    }

    /// Bring `region` of one output up to date.
    pub fn update_region(
        &mut self,
        node_id: NodeId,
        output: usize,
        region: Region,
    ) -> StrataResult<UpdateReport> {
        UpdateEngine::new().update_region(self, node_id, output, region)
    }

    /// Clear pinned regions and bring every output up to date in full.
    pub fn update_largest_possible_region(
        &mut self,
        node_id: NodeId,
    ) -> StrataResult<UpdateReport> {
        UpdateEngine::new().update_largest_possible_region(self, node_id)
    }

    /// Produce one output in `pieces` separate passes.
    pub fn update_streamed(
        &mut self,
        node_id: NodeId,
        output: usize,
        pieces: usize,
    ) -> StrataResult<UpdateReport> {
        UpdateEngine::new().update_streamed(self, node_id, output, Some(pieces))
    }

    // ========================================================================
    // Connections and Analysis
    // ========================================================================

    /// Get a connection by ID.
    pub fn get_connection(&self, id: ConnectionId) -> GraphResult<&Connection> {
        self.connections
            .iter()
            .find(|c| c.id == id)
            .ok_or(GraphError::ConnectionNotFound(id))
    }

    /// Get all connections.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Get all connections from a node.
    pub fn connections_from(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.from.node_id == node_id)
    }

    /// Get all connections to a node.
    pub fn connections_to(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.to.node_id == node_id)
    }

    /// Get the number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Check if `target` is reachable from `start` following connections.
    pub fn is_reachable(&self, start: NodeId, target: NodeId) -> bool {
        if start == target {
            return true;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }

            if visited.insert(current) {
                for conn in self.connections_from(current) {
                    queue.push_back(conn.to.node_id);
                }
            }
        }

        false
    }

    /// Get all nodes that depend on the given node (downstream).
    pub fn get_downstream(&self, node_id: NodeId) -> Vec<NodeId> {
        self.walk(node_id, |conn| (conn.from.node_id, conn.to.node_id))
    }

    /// Get all nodes that the given node depends on (upstream).
    pub fn get_upstream(&self, node_id: NodeId) -> Vec<NodeId> {
        self.walk(node_id, |conn| (conn.to.node_id, conn.from.node_id))
    }

    fn walk(&self, start: NodeId, edge: impl Fn(&Connection) -> (NodeId, NodeId)) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for conn in &self.connections {
                let (near, far) = edge(conn);
                if near == current && visited.insert(far) {
                    result.push(far);
                    queue.push_back(far);
                }
            }
        }

        result
    }

    /// Get nodes with no incoming connections (source nodes).
    pub fn get_source_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|&id| !self.connections.iter().any(|c| c.to.node_id == *id))
            .copied()
            .collect()
    }

    /// Get nodes with no outgoing connections (sink nodes).
    pub fn get_sink_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|&id| !self.connections.iter().any(|c| c.from.node_id == *id))
            .copied()
            .collect()
    }

    /// Record a connection and binding without any checks.
    #[cfg(test)]
    pub(crate) fn insert_connection_unchecked(
        &mut self,
        from: NodeId,
        from_slot: usize,
        to: NodeId,
        to_slot: usize,
    ) {
        let handle = self.nodes[&from].outputs[from_slot].clone();
        self.nodes[&to].inputs[to_slot] = Some(handle);
        self.connections.push(Connection::new(
            Endpoint::new(from, from_slot),
            Endpoint::new(to, to_slot),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::Image;
    use crate::filters::builtin::{Add, ImageSource, ShiftScale, Statistics};

    fn source(pipeline: &mut Pipeline) -> NodeId {
        pipeline.add_filter(Box::new(ImageSource::<u8>::new()))
    }

    fn shift(pipeline: &mut Pipeline) -> NodeId {
        pipeline.add_filter(Box::new(ShiftScale::<u8>::new()))
    }

    #[test]
    fn test_add_remove_node() {
        let mut pipeline = Pipeline::new();

        let id = source(&mut pipeline);
        assert_eq!(pipeline.node_count(), 1);
        assert!(pipeline.has_node(id));
        assert_eq!(pipeline.get_node(id).unwrap().outputs().len(), 1);

        pipeline.remove_node(id).unwrap();
        assert_eq!(pipeline.node_count(), 0);
        assert!(matches!(
            pipeline.remove_node(id),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_connect_records_binding() {
        let mut pipeline = Pipeline::new();
        let a = source(&mut pipeline);
        let b = shift(&mut pipeline);

        let conn_id = pipeline.connect(a, 0, b, "input").unwrap();
        assert_eq!(pipeline.connection_count(), 1);
        let bound = pipeline.input(b, 0).unwrap().unwrap();
        assert!(bound.ptr_eq(&pipeline.output(a, "output").unwrap()));

        pipeline.disconnect(conn_id).unwrap();
        assert_eq!(pipeline.connection_count(), 0);
        assert!(pipeline.input(b, 0).unwrap().is_none());
    }

    #[test]
    fn test_rebinding_replaces_connection() {
        let mut pipeline = Pipeline::new();
        let a = source(&mut pipeline);
        let a2 = source(&mut pipeline);
        let b = shift(&mut pipeline);

        pipeline.connect(a, 0, b, 0).unwrap();
        pipeline.connect(a2, 0, b, 0).unwrap();
        assert_eq!(pipeline.connection_count(), 1);
        assert_eq!(pipeline.connections()[0].from.node_id, a2);

        let before = pipeline.get_node(b).unwrap().modified();
        let same = pipeline.output(a2, 0).unwrap();
        pipeline.set_input(b, 0, same).unwrap();
        assert_eq!(pipeline.get_node(b).unwrap().modified(), before);
    }

    #[test]
    fn test_invalid_slots() {
        let mut pipeline = Pipeline::new();
        let a = source(&mut pipeline);
        let b = shift(&mut pipeline);

        let err = pipeline.connect(a, 0, b, "missing").unwrap_err();
        assert!(matches!(err, GraphError::InvalidSlot { .. }));
        let err = pipeline.connect(a, 3, b, 0).unwrap_err();
        assert!(matches!(err, GraphError::InvalidSlot { .. }));

        let stats = pipeline.add_filter(Box::new(Statistics::<u8>::new()));
        pipeline.connect(a, 0, stats, 0).unwrap();
        let err = pipeline.connect(stats, 0, b, 0).unwrap_err();
        assert!(matches!(err, GraphError::SlotTypeMismatch { .. }));

        let float_image = DataHandle::from_image(Image::<f32>::allocated(Region::from_size(&[2])));
        let err = pipeline.set_input(b, 0, float_image).unwrap_err();
        assert!(matches!(err, GraphError::SlotTypeMismatch { .. }));
    }

    #[test]
    fn test_foreign_data_rejected() {
        let mut other = Pipeline::new();
        let foreign = source(&mut other);
        let handle = other.output(foreign, 0).unwrap();

        let mut pipeline = Pipeline::new();
        let b = shift(&mut pipeline);
        let err = pipeline.set_input(b, 0, handle).unwrap_err();
        assert!(matches!(err, GraphError::InvalidSlot { .. }));
    }

    #[test]
    fn test_cycle_detection() {
        let mut pipeline = Pipeline::new();

        let node1 = shift(&mut pipeline);
        let node2 = shift(&mut pipeline);
        let node3 = shift(&mut pipeline);

        pipeline.connect(node1, 0, node2, 0).unwrap();
        pipeline.connect(node2, 0, node3, 0).unwrap();

        let result = pipeline.connect(node3, 0, node1, 0);
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
        let result = pipeline.connect(node1, 0, node1, 0);
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
        assert_eq!(pipeline.connection_count(), 2);
    }

    #[test]
    fn test_set_parameter() {
        let mut pipeline = Pipeline::new();
        let b = shift(&mut pipeline);

        let before = pipeline.get_node(b).unwrap().modified();
        pipeline.set_parameter(b, "scale", 2.0).unwrap();
        let after = pipeline.get_node(b).unwrap().modified();
        assert!(after > before);

        // Same value again changes nothing.
        pipeline.set_parameter(b, "scale", 2.0).unwrap();
        assert_eq!(pipeline.get_node(b).unwrap().modified(), after);
        assert_eq!(pipeline.get_parameter(b, "scale").unwrap(), Value::Float(2.0));

        let err = pipeline.set_parameter(b, "nonexistent", 1.0).unwrap_err();
        assert!(matches!(err, GraphError::InvalidParameter { .. }));
        let err = pipeline.set_parameter(b, "scale", "big").unwrap_err();
        assert!(matches!(err, GraphError::InvalidParameter { .. }));
    }

    #[test]
    fn test_remove_node_unbinds_consumers() {
        let mut pipeline = Pipeline::new();
        let a = source(&mut pipeline);
        let b = shift(&mut pipeline);
        pipeline.connect(a, 0, b, 0).unwrap();
        let held = pipeline.output(a, 0).unwrap();

        pipeline.remove_node(a).unwrap();
        assert!(pipeline.input(b, 0).unwrap().is_none());
        assert_eq!(pipeline.connection_count(), 0);
        assert!(held.source().is_none());
    }

    #[test]
    fn test_upstream_downstream() {
        let mut pipeline = Pipeline::new();

        let a = source(&mut pipeline);
        let b = shift(&mut pipeline);
        let c = pipeline.add_filter(Box::new(Add::<u8>::new()));

        pipeline.connect(a, 0, b, 0).unwrap();
        pipeline.connect(a, 0, c, "first").unwrap();
        pipeline.connect(b, 0, c, "second").unwrap();

        let downstream = pipeline.get_downstream(a);
        assert_eq!(downstream.len(), 2);
        assert!(downstream.contains(&b));
        assert!(downstream.contains(&c));

        let upstream = pipeline.get_upstream(c);
        assert_eq!(upstream.len(), 2);

        assert_eq!(pipeline.get_source_nodes(), vec![a]);
        assert_eq!(pipeline.get_sink_nodes(), vec![c]);
    }
}
