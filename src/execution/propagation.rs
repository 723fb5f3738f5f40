//! The information and requested-region passes of an update.
//!
//! An [`UpdatePlan`] stages everything the two metadata passes compute for
//! the dependency closure of a target: output information, the regions each
//! output must hold, the regions each input is read over and the pipeline
//! time of every node. Nothing in the pipeline changes until the plan is
//! committed, so a structural or region error leaves buffers and metadata as
//! they were.

use crate::core::context::{InformationContext, Parameters, RegionContext};
use crate::core::data::DataInformation;
use crate::core::error::{GraphError, NodeId, RegionError, StrataError, StrataResult};
use crate::core::region::Region;
use crate::core::time::ModifiedTime;
use crate::graph::structure::Pipeline;
use crate::graph::topology::TopologyAnalyzer;
use log::trace;
use std::collections::{HashMap, HashSet};

/// Staged state of one node.
#[derive(Debug)]
pub(crate) struct NodePlan {
    pub params: Parameters,
    pub input_information: Vec<Option<DataInformation>>,
    pub output_information: Vec<DataInformation>,
    pub output_requests: Vec<Region>,
    pub input_requests: Vec<Option<Region>>,
    /// Latest change anywhere upstream of and including this node.
    pub pipeline_time: ModifiedTime,
}

/// Nodes an update executes and nodes it leaves alone.
#[derive(Debug, Default)]
pub(crate) struct Schedule {
    /// Nodes to execute, in execution order.
    pub run: Vec<NodeId>,
    /// Nodes of the closure that keep their current data.
    pub skipped: Vec<NodeId>,
}

/// Staged result of the metadata passes for one target.
#[derive(Debug)]
pub(crate) struct UpdatePlan {
    target: NodeId,
    order: Vec<NodeId>,
    nodes: HashMap<NodeId, NodePlan>,
}

impl UpdatePlan {
    /// Run the information pass over the dependency closure of `target`.
    pub fn information(pipeline: &Pipeline, target: NodeId) -> StrataResult<Self> {
        let order = TopologyAnalyzer::new(pipeline).dependency_order(target)?;
        let mut nodes: HashMap<NodeId, NodePlan> = HashMap::with_capacity(order.len());

        for &id in &order {
            let node = pipeline.get_node(id)?;
            let metadata = node.metadata();
            let params = node.resolved_parameters();
            let mut pipeline_time = node.modified();
            let mut inputs = Vec::with_capacity(metadata.inputs.len());

            for (definition, binding) in metadata.inputs.iter().zip(node.inputs()) {
                let Some(handle) = binding else {
                    if !definition.optional {
                        return Err(GraphError::MissingInput {
                            node_id: id,
                            slot: definition.name.clone(),
                        }
                        .into());
                    }
                    inputs.push(None);
                    continue;
                };

                let (source, stored, modified) = {
                    let object = handle.read();
                    (object.source(), object.information().cloned(), object.modified())
                };
                pipeline_time = pipeline_time.max(modified);

                let staged = source.and_then(|src| nodes.get(&src.node_id).map(|p| (src, p)));
                let information = match staged {
                    Some((src, producer)) => {
                        pipeline_time = pipeline_time.max(producer.pipeline_time);
                        producer.output_information.get(src.index).cloned()
                    }
                    None => stored,
                };
                let information = information.ok_or_else(|| GraphError::InvalidSlot {
                    node_id: id,
                    slot: definition.name.clone(),
                    reason: "bound data carries no information".to_string(),
                })?;
                if !definition.kind.accepts(information.kind) {
                    return Err(GraphError::SlotTypeMismatch {
                        node_id: id,
                        slot: definition.name.clone(),
                        expected: definition.kind,
                        got: information.kind,
                    }
                    .into());
                }
                inputs.push(Some(information));
            }

            let output_information = {
                let input_names = metadata.input_names().into_iter().map(String::from).collect();
                let output_kinds = metadata.outputs.iter().map(|o| o.kind).collect();
                let mut ctx =
                    InformationContext::new(&params, input_names, inputs.clone(), output_kinds);
                node.filter().generate_output_information(&mut ctx)?;
                ctx.into_outputs()?
            };
            trace!("Information of node {}: {:?}", id, output_information);

            let output_count = output_information.len();
            nodes.insert(
                id,
                NodePlan {
                    params,
                    input_requests: vec![None; inputs.len()],
                    input_information: inputs,
                    output_information,
                    output_requests: Vec::with_capacity(output_count),
                    pipeline_time,
                },
            );
        }

        Ok(Self {
            target,
            order,
            nodes,
        })
    }

    /// Run the requested-region pass.
    ///
    /// `wanted` holds one entry per output of the target: an explicit
    /// region, or `None` for the pinned region of the output if any and its
    /// largest possible region otherwise. Outputs no consumer asks for get
    /// the same default.
    pub fn propagate_requests(
        &mut self,
        pipeline: &Pipeline,
        wanted: &[Option<Region>],
    ) -> StrataResult<()> {
        let mut pending: HashMap<(NodeId, usize), Region> = HashMap::new();
        for (output, region) in wanted.iter().enumerate() {
            if let Some(region) = region {
                pending.insert((self.target, output), region.clone());
            }
        }

        for &id in self.order.iter().rev() {
            let node = pipeline.get_node(id)?;
            let plan = self.node(id)?;

            let requests: Vec<Region> = node
                .outputs()
                .iter()
                .zip(&plan.output_information)
                .enumerate()
                .map(|(output, (handle, information))| {
                    pending.remove(&(id, output)).unwrap_or_else(|| {
                        handle
                            .read()
                            .pinned_region()
                            .cloned()
                            .unwrap_or_else(|| information.largest_region.clone())
                    })
                })
                .collect();

            let mut ctx = RegionContext::new(
                &plan.params,
                &plan.output_information,
                requests,
                plan.input_information.clone(),
            );
            node.filter().enlarge_output_requested_region(&mut ctx)?;
            for (output, information) in plan.output_information.iter().enumerate() {
                let requested = ctx.output_requested_region(output);
                if !information.largest_region.contains(requested) {
                    return Err(RegionError::OutOfBounds {
                        node_id: id,
                        requested: requested.clone(),
                        largest: information.largest_region.clone(),
                    }
                    .into());
                }
            }
            node.filter().generate_input_requested_region(&mut ctx)?;
            let (output_requests, raw_input_requests) = ctx.into_parts();

            let mut input_requests = Vec::with_capacity(raw_input_requests.len());
            for (slot, request) in raw_input_requests.into_iter().enumerate() {
                let (Some(request), Some(information)) =
                    (request, plan.input_information[slot].as_ref())
                else {
                    input_requests.push(None);
                    continue;
                };
                let largest = &information.largest_region;
                let mut cropped = request.clone();
                if !cropped.crop(largest) && !request.is_empty() {
                    return Err(RegionError::OutOfBounds {
                        node_id: id,
                        requested: request,
                        largest: largest.clone(),
                    }
                    .into());
                }

                let source = node.inputs()[slot].as_ref().and_then(|h| h.read().source());
                if let Some(src) = source.filter(|s| self.nodes.contains_key(&s.node_id)) {
                    let key = (src.node_id, src.index);
                    let merged = match pending.remove(&key) {
                        Some(existing) => existing.union_bounds(&cropped),
                        None => cropped.clone(),
                    };
                    pending.insert(key, merged);
                }
                input_requests.push(Some(cropped));
            }

            trace!(
                "Node {} produces {:?} and reads {:?}",
                id,
                output_requests,
                input_requests
            );
            let Some(plan) = self.nodes.get_mut(&id) else {
                continue;
            };
            plan.output_requests = output_requests;
            plan.input_requests = input_requests;
        }
        Ok(())
    }

    /// Decide which nodes must execute, walking back from the target.
    ///
    /// A node is considered only if the target or a consumer that executes
    /// needs it. It executes when it never ran, when anything upstream of it
    /// changed after its last execution, or when an output buffer does not
    /// hold the region now requested of it.
    pub fn schedule(&self, pipeline: &Pipeline) -> StrataResult<Schedule> {
        let mut needed: HashSet<NodeId> = HashSet::from([self.target]);
        let mut run: HashSet<NodeId> = HashSet::new();

        for &id in self.order.iter().rev() {
            if !needed.contains(&id) {
                continue;
            }
            let node = pipeline.get_node(id)?;
            let plan = self.node(id)?;
            let last = node.last_executed();
            let stale = last.is_never()
                || plan.pipeline_time > last
                || node
                    .outputs()
                    .iter()
                    .zip(&plan.output_requests)
                    .any(|(handle, request)| !handle.read().buffered_contains(request));
            if !stale {
                continue;
            }
            run.insert(id);
            for handle in node.inputs().iter().flatten() {
                if let Some(src) = handle.read().source() {
                    needed.insert(src.node_id);
                }
            }
        }

        let (run, skipped) = self.order.iter().partition(|id| run.contains(*id));
        Ok(Schedule { run, skipped })
    }

    /// Publish the staged information and requested regions on the data
    /// objects of the closure.
    pub fn commit(&self, pipeline: &Pipeline) -> StrataResult<()> {
        for &id in &self.order {
            let node = pipeline.get_node(id)?;
            let plan = self.node(id)?;
            for ((handle, information), request) in node
                .outputs()
                .iter()
                .zip(&plan.output_information)
                .zip(&plan.output_requests)
            {
                let mut object = handle.write();
                object.set_information(information.clone());
                object.set_requested_region(request.clone());
            }
        }
        Ok(())
    }

    /// Number of nodes in the closure.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Staged state of a node of the closure.
    pub fn node(&self, id: NodeId) -> StrataResult<&NodePlan> {
        self.nodes
            .get(&id)
            .ok_or_else(|| StrataError::Other(format!("node {} is not part of the update", id)))
    }

    /// Staged information of an output of the target.
    pub fn target_information(&self, output: usize) -> Option<&DataInformation> {
        self.nodes.get(&self.target)?.output_information.get(output)
    }

    /// Staged request of an output of the target.
    pub fn target_request(&self, output: usize) -> Option<&Region> {
        self.nodes.get(&self.target)?.output_requests.get(output)
    }
}
