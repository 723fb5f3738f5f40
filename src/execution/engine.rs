//! Update engine implementation.
//!
//! The engine brings an output of a pipeline node up to date. It runs the
//! information and requested-region passes over the dependency closure of
//! the node, decides which nodes are stale, then executes them in
//! topological order. Streamed updates repeat this per piece of the target
//! region and assemble the pieces into one buffer.

use crate::core::context::GenerateContext;
use crate::core::data::Payload;
use crate::core::error::{
    ExecutionError, GraphError, NodeId, RegionError, StrataError, StrataResult,
};
use crate::core::region::Region;
use crate::core::streaming::{MemoryTracker, StreamingConfig};
use crate::core::time::ModifiedTime;
use crate::execution::progress::{
    CancellationToken, ProgressCallback, ProgressTracker, ProgressUpdate, SkipReason,
};
use crate::execution::propagation::{Schedule, UpdatePlan};
use crate::graph::structure::Pipeline;
use crate::graph::topology::TopologyAnalyzer;
use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Update options.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Whether to execute independent nodes of a batch in parallel.
    pub parallel: bool,
    /// Maximum number of parallel threads (0 = rayon's global pool).
    pub max_threads: usize,
    /// Settings of streamed updates.
    pub streaming: StreamingConfig,
    /// Progress callback.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
    /// Token that stops the update at the next node or piece.
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("parallel", &self.parallel)
            .field("max_threads", &self.max_threads)
            .field("streaming", &self.streaming)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl ExecutionOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set maximum threads.
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    /// Set the streaming configuration.
    pub fn with_streaming(mut self, streaming: StreamingConfig) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Set the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Parse options from TOML.
    pub fn from_toml_str(s: &str) -> StrataResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read options from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> StrataResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Outcome of an update.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    /// Node that was updated.
    pub target: NodeId,
    /// Outputs brought up to date and the regions they now hold.
    pub outputs: Vec<(usize, Region)>,
    /// Execution statistics.
    pub stats: ExecutionStats,
}

impl UpdateReport {
    /// Region now held by an output of the target.
    pub fn region(&self, output: usize) -> Option<&Region> {
        self.outputs
            .iter()
            .find(|(index, _)| *index == output)
            .map(|(_, region)| region)
    }
}

/// Execution statistics.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    /// Nodes executed, in execution order. Streamed updates list a node once
    /// per piece it ran for.
    pub executed: Vec<NodeId>,
    /// Nodes of the closure that kept their data.
    pub skipped: Vec<NodeId>,
    /// Buffers that needed new storage.
    pub allocations: usize,
    /// Number of passes the target region was produced in.
    pub pieces: usize,
    /// Largest output footprint of a single piece in bytes.
    pub peak_piece_bytes: usize,
    /// Total update time.
    pub total_duration: Duration,
}

impl ExecutionStats {
    /// Number of node executions.
    pub fn nodes_executed(&self) -> usize {
        self.executed.len()
    }

    /// Number of times `node` executed.
    pub fn executions_of(&self, node: NodeId) -> usize {
        self.executed.iter().filter(|&&id| id == node).count()
    }

    /// Fold the statistics of a piece into these.
    pub fn merge(&mut self, other: &ExecutionStats) {
        self.executed.extend_from_slice(&other.executed);
        self.skipped.extend_from_slice(&other.skipped);
        self.allocations += other.allocations;
        self.pieces += other.pieces;
        self.peak_piece_bytes = self.peak_piece_bytes.max(other.peak_piece_bytes);
    }
}

struct NodeOutcome {
    generated_at: ModifiedTime,
    allocations: usize,
}

/// The update engine.
#[derive(Debug, Clone, Default)]
pub struct UpdateEngine {
    options: ExecutionOptions,
}

impl UpdateEngine {
    /// Create an engine with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given options.
    pub fn with_options(options: ExecutionOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Bring every output of `node` up to date over its pinned or largest
    /// possible region.
    pub fn update(&self, pipeline: &mut Pipeline, node: NodeId) -> StrataResult<UpdateReport> {
        let count = pipeline.get_node(node)?.outputs().len();
        self.run(pipeline, node, vec![None; count], (0..count).collect())
    }

    /// Bring one output up to date over its pinned or largest possible region.
    pub fn update_output(
        &self,
        pipeline: &mut Pipeline,
        node: NodeId,
        output: usize,
    ) -> StrataResult<UpdateReport> {
        let count = Self::check_output(pipeline, node, output)?;
        self.run(pipeline, node, vec![None; count], vec![output])
    }

    /// Bring `region` of one output up to date.
    pub fn update_region(
        &self,
        pipeline: &mut Pipeline,
        node: NodeId,
        output: usize,
        region: Region,
    ) -> StrataResult<UpdateReport> {
        let count = Self::check_output(pipeline, node, output)?;
        let mut wanted = vec![None; count];
        wanted[output] = Some(region);
        self.run(pipeline, node, wanted, vec![output])
    }

    /// Clear the pinned regions of `node` and bring every output up to date
    /// in full.
    pub fn update_largest_possible_region(
        &self,
        pipeline: &mut Pipeline,
        node: NodeId,
    ) -> StrataResult<UpdateReport> {
        pipeline.clear_requested_region(node)?;
        self.update(pipeline, node)
    }

    /// Produce one output in several passes, each over a piece of its
    /// pinned or largest possible region.
    ///
    /// With `pieces` unset the streaming configuration decides the count.
    /// Once done the output holds the whole region.
    pub fn update_streamed(
        &self,
        pipeline: &mut Pipeline,
        node: NodeId,
        output: usize,
        pieces: Option<usize>,
    ) -> StrataResult<UpdateReport> {
        let started = Instant::now();
        let count = Self::check_output(pipeline, node, output)?;

        let mut probe = UpdatePlan::information(pipeline, node)?;
        let mut wanted = vec![None; count];
        probe.propagate_requests(pipeline, &wanted)?;
        let (region, element_size) = match (probe.target_request(output), probe.target_information(output)) {
            (Some(region), Some(information)) => (region.clone(), information.kind.element_size()),
            _ => return Err(ExecutionError::OutputNotSet { node_id: node, output }.into()),
        };

        let schedule = probe.schedule(pipeline)?;
        if schedule.run.is_empty() {
            debug!("Streamed update of {} is up to date", node);
            let stats = ExecutionStats {
                skipped: schedule.skipped,
                total_duration: started.elapsed(),
                ..ExecutionStats::default()
            };
            return Ok(UpdateReport {
                target: node,
                outputs: vec![(output, region)],
                stats,
            });
        }

        let streaming = &self.options.streaming;
        let count = pieces.map_or_else(|| streaming.pieces_for(&region, element_size), |n| n.max(1));
        let parts = streaming.split(&region, count);
        if parts.len() <= 1 {
            wanted[output] = Some(region);
            let mut report = self.run(pipeline, node, wanted, vec![output])?;
            report.stats.total_duration = started.elapsed();
            return Ok(report);
        }
        debug!("Streaming {} of node {} in {} pieces", region, node, parts.len());

        let progress = self.tracker(parts.len());
        let limit = if streaming.memory_limit == 0 {
            usize::MAX
        } else {
            streaming.memory_limit
        };
        let memory = MemoryTracker::new(limit);
        let handle = pipeline.output(node, output)?;
        let mut accumulator: Option<Box<dyn Payload>> = None;
        let mut stats = ExecutionStats::default();

        for (index, piece) in parts.iter().enumerate() {
            if progress.is_cancelled() {
                progress.report_cancelled();
                return Err(ExecutionError::Cancelled.into());
            }
            progress.piece_started(index, parts.len(), piece);

            let bytes = piece.number_of_pixels().saturating_mul(element_size);
            let claimed = memory.try_allocate(bytes);
            if !claimed {
                warn!(
                    "Piece {} of node {} needs {} bytes, above the limit of {}",
                    piece,
                    node,
                    bytes,
                    memory.limit()
                );
            }

            wanted[output] = Some(piece.clone());
            let report = self.run(pipeline, node, wanted.clone(), vec![output])?;
            stats.merge(&report.stats);

            {
                let object = handle.read();
                let payload = object
                    .payload()
                    .ok_or(ExecutionError::OutputNotSet { node_id: node, output })?;
                if accumulator.is_none() {
                    let mut buffer = payload.empty_like();
                    buffer
                        .allocate(&region)
                        .map_err(|error| ExecutionError::AllocationFailure {
                            node_id: node,
                            output,
                            error,
                        })?;
                    stats.allocations += 1;
                    accumulator = Some(buffer);
                }
                if let Some(buffer) = accumulator.as_mut() {
                    buffer.paste(payload, piece).map_err(|error| {
                        ExecutionError::ComputationFailure {
                            node_id: node,
                            region: Some(piece.clone()),
                            error,
                        }
                    })?;
                }
            }

            stats.peak_piece_bytes = stats.peak_piece_bytes.max(bytes);
            if claimed {
                memory.release(bytes);
            }
            progress.piece_completed(index, parts.len());
        }

        if let Some(buffer) = accumulator {
            let mut object = handle.write();
            object.install_payload(buffer);
            object.set_requested_region(region.clone());
        }

        stats.pieces = parts.len();
        stats.total_duration = started.elapsed();
        debug!(
            "Streamed update of {} finished: {} execution(s) over {} pieces",
            node,
            stats.nodes_executed(),
            stats.pieces
        );
        Ok(UpdateReport {
            target: node,
            outputs: vec![(output, region)],
            stats,
        })
    }

    fn check_output(pipeline: &Pipeline, node: NodeId, output: usize) -> StrataResult<usize> {
        let count = pipeline.get_node(node)?.outputs().len();
        if output >= count {
            return Err(GraphError::InvalidSlot {
                node_id: node,
                slot: output.to_string(),
                reason: format!("node has {} output(s)", count),
            }
            .into());
        }
        Ok(count)
    }

    fn tracker(&self, total: usize) -> ProgressTracker {
        ProgressTracker::new(total)
            .with_callback(self.options.progress_callback.clone())
            .with_cancellation(self.options.cancellation.clone().unwrap_or_default())
    }

    /// One complete update: plan, commit, execute.
    fn run(
        &self,
        pipeline: &mut Pipeline,
        target: NodeId,
        wanted: Vec<Option<Region>>,
        reported: Vec<usize>,
    ) -> StrataResult<UpdateReport> {
        let started = Instant::now();

        let mut plan = UpdatePlan::information(pipeline, target)?;
        plan.propagate_requests(pipeline, &wanted)?;
        plan.commit(pipeline)?;
        let schedule = plan.schedule(pipeline)?;

        let mut tracker = self.tracker(plan.len());
        tracker.start();
        for &id in &schedule.skipped {
            trace!("Node {} is up to date", id);
            tracker.node_skipped(id, SkipReason::UpToDate);
        }

        let mut stats = ExecutionStats {
            skipped: schedule.skipped.clone(),
            pieces: 1,
            ..ExecutionStats::default()
        };
        if let Err(error) = self.execute(pipeline, &plan, &schedule, &tracker, &mut stats) {
            match &error {
                StrataError::Execution(ExecutionError::Cancelled) => tracker.report_cancelled(),
                other => tracker.report_error(other.node_id(), other.to_string()),
            }
            return Err(error);
        }

        let outputs: Vec<(usize, Region)> = reported
            .into_iter()
            .filter_map(|o| plan.target_request(o).map(|r| (o, r.clone())))
            .collect();
        stats.peak_piece_bytes = outputs
            .iter()
            .filter_map(|(o, r)| {
                plan.target_information(*o)
                    .map(|i| r.number_of_pixels().saturating_mul(i.kind.element_size()))
            })
            .sum();
        stats.total_duration = started.elapsed();
        tracker.complete();

        debug!(
            "Updated node {}: {} executed, {} skipped, {} allocation(s)",
            target,
            stats.nodes_executed(),
            stats.skipped.len(),
            stats.allocations
        );
        Ok(UpdateReport {
            target,
            outputs,
            stats,
        })
    }

    fn execute(
        &self,
        pipeline: &mut Pipeline,
        plan: &UpdatePlan,
        schedule: &Schedule,
        tracker: &ProgressTracker,
        stats: &mut ExecutionStats,
    ) -> StrataResult<()> {
        if schedule.run.is_empty() {
            return Ok(());
        }

        if !self.options.parallel {
            for &id in &schedule.run {
                let result = execute_node(pipeline, plan, id, tracker);
                record(pipeline, vec![(id, result)], stats)?;
            }
            return Ok(());
        }

        let batches = TopologyAnalyzer::new(pipeline).parallel_batches(&schedule.run);
        let pool = self.thread_pool()?;
        for batch in batches {
            let results = {
                let shared: &Pipeline = pipeline;
                let job = || {
                    batch
                        .par_iter()
                        .map(|&id| (id, execute_node(shared, plan, id, tracker)))
                        .collect::<Vec<_>>()
                };
                match &pool {
                    Some(pool) => pool.install(job),
                    None => job(),
                }
            };
            record(pipeline, results, stats)?;
        }
        Ok(())
    }

    fn thread_pool(&self) -> StrataResult<Option<rayon::ThreadPool>> {
        if self.options.max_threads == 0 {
            return Ok(None);
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.max_threads)
            .build()
            .map(Some)
            .map_err(|e| StrataError::Other(format!("cannot build thread pool: {}", e)))
    }
}

/// Allocate the outputs of a node and run its `generate_data`.
fn execute_node(
    pipeline: &Pipeline,
    plan: &UpdatePlan,
    id: NodeId,
    tracker: &ProgressTracker,
) -> StrataResult<NodeOutcome> {
    if tracker.is_cancelled() {
        return Err(ExecutionError::Cancelled.into());
    }
    let node = pipeline.get_node(id)?;
    let node_plan = plan.node(id)?;
    let metadata = node.metadata();

    tracker.node_started(id, node.display_name());
    trace!("Executing node {} ({})", id, metadata.id);
    let started = Instant::now();

    for (slot, (binding, request)) in node
        .inputs()
        .iter()
        .zip(&node_plan.input_requests)
        .enumerate()
    {
        if let (Some(handle), Some(request)) = (binding, request) {
            if !handle.read().buffered_contains(request) {
                return Err(RegionError::NotBuffered {
                    node_id: id,
                    slot: metadata.inputs[slot].name.clone(),
                    requested: request.clone(),
                }
                .into());
            }
        }
    }

    let mut allocations = 0;
    for (output, (handle, region)) in node
        .outputs()
        .iter()
        .zip(&node_plan.output_requests)
        .enumerate()
    {
        let grew = handle
            .write()
            .allocate(region)
            .map_err(|error| ExecutionError::AllocationFailure {
                node_id: id,
                output,
                error,
            })?;
        if grew {
            allocations += 1;
        }
    }

    let input_names = metadata.input_names().into_iter().map(String::from).collect();
    let mut ctx = GenerateContext::new(
        &node_plan.params,
        input_names,
        node.inputs(),
        node_plan.input_requests.clone(),
        node.outputs(),
        node_plan.output_requests.clone(),
        Some(tracker.cancellation()),
    );
    node.filter().generate_data(&mut ctx).map_err(|e| {
        match node_plan.output_requests.first() {
            Some(region) => e.with_region(region),
            None => e,
        }
    })?;

    let generated_at = ModifiedTime::tick();
    for handle in node.outputs() {
        handle.write().mark_generated(generated_at);
    }
    tracker.node_completed(id, started.elapsed().as_millis() as u64);
    Ok(NodeOutcome {
        generated_at,
        allocations,
    })
}

/// Stamp executed nodes and invalidate failed ones. Returns the first error.
fn record(
    pipeline: &mut Pipeline,
    results: Vec<(NodeId, StrataResult<NodeOutcome>)>,
    stats: &mut ExecutionStats,
) -> StrataResult<()> {
    let mut first_error = None;
    for (id, result) in results {
        let node = pipeline.get_node_mut(id)?;
        match result {
            Ok(outcome) => {
                node.mark_executed(outcome.generated_at);
                stats.executed.push(id);
                stats.allocations += outcome.allocations;
            }
            Err(error) => {
                warn!("Node {} failed: {}", id, error);
                node.invalidate();
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
