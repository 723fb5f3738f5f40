//! Progress reporting and cooperative cancellation for updates.

use crate::core::error::NodeId;
use crate::core::region::Region;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// An update has started.
    Started {
        total_nodes: usize,
    },
    /// A node has started generating data.
    NodeStarted {
        node_id: NodeId,
        node_name: String,
        index: usize,
        total: usize,
    },
    /// A node has finished generating data.
    NodeCompleted {
        node_id: NodeId,
        duration_ms: u64,
        index: usize,
        total: usize,
    },
    /// A node was not executed.
    NodeSkipped {
        node_id: NodeId,
        reason: SkipReason,
    },
    /// A streamed update has started a piece.
    PieceStarted {
        piece: usize,
        pieces: usize,
        region: Region,
    },
    /// A streamed update has finished a piece.
    PieceCompleted {
        piece: usize,
        pieces: usize,
    },
    /// Overall progress percentage.
    Progress {
        percent: f32,
        elapsed_ms: u64,
        estimated_remaining_ms: Option<u64>,
    },
    /// The update has completed.
    Completed {
        total_duration_ms: u64,
        nodes_processed: usize,
        nodes_skipped: usize,
    },
    /// The update was cancelled.
    Cancelled,
    /// An error occurred.
    Error {
        node_id: Option<NodeId>,
        message: String,
    },
}

/// Reason why a node was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing changed since the last execution and the buffers hold the
    /// requested regions.
    UpToDate,
}

/// Callback type for progress updates.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// A shared flag requesting that an update stop at the next node or piece.
///
/// Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Tracks the progress of one update and carries its cancellation token.
pub struct ProgressTracker {
    /// Total number of nodes involved.
    total_nodes: usize,
    /// Number of nodes executed.
    completed_nodes: AtomicU64,
    /// Number of nodes skipped.
    skipped_nodes: AtomicU64,
    cancellation: CancellationToken,
    /// Start time.
    start_time: Option<Instant>,
    /// Progress callback.
    callback: Option<ProgressCallback>,
    /// Node execution times for estimation.
    node_times: parking_lot::Mutex<Vec<u64>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_nodes: usize) -> Self {
        Self {
            total_nodes,
            completed_nodes: AtomicU64::new(0),
            skipped_nodes: AtomicU64::new(0),
            cancellation: CancellationToken::new(),
            start_time: None,
            callback: None,
            node_times: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Share an existing cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The token checked by this update.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Start tracking.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.send_update(ProgressUpdate::Started {
            total_nodes: self.total_nodes,
        });
    }

    /// Report that a node has started.
    pub fn node_started(&self, node_id: NodeId, node_name: String) {
        let completed = self.completed_nodes.load(Ordering::Relaxed) as usize;
        self.send_update(ProgressUpdate::NodeStarted {
            node_id,
            node_name,
            index: completed,
            total: self.total_nodes,
        });
    }

    /// Report that a node has completed.
    pub fn node_completed(&self, node_id: NodeId, duration_ms: u64) {
        let completed = self.completed_nodes.fetch_add(1, Ordering::Relaxed) as usize + 1;
        self.node_times.lock().push(duration_ms);

        self.send_update(ProgressUpdate::NodeCompleted {
            node_id,
            duration_ms,
            index: completed,
            total: self.total_nodes,
        });
        self.send_progress_update();
    }

    /// Report that a node was skipped.
    pub fn node_skipped(&self, node_id: NodeId, reason: SkipReason) {
        self.skipped_nodes.fetch_add(1, Ordering::Relaxed);
        self.send_update(ProgressUpdate::NodeSkipped { node_id, reason });
    }

    /// Report that a streamed piece has started.
    pub fn piece_started(&self, piece: usize, pieces: usize, region: &Region) {
        self.send_update(ProgressUpdate::PieceStarted {
            piece,
            pieces,
            region: region.clone(),
        });
    }

    /// Report that a streamed piece has completed.
    pub fn piece_completed(&self, piece: usize, pieces: usize) {
        self.send_update(ProgressUpdate::PieceCompleted { piece, pieces });
    }

    /// Check if the update should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Report that the update stopped on a cancellation request.
    pub fn report_cancelled(&self) {
        self.send_update(ProgressUpdate::Cancelled);
    }

    /// Report an error.
    pub fn report_error(&self, node_id: Option<NodeId>, message: String) {
        self.send_update(ProgressUpdate::Error { node_id, message });
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            nodes_processed: self.completed_nodes.load(Ordering::Relaxed) as usize,
            nodes_skipped: self.skipped_nodes.load(Ordering::Relaxed) as usize,
        });
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_nodes == 0 {
            return 100.0;
        }
        let completed = self.completed_nodes.load(Ordering::Relaxed);
        let skipped = self.skipped_nodes.load(Ordering::Relaxed);
        ((completed + skipped) as f32 / self.total_nodes as f32 * 100.0).min(100.0)
    }

    /// Estimate remaining time in milliseconds.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let times = self.node_times.lock();
        if times.is_empty() {
            return None;
        }

        let avg_time: u64 = times.iter().sum::<u64>() / times.len() as u64;
        let done = self.completed_nodes.load(Ordering::Relaxed)
            + self.skipped_nodes.load(Ordering::Relaxed);
        let remaining = (self.total_nodes as u64).saturating_sub(done);

        Some(avg_time * remaining)
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }

    fn send_progress_update(&self) {
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.elapsed_ms(),
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}
