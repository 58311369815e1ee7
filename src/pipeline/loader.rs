//! Pipeline consumer handle
//!
//! The training loop's interface: pull ready batches, inspect progress,
//! shut the stages down.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::backpressure::BackpressureController;
use super::batch::ExampleBatch;
use super::shutdown::ShutdownSignal;
use crate::error::{FeedError, Result};
use crate::metrics::PipelineMetrics;

/// A running input pipeline
///
/// Created by [`crate::pipeline::PipelineBuilder::build`]. Batches are
/// decoded and buffered ahead of consumption; this handle only receives.
#[derive(Debug)]
pub struct InputPipeline {
    receiver: mpsc::Receiver<Result<ExampleBatch>>,
    backpressure: BackpressureController,
    metrics: Arc<PipelineMetrics>,
    shutdown: ShutdownSignal,
    handles: Vec<JoinHandle<()>>,
    batches_delivered: u64,
    started_at: DateTime<Utc>,
}

impl InputPipeline {
    pub(crate) fn new(
        receiver: mpsc::Receiver<Result<ExampleBatch>>,
        backpressure: BackpressureController,
        metrics: Arc<PipelineMetrics>,
        shutdown: ShutdownSignal,
        handles: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            receiver,
            backpressure,
            metrics,
            shutdown,
            handles,
            batches_delivered: 0,
            started_at: Utc::now(),
        }
    }

    /// Get the next batch
    ///
    /// This is the hot path, called every training step. Returns
    /// [`FeedError::Exhausted`] once the final epoch has drained; errors
    /// from individual records surface here without ending the stream.
    pub async fn next_batch(&mut self) -> Result<ExampleBatch> {
        match self.receiver.recv().await {
            Some(item) => {
                self.backpressure.record_consumption();
                self.metrics.prefetch_depth.dec();
                let batch = item?;
                self.batches_delivered += 1;
                Ok(batch)
            }
            None => Err(FeedError::Exhausted),
        }
    }

    /// Try to get a batch without waiting
    pub fn try_next_batch(&mut self) -> Option<Result<ExampleBatch>> {
        match self.receiver.try_recv() {
            Ok(item) => {
                self.backpressure.record_consumption();
                self.metrics.prefetch_depth.dec();
                match item {
                    Ok(batch) => {
                        self.batches_delivered += 1;
                        Some(Ok(batch))
                    }
                    Err(e) => Some(Err(e)),
                }
            }
            Err(_) => None,
        }
    }

    /// Total batches delivered to the caller
    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered
    }

    /// Batches buffered ahead of the caller
    pub fn pending_count(&self) -> usize {
        self.backpressure.pending_count()
    }

    /// Pipeline metrics, shared with the stage tasks
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Snapshot of delivery progress
    pub fn state(&self) -> PipelineState {
        PipelineState {
            batches_delivered: self.batches_delivered,
            records_read: self.metrics.records_read.get(),
            records_decoded: self.metrics.records_decoded.get(),
            started_at: self.started_at,
            captured_at: Utc::now(),
        }
    }

    /// Stop all stages and wait for them to exit
    pub async fn shutdown(self) {
        let Self {
            receiver,
            shutdown,
            mut handles,
            batches_delivered,
            ..
        } = self;
        shutdown.trigger();
        drop(receiver);
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!(
            "input pipeline shutdown complete, delivered {} batches",
            batches_delivered
        );
    }
}

/// Serializable delivery-progress snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub batches_delivered: u64,
    pub records_read: u64,
    pub records_decoded: u64,
    pub started_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
}
