//! Batching and prefetch feed
//!
//! Groups decoded examples into fixed-size batches and pushes them into
//! the bounded prefetch channel under backpressure. Without a batch size,
//! examples flow through as singleton batches.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::backpressure::BackpressureController;
use super::shutdown::ShutdownListener;
use crate::decode::Example;
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use std::sync::Arc;

/// A batch of decoded examples ready for a training step
#[derive(Debug, Clone, Default)]
pub struct ExampleBatch {
    examples: Vec<Example>,
}

impl ExampleBatch {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Number of examples in the batch
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Borrow the examples
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Consume the batch
    pub fn into_examples(self) -> Vec<Example> {
        self.examples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> {
        self.examples.iter()
    }
}

/// Spawn the batcher feeding the prefetch channel
pub(crate) fn spawn_batcher(
    mut input: mpsc::Receiver<Result<Example>>,
    batch_size: Option<usize>,
    drop_remainder: bool,
    backpressure: BackpressureController,
    metrics: Arc<PipelineMetrics>,
    prefetch_batches: usize,
    mut stop: ShutdownListener,
) -> (mpsc::Receiver<Result<ExampleBatch>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(prefetch_batches.max(1));
    let handle = tokio::spawn(async move {
        let target = batch_size.unwrap_or(1);
        let mut pending: Vec<Example> = Vec::with_capacity(target);

        while let Some(item) = input.recv().await {
            let out = match item {
                Ok(example) => {
                    pending.push(example);
                    if pending.len() < target {
                        continue;
                    }
                    Ok(ExampleBatch::new(std::mem::replace(
                        &mut pending,
                        Vec::with_capacity(target),
                    )))
                }
                Err(e) => Err(e),
            };
            // A consumer that stopped releasing slots never will again;
            // shutdown must not wait on it
            tokio::select! {
                _ = stop.triggered() => {
                    debug!("batcher stopping on shutdown");
                    return;
                }
                _ = backpressure.acquire() => {}
            }
            if out.is_ok() {
                metrics.batches_produced.inc();
            }
            metrics.prefetch_depth.inc();
            if tx.send(out).await.is_err() {
                return;
            }
        }

        if !pending.is_empty() {
            if batch_size.is_some() && drop_remainder {
                debug!("dropping {} remainder examples", pending.len());
            } else {
                let batch = ExampleBatch::new(pending);
                tokio::select! {
                    _ = stop.triggered() => return,
                    _ = backpressure.acquire() => {}
                }
                metrics.batches_produced.inc();
                metrics.prefetch_depth.inc();
                let _ = tx.send(Ok(batch)).await;
            }
        }
        debug!("batcher finished");
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Feature;

    fn example(i: i64) -> Example {
        let mut ex = Example::new();
        ex.insert("index", Feature::Int64List(vec![i]));
        ex
    }

    async fn run_batcher(
        count: i64,
        batch_size: Option<usize>,
        drop_remainder: bool,
    ) -> Vec<ExampleBatch> {
        let (in_tx, in_rx) = mpsc::channel(count.max(1) as usize);
        for i in 0..count {
            in_tx.send(Ok(example(i))).await.unwrap();
        }
        drop(in_tx);

        let backpressure = BackpressureController::new(64);
        let metrics = Arc::new(PipelineMetrics::new());
        let shutdown = crate::pipeline::shutdown::ShutdownSignal::new();
        let (mut rx, handle) = spawn_batcher(
            in_rx,
            batch_size,
            drop_remainder,
            backpressure.clone(),
            metrics,
            64,
            shutdown.listen(),
        );

        let mut batches = Vec::new();
        while let Some(item) = rx.recv().await {
            backpressure.record_consumption();
            batches.push(item.unwrap());
        }
        handle.await.unwrap();
        drop(shutdown);
        batches
    }

    #[tokio::test]
    async fn test_full_batches_with_drop_remainder() {
        let batches = run_batcher(10, Some(4), true).await;
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 4));
    }

    #[tokio::test]
    async fn test_remainder_kept_when_configured() {
        let batches = run_batcher(10, Some(4), false).await;
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 2);
    }

    #[tokio::test]
    async fn test_unbatched_passes_singletons() {
        let batches = run_batcher(5, None, true).await;
        assert_eq!(batches.len(), 5);
        assert!(batches.iter().all(|b| b.len() == 1));
    }
}
