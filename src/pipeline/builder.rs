//! Pipeline assembly
//!
//! Wires the configured stages together: plan files, spawn the feeder and
//! readers, then shuffle, sample, decode, batch, and prefetch.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::backpressure::BackpressureController;
use super::batch::spawn_batcher;
use super::files::plan_files;
use super::interleave::RecordStream;
use super::loader::InputPipeline;
use super::map::spawn_map_stage;
use super::shuffle::spawn_shuffle_stage;
use super::shutdown::ShutdownSignal;
use crate::config::InputReaderConfig;
use crate::decode::{Example, JsonExampleDecoder, LabelMap, RecordDecoder, TransformFn};
use crate::error::Result;
use crate::metrics::PipelineMetrics;

/// Builds an [`InputPipeline`] from an [`InputReaderConfig`]
pub struct PipelineBuilder {
    config: InputReaderConfig,
    batch_size: Option<usize>,
    decoder: Option<Arc<dyn RecordDecoder>>,
    transform: Option<TransformFn>,
}

impl PipelineBuilder {
    pub fn new(config: InputReaderConfig) -> Self {
        Self {
            config,
            batch_size: None,
            decoder: None,
            transform: None,
        }
    }

    /// Deliver fixed-size batches instead of single examples
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Use a custom record decoder instead of the JSON reference decoder
    pub fn decoder(mut self, decoder: Arc<dyn RecordDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Apply a transform to every decoded example
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Example) -> Result<Example> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Validate the configuration and spawn the pipeline stages
    ///
    /// Must be called within a Tokio runtime.
    pub fn build(self) -> Result<InputPipeline> {
        let Self {
            config,
            batch_size,
            decoder,
            transform,
        } = self;

        config.validate()?;
        if let Some(b) = batch_size {
            if b == 0 {
                return Err(crate::error::FeedError::InvalidConfig {
                    reason: "batch_size must be at least 1".into(),
                });
            }
        }

        // The label map is loaded before the first record is decoded
        let decoder: Arc<dyn RecordDecoder> = match decoder {
            Some(d) => d,
            None => Arc::new(default_decoder(&config)?),
        };

        let plan = plan_files(&config)?;
        debug!(
            files = plan.files.len(),
            readers = plan.num_readers,
            "building input pipeline"
        );

        let metrics = Arc::new(PipelineMetrics::new());
        let shutdown = ShutdownSignal::new();
        let stream =
            RecordStream::spawn_with_plan(plan, &config, metrics.clone(), shutdown.clone());
        let (mut raw_rx, mut handles, _) = stream.into_parts();
        let raw_cap = raw_channel_cap(&config);

        if config.shuffle {
            let (rx, handle) = spawn_shuffle_stage(
                raw_rx,
                config.shuffle_buffer_size,
                config.seed,
                raw_cap,
            );
            raw_rx = rx;
            handles.push(handle);
        }

        if config.sample_1_of_n > 1 {
            let (tx, rx) = mpsc::channel(raw_cap);
            handles.push(spawn_sampler(raw_rx, tx, config.sample_1_of_n));
            raw_rx = rx;
        }

        let workers = config.parallel_map_calls(batch_size);
        let (decoded_rx, map_handles) = spawn_map_stage(
            raw_rx,
            decoder,
            transform,
            workers,
            !config.shuffle,
            metrics.clone(),
            (workers * 2).max(16),
        );
        handles.extend(map_handles);

        let backpressure = BackpressureController::new(config.num_prefetch_batches);
        let (batch_rx, batch_handle) = spawn_batcher(
            decoded_rx,
            batch_size,
            config.drop_remainder,
            backpressure.clone(),
            metrics.clone(),
            config.num_prefetch_batches,
            shutdown.listen(),
        );
        handles.push(batch_handle);

        Ok(InputPipeline::new(
            batch_rx,
            backpressure,
            metrics,
            shutdown,
            handles,
        ))
    }
}

fn default_decoder(config: &InputReaderConfig) -> Result<JsonExampleDecoder> {
    let decoder = JsonExampleDecoder::new();
    match &config.label_map_path {
        Some(path) => {
            let label_map = LabelMap::from_json_file(path, config.use_display_name)?;
            Ok(decoder.with_label_map(Arc::new(label_map), config.class_feature_key.clone()))
        }
        None => Ok(decoder),
    }
}

fn raw_channel_cap(config: &InputReaderConfig) -> usize {
    (config.num_readers * config.read_block_length).clamp(16, 4096)
}

/// Keeps every n-th record, dropping the rest before decode
fn spawn_sampler(
    mut input: mpsc::Receiver<Result<Bytes>>,
    output: mpsc::Sender<Result<Bytes>>,
    n: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut index = 0u64;
        while let Some(item) = input.recv().await {
            match item {
                Ok(record) => {
                    let keep = index % n == 0;
                    index += 1;
                    if keep && output.send(Ok(record)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    if output.send(Err(e)).await.is_err() {
                        return;
                    }
                }
            }
        }
        debug!("sampler finished, kept 1 of {} from {} records", n, index);
    })
}
