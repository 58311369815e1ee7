//! Sharded, shuffled, interleaved record reading
//!
//! A feeder task walks the file list for the configured number of epochs,
//! optionally shuffling filenames each pass. Reader tasks pull files and
//! interleave their records into one stream of raw payloads.
//!
//! With `shuffle` enabled the interleave is sloppy: records arrive in
//! whatever order the readers produce them. With `shuffle` disabled a
//! single task round-robins fixed-size blocks across the open files, so
//! the output order is a pure function of the file list.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::files::{plan_files, FilePlan};
use super::shutdown::{ShutdownListener, ShutdownSignal};
use crate::config::InputReaderConfig;
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::record::RecordFileReader;

/// Stream of raw (undecoded) record payloads
///
/// The reading half of a pipeline: sharding, filename shuffling, epoch
/// repetition, and parallel interleaved reads, with decode and batching
/// left to the caller.
pub struct RecordStream {
    receiver: mpsc::Receiver<Result<Bytes>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: ShutdownSignal,
}

/// Per-reader settings shared by both interleave modes
#[derive(Clone)]
struct ReadSettings {
    read_buffer_bytes: usize,
    max_record_bytes: usize,
    block_length: usize,
}

impl RecordStream {
    /// Plan files and spawn the read stages for `config`
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(config: &InputReaderConfig, metrics: Arc<PipelineMetrics>) -> Result<Self> {
        config.validate()?;
        let plan = plan_files(config)?;
        Ok(Self::spawn_with_plan(
            plan,
            config,
            metrics,
            ShutdownSignal::new(),
        ))
    }

    /// Spawn the read stages for an already-computed plan
    pub(crate) fn spawn_with_plan(
        plan: FilePlan,
        config: &InputReaderConfig,
        metrics: Arc<PipelineMetrics>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let num_readers = plan.num_readers.max(1);
        let settings = ReadSettings {
            read_buffer_bytes: config.read_buffer_bytes,
            max_record_bytes: config.max_record_bytes,
            block_length: config.read_block_length,
        };

        let (file_tx, file_rx) = mpsc::channel(num_readers * 2);
        let record_cap = (num_readers * config.read_block_length).clamp(16, 4096);
        let (record_tx, record_rx) = mpsc::channel(record_cap);

        let mut handles = Vec::with_capacity(num_readers + 1);
        handles.push(tokio::spawn(run_feeder(
            plan.files,
            config.shuffle,
            config.filename_shuffle_buffer_size,
            config.seed,
            config.num_epochs,
            file_tx,
            shutdown.listen(),
        )));

        if config.shuffle {
            let file_rx = Arc::new(Mutex::new(file_rx));
            for reader_id in 0..num_readers {
                handles.push(tokio::spawn(run_sloppy_reader(
                    reader_id,
                    file_rx.clone(),
                    record_tx.clone(),
                    settings.clone(),
                    metrics.clone(),
                    shutdown.listen(),
                )));
            }
        } else {
            handles.push(tokio::spawn(run_deterministic_interleave(
                file_rx,
                record_tx.clone(),
                num_readers,
                settings,
                metrics,
                shutdown.listen(),
            )));
        }
        drop(record_tx);

        Self {
            receiver: record_rx,
            handles,
            shutdown,
        }
    }

    /// Next raw record payload; `None` once all epochs have drained
    pub async fn next_record(&mut self) -> Option<Result<Bytes>> {
        self.receiver.recv().await
    }

    /// Stop the readers and wait for them to exit
    pub async fn shutdown(mut self) {
        self.shutdown.trigger();
        drop(self.receiver);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<Result<Bytes>>,
        Vec<JoinHandle<()>>,
        ShutdownSignal,
    ) {
        (self.receiver, self.handles, self.shutdown)
    }
}

/// Walks the file list once per epoch, shuffling the order when asked
async fn run_feeder(
    files: Vec<PathBuf>,
    shuffle: bool,
    shuffle_window: usize,
    seed: Option<u64>,
    num_epochs: u64,
    file_tx: mpsc::Sender<PathBuf>,
    mut stop: ShutdownListener,
) {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut epoch = 0u64;
    while num_epochs == 0 || epoch < num_epochs {
        let mut order: Vec<usize> = (0..files.len()).collect();
        if shuffle {
            windowed_shuffle(&mut order, shuffle_window, &mut rng);
        }

        for idx in order {
            let path = files[idx].clone();
            tokio::select! {
                _ = stop.triggered() => {
                    debug!("feeder stopping on shutdown");
                    return;
                }
                sent = file_tx.send(path) => {
                    if sent.is_err() {
                        debug!("feeder stopping, readers dropped");
                        return;
                    }
                }
            }
        }

        epoch += 1;
        debug!(epoch, "filename epoch completed");
    }
    debug!("feeder finished after {} epochs", epoch);
}

/// Bounded-window Fisher-Yates: each slot draws from the next `window`
/// positions, so a small window approximates a streaming shuffle buffer
fn windowed_shuffle(order: &mut [usize], window: usize, rng: &mut StdRng) {
    if window < 2 {
        return;
    }
    for i in 0..order.len() {
        let end = (i + window).min(order.len());
        if end - i > 1 {
            let j = rng.gen_range(i..end);
            order.swap(i, j);
        }
    }
}

/// Sloppy-mode reader: pull files from the shared queue, stream their
/// records first-come into the output channel
async fn run_sloppy_reader(
    reader_id: usize,
    file_rx: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    record_tx: mpsc::Sender<Result<Bytes>>,
    settings: ReadSettings,
    metrics: Arc<PipelineMetrics>,
    mut stop: ShutdownListener,
) {
    loop {
        let path = {
            let mut rx = file_rx.lock().await;
            tokio::select! {
                _ = stop.triggered() => {
                    debug!(reader_id, "reader stopping on shutdown");
                    return;
                }
                path = rx.recv() => path,
            }
        };
        let Some(path) = path else { break };

        let mut reader =
            match RecordFileReader::open(&path, settings.read_buffer_bytes, settings.max_record_bytes)
                .await
            {
                Ok(reader) => {
                    metrics.files_opened.inc();
                    reader
                }
                Err(e) => {
                    error!("failed to open {}: {}", path.display(), e);
                    if record_tx.send(Err(e)).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

        let mut in_block = 0usize;
        loop {
            match reader.next_record().await {
                Ok(Some(record)) => {
                    metrics.records_read.inc();
                    metrics.bytes_read.inc_by(record.len() as u64);
                    if record_tx.send(Ok(record)).await.is_err() {
                        return;
                    }
                    in_block += 1;
                    if in_block >= settings.block_length {
                        in_block = 0;
                        // Give the other readers a turn
                        tokio::task::yield_now().await;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if e.is_corruption() {
                        metrics.checksum_failures.inc();
                    }
                    error!("read error in {}: {}", path.display(), e);
                    // Skip the rest of this file, keep serving others
                    let _ = record_tx.send(Err(e)).await;
                    break;
                }
            }
        }
    }
    debug!(reader_id, "reader finished");
}

/// Deterministic-mode interleave: keep up to `cycle_length` files open and
/// take `block_length` records from each in turn
async fn run_deterministic_interleave(
    mut file_rx: mpsc::Receiver<PathBuf>,
    record_tx: mpsc::Sender<Result<Bytes>>,
    cycle_length: usize,
    settings: ReadSettings,
    metrics: Arc<PipelineMetrics>,
    mut stop: ShutdownListener,
) {
    let mut active: Vec<RecordFileReader> = Vec::new();
    let mut files_done = false;
    let mut slot = 0usize;

    loop {
        if stop.is_triggered() {
            debug!("interleave stopping on shutdown");
            return;
        }

        while !files_done && active.len() < cycle_length {
            match file_rx.recv().await {
                Some(path) => {
                    match RecordFileReader::open(
                        &path,
                        settings.read_buffer_bytes,
                        settings.max_record_bytes,
                    )
                    .await
                    {
                        Ok(reader) => {
                            metrics.files_opened.inc();
                            active.push(reader);
                        }
                        Err(e) => {
                            error!("failed to open {}: {}", path.display(), e);
                            if record_tx.send(Err(e)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                None => files_done = true,
            }
        }
        if active.is_empty() {
            if files_done {
                break;
            }
            continue;
        }
        if slot >= active.len() {
            slot = 0;
        }

        let mut exhausted = false;
        for _ in 0..settings.block_length {
            match active[slot].next_record().await {
                Ok(Some(record)) => {
                    metrics.records_read.inc();
                    metrics.bytes_read.inc_by(record.len() as u64);
                    if record_tx.send(Ok(record)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(e) => {
                    if e.is_corruption() {
                        metrics.checksum_failures.inc();
                    }
                    error!("read error in {}: {}", active[slot].path().display(), e);
                    let _ = record_tx.send(Err(e)).await;
                    exhausted = true;
                    break;
                }
            }
        }
        if exhausted {
            // The removed slot's successor shifts into place, keeping the
            // round-robin position
            active.remove(slot);
        } else {
            slot += 1;
        }
    }
    debug!("deterministic interleave finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windowed_shuffle_is_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut order: Vec<usize> = (0..50).collect();
        windowed_shuffle(&mut order, 10, &mut rng);

        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_windowed_shuffle_respects_window() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut order: Vec<usize> = (0..100).collect();
        windowed_shuffle(&mut order, 5, &mut rng);

        // An element moves backwards at most window - 1 positions
        for (pos, &val) in order.iter().enumerate() {
            assert!(val < pos + 5, "element {val} moved too far back to {pos}");
        }
    }

    #[test]
    fn test_windowed_shuffle_seeded_is_deterministic() {
        let mut a: Vec<usize> = (0..30).collect();
        let mut b: Vec<usize> = (0..30).collect();
        windowed_shuffle(&mut a, 8, &mut StdRng::seed_from_u64(42));
        windowed_shuffle(&mut b, 8, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_window_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut order: Vec<usize> = (0..10).collect();
        windowed_shuffle(&mut order, 1, &mut rng);
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }
}
