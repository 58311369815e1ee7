//! Parallel decode/transform stage
//!
//! A pool of workers decodes raw payloads into examples and applies the
//! optional user transform. Items are sequence-tagged so deterministic
//! pipelines can restore input order after the parallel hop; shuffled
//! pipelines skip the reordering and forward results as they finish.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::decode::{Example, RecordDecoder, TransformFn};
use crate::error::Result;
use crate::metrics::PipelineMetrics;

/// Spawn the decode stage between two channels
pub(crate) fn spawn_map_stage(
    input: mpsc::Receiver<Result<Bytes>>,
    decoder: Arc<dyn RecordDecoder>,
    transform: Option<TransformFn>,
    workers: usize,
    preserve_order: bool,
    metrics: Arc<PipelineMetrics>,
    out_cap: usize,
) -> (mpsc::Receiver<Result<Example>>, Vec<JoinHandle<()>>) {
    let workers = workers.max(1);
    let (work_tx, work_rx) = mpsc::channel::<(u64, Result<Bytes>)>(workers * 2);
    let (done_tx, done_rx) = mpsc::channel::<(u64, Result<Example>)>(workers * 2);
    let (out_tx, out_rx) = mpsc::channel::<Result<Example>>(out_cap);

    let mut handles = Vec::with_capacity(workers + 2);
    handles.push(tokio::spawn(run_sequencer(input, work_tx)));

    let work_rx = Arc::new(Mutex::new(work_rx));
    for _ in 0..workers {
        handles.push(tokio::spawn(run_worker(
            work_rx.clone(),
            done_tx.clone(),
            decoder.clone(),
            transform.clone(),
            metrics.clone(),
        )));
    }
    drop(done_tx);

    handles.push(tokio::spawn(run_collector(done_rx, out_tx, preserve_order)));
    (out_rx, handles)
}

/// Tags each incoming item with its position in the stream
async fn run_sequencer(
    mut input: mpsc::Receiver<Result<Bytes>>,
    work_tx: mpsc::Sender<(u64, Result<Bytes>)>,
) {
    let mut seq = 0u64;
    while let Some(item) = input.recv().await {
        if work_tx.send((seq, item)).await.is_err() {
            return;
        }
        seq += 1;
    }
    debug!("map sequencer finished after {} records", seq);
}

async fn run_worker(
    work_rx: Arc<Mutex<mpsc::Receiver<(u64, Result<Bytes>)>>>,
    done_tx: mpsc::Sender<(u64, Result<Example>)>,
    decoder: Arc<dyn RecordDecoder>,
    transform: Option<TransformFn>,
    metrics: Arc<PipelineMetrics>,
) {
    loop {
        let item = { work_rx.lock().await.recv().await };
        let Some((seq, item)) = item else { break };
        let result = process_one(&*decoder, transform.as_ref(), &metrics, item);
        if done_tx.send((seq, result)).await.is_err() {
            return;
        }
    }
}

fn process_one(
    decoder: &dyn RecordDecoder,
    transform: Option<&TransformFn>,
    metrics: &PipelineMetrics,
    item: Result<Bytes>,
) -> Result<Example> {
    // Upstream read errors pass through untouched
    let payload = item?;
    let start = Instant::now();
    let result = decoder.decode(&payload).and_then(|example| match transform {
        Some(f) => (**f)(example),
        None => Ok(example),
    });
    metrics.decode_latency.observe(start.elapsed());
    match &result {
        Ok(_) => metrics.records_decoded.inc(),
        Err(_) => metrics.decode_failures.inc(),
    }
    result
}

/// Forwards worker results, restoring sequence order when required
async fn run_collector(
    mut done_rx: mpsc::Receiver<(u64, Result<Example>)>,
    out_tx: mpsc::Sender<Result<Example>>,
    preserve_order: bool,
) {
    if !preserve_order {
        while let Some((_, result)) = done_rx.recv().await {
            if out_tx.send(result).await.is_err() {
                return;
            }
        }
        return;
    }

    // Pending results are bounded by the work and done channel capacities
    let mut pending: BTreeMap<u64, Result<Example>> = BTreeMap::new();
    let mut next_seq = 0u64;
    while let Some((seq, result)) = done_rx.recv().await {
        pending.insert(seq, result);
        while let Some(result) = pending.remove(&next_seq) {
            if out_tx.send(result).await.is_err() {
                return;
            }
            next_seq += 1;
        }
    }
    // Workers are gone; flush whatever is left in order
    for (_, result) in pending {
        if out_tx.send(result).await.is_err() {
            return;
        }
    }
}
