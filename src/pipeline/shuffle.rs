//! Record shuffle buffer
//!
//! Reservoir shuffle: hold `buffer_size` records; once full, each arrival
//! evicts a uniformly random resident. When the input ends, the residue
//! is shuffled and drained.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// Spawn the shuffle stage between two channels
pub(crate) fn spawn_shuffle_stage(
    input: mpsc::Receiver<Result<Bytes>>,
    buffer_size: usize,
    seed: Option<u64>,
    out_cap: usize,
) -> (mpsc::Receiver<Result<Bytes>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(out_cap);
    let handle = tokio::spawn(run_shuffle(input, tx, buffer_size, seed));
    (rx, handle)
}

async fn run_shuffle(
    mut input: mpsc::Receiver<Result<Bytes>>,
    output: mpsc::Sender<Result<Bytes>>,
    buffer_size: usize,
    seed: Option<u64>,
) {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut reservoir: Vec<Bytes> = Vec::with_capacity(buffer_size);

    while let Some(item) = input.recv().await {
        match item {
            Ok(record) => {
                if reservoir.len() < buffer_size {
                    reservoir.push(record);
                    continue;
                }
                let idx = rng.gen_range(0..reservoir.len());
                let evicted = std::mem::replace(&mut reservoir[idx], record);
                if output.send(Ok(evicted)).await.is_err() {
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

    reservoir.shuffle(&mut rng);
    let remaining = reservoir.len();
    for record in reservoir {
        if output.send(Ok(record)).await.is_err() {
            return;
        }
    }
    debug!("shuffle stage drained {} buffered records", remaining);
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn shuffle_all(records: Vec<Bytes>, buffer_size: usize, seed: u64) -> Vec<Bytes> {
        let (in_tx, in_rx) = mpsc::channel(records.len().max(1));
        for r in records {
            in_tx.send(Ok(r)).await.unwrap();
        }
        drop(in_tx);

        let (mut out_rx, handle) = spawn_shuffle_stage(in_rx, buffer_size, Some(seed), 1024);
        let mut out = Vec::new();
        while let Some(item) = out_rx.recv().await {
            out.push(item.unwrap());
        }
        handle.await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_shuffle_emits_every_record_once() {
        let records: Vec<Bytes> = (0..100u8).map(|i| Bytes::from(vec![i])).collect();
        let out = shuffle_all(records.clone(), 16, 9).await;

        assert_eq!(out.len(), records.len());
        let mut sorted = out.clone();
        sorted.sort();
        assert_eq!(sorted, records);
        assert_ne!(out, records);
    }

    #[tokio::test]
    async fn test_seeded_shuffle_is_deterministic() {
        let records: Vec<Bytes> = (0..50u8).map(|i| Bytes::from(vec![i])).collect();
        let a = shuffle_all(records.clone(), 8, 7).await;
        let b = shuffle_all(records, 8, 7).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_buffer_larger_than_input() {
        let records: Vec<Bytes> = (0..5u8).map(|i| Bytes::from(vec![i])).collect();
        let out = shuffle_all(records.clone(), 64, 1).await;
        assert_eq!(out.len(), 5);
    }
}
