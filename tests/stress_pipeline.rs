//! Stress tests for the input pipeline
//!
//! Run with: cargo test --release --test stress_pipeline -- --nocapture

use std::path::Path;
use std::time::Instant;

use tensorfeed::record::RecordFileWriter;
use tensorfeed::{FeedError, InputReaderConfig, PipelineBuilder};

/// Configuration for stress tests
struct StressConfig {
    num_files: usize,
    records_per_file: usize,
    batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            num_files: 8,
            records_per_file: 2000,
            batch_size: 64,
        }
    }
}

/// Generate record files with a filler field to give records realistic size
async fn generate_dataset(dir: &Path, config: &StressConfig) -> String {
    for file_idx in 0..config.num_files {
        let path = dir.join(format!("stress-{file_idx:05}.rec"));
        let mut writer = RecordFileWriter::create(&path).await.unwrap();
        for record_idx in 0..config.records_per_file {
            let index = file_idx * config.records_per_file + record_idx;
            let filler: String = (0..128)
                .map(|i| char::from(b'a' + ((index + i) % 26) as u8))
                .collect();
            let payload = serde_json::json!({
                "index": index as i64,
                "filler": filler,
                "values": [0.1, 0.2, 0.3, 0.4],
            });
            writer
                .write_record(payload.to_string().as_bytes())
                .await
                .unwrap();
        }
        writer.finish().await.unwrap();
    }
    dir.join("*.rec").to_string_lossy().into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_batched_throughput() {
    let stress = StressConfig::default();
    let dir = tempfile::tempdir().unwrap();
    let pattern = generate_dataset(dir.path(), &stress).await;
    let total_records = stress.num_files * stress.records_per_file;

    let mut config = InputReaderConfig::new([pattern]);
    config.shuffle = true;
    config.seed = Some(1);
    config.shuffle_buffer_size = 512;
    config.num_epochs = 1;
    config.num_readers = 4;

    let mut pipeline = PipelineBuilder::new(config)
        .batch_size(stress.batch_size)
        .build()
        .unwrap();

    let start = Instant::now();
    let mut examples = 0usize;
    loop {
        match pipeline.next_batch().await {
            Ok(batch) => examples += batch.len(),
            Err(FeedError::Exhausted) => break,
            Err(e) => panic!("stream error: {e}"),
        }
    }
    let elapsed = start.elapsed();
    let examples_per_sec = examples as f64 / elapsed.as_secs_f64();

    println!("Batched throughput test:");
    println!("  Records: {total_records}");
    println!("  Batches: {}", pipeline.batches_delivered());
    println!("  Elapsed: {elapsed:?}");
    println!("  Throughput: {examples_per_sec:.0} examples/s");

    assert_eq!(examples, total_records);
    assert_eq!(
        pipeline.batches_delivered() as usize,
        total_records / stress.batch_size
    );

    let metrics = pipeline.metrics();
    assert_eq!(metrics.records_read.get() as usize, total_records);
    assert_eq!(metrics.records_decoded.get() as usize, total_records);
    assert_eq!(metrics.decode_failures.get(), 0);

    assert!(
        examples_per_sec > 1000.0,
        "throughput below 1000 examples/s"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_unbatched_drain() {
    let stress = StressConfig {
        num_files: 4,
        records_per_file: 1000,
        batch_size: 1,
    };
    let dir = tempfile::tempdir().unwrap();
    let pattern = generate_dataset(dir.path(), &stress).await;
    let total_records = stress.num_files * stress.records_per_file;

    let mut config = InputReaderConfig::new([pattern]);
    config.shuffle = false;
    config.num_epochs = 1;
    config.num_readers = 4;

    let mut pipeline = PipelineBuilder::new(config).build().unwrap();

    let start = Instant::now();
    let mut examples = 0usize;
    loop {
        match pipeline.next_batch().await {
            Ok(batch) => examples += batch.len(),
            Err(FeedError::Exhausted) => break,
            Err(e) => panic!("stream error: {e}"),
        }
    }
    let elapsed = start.elapsed();

    println!("Unbatched drain test:");
    println!("  Records: {examples}");
    println!("  Elapsed: {elapsed:?}");

    assert_eq!(examples, total_records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_repeated_epochs_under_shutdown() {
    let stress = StressConfig {
        num_files: 2,
        records_per_file: 500,
        batch_size: 32,
    };
    let dir = tempfile::tempdir().unwrap();
    let pattern = generate_dataset(dir.path(), &stress).await;

    let mut config = InputReaderConfig::new([pattern]);
    config.shuffle = true;
    config.seed = Some(7);
    config.num_epochs = 0;
    config.num_readers = 2;

    let mut pipeline = PipelineBuilder::new(config)
        .batch_size(stress.batch_size)
        .build()
        .unwrap();

    // Consume well past one epoch, then stop mid-stream
    for _ in 0..100 {
        let batch = pipeline.next_batch().await.unwrap();
        assert_eq!(batch.len(), stress.batch_size);
    }

    let start = Instant::now();
    tokio::time::timeout(std::time::Duration::from_secs(30), pipeline.shutdown())
        .await
        .expect("shutdown timed out");
    println!("Shutdown after 100 batches took {:?}", start.elapsed());
}
