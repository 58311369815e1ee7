//! Drains a configured pipeline and reports throughput
//!
//!   pipeline_bench <config.toml> [max_batches] [batch_size]

use std::time::Instant;

use tensorfeed::{FeedError, InputReaderConfig, PipelineBuilder};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .ok_or("usage: pipeline_bench <config.toml> [max_batches] [batch_size]")?;
    let max_batches: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1000);
    let batch_size: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(32);

    let config = InputReaderConfig::from_toml_file(&config_path)?;
    info!(
        "building pipeline from {} ({} input patterns)",
        config_path,
        config.input_paths.len()
    );

    let mut pipeline = PipelineBuilder::new(config).batch_size(batch_size).build()?;

    let start = Instant::now();
    let mut examples = 0u64;
    loop {
        match pipeline.next_batch().await {
            Ok(batch) => {
                examples += batch.len() as u64;
                if pipeline.batches_delivered() >= max_batches {
                    break;
                }
            }
            Err(FeedError::Exhausted) => {
                info!("pipeline exhausted");
                break;
            }
            Err(e) => {
                error!("stream error: {}", e);
            }
        }
    }
    let elapsed = start.elapsed();

    let batches = pipeline.batches_delivered();
    info!(
        "drained {} batches ({} examples) in {:.2?} ({:.0} examples/s)",
        batches,
        examples,
        elapsed,
        examples as f64 / elapsed.as_secs_f64()
    );

    let metrics = pipeline.metrics();
    pipeline.shutdown().await;
    println!("{}", metrics.to_prometheus());
    Ok(())
}
