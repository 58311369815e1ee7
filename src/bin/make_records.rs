//! Synthetic record-file generator
//!
//! Writes JSON-example record files for demos and pipeline bring-up:
//!
//!   make_records <out_dir> [num_files] [records_per_file]

use std::path::PathBuf;

use tensorfeed::record::RecordFileWriter;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let out_dir: PathBuf = args
        .next()
        .ok_or("usage: make_records <out_dir> [num_files] [records_per_file]")?
        .into();
    let num_files: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(4);
    let records_per_file: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1024);

    std::fs::create_dir_all(&out_dir)?;
    info!(
        "writing {} files x {} records to {}",
        num_files,
        records_per_file,
        out_dir.display()
    );

    let mut total = 0u64;
    for file_idx in 0..num_files {
        let path = out_dir.join(format!("examples-{file_idx:05}.rec"));
        let mut writer = RecordFileWriter::create(&path).await?;

        for record_idx in 0..records_per_file {
            let index = (file_idx * records_per_file + record_idx) as u64;
            let payload = serde_json::json!({
                "index": index,
                "source": format!("examples-{file_idx:05}"),
                "score": (index % 100) as f64 / 100.0,
                "values": [0.25, 0.5, 0.75],
                "class": ["background"],
            });
            writer.write_record(payload.to_string().as_bytes()).await?;
        }

        total += writer.finish().await?;
        info!("wrote {}", path.display());
    }

    info!("done, {} records total", total);
    Ok(())
}
