//! Input pipeline stages
//!
//! File planning, interleaved reading, shuffling, parallel decode,
//! batching, and prefetching, assembled by [`PipelineBuilder`].

pub mod backpressure;
pub mod batch;
pub mod builder;
pub mod files;
pub mod interleave;
pub mod loader;
pub mod map;
pub mod shuffle;
pub mod shutdown;

pub use backpressure::BackpressureController;
pub use batch::ExampleBatch;
pub use builder::PipelineBuilder;
pub use files::{expand_patterns, plan_files, FilePlan};
pub use interleave::RecordStream;
pub use loader::{InputPipeline, PipelineState};
pub use shutdown::{ShutdownListener, ShutdownSignal};
