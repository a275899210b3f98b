//! The normalization pipeline: a pure payload normalizer and the batch
//! processor that drains the buffer into the `accidents` table.

pub mod normalize;
pub mod processor;

pub use normalize::{normalize, NormalizeError};
pub use processor::{run_to_exhaustion, PipelineError, ProcessingSummary, ProcessorConfig};
