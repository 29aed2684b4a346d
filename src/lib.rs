pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use pipeline::{run_pipeline, Pipeline, RunSummary};
