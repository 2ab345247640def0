pub mod audio;
pub mod balance;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod remux;
pub mod timeline;

pub use config::Config;
pub use error::{DubError, Result};
pub use pipeline::{print_summary, reconcile, PipelineConfig, PipelineResult, PipelineStats};
