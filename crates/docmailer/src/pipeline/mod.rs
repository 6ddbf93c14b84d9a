pub mod config;
pub mod context;
pub mod error;
pub mod runner;
pub mod stability;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use runner::Pipeline;
pub use stability::wait_until_stable;
