pub mod claims;
pub mod job;
pub mod pool;
pub mod scanner;

pub use claims::ClaimRegistry;
pub use job::{JobResult, WatchedFile};
pub use pool::WorkerPool;
pub use scanner::DirectoryScanner;

// Re-export crossbeam_channel for callers holding a submitter or result receiver
pub use crossbeam_channel;
