pub mod orchestrator;
pub mod progress;
pub mod retry;

pub use orchestrator::{BatchHandle, BatchOrchestrator, RANDOM_SEED_MAX};
pub use progress::BatchProgress;
pub use retry::RetryPolicy;
