#![recursion_limit = "256"]

pub mod batch;
pub mod carousel;
pub mod comfy;
pub mod config;
pub mod error;
pub mod i18n;
pub mod logger;
pub mod models;
#[cfg(feature = "server")]
pub mod server;

pub use batch::{BatchHandle, BatchOrchestrator, BatchProgress, RetryPolicy};
pub use carousel::Carousel;
pub use comfy::{build_request, ComfyImageClient, GenerateApiClient, ImageBackend, WorkflowGraph};
pub use config::{BackendConfig, Config};
pub use error::{GenerationError, Result};
pub use i18n::Locale;
pub use models::{
    BatchReport, BatchSlot, CommunityWork, GenerationRequest, ImageResult, SlotStatus,
};
