pub mod api_client;
pub mod image_client;
pub mod workflow;

use crate::{
    error::Result,
    models::{GenerationRequest, ImageResult},
};
use async_trait::async_trait;

pub use api_client::GenerateApiClient;
pub use image_client::ComfyImageClient;
pub use workflow::{build_request, WorkflowGraph};

/// Anything that can turn one fully-specified request into one image.
///
/// The batch orchestrator resolves the seed before calling, so
/// implementations never see `seed: None` from it.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImageResult>;
}
