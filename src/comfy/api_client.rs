use crate::{
    comfy::ImageBackend,
    error::{GenerationError, Result},
    models::{GenerateResponse, GenerationRequest, ImageResult},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Clone)]
pub struct GenerateApiClient {
    client: Client,
    base_url: String,
}

impl GenerateApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl ImageBackend for GenerateApiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImageResult> {
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status != StatusCode::OK {
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: GenerateResponse = serde_json::from_str(&text)
            .map_err(|_| GenerationError::protocol("Invalid JSON response", &text))?;
        Ok(ImageResult::from_url(body.image_url))
    }
}
