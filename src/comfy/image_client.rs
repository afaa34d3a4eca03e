use crate::{
    comfy::{
        workflow::{build_request, WorkflowGraph},
        ImageBackend,
    },
    config::BackendConfig,
    error::{GenerationError, Result},
    models::{ComfyImageResponse, GenerationRequest, ImageResult},
};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::json;

#[derive(Clone)]
pub struct ComfyImageClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ComfyImageClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/prompt", self.base_url)
    }

    fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &self.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| GenerationError::Config("API key is not a valid header".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    pub async fn request_image(&self, graph: &WorkflowGraph) -> Result<ImageResult> {
        let endpoint = self.endpoint();
        log::debug!("POST {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .headers(self.build_headers()?)
            .json(&json!({ "prompt": graph }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            log::error!("Backend returned {}: {}", status, text);
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_image_response(&text)
    }
}

pub(crate) fn parse_image_response(text: &str) -> Result<ImageResult> {
    let body: ComfyImageResponse = serde_json::from_str(text)
        .map_err(|_| GenerationError::protocol("Invalid JSON response", text))?;

    match body.images.first() {
        Some(first) if !first.is_empty() => Ok(ImageResult::from_base64(first)),
        _ => Err(GenerationError::protocol("No images generated", text)),
    }
}

#[async_trait]
impl ImageBackend for ComfyImageClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImageResult> {
        let graph = build_request(request);
        log::info!(
            "Generating {}x{} image, {} steps, seed {:?}",
            request.width,
            request.height,
            request.steps,
            graph.seed()
        );
        self.request_image(&graph).await
    }
}
