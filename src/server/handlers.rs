use crate::{
    comfy::ImageBackend,
    error::{GenerationError, Result},
    models::{community, ErrorResponse, GenerateResponse, GenerationRequest, DIMENSION_RANGE, STEPS_RANGE},
};
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub backend: Arc<dyn ImageBackend>,
}

pub type SharedState = web::Data<AppState>;

impl ResponseError for GenerationError {
    fn status_code(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            GenerationError::Validation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(message))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SeedInput {
    Number(u64),
    Text(String),
}

/// Numbers are taken as any JSON number (`512`, `512.0`, `-5`) so
/// out-of-range or fractional values get the endpoint's own error.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: String,
    pub width: f64,
    pub height: f64,
    pub steps: f64,
    #[serde(default)]
    pub seed: Option<SeedInput>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

impl GenerateBody {
    pub fn into_request(self) -> Result<GenerationRequest> {
        let width = in_range(self.width, &DIMENSION_RANGE);
        let height = in_range(self.height, &DIMENSION_RANGE);
        let (width, height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                return Err(GenerationError::validation(
                    "dimensions",
                    "Invalid image dimensions",
                ))
            }
        };
        let steps = in_range(self.steps, &STEPS_RANGE)
            .ok_or_else(|| GenerationError::validation("steps", "Invalid steps value"))?;

        let seed = match self.seed {
            None => None,
            Some(SeedInput::Number(n)) => Some(n),
            Some(SeedInput::Text(text)) if text.trim().is_empty() => None,
            Some(SeedInput::Text(text)) => Some(
                text.trim()
                    .parse::<u64>()
                    .map_err(|_| GenerationError::validation("seed", "Invalid seed value"))?,
            ),
        };

        Ok(GenerationRequest {
            prompt: self.prompt,
            width,
            height,
            steps,
            seed,
            batch_size: self.batch_size.unwrap_or(1),
        })
    }
}

fn in_range(value: f64, range: &std::ops::RangeInclusive<u32>) -> Option<u32> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    if value < f64::from(*range.start()) || value > f64::from(*range.end()) {
        return None;
    }
    Some(value as u32)
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok"}))
}

pub async fn generate(
    state: SharedState,
    body: web::Json<GenerateBody>,
) -> std::result::Result<HttpResponse, GenerationError> {
    let request = body.into_inner().into_request()?;
    let _timer = crate::logger::timer("generate");

    match state.backend.generate(&request).await {
        Ok(image) => Ok(HttpResponse::Ok().json(GenerateResponse {
            image_url: image.image_url,
        })),
        Err(e) => {
            log::error!("Error generating image: {}", e);
            Err(e)
        }
    }
}

pub async fn community_works() -> HttpResponse {
    HttpResponse::Ok().json(community::community_works())
}
