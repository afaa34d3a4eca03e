use crate::error::{GenerationError, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const DIMENSION_RANGE: RangeInclusive<u32> = 64..=1024;
pub const STEPS_RANGE: RangeInclusive<u32> = 15..=30;
pub const BATCH_SIZE_RANGE: RangeInclusive<u32> = 1..=4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_batch_size() -> u32 {
    1
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            width: 512,
            height: 512,
            steps: 20,
            seed: None,
            batch_size: 4,
        }
    }
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate_image_params(&self) -> Result<()> {
        if !DIMENSION_RANGE.contains(&self.width) || !DIMENSION_RANGE.contains(&self.height) {
            return Err(GenerationError::validation(
                "dimensions",
                "Invalid image dimensions",
            ));
        }
        if !STEPS_RANGE.contains(&self.steps) {
            return Err(GenerationError::validation("steps", "Invalid steps value"));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_image_params()?;
        if !BATCH_SIZE_RANGE.contains(&self.batch_size) {
            return Err(GenerationError::validation(
                "batch_size",
                "Invalid batch size",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
