use crate::error::{GenerationError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub image_url: String,
}

impl ImageResult {
    pub fn from_base64(payload: &str) -> Self {
        Self {
            image_url: format!("{}{}", DATA_URI_PREFIX, payload),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            image_url: url.into(),
        }
    }

    pub fn is_data_uri(&self) -> bool {
        self.image_url.starts_with("data:")
    }

    pub fn decode(&self) -> Result<Option<Vec<u8>>> {
        if !self.is_data_uri() {
            return Ok(None);
        }
        let (header, payload) = self
            .image_url
            .split_once(',')
            .ok_or_else(|| GenerationError::protocol("Malformed data URI", &self.image_url))?;
        if !header.ends_with(";base64") || !header.starts_with("data:image/") {
            return Err(GenerationError::protocol(
                "Unsupported data URI header",
                header,
            ));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| GenerationError::protocol(format!("Invalid image payload: {}", e), header))?;
        Ok(Some(bytes))
    }

    /// Mirrors a browser image load: an image that cannot be displayed is a
    /// failed attempt.
    pub fn verify(&self) -> Result<()> {
        if self.image_url.is_empty() {
            return Err(GenerationError::protocol("Empty image reference", ""));
        }
        if self.is_data_uri() {
            match self.decode()? {
                Some(bytes) if !bytes.is_empty() => Ok(()),
                _ => Err(GenerationError::protocol(
                    "Image payload is empty",
                    &self.image_url,
                )),
            }
        } else if self.image_url.starts_with("http://")
            || self.image_url.starts_with("https://")
            || self.image_url.starts_with('/')
        {
            Ok(())
        } else {
            Err(GenerationError::protocol(
                "Unrecognized image reference",
                &self.image_url,
            ))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComfyImageResponse {
    pub images: Vec<String>,
}
