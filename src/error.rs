use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Validation error: {message}")]
    Validation { field: &'static str, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16, body: String },
    #[error("Invalid response: {message} (raw: {raw})")]
    Protocol { message: String, raw: String },
    #[error("Generation failed after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },
    #[error("Generation cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        GenerationError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>, raw: impl Into<String>) -> Self {
        GenerationError::Protocol {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Transport and response failures are worth another attempt; validation,
    /// config and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Network(_)
                | GenerationError::HttpStatus { .. }
                | GenerationError::Protocol { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GenerationError::Validation { .. })
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
