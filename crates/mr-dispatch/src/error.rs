//! Dispatch Error Types

use mr_common::ProviderKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The message failed validation; no provider was contacted
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Could not connect to the mail provider {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid provider url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to encode request body: {0}")]
    Encoding(String),

    #[error("Malformed {provider} response: {message}")]
    MalformedResponse { provider: ProviderKind, message: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl DispatchError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DispatchError::Validation(_))
    }

    pub fn malformed(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
