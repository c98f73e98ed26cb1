use thiserror::Error;

/// Errors raised by AI provider adapters.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ClientBuild(reqwest::Error),

    #[error("Failed to send request to the AI provider: {0}")]
    Request(reqwest::Error),

    #[error("Failed to deserialize AI provider response: {0}")]
    Deserialization(reqwest::Error),

    #[error("AI provider returned an error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("AI provider is misconfigured: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying under the retry policy.
    ///
    /// Timeouts, connection-level failures, 408, 429, and 5xx are transient;
    /// every other API status and all configuration errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Request(err) => {
                err.is_timeout() || err.is_connect() || err.is_request()
            }
            ProviderError::Api { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}
