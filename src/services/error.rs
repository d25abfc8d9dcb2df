use thiserror::Error;

/// Failures produced by the gateway services, before they are mapped to HTTP responses.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The remote store call could not complete (network, auth, throttling).
    #[error("{0:#}")]
    StoreUnavailable(anyhow::Error),

    /// Local staging write or read failed.
    #[error("{0}")]
    IoFailure(#[from] std::io::Error),

    #[error("Upload exceeds the maximum allowed size of {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl GatewayError {
    pub fn store(err: anyhow::Error) -> Self {
        GatewayError::StoreUnavailable(err)
    }
}
