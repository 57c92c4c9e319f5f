use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider does not support feature URI resolution")]
    FeatureUriUnsupported,

    #[error("provider computation failed: {0}")]
    Computation(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
