use ripple_engine::RippleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HttpError>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Relative URL `{0}` needs a configured base URL")]
    RelativeUrl(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        HttpError::Network(err.to_string())
    }
}

impl From<HttpError> for RippleError {
    fn from(err: HttpError) -> Self {
        RippleError::Transport(err.to_string())
    }
}
