use thiserror::Error;

#[derive(Error, Debug)]
pub enum CustomError {
    #[error("request error: {message} (status {code})")]
    RequestError { message: String, code: u16 },

    #[error("config error: {message}")]
    ConfigError { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_yaml::Error),

    #[error("url error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl CustomError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CustomError::Cancelled)
    }
}

pub type EResult<T> = Result<T, CustomError>;
