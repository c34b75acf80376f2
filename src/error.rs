use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovgateError {
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        source: Box<ureq::Error>,
    },

    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("no matching project key for {workspace}/{repo}")]
    ProjectKeyNotFound { workspace: String, repo: String },

    #[error("invalid change reference: {0}")]
    InvalidChange(String),

    #[error("invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("report generation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CovgateError>;
