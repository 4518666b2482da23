use thiserror::Error;

/// Failure of a single prediction attempt.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The service answered but rejected the request. Displays the service's
    /// own message and nothing else.
    #[error("{message}")]
    Service {
        /// HTTP status, if the rejection came with an error status.
        status: Option<u16>,
        message: String,
    },
    /// No response was received.
    #[error("prediction service unreachable: {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    /// A success status whose body was not a JSON object.
    #[error("prediction service returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl PredictError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            PredictError::Service { status, .. } => *status,
            PredictError::Unreachable { .. } | PredictError::MalformedResponse(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PredictConfigError {
    #[error("invalid prediction endpoint '{raw}': {source}")]
    InvalidEndpoint {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported prediction endpoint scheme '{0}'; expected http or https")]
    UnsupportedScheme(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
