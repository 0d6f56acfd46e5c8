use thiserror::Error;

/// Every way a lookup can fail. Each variant has a fixed status code and a
/// fixed public message; the `Display` text is for logs only.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no udiDi in query or body")]
    MissingIdentifier,
    #[error("request body is not valid UTF-8 JSON")]
    InvalidBody,
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl LookupError {
    pub fn status_code(&self) -> u16 {
        match self {
            LookupError::MissingIdentifier | LookupError::InvalidBody => 400,
            LookupError::Credentials(_) => 500,
            LookupError::Upstream(UpstreamError::Timeout) => 504,
            LookupError::Upstream(_) => 502,
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            LookupError::MissingIdentifier => {
                r#"The request must carry a udiDi query parameter or a JSON body containing { "udiDi": "your_code" }."#
            }
            LookupError::InvalidBody => {
                r#"The request body must be JSON of the form { "udiDi": "your_code" }."#
            }
            LookupError::Credentials(_) => "API key not configured on the server.",
            LookupError::Upstream(UpstreamError::Timeout) => {
                "Timed out waiting for the external device API."
            }
            LookupError::Upstream(_) => "Failed to retrieve product details from external API.",
        }
    }
}

/// Failures resolving the registry API key. None of these carry the secret
/// payload itself.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("secret store request failed: {0}")]
    Store(String),
    #[error("secret has no string payload")]
    MissingSecretString,
    #[error("secret payload is not JSON")]
    MalformedPayload,
    #[error("secret payload has no usable {0} entry")]
    MissingKey(String),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("device API timed out")]
    Timeout,
    #[error("device API request failed: {0}")]
    Transport(String),
    #[error("device API responded with status {0}")]
    Status(u16),
    #[error("device API response is not valid JSON: {0}")]
    Decode(String),
    #[error("device API rejected the request with result code {code}")]
    Rejected { code: String },
}

// reqwest puts the request URL in its messages, and the URL carries the
// service key, so it is stripped before anything is formatted.
impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
