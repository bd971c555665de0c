#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("web service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("{endpoint} rejected the request: {message}")]
    Rejected { endpoint: String, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("client error: {0}")]
    Client(String),
}

impl NotifyError {
    /// Connection failures and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
