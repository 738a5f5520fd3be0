use std::fmt;

/// Failure to obtain a usable option-chain payload. Recoverable: the
/// scheduler resets the session and tries again on the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Request(String),
    Status(u16, String),
    NonJsonResponse(String),
    Parse(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FetchError::Request(msg) => write!(f, "Request error: {}", msg),
            FetchError::Status(code, preview) => write!(f, "HTTP {}: {}", code, preview),
            FetchError::NonJsonResponse(preview) => write!(f, "Non-JSON response: {}", preview),
            FetchError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// Failure to write the canonical state document. Logged, never fatal.
#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    Encode(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PersistError::Io(err) => write!(f, "I/O error: {}", err),
            PersistError::Encode(msg) => write!(f, "Encode error: {}", msg),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(err) => Some(err),
            PersistError::Encode(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::Io(err)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        PersistError::Encode(err.to_string())
    }
}

/// Outcome of a failed scheduler cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    Fetch(FetchError),
    Unexpected(String),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CycleError::Fetch(err) => write!(f, "{}", err),
            CycleError::Unexpected(msg) => write!(f, "Unexpected error: {}", msg),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<FetchError> for CycleError {
    fn from(err: FetchError) -> Self {
        CycleError::Fetch(err)
    }
}
