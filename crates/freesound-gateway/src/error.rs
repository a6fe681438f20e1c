use std::fmt;

/// Unified error type for the gateway.
///
/// Every variant carries the exact message the host script renders, since
/// all failures end up serialized into the result object on stdout.
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// Invalid mode or missing/malformed arguments.
    InvalidInput(String),
    /// The local environment could not be prepared (port bind, directories).
    Environment(String),
    /// The remote API rejected the request with an HTTP status.
    Api {
        status: Option<u16>,
        message: String,
    },
    /// Transport-level failure (connection refused, timeout) or a flow that
    /// never produced a response.
    Network(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidInput(msg)
            | GatewayError::Environment(msg)
            | GatewayError::Network(msg)
            | GatewayError::Api { message: msg, .. } => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;
