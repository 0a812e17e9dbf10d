//! Error handling for the execution core

/// Execution-core error types
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Config error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network connection error, retried before surfacing
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication failed (signature, key, passphrase)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Venue rejected the request with an error body
    #[error("Venue error {code}: {message}")]
    Venue {
        /// Venue-native error code
        code: String,
        /// Venue-native error message
        message: String,
    },

    /// API rate limit has been exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Invalid response format received from a venue
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Symbol is not listed on the venue
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Order not found when querying status
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Decision producer failed
    #[error("Producer error: {0}")]
    Producer(String),
}

impl ExecError {
    /// Whether a failed request is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ExecError::Network(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection reset")
                    || msg.contains("unexpected eof")
                    || msg.contains("connection closed")
            }
            ExecError::RateLimited => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_detection() {
        assert!(ExecError::Network("operation timed out".into()).is_transient());
        assert!(ExecError::Network("Connection reset by peer".into()).is_transient());
        assert!(ExecError::RateLimited.is_transient());
        assert!(!ExecError::Auth("bad signature".into()).is_transient());
        assert!(
            !ExecError::Venue {
                code: "-4164".into(),
                message: "min notional".into()
            }
            .is_transient()
        );
    }
}
