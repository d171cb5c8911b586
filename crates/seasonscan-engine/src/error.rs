//! Error taxonomy for portal lookups and scan runs

use std::fmt;

/// Failure raised by a `Transport` for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Session never established or invalidated. Fatal for the run.
    Auth(String),
    /// Connection, status, or body read failure.
    Network(String),
    /// Request exceeded the per-request timeout.
    Timeout(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(m) => write!(f, "authentication failed: {m}"),
            Self::Network(m) => write!(f, "network error: {m}"),
            Self::Timeout(m) => write!(f, "timed out: {m}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// The response arrived but does not have the expected structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparseable response: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Why a single logical lookup gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// Every attempt hit a transient error.
    Exhausted { attempts: u32, last: TransportError },
    /// Response could not be interpreted; not retried.
    Parse(ParseError),
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LookupFailure {}

/// The run was aborted by an authentication failure; stop issuing work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAborted {
    pub reason: String,
}

impl fmt::Display for RunAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run aborted: {}", self.reason)
    }
}

impl std::error::Error for RunAborted {}

/// Terminal error of a whole scan run.
#[derive(Debug)]
pub enum RunError {
    /// Authentication failed; the run stopped before finishing.
    Aborted(RunAborted),
    /// The store could not answer a resume/idempotency query.
    Store(anyhow::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "store error: {e:#}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<RunAborted> for RunError {
    fn from(e: RunAborted) -> Self {
        Self::Aborted(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(TransportError::Timeout("30s".into()).is_retryable());
        assert!(!TransportError::Auth("logged out".into()).is_retryable());
    }

    #[test]
    fn display_exhausted() {
        let e = LookupFailure::Exhausted {
            attempts: 3,
            last: TransportError::Timeout("after 30s".into()),
        };
        assert_eq!(e.to_string(), "gave up after 3 attempts: timed out: after 30s");
    }

    #[test]
    fn display_parse() {
        let e = LookupFailure::Parse(ParseError::new("no info table"));
        assert!(e.to_string().contains("no info table"));
    }

    #[test]
    fn run_error_from_abort() {
        let e: RunError = RunAborted {
            reason: "session expired".into(),
        }
        .into();
        assert!(matches!(e, RunError::Aborted(_)));
        assert_eq!(e.to_string(), "run aborted: session expired");
    }
}
