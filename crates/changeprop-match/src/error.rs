use thiserror::Error;

/// Compile-time failures for match trees and retry-condition stanzas.
/// Fatal at rule construction, never observed at runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("invalid match tree: {0}")]
    InvalidMatch(String),

    #[error("invalid retry condition: {0}")]
    InvalidRetryCondition(String),
}
