use changeprop_match::MatchError;
use thiserror::Error;

/// Rule construction failure: fatal at start-up, never surfaced per-event.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule {name:?} is missing a required field: {field}")]
    MissingField { name: String, field: &'static str },

    #[error("rule {name:?}: {source}")]
    Compile {
        name: String,
        #[source]
        source: MatchError,
    },
}
