// Error types module
use thiserror::Error;

/// Main error type for UmbraDB statement processing.
///
/// One variant per failure stage. The shadow-vs-actual decision itself is
/// never an error: an inconclusive judgement resolves to the actual target.
#[derive(Error, Debug)]
pub enum UmbraError {
    /// Malformed SQL; surfaced before any physical execution is attempted.
    #[error("SQL parse error: {0}")]
    Parse(String),

    /// Statement-context construction or token generation failure
    /// (e.g. unresolvable table reference). Treated like a parse error.
    #[error("SQL rewrite error: {0}")]
    Rewrite(String),

    /// The chosen physical target rejected or failed the statement.
    #[error("Physical execution error: {0}")]
    Execution(String),

    /// Statement lifecycle misuse, e.g. reading a result before execution.
    #[error("Invalid statement state: {0}")]
    State(String),
}

impl UmbraError {
    /// Create a parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        UmbraError::Parse(msg.into())
    }

    /// Create a rewrite error
    pub fn rewrite<S: Into<String>>(msg: S) -> Self {
        UmbraError::Rewrite(msg.into())
    }

    /// Create a physical execution error
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        UmbraError::Execution(msg.into())
    }

    /// Create a statement state error
    pub fn state<S: Into<String>>(msg: S) -> Self {
        UmbraError::State(msg.into())
    }
}

impl From<sqlparser::parser::ParserError> for UmbraError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        UmbraError::Parse(err.to_string())
    }
}

/// Result alias used across the UmbraDB crates.
pub type Result<T> = std::result::Result<T, UmbraError>;
