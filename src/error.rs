use std::io;

use thiserror::Error;

/// Errors produced while indexing, training, scoring or persisting models
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or degenerate training data, malformed events
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bad training or construction parameters
    #[error("{0}")]
    Configuration(String),

    /// A trainer name is registered twice
    #[error("trainer '{0}' is already registered")]
    AlreadyRegistered(String),

    /// A trainer does not provide the required capabilities
    #[error("invalid trainer '{name}': {reason}")]
    InvalidTrainer { name: String, reason: String },

    /// The configured algorithm is not registered
    #[error("unknown training algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// The persisted model is malformed
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    /// A declared capability has no executable path
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// The numerical optimizer failed to converge or aborted
    #[error("{0}")]
    Optimization(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptModel(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
