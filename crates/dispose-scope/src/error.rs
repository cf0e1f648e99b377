use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope manager a scope was asked to join no longer exists (dropped,
    /// or the thread-local storage holding it was torn down).
    ManagerUnavailable,
    InvalidConfig {
        key: &'static str,
        value: String,
    },
    /// A statistics snapshot could not be encoded.
    Serialization {
        message: String,
    },
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManagerUnavailable => {
                write!(f, "cannot open a dispose scope: scope manager is not available")
            }
            Self::InvalidConfig { key, value } => {
                write!(f, "invalid value for {key}: {value:?} (expected \"ignore\" or \"warn\")")
            }
            Self::Serialization { message } => {
                write!(f, "failed to serialize statistics: {message}")
            }
        }
    }
}

impl Error for ScopeError {}
