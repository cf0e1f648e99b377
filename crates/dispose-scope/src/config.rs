use std::env::VarError;

use crate::ScopeError;

pub const OUT_OF_ORDER_ENV: &str = "DISPOSE_SCOPE_OUT_OF_ORDER";

/// What to do when a scope that is not on top of the stack is ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfOrderPolicy {
    /// Remove the scope from wherever it sits, silently.
    Ignore,
    /// Remove the scope from wherever it sits and emit a `tracing` warning.
    #[default]
    Warn,
}

impl OutOfOrderPolicy {
    pub fn parse(value: &str) -> Result<Self, ScopeError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            _ => Err(ScopeError::InvalidConfig {
                key: OUT_OF_ORDER_ENV,
                value: value.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeConfig {
    pub out_of_order_end: OutOfOrderPolicy,
}

impl ScopeConfig {
    /// Reads `DISPOSE_SCOPE_OUT_OF_ORDER`; unset means the default.
    pub fn from_env() -> Result<Self, ScopeError> {
        Self::from_var(std::env::var(OUT_OF_ORDER_ENV))
    }

    fn from_var(var: Result<String, VarError>) -> Result<Self, ScopeError> {
        match var {
            Ok(value) => Self::from_value(Some(&value)),
            Err(VarError::NotPresent) => Self::from_value(None),
            Err(VarError::NotUnicode(raw)) => Err(ScopeError::InvalidConfig {
                key: OUT_OF_ORDER_ENV,
                value: raw.to_string_lossy().into_owned(),
            }),
        }
    }

    pub(crate) fn from_value(value: Option<&str>) -> Result<Self, ScopeError> {
        let out_of_order_end = match value {
            Some(value) => OutOfOrderPolicy::parse(value)?,
            None => OutOfOrderPolicy::default(),
        };
        Ok(Self { out_of_order_end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_policies_case_insensitively() {
        assert_eq!(OutOfOrderPolicy::parse("ignore"), Ok(OutOfOrderPolicy::Ignore));
        assert_eq!(OutOfOrderPolicy::parse(" WARN "), Ok(OutOfOrderPolicy::Warn));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = OutOfOrderPolicy::parse("panic").unwrap_err();
        assert_eq!(
            err,
            ScopeError::InvalidConfig {
                key: OUT_OF_ORDER_ENV,
                value: "panic".to_owned(),
            }
        );
        assert!(err.to_string().contains(OUT_OF_ORDER_ENV));
    }

    #[test]
    fn missing_value_uses_default() {
        assert_eq!(ScopeConfig::from_value(None), Ok(ScopeConfig::default()));
        assert_eq!(
            ScopeConfig::default().out_of_order_end,
            OutOfOrderPolicy::Warn
        );
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert_eq!(
            ScopeConfig::from_value(Some("bogus")),
            Err(ScopeError::InvalidConfig {
                key: OUT_OF_ORDER_ENV,
                value: "bogus".to_owned(),
            })
        );
        assert_eq!(
            ScopeConfig::from_var(Ok("ignore".to_owned())).map(|c| c.out_of_order_end),
            Ok(OutOfOrderPolicy::Ignore)
        );
        assert_eq!(ScopeConfig::from_var(Err(VarError::NotPresent)), Ok(ScopeConfig::default()));
    }

    #[test]
    fn non_unicode_value_is_rejected() {
        let raw = std::ffi::OsString::from("warn");
        assert_eq!(
            ScopeConfig::from_var(Err(VarError::NotUnicode(raw))),
            Err(ScopeError::InvalidConfig {
                key: OUT_OF_ORDER_ENV,
                value: "warn".to_owned(),
            })
        );
    }
}
