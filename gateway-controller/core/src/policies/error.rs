use super::PolicyKind;
use crate::routes::ResourceId;
use gateway_controller_k8s_api::{duration, size};
use std::fmt;

/// A policy whose contents cannot be rendered.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid {field} {value:?}: {source}")]
    InvalidSize {
        field: &'static str,
        value: String,
        #[source]
        source: size::ParseError,
    },

    #[error("invalid {field} {value:?}: {source}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: duration::ParseError,
    },

    #[error("{field} must be between 0 and 100, not {value}")]
    InvalidRatio { field: &'static str, value: u32 },
}

/// A generation failure, attributed to the policy that caused it so that it
/// can be reported on that policy's status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{kind} {policy}: {error}")]
pub struct GenerateError {
    pub kind: PolicyKind,
    pub policy: ResourceId,
    #[source]
    pub error: PolicyError,
}

/// Every generation failure found in a pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Errors(Vec<GenerateError>);

// === impl Errors ===

impl Errors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenerateError> {
        self.0.iter()
    }

    pub fn push(&mut self, error: GenerateError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, errors: Errors) {
        self.0.extend(errors.0);
    }

    /// Returns `ok` if no errors were collected.
    pub fn into_result<T>(self, ok: T) -> Result<T, Errors> {
        if self.is_empty() {
            Ok(ok)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("no errors"),
            [error] => fmt::Display::fmt(error, f),
            errors => {
                write!(f, "{} policy errors", errors.len())?;
                for error in errors {
                    write!(f, "; {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Errors {}

impl From<GenerateError> for Errors {
    fn from(error: GenerateError) -> Self {
        Self(vec![error])
    }
}

impl FromIterator<GenerateError> for Errors {
    fn from_iter<I: IntoIterator<Item = GenerateError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Errors {
    type Item = GenerateError;
    type IntoIter = std::vec::IntoIter<GenerateError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_error(name: &str) -> GenerateError {
        GenerateError {
            kind: PolicyKind::ClientSettings,
            policy: ResourceId::new("default", name),
            error: PolicyError::InvalidSize {
                field: "body.maxSize",
                value: "10x".to_string(),
                source: size::ParseError::InvalidUnit,
            },
        }
    }

    #[test]
    fn display() {
        let one = Errors::from(mk_error("a"));
        assert_eq!(
            one.to_string(),
            "ClientSettingsPolicy default/a: invalid body.maxSize \"10x\": \
             invalid unit: expected no unit or one of 'k', 'm', or 'g'"
        );

        let two = [mk_error("a"), mk_error("b")].into_iter().collect::<Errors>();
        assert!(two.to_string().starts_with("2 policy errors; "));
        assert!(two.to_string().contains("default/b"));
    }

    #[test]
    fn into_result() {
        assert_eq!(Errors::default().into_result(1), Ok(1));
        assert!(Errors::from(mk_error("a")).into_result(1).is_err());
    }
}
