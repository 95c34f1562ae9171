use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, time};

/// A duration literal as written in a policy, e.g. `10s` or `500ms`.
///
/// The literal is kept verbatim so that it can be rendered back into proxy
/// configuration unchanged. It is validated on demand with [`Duration::to_std`]
/// rather than when the resource is read, so that a malformed value is
/// reported against the policy that carries it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Duration(String);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("duration is empty")]
    Empty,

    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("expected between 1 and 4 digits")]
    InvalidDigits,
}

const EXPECTED_UNITS: &str = "expected one of 'ms', 's', 'm', or 'h'";

const MAX_DIGITS: usize = 4;

impl Duration {
    pub fn new(literal: impl Into<String>) -> Self {
        Self(literal.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the literal, following the `^\d{1,4}(ms|s|m|h)?$` grammar. A
    /// value without a unit is measured in seconds.
    pub fn to_std(&self) -> Result<time::Duration, ParseError> {
        const MINUTE: time::Duration = time::Duration::from_secs(60);

        let s = self.0.as_str();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let unit_start = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(unit_start);
        if digits.is_empty() || digits.len() > MAX_DIGITS {
            return Err(ParseError::InvalidDigits);
        }
        let val = digits
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidDigits)?;

        let base = match unit {
            "ms" => time::Duration::from_millis(1),
            "" | "s" => time::Duration::from_secs(1),
            "m" => MINUTE,
            "h" => MINUTE * 60,
            _ => return Err(ParseError::InvalidUnit),
        };
        Ok(base * val)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Duration {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for Duration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration string such as `30s` or `500ms`")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::new(value))
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

impl schemars::JsonSchema for Duration {
    fn schema_name() -> String {
        "Duration".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            // Not "duration": that format means ISO 8601.
            format: None,
            string: Some(Box::new(schemars::schema::StringValidation {
                pattern: Some(r"^\d{1,4}(ms|s|m|h)?$".to_owned()),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
