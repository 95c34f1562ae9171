use serde::{Deserialize, Serialize};
use std::fmt;

/// A size literal as written in a policy: one to four digits followed by an
/// optional, case-insensitive unit (`k`, `m` or `g`). A literal without a unit
/// is measured in bytes.
///
/// The literal is kept verbatim so that the proxy receives exactly what the
/// user wrote. An empty literal is treated as unset.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct Size(String);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("size is empty")]
    Empty,

    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("expected between 1 and 4 digits")]
    InvalidDigits,
}

const EXPECTED_UNITS: &str = "expected no unit or one of 'k', 'm', or 'g'";

const MAX_DIGITS: usize = 4;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

impl Size {
    pub fn new(literal: impl Into<String>) -> Self {
        Self(literal.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the literal into a byte count.
    pub fn to_bytes(&self) -> Result<u64, ParseError> {
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
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidDigits)?;

        let multiplier = match unit {
            "" => 1,
            "k" | "K" => KIB,
            "m" | "M" => MIB,
            "g" | "G" => GIB,
            _ => return Err(ParseError::InvalidUnit),
        };
        Ok(val * multiplier)
    }

    /// Returns whichever literal denotes the larger byte count.
    ///
    /// An unset literal never wins and is never parsed, so it acts as the
    /// identity of the merge. When both literals denote the same number of
    /// bytes, `other` is returned.
    pub fn max(self, other: Size) -> Result<Size, ParseError> {
        if self.is_unset() {
            return Ok(other);
        }
        if other.is_unset() {
            return Ok(self);
        }

        if self.to_bytes()? > other.to_bytes()? {
            Ok(self)
        } else {
            Ok(other)
        }
    }

    /// Reduces a set of literals to the largest one, or `None` if every
    /// literal is unset.
    pub fn max_of<I>(sizes: I) -> Result<Option<Size>, ParseError>
    where
        I: IntoIterator<Item = Size>,
    {
        let max = sizes
            .into_iter()
            .try_fold(Size::default(), |acc, size| acc.max(size))?;
        Ok(if max.is_unset() { None } else { Some(max) })
    }
}

impl fmt::Debug for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Size {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", 0)]
    #[case("10", 10)]
    #[case("9999", 9999)]
    #[case("1k", 1024)]
    #[case("1K", 1024)]
    #[case("1024k", 1024 * 1024)]
    #[case("10m", 10 * 1024 * 1024)]
    #[case("10M", 10 * 1024 * 1024)]
    #[case("2g", 2_147_483_648)]
    #[case("9999g", 9999 * 1024 * 1024 * 1024)]
    fn parses_to_bytes(#[case] literal: &str, #[case] bytes: u64) {
        assert_eq!(Size::from(literal).to_bytes(), Ok(bytes));
    }

    #[rstest]
    #[case("", ParseError::Empty)]
    #[case("k", ParseError::InvalidDigits)]
    #[case("10000", ParseError::InvalidDigits)]
    #[case("12345m", ParseError::InvalidDigits)]
    #[case("10b", ParseError::InvalidUnit)]
    #[case("10kb", ParseError::InvalidUnit)]
    #[case("1.5m", ParseError::InvalidUnit)]
    #[case(" 1m", ParseError::InvalidDigits)]
    fn rejects_malformed(#[case] literal: &str, #[case] error: ParseError) {
        assert_eq!(Size::from(literal).to_bytes(), Err(error));
    }

    #[rstest]
    #[case("1k", "1m", "1m")]
    #[case("2g", "1024m", "2g")]
    #[case("", "5k", "5k")]
    #[case("5k", "", "5k")]
    #[case("10", "1k", "1k")]
    #[case("", "", "")]
    fn max(#[case] a: &str, #[case] b: &str, #[case] expected: &str) {
        assert_eq!(Size::from(a).max(Size::from(b)).unwrap(), Size::from(expected));
    }

    #[test]
    fn max_is_value_based() {
        let a = Size::from("1024");
        let b = Size::from("1k");
        let ab = a.clone().max(b.clone()).unwrap();
        let ba = b.max(a).unwrap();
        assert_eq!(ab.to_bytes(), ba.to_bytes());
        assert_eq!(ab.to_bytes(), Ok(1024));
    }

    #[test]
    fn max_of_is_order_independent() {
        let forward = Size::max_of(["10m".into(), "1024k".into()]).unwrap().unwrap();
        let reverse = Size::max_of(["1024k".into(), "10m".into()]).unwrap().unwrap();
        assert_eq!(forward.to_bytes(), reverse.to_bytes());
        assert_eq!(forward, Size::from("10m"));
    }

    #[test]
    fn max_of_single_is_identity() {
        assert_eq!(
            Size::max_of(["7K".into()]).unwrap(),
            Some(Size::from("7K"))
        );
    }

    #[test]
    fn max_of_unset_is_none() {
        assert_eq!(Size::max_of([]).unwrap(), None);
        assert_eq!(Size::max_of([Size::default()]).unwrap(), None);
    }

    #[test]
    fn max_of_reports_malformed() {
        assert_eq!(
            Size::max_of(["1m".into(), "lots".into()]),
            Err(ParseError::InvalidDigits)
        );
    }
}
