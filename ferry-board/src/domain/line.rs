//! Ferry line identifiers.

use std::fmt;

use serde::Serialize;

/// Error returned when parsing an invalid line identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid line id: {reason}")]
pub struct InvalidLineId {
    reason: &'static str,
}

/// Longest accepted line identifier.
const MAX_LEN: usize = 32;

/// Identifier of one ferry line, e.g. `shuttle` or `city`.
///
/// Line ids become path segments of upstream document URLs, so only
/// lowercase ASCII letters, digits, `-` and `_` are accepted.
///
/// # Examples
///
/// ```
/// use ferry_board::domain::LineId;
///
/// let line = LineId::parse("city").unwrap();
/// assert_eq!(line.as_str(), "city");
///
/// assert!(LineId::parse("").is_err());
/// assert!(LineId::parse("../etc").is_err());
/// assert!(LineId::parse("City").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn parse(s: &str) -> Result<Self, InvalidLineId> {
        if s.is_empty() {
            return Err(InvalidLineId {
                reason: "must not be empty",
            });
        }

        if s.len() > MAX_LEN {
            return Err(InvalidLineId {
                reason: "must be at most 32 characters",
            });
        }

        let valid = s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
        if !valid {
            return Err(InvalidLineId {
                reason: "must be lowercase ASCII letters, digits, '-' or '_'",
            });
        }

        Ok(LineId(s.to_string()))
    }

    /// Parse after trimming whitespace and lowercasing.
    pub fn parse_normalized(s: &str) -> Result<Self, InvalidLineId> {
        Self::parse(&s.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineId({})", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_ids() {
        assert!(LineId::parse("shuttle").is_ok());
        assert!(LineId::parse("city").is_ok());
        assert!(LineId::parse("line-2").is_ok());
        assert!(LineId::parse("north_pier").is_ok());
    }

    #[test]
    fn reject_path_characters() {
        assert!(LineId::parse("a/b").is_err());
        assert!(LineId::parse("..").is_err());
        assert!(LineId::parse("a b").is_err());
        assert!(LineId::parse("a?b").is_err());
    }

    #[test]
    fn reject_too_long() {
        let long = "a".repeat(33);
        assert!(LineId::parse(&long).is_err());
        assert!(LineId::parse(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn normalized_parse_lowercases() {
        let line = LineId::parse_normalized("  City ").unwrap();
        assert_eq!(line.as_str(), "city");
    }
}
