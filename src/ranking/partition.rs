//! Partition selectors.
//!
//! Parsed from `global`, `country:<code>`, `friends:<id>,<id>,...` and
//! `window:<duration>` (e.g. `window:7d`).

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{PlayerId, ValidationError};
use crate::parse_duration;

/// Which slice of players a rank query ranks against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Partition {
    #[default]
    Global,

    /// Upper-case ISO 3166-1 alpha-2 code
    Country(String),

    /// Caller-resolved friend ids; the querying player is added for rank,
    /// and for Top-N when given through [`Partition::with_viewer`]
    Friends(HashSet<PlayerId>),

    /// Results created within this long before now
    Window(Duration),
}

impl Partition {
    /// Country partition, validating and normalizing the code.
    pub fn country(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new(
                "partition",
                format!("country code must be two letters, got '{}'", code),
            ));
        }
        Ok(Partition::Country(code.to_ascii_uppercase()))
    }

    pub fn friends(ids: impl IntoIterator<Item = PlayerId>) -> Self {
        Partition::Friends(ids.into_iter().collect())
    }

    /// Add the viewing player to a friends partition; other kinds are unchanged.
    pub fn with_viewer(self, viewer: &PlayerId) -> Self {
        match self {
            Partition::Friends(mut ids) => {
                ids.insert(viewer.clone());
                Partition::Friends(ids)
            }
            other => other,
        }
    }

    pub fn window(length: Duration) -> Result<Self, ValidationError> {
        if length.is_zero() {
            return Err(ValidationError::new("partition", "window must be longer than zero"));
        }
        Ok(Partition::Window(length))
    }
}

impl FromStr for Partition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("global") {
            return Ok(Partition::Global);
        }

        let (kind, arg) = s.split_once(':').ok_or_else(|| {
            ValidationError::new("partition", format!("unknown partition '{}'", s))
        })?;

        match kind.to_ascii_lowercase().as_str() {
            "country" => Partition::country(arg),
            "friends" => Ok(Partition::friends(
                arg.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(PlayerId::from),
            )),
            "window" => {
                let length = parse_duration(arg).ok_or_else(|| {
                    ValidationError::new("partition", format!("invalid window '{}'", arg))
                })?;
                Partition::window(length)
            }
            _ => Err(ValidationError::new(
                "partition",
                format!("unknown partition '{}'", kind),
            )),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Global => write!(f, "global"),
            Partition::Country(code) => write!(f, "country:{}", code),
            Partition::Friends(ids) => {
                let mut ids: Vec<&str> = ids.iter().map(PlayerId::as_str).collect();
                ids.sort_unstable();
                write!(f, "friends:{}", ids.join(","))
            }
            Partition::Window(length) => write!(f, "window:{}s", length.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global() {
        assert_eq!("global".parse::<Partition>().unwrap(), Partition::Global);
        assert_eq!("".parse::<Partition>().unwrap(), Partition::Global);
    }

    #[test]
    fn test_parse_country_case_insensitive() {
        assert_eq!(
            "country:fr".parse::<Partition>().unwrap(),
            Partition::Country("FR".to_string())
        );
    }

    #[test]
    fn test_parse_country_rejects_bad_codes() {
        assert!("country:FRA".parse::<Partition>().is_err());
        assert!("country:F1".parse::<Partition>().is_err());
        assert!("country:".parse::<Partition>().is_err());
    }

    #[test]
    fn test_parse_friends() {
        let partition: Partition = "friends:a, b,,c".parse().unwrap();
        let expected = Partition::friends(["a".into(), "b".into(), "c".into()]);
        assert_eq!(partition, expected);
        assert_eq!(partition.to_string(), "friends:a,b,c");
    }

    #[test]
    fn test_parse_window() {
        assert_eq!(
            "window:7d".parse::<Partition>().unwrap(),
            Partition::Window(Duration::from_secs(7 * 86400))
        );
        assert_eq!(
            "window:24h".parse::<Partition>().unwrap().to_string(),
            "window:86400s"
        );
    }

    #[test]
    fn test_parse_window_rejects_zero_and_garbage() {
        assert!("window:0h".parse::<Partition>().is_err());
        assert!("window:soon".parse::<Partition>().is_err());
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "guild:abc".parse::<Partition>().unwrap_err();
        assert_eq!(err.field, "partition");
        assert!("everyone".parse::<Partition>().is_err());
    }

    #[test]
    fn test_with_viewer_only_touches_friends() {
        let friends = Partition::friends(["a".into()]).with_viewer(&"me".into());
        assert_eq!(friends, Partition::friends(["a".into(), "me".into()]));

        let global = Partition::Global.with_viewer(&"me".into());
        assert_eq!(global, Partition::Global);
    }
}
