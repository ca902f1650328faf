//! Levels of assurance and service provider types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Levels of assurance notified under the eIDAS regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NotifiedLoa {
    /// `http://eidas.europa.eu/LoA/low`
    Low,
    /// `http://eidas.europa.eu/LoA/substantial`
    Substantial,
    /// `http://eidas.europa.eu/LoA/high`
    High,
}

impl NotifiedLoa {
    /// All notified levels, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Substantial, Self::High];

    /// Returns the URI of this level.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Low => "http://eidas.europa.eu/LoA/low",
            Self::Substantial => "http://eidas.europa.eu/LoA/substantial",
            Self::High => "http://eidas.europa.eu/LoA/high",
        }
    }

    /// Returns the numeric rank of this level (1 to 3).
    #[must_use]
    pub const fn numeric(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Substantial => 2,
            Self::High => 3,
        }
    }

    /// Returns the highest notified level.
    #[must_use]
    pub const fn highest() -> Self {
        Self::High
    }

    /// Parses a level from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|loa| loa.uri() == uri.trim())
    }

    /// Returns this level and every level above it.
    #[must_use]
    pub fn and_higher(self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|loa| *loa >= self).collect()
    }
}

impl fmt::Display for NotifiedLoa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Comparison operator of a requested authentication context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaComparison {
    /// The asserted level must be at least the requested one.
    #[default]
    Minimum,
    /// The asserted level must be one of the requested ones.
    Exact,
}

impl LoaComparison {
    /// Returns the SAML attribute value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimum => "minimum",
            Self::Exact => "exact",
        }
    }
}

impl FromStr for LoaComparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimum" => Ok(Self::Minimum),
            "exact" => Ok(Self::Exact),
            other => Err(format!("unsupported comparison {other}")),
        }
    }
}

/// Public or private sector service provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpType {
    /// Public sector.
    Public,
    /// Private sector.
    Private,
}

impl SpType {
    /// Returns the value carried in the `eidas:SPType` element.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl FromStr for SpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown SP type {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notified_ordering_matches_numeric() {
        assert!(NotifiedLoa::Low < NotifiedLoa::Substantial);
        assert!(NotifiedLoa::Substantial < NotifiedLoa::High);
        assert_eq!(NotifiedLoa::High.numeric(), 3);
    }

    #[test]
    fn parse_uri() {
        assert_eq!(
            NotifiedLoa::from_uri("http://eidas.europa.eu/LoA/substantial"),
            Some(NotifiedLoa::Substantial)
        );
        assert_eq!(NotifiedLoa::from_uri("http://eidas.europa.eu/LoA/NotNotified/low"), None);
        assert_eq!(NotifiedLoa::from_uri("substantial"), None);
    }

    #[test]
    fn and_higher() {
        assert_eq!(
            NotifiedLoa::Substantial.and_higher(),
            vec![NotifiedLoa::Substantial, NotifiedLoa::High]
        );
    }

    #[test]
    fn comparison_parsing() {
        assert_eq!("exact".parse::<LoaComparison>(), Ok(LoaComparison::Exact));
        assert!("better".parse::<LoaComparison>().is_err());
    }

    #[test]
    fn sp_type_parsing() {
        assert_eq!(" private ".parse::<SpType>(), Ok(SpType::Private));
        assert!("PUBLIC".parse::<SpType>().is_err());
    }
}
