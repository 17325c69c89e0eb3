//! Semantic version counters.
//!
//! Both the project summary and the changelog carry one of these. The two
//! counters move independently of each other.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    /// Major component
    pub major: u64,

    /// Minor component
    pub minor: u64,

    /// Patch component
    pub patch: u64,
}

/// Error returned when a version string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{0}': expected MAJOR.MINOR.PATCH")]
pub struct SemVerError(pub String);

impl SemVer {
    /// The version assigned to the first summary or changelog.
    pub const INITIAL: SemVer = SemVer::new(1, 0, 0);

    /// Create a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Next patch release.
    pub fn bump_patch(self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    /// Next minor release; resets patch.
    pub fn bump_minor(self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Next major release; resets minor and patch.
    pub fn bump_major(self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }
}

impl Default for SemVer {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for SemVer {
    type Err = SemVerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let mut parts = trimmed.split('.');
        let mut next = || -> Result<u64, SemVerError> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| SemVerError(s.to_string()))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(SemVerError(s.to_string()));
        }
        Ok(version)
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v: SemVer = "1.4.12".parse().unwrap();
        assert_eq!(v, SemVer::new(1, 4, 12));
        assert_eq!(v.to_string(), "1.4.12");
    }

    #[test]
    fn test_parse_accepts_leading_v() {
        assert_eq!("v2.0.1".parse::<SemVer>().unwrap(), SemVer::new(2, 0, 1));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("1.2".parse::<SemVer>().is_err());
        assert!("1.2.3.4".parse::<SemVer>().is_err());
        assert!("one.two.three".parse::<SemVer>().is_err());
        assert!("".parse::<SemVer>().is_err());
    }

    #[test]
    fn test_bumps() {
        let v = SemVer::new(1, 2, 3);
        assert_eq!(v.bump_patch(), SemVer::new(1, 2, 4));
        assert_eq!(v.bump_minor(), SemVer::new(1, 3, 0));
        assert_eq!(v.bump_major(), SemVer::new(2, 0, 0));
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(SemVer::new(1, 10, 0) > SemVer::new(1, 9, 9));
        assert!(SemVer::new(2, 0, 0) > SemVer::new(1, 99, 99));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&SemVer::new(3, 1, 0)).unwrap();
        assert_eq!(json, "\"3.1.0\"");
        let back: SemVer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemVer::new(3, 1, 0));
    }
}
