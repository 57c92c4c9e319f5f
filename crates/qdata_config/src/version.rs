//! A small subset of PEP-440 specifier matching: enough to express the
//! one pattern the original service's config ever used (`>=X.Y.Z`), plus
//! `==` and bare-version equality, against a dotted-numeric client
//! version with an optional trailing `.dev` suffix stripped first.
//!
//! No PEP-440 crate exists anywhere in the example pack this project was
//! grounded on, so this implements exactly the grammar actually observed
//! rather than reaching for a general version-specifier library.

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u64, pub u64, pub u64);

impl Version {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.strip_suffix(".dev").unwrap_or(s);
        let mut parts = s.split('.');
        let major = parts
            .next()
            .ok_or_else(|| ConfigError::InvalidVersion(s.to_string()))?
            .parse()
            .map_err(|_| ConfigError::InvalidVersion(s.to_string()))?;
        let minor = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| ConfigError::InvalidVersion(s.to_string()))?;
        let patch = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| ConfigError::InvalidVersion(s.to_string()))?;
        Ok(Version(major, minor, patch))
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Ge,
    Eq,
}

/// A parsed acceptance rule, e.g. `">=0.4.0"`.
#[derive(Debug, Clone, Copy)]
pub struct VersionSpec {
    op: Op,
    bound: Version,
}

impl VersionSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if let Some(rest) = spec.strip_prefix(">=") {
            Ok(VersionSpec {
                op: Op::Ge,
                bound: Version::parse(rest.trim())?,
            })
        } else if let Some(rest) = spec.strip_prefix("==") {
            Ok(VersionSpec {
                op: Op::Eq,
                bound: Version::parse(rest.trim())?,
            })
        } else {
            Ok(VersionSpec {
                op: Op::Eq,
                bound: Version::parse(spec)?,
            })
        }
    }

    pub fn accepts(&self, client_version: &str) -> Result<bool> {
        let version = Version::parse(client_version)?;
        Ok(match self.op {
            Op::Ge => version >= self.bound,
            Op::Eq => version == self.bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_dev_suffix() {
        let spec = VersionSpec::parse(">=0.4.0").unwrap();
        assert!(spec.accepts("0.4.1.dev").unwrap());
    }

    #[test]
    fn rejects_older_version() {
        let spec = VersionSpec::parse(">=0.4.0").unwrap();
        assert!(!spec.accepts("0.3.9").unwrap());
    }

    #[test]
    fn exact_match_rejects_other_versions() {
        let spec = VersionSpec::parse("==1.2.0").unwrap();
        assert!(spec.accepts("1.2.0").unwrap());
        assert!(!spec.accepts("1.2.1").unwrap());
    }
}
