//! Minimal semver constraint matcher for `solc`/`yulc` pragmas (§4.4, §6).
//!
//! Supports the common Solidity pragma grammar: a bare version (`"0.8.24"`,
//! treated as `=`), or a version prefixed with one of `=`, `>=`, `<=`, `>`,
//! `<`, `^`, `~`, optionally chained with whitespace (`">=0.8.0 <0.9.0"`,
//! every clause must hold).

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut parts = text.trim().split('.');
        let mut next = |which: &str| -> Result<u32, Error> {
            parts
                .next()
                .ok_or_else(|| Error::version(format!("missing {which} version component in '{text}'")))?
                .parse::<u32>()
                .map_err(|_| Error::version(format!("invalid {which} version component in '{text}'")))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        if parts.next().is_some() {
            return Err(Error::version(format!("too many version components in '{text}'")));
        }
        Ok(Self { major, minor, patch })
    }
}

enum Op {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
    Caret,
    Tilde,
}

struct Clause {
    op: Op,
    version: Version,
}

impl Clause {
    fn parse(text: &str) -> Result<Self, Error> {
        let (op, rest) = if let Some(rest) = text.strip_prefix(">=") {
            (Op::Ge, rest)
        } else if let Some(rest) = text.strip_prefix("<=") {
            (Op::Le, rest)
        } else if let Some(rest) = text.strip_prefix('>') {
            (Op::Gt, rest)
        } else if let Some(rest) = text.strip_prefix('<') {
            (Op::Lt, rest)
        } else if let Some(rest) = text.strip_prefix('=') {
            (Op::Eq, rest)
        } else if let Some(rest) = text.strip_prefix('^') {
            (Op::Caret, rest)
        } else if let Some(rest) = text.strip_prefix('~') {
            (Op::Tilde, rest)
        } else {
            (Op::Eq, text)
        };
        Ok(Self {
            op,
            version: Version::parse(rest)?,
        })
    }

    fn matches(&self, v: Version) -> bool {
        match self.op {
            Op::Eq => v == self.version,
            Op::Ge => v >= self.version,
            Op::Le => v <= self.version,
            Op::Gt => v > self.version,
            Op::Lt => v < self.version,
            Op::Caret => {
                v >= self.version
                    && v.major == self.version.major
                    && (self.version.major != 0 || v.minor == self.version.minor)
            }
            Op::Tilde => v >= self.version && v.major == self.version.major && v.minor == self.version.minor,
        }
    }
}

/// Returns `Ok(())` when `actual` satisfies every whitespace-separated
/// clause in `constraint`.
pub fn satisfies(actual: Version, constraint: &str) -> Result<(), Error> {
    for clause_text in constraint.split_whitespace() {
        let clause = Clause::parse(clause_text)?;
        if !clause.matches(actual) {
            return Err(Error::version(format!(
                "version {}.{}.{} does not satisfy constraint '{constraint}'",
                actual.major, actual.minor, actual.patch
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_version_is_exact_match() {
        let v = Version::parse("0.8.24").unwrap();
        assert!(satisfies(v, "0.8.24").is_ok());
        assert!(satisfies(v, "0.8.23").is_err());
    }

    #[test]
    fn range_constraint() {
        let v = Version::parse("0.8.5").unwrap();
        assert!(satisfies(v, ">=0.8.0 <0.9.0").is_ok());
        let too_new = Version::parse("0.9.0").unwrap();
        assert!(satisfies(too_new, ">=0.8.0 <0.9.0").is_err());
    }

    #[test]
    fn caret_constraint_pins_major() {
        let v = Version::parse("0.8.9").unwrap();
        assert!(satisfies(v, "^0.8.0").is_ok());
        let next_minor = Version::parse("0.9.0").unwrap();
        assert!(satisfies(next_minor, "^0.8.0").is_err());
    }
}
