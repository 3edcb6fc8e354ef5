use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use buildplan_consts::consts;
use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use thiserror::Error;

/// The name of a target, unique within its namespace.
///
/// A name is never empty, never contains the address separators `:` or `/`
/// and never contains whitespace.
#[derive(Debug, Clone, Serialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(transparent)]
pub struct TargetName(String);

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("'{name}' is not a valid target name, {reason}")]
#[diagnostic(code(buildplan::invalid_target_name))]
pub struct InvalidTargetName {
    pub name: String,
    pub reason: &'static str,
}

impl TargetName {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for TargetName {
    type Err = InvalidTargetName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| InvalidTargetName {
            name: s.to_string(),
            reason,
        };
        if s.is_empty() {
            return Err(invalid("it is empty"));
        }
        if s.contains(consts::NAME_SEPARATOR) || s.contains(consts::NAMESPACE_SEPARATOR) {
            return Err(invalid("it contains an address separator"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("it contains whitespace"));
        }
        Ok(TargetName(s.to_string()))
    }
}

impl TryFrom<String> for TargetName {
    type Error = InvalidTargetName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&str> for TargetName {
    type Error = InvalidTargetName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl<'de> Deserialize<'de> for TargetName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(D::Error::custom)
    }
}

impl Display for TargetName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for TargetName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("lib")]
    #[case("test-suite")]
    #[case("py_dist.whl")]
    fn test_valid_names(#[case] name: &str) {
        assert_eq!(name.parse::<TargetName>().unwrap().as_str(), name);
    }

    #[rstest]
    #[case("", "it is empty")]
    #[case("a:b", "it contains an address separator")]
    #[case("a/b", "it contains an address separator")]
    #[case("a b", "it contains whitespace")]
    fn test_invalid_names(#[case] name: &str, #[case] reason: &str) {
        let err = name.parse::<TargetName>().unwrap_err();
        assert_eq!(err.reason, reason);
        assert_eq!(err.name, name);
    }
}
