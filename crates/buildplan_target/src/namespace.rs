use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use buildplan_consts::consts;
use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use thiserror::Error;

/// The scope a target is declared in, usually the directory of the manifest
/// that declared it.
///
/// Namespaces are normalized on construction: a leading `//` or `./` and a
/// trailing `/` are stripped and `.` components are dropped. The root
/// namespace is the empty string.
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(transparent)]
pub struct Namespace(String);

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("'{namespace}' is not a valid namespace, {reason}")]
#[diagnostic(code(buildplan::invalid_namespace))]
pub struct InvalidNamespace {
    pub namespace: String,
    pub reason: &'static str,
}

impl Namespace {
    /// The root namespace.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the last component of the namespace, which is the name a
    /// reference to the namespace without an explicit target name refers to.
    pub fn default_name(&self) -> Option<&str> {
        self.0.rsplit(consts::NAMESPACE_SEPARATOR).next().filter(|s| !s.is_empty())
    }
}

impl FromStr for Namespace {
    type Err = InvalidNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| InvalidNamespace {
            namespace: s.to_string(),
            reason,
        };

        let trimmed = s.strip_prefix(consts::ROOT_PREFIX).unwrap_or(s);
        let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
        let trimmed = trimmed.trim_end_matches(consts::NAMESPACE_SEPARATOR);
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::root());
        }
        if trimmed.starts_with(consts::NAMESPACE_SEPARATOR) {
            return Err(invalid("it is an absolute path"));
        }

        let mut components = Vec::new();
        for component in trimmed.split(consts::NAMESPACE_SEPARATOR) {
            match component {
                "" => return Err(invalid("it contains an empty path component")),
                "." => continue,
                ".." => return Err(invalid("it escapes the workspace root")),
                _ if component.contains(consts::NAME_SEPARATOR) => {
                    return Err(invalid("it contains a ':'"));
                }
                _ if component.chars().any(char::is_whitespace) => {
                    return Err(invalid("it contains whitespace"));
                }
                _ => components.push(component),
            }
        }

        Ok(Self(components.into_iter().join("/")))
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let namespace = String::deserialize(deserializer)?;
        namespace.parse().map_err(D::Error::custom)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(consts::ROOT_PREFIX)
        } else {
            f.write_str(self.as_str())
        }
    }
}
