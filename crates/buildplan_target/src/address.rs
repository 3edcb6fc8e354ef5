use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use buildplan_consts::consts;
use console::StyledObject;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FancyDisplay, InvalidNamespace, InvalidTargetName, Namespace, TargetName};

/// The concrete identity of a target: the namespace it was declared in and
/// its name.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Address {
    namespace: Namespace,
    name: TargetName,
}

impl Address {
    pub fn new(namespace: Namespace, name: TargetName) -> Self {
        Self { namespace, name }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn name(&self) -> &TargetName {
        &self.name
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, consts::NAME_SEPARATOR, self.name)
    }
}

impl FromStr for Address {
    type Err = InvalidReference;

    /// Parses a fully qualified address. Sibling references (`:name`) are
    /// interpreted relative to the root namespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetRef::from(s).parse(&Namespace::root())
    }
}

impl FancyDisplay for Address {
    fn fancy_display(&self) -> StyledObject<String> {
        consts::TARGET_STYLE.apply_to(self.to_string())
    }
}

/// An unresolved reference from one target to another, kept verbatim as it
/// was declared.
///
/// References are only interpreted when they are resolved against a fully
/// populated registry, which allows declarations to refer to targets that
/// are registered later. The accepted forms are:
///
/// * `path/to/dir:name` or `//path/to/dir:name`, an explicit address.
/// * `:name` or `name`, a target in the namespace of the referencing target.
/// * `path/to/dir` or `//dir`, the target named after the last path
///   component.
/// * `//:name`, a target in the root namespace.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetRef(String);

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum InvalidReference {
    #[error("the reference is empty")]
    Empty,

    #[error("'{0}' does not name a target")]
    MissingName(String),

    #[error(transparent)]
    Namespace(#[from] InvalidNamespace),

    #[error(transparent)]
    Name(#[from] InvalidTargetName),
}

impl TargetRef {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Interprets this reference relative to the namespace of the target that
    /// declared it.
    pub fn parse(&self, base: &Namespace) -> Result<Address, InvalidReference> {
        let reference = self.0.as_str();
        if reference.is_empty() {
            return Err(InvalidReference::Empty);
        }

        if let Some((path, name)) = reference.split_once(consts::NAME_SEPARATOR) {
            if name.is_empty() {
                return Err(InvalidReference::MissingName(reference.to_string()));
            }
            let namespace = if path.is_empty() {
                base.clone()
            } else {
                path.parse()?
            };
            return Ok(Address::new(namespace, name.parse()?));
        }

        let is_path = reference.starts_with(consts::ROOT_PREFIX)
            || reference.contains(consts::NAMESPACE_SEPARATOR);
        if !is_path {
            return Ok(Address::new(base.clone(), reference.parse()?));
        }

        let namespace: Namespace = reference.parse()?;
        let name = namespace
            .default_name()
            .ok_or_else(|| InvalidReference::MissingName(reference.to_string()))?
            .parse()?;
        Ok(Address::new(namespace, name))
    }
}

impl Display for TargetRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TargetRef {
    fn from(reference: &str) -> Self {
        Self(reference.to_string())
    }
}

impl From<String> for TargetRef {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

impl From<&Address> for TargetRef {
    fn from(address: &Address) -> Self {
        Self(address.to_string())
    }
}
