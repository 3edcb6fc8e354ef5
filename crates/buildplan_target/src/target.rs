use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use serde::{Deserialize, Serialize, de::IntoDeserializer};
use thiserror::Error;

use crate::{
    Address, InvalidNamespace, InvalidSourcePattern, InvalidTargetName, Namespace,
    SourcePatterns, TargetName, TargetRef,
};

/// The kind of a target. The kind decides which options a target accepts,
/// the planner itself treats all kinds alike.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Library,
    Binary,
    Distribution,
    TestSuite,
    /// Groups other targets without sources of its own.
    Aggregate,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Library => "library",
            TargetKind::Binary => "binary",
            TargetKind::Distribution => "distribution",
            TargetKind::TestSuite => "test-suite",
            TargetKind::Aggregate => "aggregate",
        }
    }
}

impl FromStr for TargetKind {
    type Err = serde::de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s.into_deserializer())
    }
}

impl Display for TargetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque, kind-specific option value.
pub type OptionValue = serde_json::Value;

/// A target as it is produced by a manifest loader, before it is placed in a
/// namespace.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct TargetDeclaration {
    pub name: String,
    pub kind: TargetKind,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, alias = "depends-on")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub options: IndexMap<String, OptionValue>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum TargetError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidName(#[from] InvalidTargetName),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidNamespace(#[from] InvalidNamespace),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidSourcePattern(#[from] InvalidSourcePattern),
}

/// A named, buildable unit.
///
/// The dependencies of a target are kept as unresolved [`TargetRef`]s in the
/// order they were declared.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    address: Address,
    kind: TargetKind,
    sources: IndexSet<String>,
    dependencies: Vec<TargetRef>,
    options: IndexMap<String, OptionValue>,
}

impl Target {
    pub fn new(address: Address, kind: TargetKind) -> Self {
        Self {
            address,
            kind,
            sources: IndexSet::new(),
            dependencies: Vec::new(),
            options: IndexMap::new(),
        }
    }

    /// Places a declaration in the given namespace, validating its name and
    /// source patterns.
    pub fn from_declaration(
        namespace: &Namespace,
        declaration: TargetDeclaration,
    ) -> Result<Self, TargetError> {
        let name: TargetName = declaration.name.parse()?;
        Ok(Self::new(Address::new(namespace.clone(), name), declaration.kind)
            .with_sources(declaration.sources)?
            .with_dependencies(declaration.dependencies)
            .with_options(declaration.options))
    }

    /// Sets the source patterns of the target. Duplicate patterns are
    /// dropped.
    pub fn with_sources<S: Into<String>>(
        mut self,
        sources: impl IntoIterator<Item = S>,
    ) -> Result<Self, InvalidSourcePattern> {
        let sources: IndexSet<String> = sources.into_iter().map(Into::into).collect();
        SourcePatterns::compile(sources.iter().map(String::as_str))?;
        self.sources = sources;
        Ok(self)
    }

    pub fn with_dependencies<R: Into<TargetRef>>(
        mut self,
        dependencies: impl IntoIterator<Item = R>,
    ) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: IndexMap<String, OptionValue>) -> Self {
        self.options = options;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &TargetName {
        self.address.name()
    }

    pub fn namespace(&self) -> &Namespace {
        self.address.namespace()
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn sources(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.sources.iter().map(String::as_str)
    }

    /// Compiles the source patterns of this target into a matcher.
    pub fn source_patterns(&self) -> Result<SourcePatterns, InvalidSourcePattern> {
        SourcePatterns::compile(self.sources())
    }

    pub fn dependencies(&self) -> &[TargetRef] {
        &self.dependencies
    }

    pub fn options(&self) -> &IndexMap<String, OptionValue> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_declaration_from_toml() {
        let declaration: TargetDeclaration = toml_edit::de::from_str(
            r#"
            name = "tests"
            kind = "test-suite"
            sources = ["test_*.py", "test_*.py"]
            depends-on = [":lib", "//3rdparty:pytest"]
            options = { timeout = 60, tags = ["unit"] }
            "#,
        )
        .unwrap();

        let namespace: Namespace = "src/python".parse().unwrap();
        let target = Target::from_declaration(&namespace, declaration).unwrap();

        assert_eq!(target.address().to_string(), "src/python:tests");
        assert_eq!(target.kind(), TargetKind::TestSuite);
        assert_eq!(target.sources().collect::<Vec<_>>(), vec!["test_*.py"]);
        assert_eq!(
            target
                .dependencies()
                .iter()
                .map(TargetRef::as_str)
                .collect::<Vec<_>>(),
            vec![":lib", "//3rdparty:pytest"]
        );
        assert_eq!(target.option("timeout"), Some(&serde_json::json!(60)));
        assert_eq!(target.option("tags"), Some(&serde_json::json!(["unit"])));
    }

    #[test]
    fn test_invalid_declaration() {
        let declaration = TargetDeclaration {
            name: "bad name".to_string(),
            kind: TargetKind::Library,
            sources: vec![],
            dependencies: vec![],
            options: IndexMap::new(),
        };
        assert_matches!(
            Target::from_declaration(&Namespace::root(), declaration),
            Err(TargetError::InvalidName(_))
        );
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("test-suite".parse::<TargetKind>().unwrap(), TargetKind::TestSuite);
        assert!("wheel".parse::<TargetKind>().is_err());
        assert_eq!(TargetKind::Distribution.to_string(), "distribution");
    }
}
