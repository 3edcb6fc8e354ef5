use std::path::Path;

use buildplan_consts::consts;
use itertools::{Either, Itertools};
use miette::Diagnostic;
use thiserror::Error;
use wax::{Glob, Pattern};

#[derive(Debug, Error, Diagnostic)]
#[error("invalid source pattern '{pattern}'")]
#[diagnostic(code(buildplan::invalid_source_pattern))]
pub struct InvalidSourcePattern {
    pub pattern: String,
    #[source]
    pub source: wax::BuildError,
}

/// The compiled form of the source patterns of a target.
///
/// Patterns starting with `!` exclude paths that would otherwise be matched
/// by one of the inclusion patterns.
#[derive(Debug, Clone)]
pub struct SourcePatterns {
    include: Vec<Glob<'static>>,
    exclude: Vec<Glob<'static>>,
}

impl SourcePatterns {
    pub fn compile<'a>(
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, InvalidSourcePattern> {
        let (include, exclude): (Vec<_>, Vec<_>) =
            patterns.into_iter().partition_map(|pattern| {
                pattern
                    .strip_prefix(consts::EXCLUDE_PREFIX)
                    .map(Either::Right)
                    .unwrap_or(Either::Left(pattern))
            });

        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    /// Returns true if the path, relative to the namespace of the target, is
    /// one of the sources of the target.
    pub fn is_match(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.include.iter().any(|glob| glob.is_match(path))
            && !self.exclude.iter().any(|glob| glob.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }
}

fn compile_all(patterns: Vec<&str>) -> Result<Vec<Glob<'static>>, InvalidSourcePattern> {
    patterns
        .into_iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map(Glob::into_owned)
                .map_err(|source| InvalidSourcePattern {
                    pattern: pattern.to_string(),
                    source,
                })
        })
        .collect()
}
