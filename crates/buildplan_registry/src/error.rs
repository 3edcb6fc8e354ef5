use std::fmt::{self, Display, Formatter};

use buildplan_target::{Address, FancyDisplay, InvalidReference, TargetError, TargetName, TargetRef};
use miette::Diagnostic;
use thiserror::Error;

/// A target was registered under a key that is already taken.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("the target '{name}' is declared more than once")]
#[diagnostic(
    code(buildplan::duplicate_target),
    help("'{address}' conflicts with the earlier declaration '{existing}'")
)]
pub struct DuplicateTargetError {
    /// The name that is declared twice.
    pub name: TargetName,
    /// The address of the rejected declaration.
    pub address: Address,
    /// The address of the declaration that was registered first.
    pub existing: Address,
}

/// A reference could not be resolved to a registered target.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct UnknownTargetError {
    /// The reference as it was declared.
    pub reference: TargetRef,
    /// The target that declared the reference, `None` for direct lookups.
    pub referencing_target: Option<Address>,
    /// Why the reference could not be interpreted, if it was malformed.
    #[source]
    pub invalid: Option<InvalidReference>,
    /// Registered targets with a name similar to the reference.
    pub suggestions: Vec<Address>,
}

impl Display for UnknownTargetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "could not find the target '{}'", self.reference)?;
        if let Some(referencing_target) = &self.referencing_target {
            write!(f, " referenced by '{referencing_target}'")?;
        }
        Ok(())
    }
}

impl Diagnostic for UnknownTargetError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("buildplan::unknown_target"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        if self.suggestions.is_empty() {
            return None;
        }
        let suggestions = self
            .suggestions
            .iter()
            .map(|address| address.fancy_display().to_string())
            .collect::<Vec<_>>()
            .join("', '");
        Some(Box::new(format!("did you mean '{suggestions}'?")))
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Duplicate(#[from] DuplicateTargetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidTarget(#[from] TargetError),
}
