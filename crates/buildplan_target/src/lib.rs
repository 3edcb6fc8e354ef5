//! The data model of buildplan: targets, the namespaces they are declared
//! in, their addresses and the unresolved references between them.

mod address;
mod name;
mod namespace;
mod sources;
mod target;

use console::StyledObject;

pub use address::{Address, InvalidReference, TargetRef};
pub use name::{InvalidTargetName, TargetName};
pub use namespace::{InvalidNamespace, Namespace};
pub use sources::{InvalidSourcePattern, SourcePatterns};
pub use target::{OptionValue, Target, TargetDeclaration, TargetError, TargetKind};

/// Easy conversion into a styled object for human facing output.
pub trait FancyDisplay {
    fn fancy_display(&self) -> StyledObject<String>;
}
