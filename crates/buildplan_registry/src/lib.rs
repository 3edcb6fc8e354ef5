//! The target registry: the single owner of all targets declared for a
//! build invocation, and the place where references are resolved.

mod error;
mod registry;

pub use error::{DuplicateTargetError, RegistryError, UnknownTargetError};
pub use registry::TargetRegistry;
