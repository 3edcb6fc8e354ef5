use std::fmt::{self, Display, Formatter};

use buildplan_target::Address;
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

/// A target transitively depends on itself.
///
/// The cycle path starts at the target through which the cycle was entered
/// and ends with that same target again, so a target that depends on itself
/// is reported as `[a, a]`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cyclic dependency detected: {}", .cycle_path.iter().format(" -> "))]
pub struct CyclicDependencyError {
    pub cycle_path: Vec<Address>,
}

impl CyclicDependencyError {
    /// The names of the targets along the cycle path.
    pub fn names(&self) -> Vec<&str> {
        self.cycle_path
            .iter()
            .map(|address| address.name().as_str())
            .collect()
    }

    /// Renders the cycle as a box diagram, one dependency per step.
    pub fn diagram(&self) -> CycleDiagram<'_> {
        CycleDiagram(&self.cycle_path)
    }
}

impl Diagnostic for CyclicDependencyError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("buildplan::cyclic_dependency"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.diagram()))
    }
}

pub struct CycleDiagram<'a>(&'a [Address]);

impl Display for CycleDiagram<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let steps = self.0.len().saturating_sub(1);
        if steps == 0 {
            return writeln!(f, "Empty cycle detected");
        }

        // Top border
        writeln!(f, "┌──→──┐")?;

        for (i, (from, to)) in self.0.iter().tuple_windows().enumerate() {
            writeln!(f, "|  {from}")?;
            writeln!(f, "|    depends on {to}")?;

            if i < steps - 1 {
                writeln!(f, "↑     ↓")?;
            }
        }

        // Bottom border
        writeln!(f, "└──←──┘")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(addresses: &[&str]) -> CyclicDependencyError {
        CyclicDependencyError {
            cycle_path: addresses.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn test_cycle_display() {
        let err = cycle(&["src:a", "src:b", "tests:c", "src:a"]);
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected: src:a -> src:b -> tests:c -> src:a"
        );
        assert_eq!(err.names(), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_cycle_diagram() {
        let err = cycle(&["src:a", "src:b", "tests:c", "src:a"]);
        insta::assert_snapshot!(err.diagram().to_string(), @r"
        ┌──→──┐
        |  src:a
        |    depends on src:b
        ↑     ↓
        |  src:b
        |    depends on tests:c
        ↑     ↓
        |  tests:c
        |    depends on src:a
        └──←──┘
        ");
    }

    #[test]
    fn test_self_dependency_diagram() {
        let err = cycle(&["//:a", "//:a"]);
        assert_eq!(
            err.diagram().to_string(),
            "┌──→──┐\n|  //:a\n|    depends on //:a\n└──←──┘\n"
        );
    }
}
