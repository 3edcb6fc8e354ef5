use std::{cmp::Ordering, sync::Arc};

use buildplan_config::{Config, NamespacePolicy};
use buildplan_target::{Address, Namespace, Target, TargetDeclaration, TargetName, TargetRef};
use indexmap::{IndexMap, IndexSet, map::Entry};
use itertools::Itertools;
use parking_lot::RwLock;

use crate::{DuplicateTargetError, RegistryError, UnknownTargetError};

/// The identity a target is registered under, depends on the
/// [`NamespacePolicy`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum RegistryKey {
    Address(Address),
    Name(TargetName),
}

/// Owns every declared target of a build invocation.
///
/// The registry is populated once by one or more loaders, possibly running
/// concurrently, and is afterwards only read. Targets are handed out as
/// [`Arc`]s so derived views like the dependency graph can share them
/// without copying.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    policy: NamespacePolicy,
    targets: RwLock<IndexMap<RegistryKey, Arc<Target>>>,
}

impl TargetRegistry {
    pub fn new(policy: NamespacePolicy) -> Self {
        Self {
            policy,
            targets: RwLock::new(IndexMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.namespace_policy())
    }

    pub fn policy(&self) -> NamespacePolicy {
        self.policy
    }

    fn key(&self, address: &Address) -> RegistryKey {
        match self.policy {
            NamespacePolicy::PerNamespace => RegistryKey::Address(address.clone()),
            NamespacePolicy::Global => RegistryKey::Name(address.name().clone()),
        }
    }

    /// Adds a target to the registry.
    ///
    /// Registration is atomic per key: when several callers race to register
    /// the same key exactly one succeeds and all others receive a
    /// [`DuplicateTargetError`].
    pub fn register(&self, target: Target) -> Result<Arc<Target>, DuplicateTargetError> {
        let key = self.key(target.address());
        let registered = match self.targets.write().entry(key) {
            Entry::Occupied(entry) => {
                return Err(DuplicateTargetError {
                    name: target.name().clone(),
                    address: target.address().clone(),
                    existing: entry.get().address().clone(),
                });
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(target)).clone(),
        };
        tracing::debug!("registered target '{}'", registered.address());
        Ok(registered)
    }

    /// Registers all targets in order, stopping at the first duplicate.
    pub fn register_all(
        &self,
        targets: impl IntoIterator<Item = Target>,
    ) -> Result<(), DuplicateTargetError> {
        targets
            .into_iter()
            .try_for_each(|target| self.register(target).map(|_| ()))
    }

    /// Validates a declaration, places it in the given namespace and
    /// registers it.
    pub fn register_declaration(
        &self,
        namespace: &Namespace,
        declaration: TargetDeclaration,
    ) -> Result<Arc<Target>, RegistryError> {
        let target = Target::from_declaration(namespace, declaration)?;
        Ok(self.register(target)?)
    }

    /// Returns the target registered for the given address.
    pub fn get(&self, address: &Address) -> Option<Arc<Target>> {
        let targets = self.targets.read();
        targets
            .get(&self.key(address))
            .filter(|target| target.address() == address)
            .cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.get(address).is_some()
    }

    /// Resolves a reference relative to the root namespace.
    ///
    /// Under [`NamespacePolicy::Global`] only the name of the reference is
    /// used, so `other:lib` finds a target `lib` registered in any namespace.
    /// [`TargetRegistry::get`] on the other hand only returns a target for
    /// its exact address.
    pub fn lookup(&self, reference: &TargetRef) -> Result<Arc<Target>, UnknownTargetError> {
        self.resolve_in(reference, &Namespace::root(), None)
    }

    /// Resolves a reference declared by `referencing_target`, relative to
    /// the namespace of that target.
    ///
    /// Like [`TargetRegistry::lookup`] this matches on the name alone under
    /// [`NamespacePolicy::Global`].
    pub fn resolve(
        &self,
        reference: &TargetRef,
        referencing_target: &Target,
    ) -> Result<Arc<Target>, UnknownTargetError> {
        self.resolve_in(
            reference,
            referencing_target.namespace(),
            Some(referencing_target.address()),
        )
    }

    fn resolve_in(
        &self,
        reference: &TargetRef,
        base: &Namespace,
        referencing_target: Option<&Address>,
    ) -> Result<Arc<Target>, UnknownTargetError> {
        let unknown = |invalid, suggestions| UnknownTargetError {
            reference: reference.clone(),
            referencing_target: referencing_target.cloned(),
            invalid,
            suggestions,
        };

        let address = reference
            .parse(base)
            .map_err(|err| unknown(Some(err), Vec::new()))?;

        let targets = self.targets.read();
        let found = match self.policy {
            NamespacePolicy::PerNamespace => targets.get(&RegistryKey::Address(address.clone())),
            NamespacePolicy::Global => targets.get(&RegistryKey::Name(address.name().clone())),
        };

        match found {
            Some(target) => {
                tracing::trace!("resolved '{reference}' to '{}'", target.address());
                Ok(target.clone())
            }
            None => Err(unknown(
                None,
                similar_addresses(targets.values(), address.name().as_str()),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    /// Returns the registered targets in registration order.
    ///
    /// The returned iterator works on a snapshot taken when this method is
    /// called; call it again to start over. Planning never depends on this
    /// order, only on the dependency edges.
    pub fn all_targets(&self) -> impl ExactSizeIterator<Item = Arc<Target>> + use<> {
        let snapshot = self.targets.read().values().cloned().collect_vec();
        snapshot.into_iter()
    }

    /// Returns the distinct namespaces that targets were registered in, in
    /// the order they were first seen.
    pub fn namespaces(&self) -> Vec<Namespace> {
        self.targets
            .read()
            .values()
            .map(|target| target.namespace().clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Finds up to three registered targets whose name looks like `name`.
fn similar_addresses<'a>(
    targets: impl Iterator<Item = &'a Arc<Target>>,
    name: &str,
) -> Vec<Address> {
    targets
        .filter_map(|target| {
            let distance = strsim::jaro(name, target.name().as_str());
            (distance > 0.8).then_some((distance, target.address().clone()))
        })
        .sorted_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal))
        .take(3)
        .map(|(_, address)| address)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use assert_matches::assert_matches;
    use buildplan_target::{InvalidReference, TargetKind};
    use rstest::rstest;

    use super::*;

    fn target(address: &str) -> Target {
        Target::new(address.parse().unwrap(), TargetKind::Library)
    }

    #[test]
    fn test_duplicate_in_same_namespace() {
        let registry = TargetRegistry::default();
        registry.register(target("src:foo")).unwrap();
        let err = registry.register(target("src:foo")).unwrap_err();
        assert_eq!(err.name.as_str(), "foo");
        assert_eq!(err.existing.to_string(), "src:foo");
    }

    #[rstest]
    #[case(NamespacePolicy::PerNamespace, true)]
    #[case(NamespacePolicy::Global, false)]
    fn test_same_name_in_other_namespace(#[case] policy: NamespacePolicy, #[case] allowed: bool) {
        let registry = TargetRegistry::new(policy);
        registry.register(target("a:lib")).unwrap();
        assert_eq!(registry.register(target("b:lib")).is_ok(), allowed);
    }

    #[test]
    fn test_concurrent_registration_has_one_winner() {
        let registry = TargetRegistry::default();
        let successes = AtomicUsize::new(0);
        let failures = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| match registry.register(target("src:foo")) {
                    Ok(_) => successes.fetch_add(1, Ordering::SeqCst),
                    Err(_) => failures.fetch_add(1, Ordering::SeqCst),
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 15);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_relative_to_referencing_target() {
        let registry = TargetRegistry::default();
        let lib = registry.register(target("src/python:lib")).unwrap();
        let tests = registry.register(target("src/python:tests")).unwrap();
        registry.register(target("src/python:python")).unwrap();

        let resolved = registry.resolve(&":lib".into(), &tests).unwrap();
        assert_eq!(resolved, lib);
        let resolved = registry.resolve(&"lib".into(), &tests).unwrap();
        assert_eq!(resolved, lib);
        let resolved = registry.resolve(&"//src/python".into(), &tests).unwrap();
        assert_eq!(resolved.address().to_string(), "src/python:python");
    }

    #[test]
    fn test_lookup_unknown_target() {
        let registry = TargetRegistry::default();
        registry.register(target("src:library")).unwrap();

        let err = registry.lookup(&"src:librar".into()).unwrap_err();
        assert_eq!(err.referencing_target, None);
        assert_eq!(err.invalid, None);
        assert_eq!(
            err.suggestions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["src:library"]
        );
        assert_eq!(err.to_string(), "could not find the target 'src:librar'");
    }

    #[test]
    fn test_malformed_reference_is_unknown() {
        let registry = TargetRegistry::default();
        let err = registry.lookup(&"src:".into()).unwrap_err();
        assert_matches!(err.invalid, Some(InvalidReference::MissingName(_)));
    }

    #[test]
    fn test_global_policy_resolves_by_name() {
        let registry = TargetRegistry::new(NamespacePolicy::Global);
        let lib = registry.register(target("deep/nested:lib")).unwrap();
        let app = registry.register(target("app:app")).unwrap();
        assert_eq!(registry.resolve(&"lib".into(), &app).unwrap(), lib);
        assert!(registry.get(&"deep/nested:lib".parse().unwrap()).is_some());

        // Lookups ignore the namespace, exact address queries do not.
        assert_eq!(registry.lookup(&"other:lib".into()).unwrap(), lib);
        assert!(registry.get(&"other:lib".parse().unwrap()).is_none());
    }

    #[test]
    fn test_register_all_stops_at_first_duplicate() {
        let registry = TargetRegistry::default();
        let err = registry
            .register_all([
                target("src:a"),
                target("src:b"),
                target("src:a"),
                target("src:c"),
            ])
            .unwrap_err();

        assert_eq!(err.address.to_string(), "src:a");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&"src:b".parse().unwrap()));
        assert!(!registry.contains(&"src:c".parse().unwrap()));
    }

    #[test]
    fn test_all_targets_is_restartable_and_ordered() {
        let registry = TargetRegistry::default();
        for address in ["b:z", "a:y", "b:x"] {
            registry.register(target(address)).unwrap();
        }

        let names = |registry: &TargetRegistry| {
            registry
                .all_targets()
                .map(|target| target.address().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&registry), vec!["b:z", "a:y", "b:x"]);
        assert_eq!(names(&registry), vec!["b:z", "a:y", "b:x"]);
        assert_eq!(
            registry
                .namespaces()
                .iter()
                .map(Namespace::as_str)
                .collect::<Vec<_>>(),
            vec!["b", "a"]
        );
    }

    #[test]
    fn test_duplicate_diagnostic() {
        let registry = TargetRegistry::default();
        registry.register(target("src:foo")).unwrap();
        let err = registry.register(target("src:foo")).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"the target 'foo' is declared more than once");
    }
}
