//! Contract dispatch across realm boundaries
//!
//! Implementations are linked into the binary and registered by qualified
//! name in a [`Linker`]. A realm decides whether a name is visible at all and
//! which archive defines it; the linker supplies the code. Callers only depend
//! on the contract trait, never on the concrete payload types.

use crate::archive::ArchiveLocation;
use crate::error::ResolveError;
use crate::realm::{Definition, Resolver};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Name and parameter types of a contract method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<String>,
}

impl MethodSignature {
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// The (type name, method) pair both sides of a realm boundary agree on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContractBinding {
    pub type_name: String,
    pub method: MethodSignature,
}

impl ContractBinding {
    pub fn new(type_name: impl Into<String>, method: MethodSignature) -> Self {
        Self {
            type_name: type_name.into(),
            method,
        }
    }
}

impl fmt::Display for ContractBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.method)
    }
}

type Factory<C> = Box<dyn Fn() -> Box<C> + Send + Sync>;

struct Linkage<C: ?Sized> {
    method: MethodSignature,
    factory: Factory<C>,
}

/// Registry of linked implementations of one contract trait `C`.
pub struct Linker<C: ?Sized> {
    entries: BTreeMap<String, Linkage<C>>,
}

impl<C: ?Sized> Default for Linker<C> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<C: ?Sized> Linker<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` as the zero-argument constructor of `type_name`.
    /// A later registration of the same name replaces the earlier one.
    pub fn link<F>(
        mut self,
        type_name: impl Into<String>,
        method: MethodSignature,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Box<C> + Send + Sync + 'static,
    {
        self.entries.insert(
            type_name.into(),
            Linkage {
                method,
                factory: Box::new(factory),
            },
        );
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<C: ?Sized> fmt::Debug for Linker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linker")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Why a dispatch target could not be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    /// The realm chain does not define the name.
    Unresolved,
    /// The realm defines the name but no implementation is linked in.
    Unlinked { definition: Definition },
    /// The linked implementation has a different method signature.
    SignatureMismatch {
        definition: Definition,
        linked: MethodSignature,
    },
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundReason::Unresolved => write!(f, "not defined in any realm of the chain"),
            NotFoundReason::Unlinked { definition } => write!(
                f,
                "defined by {} in realm `{}` but no implementation is linked",
                definition.origin, definition.realm
            ),
            NotFoundReason::SignatureMismatch { linked, .. } => {
                write!(f, "linked implementation only provides {linked}")
            }
        }
    }
}

/// The target of a dispatch could not be located.
#[derive(Error, Debug, Clone)]
#[error("{binding} not found in realm `{realm}`: {reason}")]
pub struct TargetNotFound {
    pub binding: ContractBinding,
    pub realm: String,
    pub reason: NotFoundReason,
    pub chain: Vec<String>,
    pub searched: Vec<PathBuf>,
    pub inventory: Vec<ArchiveLocation>,
    #[source]
    pub cause: Option<ResolveError>,
}

impl TargetNotFound {
    fn new(binding: &ContractBinding, realm: &dyn Resolver, reason: NotFoundReason) -> Self {
        Self {
            binding: binding.clone(),
            realm: realm.label().to_string(),
            reason,
            chain: realm.chain(),
            searched: realm.sources().to_vec(),
            inventory: realm.inventory().to_vec(),
            cause: None,
        }
    }

    /// Prepend operator context, such as the directories a realm was built
    /// from, to the searched list.
    pub fn with_context<I>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut searched: Vec<PathBuf> = dirs.into_iter().collect();
        for dir in self.searched.drain(..) {
            if !searched.contains(&dir) {
                searched.push(dir);
            }
        }
        self.searched = searched;
        self
    }

    /// Multi-line diagnostic naming the chain consulted, the directories
    /// searched and the archives actually loaded.
    pub fn report(&self) -> String {
        let searched: Vec<String> = self.searched.iter().map(|p| p.display().to_string()).collect();
        let archives: Vec<String> = self.inventory.iter().map(|a| a.uri()).collect();
        let mut out = format!(
            "{self}\n  realm chain: {}\n  searched: [{}]\n  archives: [{}]\n",
            self.chain.join(" -> "),
            searched.join(", "),
            archives.join(", ")
        );
        if let Some(cause) = &self.cause {
            out.push_str("  caused by:\n");
            for line in cause.report().lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Outcome of a failed dispatch. `Invocation` carries the callee's own error
/// untouched.
#[derive(Debug)]
pub enum DispatchError<E> {
    TargetNotFound(Box<TargetNotFound>),
    Invocation(E),
}

impl<E: fmt::Display> fmt::Display for DispatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::TargetNotFound(e) => fmt::Display::fmt(e, f),
            DispatchError::Invocation(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for DispatchError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::TargetNotFound(e) => std::error::Error::source(e.as_ref()),
            DispatchError::Invocation(e) => e.source(),
        }
    }
}

impl<E> From<TargetNotFound> for DispatchError<E> {
    fn from(err: TargetNotFound) -> Self {
        DispatchError::TargetNotFound(Box::new(err))
    }
}

/// Locates contract implementations through a realm and invokes them.
pub struct Dispatcher<'a, C: ?Sized> {
    linker: &'a Linker<C>,
}

impl<'a, C: ?Sized> Dispatcher<'a, C> {
    pub fn new(linker: &'a Linker<C>) -> Self {
        Self { linker }
    }

    /// Resolve `binding.type_name` in `realm` and instantiate it.
    pub fn locate(
        &self,
        realm: &dyn Resolver,
        binding: &ContractBinding,
    ) -> Result<(Definition, Box<C>), TargetNotFound> {
        let definition = realm.resolve(&binding.type_name).map_err(|cause| {
            let mut err = TargetNotFound::new(binding, realm, NotFoundReason::Unresolved);
            err.cause = Some(cause);
            err
        })?;

        let Some(linkage) = self.linker.entries.get(&binding.type_name) else {
            return Err(TargetNotFound::new(
                binding,
                realm,
                NotFoundReason::Unlinked { definition },
            ));
        };

        if linkage.method != binding.method {
            return Err(TargetNotFound::new(
                binding,
                realm,
                NotFoundReason::SignatureMismatch {
                    definition,
                    linked: linkage.method.clone(),
                },
            ));
        }

        debug!(
            target_type = %binding.type_name,
            origin = %definition.origin,
            "dispatch target located"
        );
        Ok((definition, (linkage.factory)()))
    }

    /// Locate the target and call `invoke` on a fresh instance.
    pub fn dispatch<T, E, F>(
        &self,
        realm: &dyn Resolver,
        binding: &ContractBinding,
        invoke: F,
    ) -> Result<T, DispatchError<E>>
    where
        F: FnOnce(&mut C) -> Result<T, E>,
    {
        let (definition, mut target) = self.locate(realm, binding)?;
        info!(
            binding = %binding,
            realm = %definition.realm,
            origin = %definition.origin,
            "dispatching"
        );
        invoke(target.as_mut()).map_err(DispatchError::Invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::PlatformRealm;

    trait Greeter {
        fn greet(&mut self, who: &str) -> Result<String, GreetError>;
    }

    #[derive(Debug, Error, PartialEq)]
    #[error("refusing to greet {0}")]
    struct GreetError(String);

    struct Polite;

    impl Greeter for Polite {
        fn greet(&mut self, who: &str) -> Result<String, GreetError> {
            if who.is_empty() {
                return Err(GreetError("nobody".into()));
            }
            Ok(format!("hello {who}"))
        }
    }

    fn greet_method() -> MethodSignature {
        MethodSignature::new("greet", ["str"])
    }

    fn linker() -> Linker<dyn Greeter> {
        Linker::new().link("demo.Polite", greet_method(), || Box::new(Polite) as Box<dyn Greeter>)
    }

    #[test]
    fn test_dispatch_success_and_callee_error_passthrough() {
        let realm = PlatformRealm::new().expose("demo.Polite");
        let linker = linker();
        let dispatcher = Dispatcher::new(&linker);
        let binding = ContractBinding::new("demo.Polite", greet_method());

        let greeting = dispatcher
            .dispatch(&realm, &binding, |g| g.greet("realm"))
            .expect("dispatch");
        assert_eq!(greeting, "hello realm");

        match dispatcher.dispatch(&realm, &binding, |g| g.greet("")) {
            Err(DispatchError::Invocation(e)) => assert_eq!(e, GreetError("nobody".into())),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_name_reports_chain() {
        let realm = PlatformRealm::new();
        let linker = linker();
        let binding = ContractBinding::new("demo.Polite", greet_method());

        let err = Dispatcher::new(&linker)
            .locate(&realm, &binding)
            .map(|_| ())
            .expect_err("hidden");
        assert_eq!(err.reason, NotFoundReason::Unresolved);
        assert_eq!(err.chain, vec!["platform".to_string()]);
        assert!(err.cause.is_some());
    }

    #[test]
    fn test_visible_but_unlinked_and_signature_mismatch() {
        let realm = PlatformRealm::new().expose("demo.Rude").expose("demo.Polite");
        let linker = linker();
        let dispatcher = Dispatcher::new(&linker);

        let err = dispatcher
            .locate(&realm, &ContractBinding::new("demo.Rude", greet_method()))
            .map(|_| ())
            .expect_err("unlinked");
        assert!(matches!(err.reason, NotFoundReason::Unlinked { .. }));

        let wrong =
            ContractBinding::new("demo.Polite", MethodSignature::new("greet", ["str", "int"]));
        let err = dispatcher
            .locate(&realm, &wrong)
            .map(|_| ())
            .expect_err("mismatch");
        assert!(matches!(err.reason, NotFoundReason::SignatureMismatch { .. }));
        assert!(err.report().contains("greet(str)"));
    }
}
