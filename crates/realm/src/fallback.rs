//! Fallback resolution with a deferred secondary realm
//!
//! The primary realm is fixed at construction. The secondary can be bound once,
//! later, so a fallback realm can be handed to collaborators before the realm
//! it eventually consults exists.

use crate::error::{BindError, ResolveError, ResolveFailure};
use crate::realm::{Definition, Resolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use strum::{Display, EnumString};
use tracing::info;

/// How the primary and secondary sources are combined.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FallbackPolicy {
    /// The first source that defines a name wins; the primary is consulted first.
    #[default]
    FirstDefined,
    /// When both sources define a name they must agree on the definition.
    Unanimous,
}

pub struct FallbackRealm {
    label: String,
    primary: Arc<dyn Resolver>,
    secondary: OnceLock<Arc<dyn Resolver>>,
    policy: FallbackPolicy,
}

impl FallbackRealm {
    pub fn new(primary: Arc<dyn Resolver>) -> Self {
        Self {
            label: format!("{}+fallback", primary.label()),
            primary,
            secondary: OnceLock::new(),
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn primary(&self) -> &Arc<dyn Resolver> {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Arc<dyn Resolver>> {
        self.secondary.get()
    }

    pub fn is_bound(&self) -> bool {
        self.secondary.get().is_some()
    }

    /// Publish the secondary realm. Fails if one is already bound.
    pub fn bind(&self, secondary: Arc<dyn Resolver>) -> Result<(), BindError> {
        let label = secondary.label().to_string();
        self.secondary.set(secondary).map_err(|_| BindError::AlreadyBound {
            fallback: self.label.clone(),
            bound: self
                .secondary
                .get()
                .map(|s| s.label().to_string())
                .unwrap_or_default(),
        })?;
        info!(fallback = %self.label, secondary = %label, "secondary realm bound");
        Ok(())
    }

    fn merged_failure(
        &self,
        name: &str,
        primary: ResolveError,
        secondary: ResolveError,
    ) -> ResolveError {
        ResolveError::not_found(name, &self.label)
            .with_chain(self.chain())
            .with_searched(primary.searched.clone())
            .with_inventory(primary.inventory.clone())
            .caused_by(primary)
            .suppress(secondary)
    }

    fn check_agreement(
        &self,
        found: Definition,
        secondary: &dyn Resolver,
    ) -> Result<Definition, ResolveError> {
        match secondary.resolve(&found.name) {
            Ok(other) if other != found => {
                let mut err =
                    ResolveError::not_found(&found.name, &self.label).with_chain(self.chain());
                err.failure = ResolveFailure::Conflict {
                    primary: Box::new(found),
                    secondary: Box::new(other),
                };
                Err(err)
            }
            _ => Ok(found),
        }
    }
}

impl fmt::Debug for FallbackRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRealm")
            .field("label", &self.label)
            .field("primary", &self.primary.label())
            .field("secondary", &self.secondary.get().map(|s| s.label().to_string()))
            .field("policy", &self.policy)
            .finish()
    }
}

impl Resolver for FallbackRealm {
    fn resolve(&self, name: &str) -> Result<Definition, ResolveError> {
        let secondary = self.secondary.get();

        let primary_err = match self.primary.resolve(name) {
            Ok(found) => {
                return match (self.policy, secondary) {
                    (FallbackPolicy::Unanimous, Some(secondary)) => {
                        self.check_agreement(found, secondary.as_ref())
                    }
                    _ => Ok(found),
                };
            }
            Err(e) => e,
        };

        let Some(secondary) = secondary else {
            return Err(primary_err);
        };

        secondary
            .resolve(name)
            .map_err(|secondary_err| self.merged_failure(name, primary_err, secondary_err))
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.label.clone()];
        chain.extend(self.primary.chain());
        if let Some(secondary) = self.secondary.get() {
            chain.extend(secondary.chain());
        }
        chain
    }

    fn inventory(&self) -> &[crate::archive::ArchiveLocation] {
        self.primary.inventory()
    }

    fn sources(&self) -> &[std::path::PathBuf] {
        self.primary.sources()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::PlatformRealm;

    fn platform(names: &[&str]) -> Arc<dyn Resolver> {
        let realm = names
            .iter()
            .fold(PlatformRealm::new(), |realm, name| realm.expose(*name));
        Arc::new(realm)
    }

    #[test]
    fn test_unbound_fallback_behaves_like_primary() {
        let primary = platform(&["a.A"]);
        let fallback = FallbackRealm::new(primary.clone());

        assert_eq!(
            fallback.resolve("a.A").expect("fallback"),
            primary.resolve("a.A").expect("primary")
        );

        let direct = primary.resolve("x.X").expect_err("primary");
        let through = fallback.resolve("x.X").expect_err("fallback");
        assert_eq!(through.realm, direct.realm);
        assert!(through.cause.is_none());
        assert!(through.suppressed.is_empty());
    }

    #[test]
    fn test_bind_only_once() {
        let fallback = FallbackRealm::new(platform(&[]));
        fallback.bind(platform(&["b.B"])).expect("first bind");
        let err = fallback.bind(platform(&["c.C"])).expect_err("second bind");
        assert!(matches!(err, BindError::AlreadyBound { .. }));

        assert!(fallback.resolve("b.B").is_ok());
        assert!(fallback.resolve("c.C").is_err());
    }

    #[test]
    fn test_unanimous_policy_reports_conflict() {
        use crate::builder::RealmBuilder;

        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join("dup.jar"), "Export-Types: a.A\n").expect("write");
        let archives: Arc<dyn Resolver> = Arc::new(
            RealmBuilder::new("extensions", None)
                .collect(temp.path())
                .expect("collect")
                .make()
                .expect("make"),
        );

        let fallback =
            FallbackRealm::new(platform(&["a.A"])).with_policy(FallbackPolicy::Unanimous);
        fallback.bind(archives).expect("bind");

        let err = fallback.resolve("a.A").expect_err("conflict");
        assert!(err.is_conflict());

        let lenient = FallbackRealm::new(platform(&["a.A"]));
        assert!(lenient.resolve("a.A").is_ok());
    }

    #[test]
    fn test_policy_parses_from_kebab_case() {
        assert_eq!(
            "unanimous".parse::<FallbackPolicy>().expect("parse"),
            FallbackPolicy::Unanimous
        );
        assert_eq!(FallbackPolicy::FirstDefined.to_string(), "first-defined");
    }
}
