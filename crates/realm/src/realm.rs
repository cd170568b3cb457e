//! Sealed realms
//!
//! A realm is an isolated scope for resolving qualified type names: an ordered
//! archive set plus at most one parent. Resolution always asks the parent
//! first, so names defined closer to the platform stay authoritative.

use crate::archive::ArchiveLocation;
use crate::error::ResolveError;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Prefix of the bootstrap glue types every realm may see.
pub const BOOTSTRAP_PREFIX: &str = "pipeline.runner.bootstrap.";

/// Where a resolved name is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Built into this program and exposed by the platform realm.
    Platform,
    Archive(ArchiveLocation),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Platform => write!(f, "platform"),
            Origin::Archive(archive) => write!(f, "{}", archive.uri()),
        }
    }
}

/// A successfully resolved name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Definition {
    pub name: String,
    /// Label of the realm that defined the name.
    pub realm: String,
    pub origin: Origin,
}

/// Anything that resolves qualified names: sealed realms, the platform realm
/// and fallback realms.
pub trait Resolver: fmt::Debug + Send + Sync {
    fn resolve(&self, name: &str) -> Result<Definition, ResolveError>;

    fn label(&self) -> &str;

    /// Lookup chain, nearest realm first.
    fn chain(&self) -> Vec<String>;

    /// Archives held directly by this realm.
    fn inventory(&self) -> &[ArchiveLocation] {
        &[]
    }

    /// Directories this realm was assembled from.
    fn sources(&self) -> &[PathBuf] {
        &[]
    }
}

/// Minimal platform realm: exposes only an explicit set of this program's own
/// types to otherwise isolated realms.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformRealm {
    label: String,
    prefixes: Vec<String>,
    names: BTreeSet<String>,
}

impl Default for PlatformRealm {
    fn default() -> Self {
        Self::new().expose_prefix(BOOTSTRAP_PREFIX)
    }
}

impl PlatformRealm {
    /// A platform realm that exposes nothing yet.
    pub fn new() -> Self {
        Self {
            label: "platform".to_string(),
            prefixes: Vec::new(),
            names: BTreeSet::new(),
        }
    }

    pub fn expose_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn expose(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn exposes(&self, name: &str) -> bool {
        self.names.contains(name) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

impl Resolver for PlatformRealm {
    fn resolve(&self, name: &str) -> Result<Definition, ResolveError> {
        if self.exposes(name) {
            Ok(Definition {
                name: name.to_string(),
                realm: self.label.clone(),
                origin: Origin::Platform,
            })
        } else {
            Err(ResolveError::not_found(name, &self.label).with_chain(self.chain()))
        }
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn chain(&self) -> Vec<String> {
        vec![self.label.clone()]
    }
}

/// An immutable realm produced by [`RealmBuilder::make`](crate::RealmBuilder::make).
pub struct Realm {
    label: String,
    parent: Option<Arc<dyn Resolver>>,
    archives: Vec<ArchiveLocation>,
    sources: Vec<PathBuf>,
    index: HashMap<String, usize>,
}

impl Realm {
    pub(crate) fn sealed(
        label: String,
        parent: Option<Arc<dyn Resolver>>,
        archives: Vec<ArchiveLocation>,
        sources: Vec<PathBuf>,
        exports: Vec<Vec<String>>,
    ) -> Self {
        let mut index = HashMap::new();
        for (position, names) in exports.into_iter().enumerate() {
            for name in names {
                if let Some(&first) = index.get(&name) {
                    debug!(
                        realm = %label,
                        name = %name,
                        kept = %archives[first],
                        shadowed = %archives[position],
                        "duplicate export inside realm"
                    );
                    continue;
                }
                index.insert(name, position);
            }
        }

        Self {
            label,
            parent,
            archives,
            sources,
            index,
        }
    }

    pub fn parent(&self) -> Option<&Arc<dyn Resolver>> {
        self.parent.as_ref()
    }

    pub fn archives(&self) -> &[ArchiveLocation] {
        &self.archives
    }

    pub fn contains(&self, archive: &ArchiveLocation) -> bool {
        self.archives.binary_search(archive).is_ok()
    }

    /// Names defined by this realm's own archives.
    pub fn exported_names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    fn resolve_local(&self, name: &str) -> Option<Definition> {
        self.index.get(name).map(|&position| Definition {
            name: name.to_string(),
            realm: self.label.clone(),
            origin: Origin::Archive(self.archives[position].clone()),
        })
    }

    pub fn snapshot(&self) -> RealmSnapshot {
        RealmSnapshot {
            label: self.label.clone(),
            parent: self.parent.as_ref().map(|p| p.label().to_string()),
            chain: self.chain(),
            sources: self.sources.clone(),
            archives: self.archives.clone(),
            exports: {
                let mut names: Vec<String> = self.index.keys().cloned().collect();
                names.sort();
                names
            },
        }
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("label", &self.label)
            .field("parent", &self.parent.as_ref().map(|p| p.label().to_string()))
            .field("archives", &self.archives.len())
            .finish()
    }
}

impl Resolver for Realm {
    fn resolve(&self, name: &str) -> Result<Definition, ResolveError> {
        if let Some(parent) = &self.parent {
            if let Ok(found) = parent.resolve(name) {
                return Ok(found);
            }
        }

        self.resolve_local(name).ok_or_else(|| {
            ResolveError::not_found(name, &self.label)
                .with_chain(self.chain())
                .with_searched(self.sources.clone())
                .with_inventory(self.archives.clone())
        })
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.label.clone()];
        if let Some(parent) = &self.parent {
            chain.extend(parent.chain());
        }
        chain
    }

    fn inventory(&self) -> &[ArchiveLocation] {
        &self.archives
    }

    fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

/// Serializable view of a realm, used by `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct RealmSnapshot {
    pub label: String,
    pub parent: Option<String>,
    pub chain: Vec<String>,
    pub sources: Vec<PathBuf>,
    pub archives: Vec<ArchiveLocation>,
    pub exports: Vec<String>,
}
