//! Realm assembly
//!
//! `collect` and `exclude` share one scanner and one traversal, so whatever a
//! directory contributed can always be removed again exactly.

use crate::archive::{ArchiveLocation, ArchiveScanner};
use crate::error::DiscoveryError;
use crate::manifest::Manifest;
use crate::realm::{Realm, Resolver};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Mutable working set of archives that is sealed into a [`Realm`].
#[derive(Debug)]
pub struct RealmBuilder {
    label: String,
    parent: Option<Arc<dyn Resolver>>,
    scanner: ArchiveScanner,
    archives: BTreeSet<ArchiveLocation>,
    sources: Vec<PathBuf>,
}

impl RealmBuilder {
    /// Start a realm. `None` as parent means only the platform's own symbols.
    pub fn new(label: impl Into<String>, parent: Option<Arc<dyn Resolver>>) -> Self {
        Self {
            label: label.into(),
            parent,
            scanner: ArchiveScanner::modules(),
            archives: BTreeSet::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_scanner(mut self, scanner: ArchiveScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Add every archive found under `dir`.
    pub fn collect(mut self, dir: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let dir = dir.as_ref();
        let found = self.scanner.scan_all(dir)?;
        debug!(realm = %self.label, dir = ?dir, count = found.len(), "collect archives");

        self.archives.extend(found);
        let dir = dir.to_path_buf();
        if !self.sources.contains(&dir) {
            self.sources.push(dir);
        }
        Ok(self)
    }

    /// Remove every archive found under `dir`; absent archives are ignored.
    pub fn exclude(mut self, dir: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let dir = dir.as_ref();
        let found = self.scanner.scan_all(dir)?;
        let before = self.archives.len();
        for archive in &found {
            self.archives.remove(archive);
        }
        debug!(
            realm = %self.label,
            dir = ?dir,
            removed = before - self.archives.len(),
            "exclude archives"
        );
        Ok(self)
    }

    /// Add a single, already located archive.
    pub fn add(mut self, archive: ArchiveLocation) -> Self {
        self.archives.insert(archive);
        self
    }

    pub fn archives(&self) -> impl Iterator<Item = &ArchiveLocation> {
        self.archives.iter()
    }

    /// Seal the working set. Each archive's manifest is read to index the
    /// names it exports.
    pub fn make(self) -> Result<Realm, DiscoveryError> {
        let archives: Vec<ArchiveLocation> = self.archives.into_iter().collect();
        let exports = archives
            .iter()
            .map(|archive| {
                Manifest::read(archive)
                    .map(|m| m.exported_types().map(str::to_string).collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            realm = %self.label,
            parent = self.parent.as_ref().map(|p| p.label()).unwrap_or("<none>"),
            archives = archives.len(),
            "realm sealed"
        );
        Ok(Realm::sealed(
            self.label,
            self.parent,
            archives,
            self.sources,
            exports,
        ))
    }
}
