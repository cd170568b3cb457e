//! 扩展模块依赖解析
//!
//! Reads `Short-Name` / `Plugin-Dependencies` from extension archives and
//! installs each dependency from a search scope into a target plugins
//! directory. Optional dependencies are best effort; required ones are fatal.

use crate::archive::{ArchiveLocation, ArchiveScanner};
use crate::error::{DiscoveryError, ResolutionError};
use crate::manifest::{Manifest, PLUGIN_DEPENDENCIES, PLUGIN_VERSION};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

const OPTIONAL_RESOLUTION: &str = "resolution:=optional";

/// One `name:version[;resolution:=optional]` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub optional: bool,
}

impl Dependency {
    pub fn parse(token: &str, declared_by: &str) -> Result<Self, ResolutionError> {
        let malformed = || ResolutionError::MalformedDependency {
            token: token.to_string(),
            declared_by: declared_by.to_string(),
        };

        let mut parts = token.trim().split(';');
        let head = parts.next().unwrap_or_default();
        let (name, version) = head.split_once(':').ok_or_else(malformed)?;
        let (name, version) = (name.trim(), version.trim());
        if name.is_empty() || version.is_empty() {
            return Err(malformed());
        }

        let optional = parts.any(|param| param.trim() == OPTIONAL_RESOLUTION);
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            optional,
        })
    }

    /// Parse a comma separated declaration list; empty tokens are ignored.
    pub fn parse_list(list: &str, declared_by: &str) -> Result<Vec<Self>, ResolutionError> {
        list.split(',')
            .filter(|token| !token.trim().is_empty())
            .map(|token| Self::parse(token, declared_by))
            .collect()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)?;
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// Identity and declared dependencies of one extension archive.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestDescriptor {
    pub archive: ArchiveLocation,
    pub short_name: String,
    pub version: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl ManifestDescriptor {
    pub fn read(archive: &ArchiveLocation) -> Result<Self, ResolutionError> {
        let manifest = Manifest::read(archive)?;
        Self::from_manifest(archive.clone(), &manifest)
    }

    pub fn from_manifest(
        archive: ArchiveLocation,
        manifest: &Manifest,
    ) -> Result<Self, ResolutionError> {
        let Some(short_name) = manifest.short_name().map(str::to_string) else {
            return Err(ResolutionError::MissingShortName { archive });
        };
        let dependencies = match manifest.get(PLUGIN_DEPENDENCIES) {
            Some(list) => Dependency::parse_list(list, &short_name)?,
            None => Vec::new(),
        };

        Ok(Self {
            archive,
            version: manifest.get(PLUGIN_VERSION).map(|v| v.trim().to_string()),
            short_name,
            dependencies,
        })
    }
}

/// The module search path dependencies are looked up in.
///
/// Manifests are only read on the first lookup.
#[derive(Debug)]
pub struct SearchScope {
    roots: Vec<PathBuf>,
    archives: Vec<ArchiveLocation>,
    by_short_name: OnceLock<HashMap<String, ArchiveLocation>>,
}

impl SearchScope {
    pub fn new(archives: impl IntoIterator<Item = ArchiveLocation>) -> Self {
        let archives: BTreeSet<ArchiveLocation> = archives.into_iter().collect();
        Self {
            roots: Vec::new(),
            archives: archives.into_iter().collect(),
            by_short_name: OnceLock::new(),
        }
    }

    /// Scan `dirs` with `scanner`. Missing directories contribute nothing.
    pub fn scan<I, P>(scanner: &ArchiveScanner, dirs: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut roots = Vec::new();
        let mut archives = BTreeSet::new();
        for dir in dirs {
            let dir = dir.as_ref();
            archives.extend(scanner.scan_all(dir)?);
            roots.push(dir.to_path_buf());
        }

        let mut scope = Self::new(archives);
        scope.roots = roots;
        Ok(scope)
    }

    pub fn archives(&self) -> &[ArchiveLocation] {
        &self.archives
    }

    /// Archive whose manifest declares `short_name`. With several
    /// candidates the first in sorted order wins.
    pub fn find(&self, short_name: &str) -> Result<Option<&ArchiveLocation>, DiscoveryError> {
        if self.by_short_name.get().is_none() {
            let index = self.build_index()?;
            let _ = self.by_short_name.set(index);
        }
        Ok(self
            .by_short_name
            .get()
            .and_then(|index| index.get(short_name)))
    }

    fn build_index(&self) -> Result<HashMap<String, ArchiveLocation>, DiscoveryError> {
        let mut index = HashMap::new();
        for archive in &self.archives {
            let manifest = Manifest::read(archive)?;
            if let Some(name) = manifest.short_name() {
                index
                    .entry(name.to_string())
                    .or_insert_with(|| archive.clone());
            }
        }
        debug!(archives = self.archives.len(), modules = index.len(), "search scope indexed");
        Ok(index)
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots: Vec<String> = self.roots.iter().map(|p| p.display().to_string()).collect();
        let archives: Vec<&str> = self.archives.iter().map(|a| a.file_name()).collect();
        write!(
            f,
            "search scope [{}] with archives [{}]",
            roots.join(", "),
            archives.join(", ")
        )
    }
}

/// One archive placed into the plugins directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installed {
    pub name: String,
    pub from: PathBuf,
    pub to: PathBuf,
    /// The target already had the source's modification time.
    pub up_to_date: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallationReport {
    /// The descriptors themselves, installed as `<name>.jpl`.
    pub batch: Vec<Installed>,
    /// Dependencies copied from the search scope as `<name>.jpi`.
    pub dependencies: Vec<Installed>,
    /// Optional dependencies that were not found.
    pub skipped: Vec<Dependency>,
}

impl InstallationReport {
    /// Short names of every archive now present in the target directory.
    pub fn installed_names(&self) -> BTreeSet<&str> {
        self.batch
            .iter()
            .chain(&self.dependencies)
            .map(|i| i.name.as_str())
            .collect()
    }
}

/// Installs a batch of extension archives and their dependencies into a
/// plugins directory.
#[derive(Debug, Clone)]
pub struct ManifestDependencyResolver {
    target: PathBuf,
}

impl ManifestDependencyResolver {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn resolve(
        &self,
        descriptors: &[ManifestDescriptor],
        scope: &SearchScope,
    ) -> Result<InstallationReport, ResolutionError> {
        fs::create_dir_all(&self.target).map_err(|e| DiscoveryError::io(&self.target, e))?;

        let batch: BTreeSet<&str> = descriptors.iter().map(|d| d.short_name.as_str()).collect();
        let mut report = InstallationReport::default();
        let mut pulled: BTreeSet<String> = BTreeSet::new();

        for descriptor in descriptors {
            let to = self.target.join(format!("{}.jpl", descriptor.short_name));
            report
                .batch
                .push(install(&descriptor.short_name, descriptor.archive.path(), &to)?);

            for dependency in &descriptor.dependencies {
                if batch.contains(dependency.name.as_str()) {
                    debug!(dependency = %dependency, "satisfied by the batch");
                    continue;
                }
                if pulled.contains(&dependency.name) {
                    continue;
                }

                match scope.find(&dependency.name)? {
                    Some(archive) => {
                        let to = self.target.join(format!("{}.jpi", dependency.name));
                        report
                            .dependencies
                            .push(install(&dependency.name, archive.path(), &to)?);
                        pulled.insert(dependency.name.clone());
                    }
                    None if dependency.optional => {
                        info!(
                            dependency = %dependency,
                            required_by = %descriptor.short_name,
                            "optional dependency not found, skipping"
                        );
                        report.skipped.push(dependency.clone());
                    }
                    None => {
                        return Err(ResolutionError::MissingDependency {
                            dependency: dependency.to_string(),
                            required_by: descriptor.short_name.clone(),
                            scope: scope.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            target_dir = %self.target.display(),
            batch = report.batch.len(),
            dependencies = report.dependencies.len(),
            skipped = report.skipped.len(),
            "extension modules installed"
        );
        Ok(report)
    }
}

/// Copy `from` to `to` unless `to` already carries the same modification
/// time, then stamp `to` with the source's modification time.
fn install(name: &str, from: &Path, to: &Path) -> Result<Installed, ResolutionError> {
    let copy_err = |source| ResolutionError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(copy_err)?;
    let up_to_date = fs::metadata(to)
        .and_then(|m| m.modified())
        .map(|existing| existing == modified)
        .unwrap_or(false);

    if up_to_date {
        debug!(module = name, to = %to.display(), "already installed");
    } else {
        fs::copy(from, to).map_err(copy_err)?;
        fs::File::options()
            .write(true)
            .open(to)
            .and_then(|file| file.set_modified(modified))
            .map_err(copy_err)?;
        debug!(module = name, from = %from.display(), to = %to.display(), "installed");
    }

    Ok(Installed {
        name: name.to_string(),
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        up_to_date,
    })
}
