//! Realm 错误类型
//!
//! 归档发现、清单解析、符号解析、延迟绑定与依赖解析的错误定义

use crate::archive::ArchiveLocation;
use crate::realm::Definition;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Filesystem traversal or archive inspection failed.
///
/// "Does not exist" is never reported through this type; scanners treat a
/// missing root as an empty result.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest in archive {archive}: {source}")]
    Manifest {
        archive: ArchiveLocation,
        #[source]
        source: ManifestError,
    },

    #[error("Failed to walk {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Symbolic link {path:?} loops back to {ancestor:?}")]
    SymlinkLoop { path: PathBuf, ancestor: PathBuf },

    #[error("Required directory is missing: {path:?} ({what})")]
    MissingDirectory { path: PathBuf, what: String },
}

impl DiscoveryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// 清单文本解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest is not valid UTF-8")]
    NotUtf8,

    #[error("line {line}: continuation line without a preceding attribute")]
    DanglingContinuation { line: usize },

    #[error("line {line}: expected `Name: value`")]
    MalformedLine { line: usize },
}

/// What went wrong while resolving a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    /// No realm in the chain defines the name.
    NotFound,
    /// Two sources of a unanimous fallback define the name differently.
    Conflict {
        primary: Box<Definition>,
        secondary: Box<Definition>,
    },
}

/// A qualified name could not be resolved in a realm (or realm chain).
///
/// `cause` is the authoritative underlying failure (for a fallback realm, the
/// primary's failure); `suppressed` holds supplementary failures that were
/// attempted afterwards.
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub name: String,
    pub realm: String,
    pub failure: ResolveFailure,
    pub chain: Vec<String>,
    pub searched: Vec<PathBuf>,
    pub inventory: Vec<ArchiveLocation>,
    pub cause: Option<Box<ResolveError>>,
    pub suppressed: Vec<ResolveError>,
}

impl ResolveError {
    pub fn not_found(name: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
            failure: ResolveFailure::NotFound,
            chain: Vec::new(),
            searched: Vec::new(),
            inventory: Vec::new(),
            cause: None,
            suppressed: Vec::new(),
        }
    }

    pub fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_searched(mut self, searched: Vec<PathBuf>) -> Self {
        self.searched = searched;
        self
    }

    pub fn with_inventory(mut self, inventory: Vec<ArchiveLocation>) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn caused_by(mut self, cause: ResolveError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn suppress(mut self, other: ResolveError) -> Self {
        self.suppressed.push(other);
        self
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.failure, ResolveFailure::Conflict { .. })
    }

    /// Multi-line operator report: chain, searched directories, inventory and
    /// nested causes.
    pub fn report(&self) -> String {
        let mut out = String::new();
        self.write_report(&mut out, 0);
        out
    }

    fn write_report(&self, out: &mut String, depth: usize) {
        use std::fmt::Write as _;

        let pad = "  ".repeat(depth);
        let _ = writeln!(out, "{pad}{self}");
        if !self.chain.is_empty() {
            let _ = writeln!(out, "{pad}  realm chain: {}", self.chain.join(" -> "));
        }
        if !self.searched.is_empty() {
            let dirs: Vec<String> = self
                .searched
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            let _ = writeln!(out, "{pad}  searched: [{}]", dirs.join(", "));
        }
        let archives: Vec<String> = self.inventory.iter().map(|a| a.uri()).collect();
        let _ = writeln!(out, "{pad}  archives: [{}]", archives.join(", "));
        if let Some(cause) = &self.cause {
            let _ = writeln!(out, "{pad}  caused by:");
            cause.write_report(out, depth + 2);
        }
        for suppressed in &self.suppressed {
            let _ = writeln!(out, "{pad}  suppressed:");
            suppressed.write_report(out, depth + 2);
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            ResolveFailure::NotFound => {
                write!(f, "{} not found in realm `{}`", self.name, self.realm)
            }
            ResolveFailure::Conflict { primary, secondary } => write!(
                f,
                "{} is defined differently in realm `{}` ({}) and realm `{}` ({})",
                self.name, primary.realm, primary.origin, secondary.realm, secondary.origin
            ),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// 延迟绑定错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("secondary realm of `{fallback}` is already bound to `{bound}`")]
    AlreadyBound { fallback: String, bound: String },
}

/// Environment assembly could not resolve extension-module dependencies.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Could not resolve {dependency} required by {required_by} in {scope}")]
    MissingDependency {
        dependency: String,
        required_by: String,
        scope: String,
    },

    #[error("{archive} doesn't have the Short-Name attribute")]
    MissingShortName { archive: ArchiveLocation },

    #[error("Malformed dependency `{token}` declared by {declared_by}")]
    MalformedDependency { token: String, declared_by: String },

    #[error("Failed to install {from:?} as {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
