//! Archive discovery
//!
//! Lazily enumerates packaged module archives below a directory tree. A walk
//! is an ordinary iterator, so it can be restarted by calling
//! [`ArchiveScanner::walk`] again and consumed into any collection.

use crate::error::DiscoveryError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Extensions of ordinary module archives.
pub const MODULE_ARCHIVE_EXTENSIONS: &[&str] = &["jar"];

/// Extensions of extension-module (plugin) archives.
pub const EXTENSION_ARCHIVE_EXTENSIONS: &[&str] = &["jpi", "hpi", "jpl"];

/// Absolute, lexically normalised reference to one archive on disk.
///
/// Two locations are equal when their normalised paths are equal; symlinks are
/// not resolved, so an archive reached through a link keeps the link's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArchiveLocation(PathBuf);

impl ArchiveLocation {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let path = path.as_ref();
        let absolute =
            std::path::absolute(path).map_err(|source| DiscoveryError::io(path, source))?;
        Ok(Self(normalize(&absolute)))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn uri(&self) -> String {
        format!("file://{}", self.0.display())
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for ArchiveLocation {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Recognises archives by file extension and walks directory trees for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveScanner {
    extensions: Vec<String>,
}

impl Default for ArchiveScanner {
    fn default() -> Self {
        Self::modules()
    }
}

impl ArchiveScanner {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Scanner for ordinary module archives (`.jar`).
    pub fn modules() -> Self {
        Self::new(MODULE_ARCHIVE_EXTENSIONS)
    }

    /// Scanner for extension-module archives (`.jpi`, `.hpi`, `.jpl`).
    pub fn extension_modules() -> Self {
        Self::new(EXTENSION_ARCHIVE_EXTENSIONS)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_archive_name(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Lazily walk `root`. Children are visited in sorted order and
    /// symlinked directories are followed.
    pub fn walk(&self, root: impl AsRef<Path>) -> ArchiveWalk<'_> {
        ArchiveWalk {
            scanner: self,
            entries: WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter(),
            finished: false,
        }
    }

    /// Every archive under `root` accepted by `filter`.
    ///
    /// A missing root yields an empty set; a root that is itself an archive
    /// file is the sole candidate.
    pub fn scan<F>(
        &self,
        root: impl AsRef<Path>,
        filter: F,
    ) -> Result<BTreeSet<ArchiveLocation>, DiscoveryError>
    where
        F: Fn(&ArchiveLocation) -> bool,
    {
        self.walk(root)
            .filter(|found| found.as_ref().map_or(true, &filter))
            .collect()
    }

    /// [`scan`](Self::scan) without a filter.
    pub fn scan_all(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<BTreeSet<ArchiveLocation>, DiscoveryError> {
        self.scan(root, |_| true)
    }
}

/// Iterator over the archives below one root.
///
/// Stops after yielding the first error.
pub struct ArchiveWalk<'a> {
    scanner: &'a ArchiveScanner,
    entries: walkdir::IntoIter,
    finished: bool,
}

impl ArchiveWalk<'_> {
    fn fail(&mut self, err: DiscoveryError) -> Option<Result<ArchiveLocation, DiscoveryError>> {
        self.finished = true;
        Some(Err(err))
    }
}

/// `None` for failures the walk steps over.
fn classify(err: walkdir::Error) -> Option<DiscoveryError> {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    if let Some(ancestor) = err.loop_ancestor() {
        return Some(DiscoveryError::SymlinkLoop {
            ancestor: ancestor.to_path_buf(),
            path,
        });
    }

    let kind = err.io_error().map(io::Error::kind);
    match kind {
        // missing root
        Some(io::ErrorKind::NotFound) if err.depth() == 0 => None,
        Some(io::ErrorKind::NotFound) => {
            warn!("Skipping {:?}: dangling link or entry removed during the scan", path);
            None
        }
        _ => Some(DiscoveryError::Walk { path, source: err }),
    }
}

impl Iterator for ArchiveWalk<'_> {
    type Item = Result<ArchiveLocation, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => match classify(err) {
                    Some(e) => return self.fail(e),
                    None => continue,
                },
            };

            if entry.file_type().is_file() && self.scanner.is_archive_name(entry.path()) {
                return match ArchiveLocation::new(entry.path()) {
                    Ok(location) => Some(Ok(location)),
                    Err(e) => self.fail(e),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(path, "Manifest-Version: 1.0\n").expect("write archive");
    }

    fn names(set: &BTreeSet<ArchiveLocation>, root: &Path) -> Vec<String> {
        let root = ArchiveLocation::new(root).expect("root");
        set.iter()
            .map(|a| {
                a.path()
                    .strip_prefix(root.path())
                    .expect("under root")
                    .display()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = tempfile::tempdir().expect("temp dir");
        let found = ArchiveScanner::modules()
            .scan_all(temp.path().join("does-not-exist"))
            .expect("scan");
        assert!(found.is_empty());
    }

    #[test]
    fn test_nested_archives_and_extension_filter() {
        let temp = tempfile::tempdir().expect("temp dir");
        touch(&temp.path().join("a.jar"));
        touch(&temp.path().join("notes.txt"));
        touch(&temp.path().join("deep/er/b.JAR"));
        touch(&temp.path().join("plugin.jpi"));

        let found = ArchiveScanner::modules()
            .scan_all(temp.path())
            .expect("scan");
        assert_eq!(names(&found, temp.path()), vec!["a.jar", "deep/er/b.JAR"]);

        let plugins = ArchiveScanner::extension_modules()
            .scan_all(temp.path())
            .expect("scan");
        assert_eq!(names(&plugins, temp.path()), vec!["plugin.jpi"]);
    }

    #[test]
    fn test_single_archive_root() {
        let temp = tempfile::tempdir().expect("temp dir");
        let launcher = temp.path().join("launcher.jar");
        touch(&launcher);

        let found = ArchiveScanner::modules().scan_all(&launcher).expect("scan");
        assert_eq!(found.len(), 1);
        assert_eq!(found.iter().next().expect("one").file_name(), "launcher.jar");

        let rejected = ArchiveScanner::modules()
            .scan(&launcher, |_| false)
            .expect("scan");
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_filter_is_applied_to_nested_entries() {
        let temp = tempfile::tempdir().expect("temp dir");
        touch(&temp.path().join("keep.jar"));
        touch(&temp.path().join("sub/skip.jar"));

        let found = ArchiveScanner::modules()
            .scan(temp.path(), |a| !a.file_name().starts_with("skip"))
            .expect("scan");
        assert_eq!(names(&found, temp.path()), vec!["keep.jar"]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let temp = tempfile::tempdir().expect("temp dir");
        touch(&temp.path().join("x/1.jar"));
        touch(&temp.path().join("y/2.jar"));

        let scanner = ArchiveScanner::modules();
        let first: Vec<_> = scanner.walk(temp.path()).collect::<Result<_, _>>().expect("walk");
        let second: Vec<_> = scanner.walk(temp.path()).collect::<Result<_, _>>().expect("walk");
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_is_skipped() {
        let temp = tempfile::tempdir().expect("temp dir");
        touch(&temp.path().join("real.jpi"));
        std::os::unix::fs::symlink(temp.path().join("gone.hpi"), temp.path().join("gone.jpi"))
            .expect("symlink");

        let found = ArchiveScanner::extension_modules()
            .scan_all(temp.path())
            .expect("scan");
        assert_eq!(names(&found, temp.path()), vec!["real.jpi"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_followed_and_loops_are_reported() {
        let temp = tempfile::tempdir().expect("temp dir");
        let shared = temp.path().join("shared");
        touch(&shared.join("a.jar"));
        let root = temp.path().join("root");
        fs::create_dir_all(&root).expect("mkdir");
        std::os::unix::fs::symlink(&shared, root.join("linked")).expect("symlink");

        let found = ArchiveScanner::modules().scan_all(&root).expect("scan");
        assert_eq!(names(&found, &root), vec!["linked/a.jar"]);

        std::os::unix::fs::symlink(&root, root.join("back")).expect("symlink");
        let err = ArchiveScanner::modules().scan_all(&root).expect_err("loop");
        assert!(matches!(err, DiscoveryError::SymlinkLoop { .. }));
    }

    #[test]
    fn test_location_normalises_dot_segments() {
        let temp = tempfile::tempdir().expect("temp dir");
        touch(&temp.path().join("lib/a.jar"));

        let direct = ArchiveLocation::new(temp.path().join("lib/a.jar")).expect("direct");
        let dotted =
            ArchiveLocation::new(temp.path().join("lib/./../lib/a.jar")).expect("dotted");
        assert_eq!(direct, dotted);
        assert!(direct.uri().starts_with("file:///"));
    }
}
