//! Extension module selection
//!
//! `--plugins` names either an installation directory, used as is, or a
//! plugin list file whose entries are materialised from the local cache into
//! the run home.

use crate::error::{Error, Result};
use crate::home::RunHome;
use runner_realm::DiscoveryError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const LATEST: &str = "latest";

/// One `name[:version]` entry of a plugin list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub name: String,
    pub version: String,
}

impl PluginEntry {
    /// Path of this plugin inside the cache: `plugins/<name>/<name>-<version>.hpi`.
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir
            .join("plugins")
            .join(&self.name)
            .join(format!("{}-{}.hpi", self.name, self.version))
    }
}

/// Parse a plugin list. Blank lines and `#` comments are skipped.
pub fn parse_list(path: &Path, text: &str) -> Result<Vec<PluginEntry>> {
    let mut entries = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let (name, version) = match line.split_once(':') {
            Some((name, version)) => (name.trim(), version.trim()),
            None => (line, LATEST),
        };
        if name.is_empty() || version.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::PluginList {
                path: path.to_path_buf(),
                line: index + 1,
                message: format!("expected `name[:version]`, found `{line}`"),
            });
        }

        entries.push(PluginEntry {
            name: name.to_string(),
            version: version.to_string(),
        });
    }
    Ok(entries)
}

/// Directory the host loads extension modules from.
pub fn prepare(plugins: &Path, home: &RunHome, cache_dir: Option<&Path>) -> Result<PathBuf> {
    if plugins.is_dir() {
        info!("Using extension modules installed in {:?}", plugins);
        return Ok(plugins.to_path_buf());
    }
    if !plugins.exists() {
        return Err(DiscoveryError::MissingDirectory {
            path: plugins.to_path_buf(),
            what: "plugins directory or plugin list file".to_string(),
        }
        .into());
    }

    let text = fs::read_to_string(plugins)?;
    let entries = parse_list(plugins, &text)?;
    let cache_dir = cache_dir.ok_or_else(|| {
        Error::custom("no cache directory available for the plugin list, set --cache-dir")
    })?;

    let target = home.plugins_dir()?;
    for entry in &entries {
        install(entry, cache_dir, &target)?;
    }
    info!(
        "Installed {} extension modules from {:?} into {:?}",
        entries.len(),
        plugins,
        target
    );
    Ok(target)
}

fn install(entry: &PluginEntry, cache_dir: &Path, target: &Path) -> Result<()> {
    // a relative link target would resolve against the plugins directory
    let cached = std::path::absolute(entry.cache_path(cache_dir))?;
    if !cached.is_file() {
        return Err(Error::PluginNotCached {
            name: entry.name.clone(),
            version: entry.version.clone(),
            path: cached,
        });
    }

    let link = target.join(format!("{}.jpi", entry.name));
    if fs::symlink_metadata(&link).is_ok() {
        fs::remove_file(&link)?;
    }
    place(&cached, &link)?;
    debug!("{}:{} -> {:?}", entry.name, entry.version, link);
    Ok(())
}

#[cfg(unix)]
fn place(cached: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(cached, link)
}

#[cfg(not(unix))]
fn place(cached: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(cached, link).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let entries = parse_list(
            Path::new("plugins.txt"),
            "# pipeline\nworkflow-job:2.40\n\nscm-api  # unpinned\n",
        )
        .expect("parse");
        assert_eq!(
            entries,
            vec![
                PluginEntry {
                    name: "workflow-job".into(),
                    version: "2.40".into()
                },
                PluginEntry {
                    name: "scm-api".into(),
                    version: LATEST.into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_list_rejects_empty_version() {
        let err = parse_list(Path::new("plugins.txt"), "ok:1\nbroken:\n").expect_err("invalid");
        assert!(matches!(err, Error::PluginList { line: 2, .. }));
    }

    #[test]
    fn test_prepare_materialises_cached_plugins() {
        let temp = tempfile::tempdir().expect("temp dir");
        let cache = temp.path().join("cache");
        let entry = PluginEntry {
            name: "workflow-job".into(),
            version: "2.40".into(),
        };
        fs::create_dir_all(entry.cache_path(&cache).parent().expect("parent")).expect("mkdir");
        fs::write(entry.cache_path(&cache), "Short-Name: workflow-job\n").expect("write");

        let list = temp.path().join("plugins.txt");
        fs::write(&list, "workflow-job:2.40\n").expect("write list");

        let home = RunHome::prepare(None).expect("home");
        let dir = prepare(&list, &home, Some(&cache)).expect("prepare");
        assert!(dir.join("workflow-job.jpi").is_file());
    }

    #[test]
    fn test_prepare_with_relative_cache_dir_is_scannable() {
        let cache = tempfile::tempdir_in(".").expect("temp dir");
        let relative = Path::new(".").join(cache.path().file_name().expect("name"));
        let entry = PluginEntry {
            name: "workflow-job".into(),
            version: "2.40".into(),
        };
        fs::create_dir_all(entry.cache_path(&relative).parent().expect("parent")).expect("mkdir");
        fs::write(entry.cache_path(&relative), "Short-Name: workflow-job\n").expect("write");

        let list = cache.path().join("plugins.txt");
        fs::write(&list, "workflow-job:2.40\n").expect("write list");

        let home = RunHome::prepare(None).expect("home");
        let dir = prepare(&list, &home, Some(&relative)).expect("prepare");
        let found = runner_realm::ArchiveScanner::extension_modules()
            .scan_all(&dir)
            .expect("scan");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_prepare_fails_on_cache_miss_and_missing_path() {
        let temp = tempfile::tempdir().expect("temp dir");
        let list = temp.path().join("plugins.txt");
        fs::write(&list, "absent\n").expect("write list");
        let home = RunHome::prepare(None).expect("home");

        let err = prepare(&list, &home, Some(temp.path())).expect_err("cache miss");
        assert!(matches!(err, Error::PluginNotCached { .. }));

        let err = prepare(&temp.path().join("nope.txt"), &home, Some(temp.path()))
            .expect_err("missing path");
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[test]
    fn test_prepare_uses_directory_as_is() {
        let temp = tempfile::tempdir().expect("temp dir");
        let home = RunHome::prepare(None).expect("home");
        assert_eq!(prepare(temp.path(), &home, None).expect("dir"), temp.path());
    }
}
