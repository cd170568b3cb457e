//! Run home management
//!
//! Handles the host home directory used by a single run: an operator supplied
//! empty directory, or a temporary one removed when the run ends.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const TEMP_PREFIX: &str = "pipeline-runner-home";

/// Directory of the home the host runs Groovy init hooks from.
pub const INIT_HOOKS_DIR: &str = "init.groovy.d";

/// Home directory of one run.
///
/// A temporary home is deleted on drop; an existing one is left in place.
#[derive(Debug)]
pub struct RunHome {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl RunHome {
    /// Use `requested` if given (it must be an existing, empty directory),
    /// otherwise create a temporary home.
    pub fn prepare(requested: Option<&Path>) -> Result<Self> {
        match requested {
            Some(dir) => Self::existing(dir),
            None => Self::temporary(),
        }
    }

    fn existing(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::run_home(dir, "is not a directory"));
        }
        let mut entries = fs::read_dir(dir)?;
        if entries.next().is_some() {
            return Err(Error::run_home(dir, "directory is not empty"));
        }

        info!("Using run home: {:?}", dir);
        Ok(Self {
            path: dir.to_path_buf(),
            temp: None,
        })
    }

    fn temporary() -> Result<Self> {
        let temp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
        info!("Created temporary run home: {:?}", temp.path());
        Ok(Self {
            path: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// `<home>/plugins`, created on first use.
    pub fn plugins_dir(&self) -> Result<PathBuf> {
        let dir = self.path.join("plugins");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

impl RunHome {
    /// Copy the tree under `hooks` into `<home>/init.groovy.d`. `hooks` must
    /// be a directory holding at least one entry.
    pub fn install_init_hooks(&self, hooks: &Path) -> Result<PathBuf> {
        let shown = std::path::absolute(hooks).unwrap_or_else(|_| hooks.to_path_buf());
        if !hooks.is_dir() {
            return Err(Error::InitHooks {
                path: shown,
                reason: "is not a directory".to_string(),
            });
        }
        if fs::read_dir(hooks)?.next().is_none() {
            return Err(Error::InitHooks {
                path: shown,
                reason: "directory does not contain any hook".to_string(),
            });
        }

        let target = self.path.join(INIT_HOOKS_DIR);
        for entry in WalkDir::new(hooks).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let Ok(relative) = entry.path().strip_prefix(hooks) else {
                continue;
            };
            let dest = target.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                fs::copy(entry.path(), &dest)?;
                debug!("init hook {:?}", relative);
            }
        }

        info!("Installed init hooks from {:?} into {:?}", shown, target);
        Ok(target)
    }
}

impl Drop for RunHome {
    fn drop(&mut self) {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                warn!("Failed to remove run home {:?}: {}", path, e);
            } else {
                info!("Run home removed: {:?}", path);
            }
        }
    }
}
