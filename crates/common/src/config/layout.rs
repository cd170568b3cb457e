//! 目录布局配置
//!
//! 宿主应用、扩展模块、程序自身模块仓库以及缓存目录的位置

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory name of the program's own module repository, next to `bin/`.
const APP_REPO_DIR: &str = "repo";
const LIB_DIR: &str = "lib";
const CACHE_DIR_NAME: &str = ".pipeline-runner";

pub const FALLBACK_POLICIES: &[&str] = &["first-defined", "unanimous"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Exploded host application directory (`-w/--host-dir`).
    #[serde(default)]
    pub host_dir: Option<PathBuf>,

    /// Extension modules: an installation directory or a plugin list file.
    #[serde(default = "default_plugins")]
    pub plugins: PathBuf,

    /// The program's own module repository. Defaults to `../repo` relative to
    /// the executable.
    #[serde(default)]
    pub app_repo: Option<PathBuf>,

    /// Slim packaging library directory holding `setup/` and `payload/`.
    /// Defaults to `<app_repo>/../lib`.
    #[serde(default)]
    pub lib_path: Option<PathBuf>,

    /// Local extension-module cache. Defaults to `~/.pipeline-runner`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_host_lib_subdir")]
    pub host_lib_subdir: String,

    #[serde(default = "default_host_launcher")]
    pub host_launcher: String,

    /// Compatibility package collected from the app repository into the host realm.
    #[serde(default = "default_compat_path")]
    pub compat_path: String,

    /// Sub-path of the app repository (and of `lib_path`) holding the payload.
    #[serde(default = "default_payload_path")]
    pub payload_path: String,

    #[serde(default = "default_module_extensions")]
    pub module_extensions: Vec<String>,

    #[serde(default = "default_extension_module_extensions")]
    pub extension_module_extensions: Vec<String>,

    /// `first-defined` or `unanimous`.
    #[serde(default = "default_fallback_policy")]
    pub fallback_policy: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            host_dir: None,
            plugins: default_plugins(),
            app_repo: None,
            lib_path: None,
            cache_dir: None,
            host_lib_subdir: default_host_lib_subdir(),
            host_launcher: default_host_launcher(),
            compat_path: default_compat_path(),
            payload_path: default_payload_path(),
            module_extensions: default_module_extensions(),
            extension_module_extensions: default_extension_module_extensions(),
            fallback_policy: default_fallback_policy(),
        }
    }
}

fn default_plugins() -> PathBuf {
    PathBuf::from("plugins.txt")
}

fn default_host_lib_subdir() -> String {
    "WEB-INF/lib".to_string()
}

fn default_host_launcher() -> String {
    "winstone.jar".to_string()
}

fn default_compat_path() -> String {
    "javax/servlet".to_string()
}

fn default_payload_path() -> String {
    "io/jenkins/jenkinsfile-runner/payload".to_string()
}

fn default_module_extensions() -> Vec<String> {
    vec!["jar".to_string()]
}

fn default_extension_module_extensions() -> Vec<String> {
    ["jpi", "hpi", "jpl"].iter().map(|s| s.to_string()).collect()
}

fn default_fallback_policy() -> String {
    "first-defined".to_string()
}

impl LayoutConfig {
    pub fn host_dir(&self) -> Result<&PathBuf, ConfigError> {
        self.host_dir
            .as_ref()
            .ok_or_else(|| ConfigError::missing_field("layout.host_dir (-w/--host-dir)"))
    }

    /// Configured app repository, or `../repo` next to the running executable.
    pub fn app_repo(&self) -> Result<PathBuf, ConfigError> {
        if let Some(repo) = &self.app_repo {
            return Ok(repo.clone());
        }
        let exe = std::env::current_exe().map_err(|e| {
            ConfigError::invalid_value("layout.app_repo", format!("cannot locate executable: {e}"))
        })?;
        exe.parent()
            .and_then(|bin| bin.parent())
            .map(|install| install.join(APP_REPO_DIR))
            .ok_or_else(|| ConfigError::missing_field("layout.app_repo"))
    }

    pub fn lib_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.lib_path {
            Some(lib) => Ok(lib.clone()),
            None => Ok(self.app_repo()?.join("..").join(LIB_DIR)),
        }
    }

    /// Configured cache directory, or `~/.pipeline-runner`.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(CACHE_DIR_NAME)))
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>) {
        for (field, list) in [
            ("layout.module_extensions", &self.module_extensions),
            (
                "layout.extension_module_extensions",
                &self.extension_module_extensions,
            ),
        ] {
            if list.is_empty() {
                errors.push(format!("{field} cannot be empty"));
            }
            for ext in list {
                if ext.is_empty() || ext.starts_with('.') {
                    errors.push(format!(
                        "Invalid extension '{ext}' in {field}, expected a bare extension such as 'jar'"
                    ));
                }
            }
        }

        if !FALLBACK_POLICIES.contains(&self.fallback_policy.as_str()) {
            errors.push(format!(
                "Invalid layout.fallback_policy '{}', must be one of: {}",
                self.fallback_policy,
                FALLBACK_POLICIES.join(", ")
            ));
        }

        for (field, value) in [
            ("layout.host_lib_subdir", &self.host_lib_subdir),
            ("layout.host_launcher", &self.host_launcher),
            ("layout.payload_path", &self.payload_path),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{field} cannot be empty"));
            }
        }

        match &self.host_dir {
            None => errors.push(
                "Warning: layout.host_dir is not set, it must be given with -w/--host-dir"
                    .to_string(),
            ),
            Some(dir) if !dir.is_dir() => errors.push(format!(
                "Warning: layout.host_dir {dir:?} does not exist"
            )),
            Some(_) => {}
        }
    }
}
