//! 流水线运行选项
//!
//! `RunOptions` is the structured value the setup layer hands to the payload
//! runner. It crosses realm boundaries, so the platform realm exposes it by
//! name.

use crate::error::RunError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Qualified name under which the platform realm exposes [`RunOptions`].
pub const RUN_OPTIONS_TYPE: &str = "pipeline.runner.RunOptions";

/// File name looked up when the definition path is a directory.
pub const DEFAULT_DEFINITION_FILE: &str = "Jenkinsfile";

pub const DEFAULT_JOB_NAME: &str = "job";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Pipeline definition file, or a directory that contains one.
    pub definition: PathBuf,
    /// `/`-separated job name; the last segment is the job itself.
    pub job_name: String,
    pub cause: Option<String>,
    pub build_number: u32,
    /// Build parameters, `-a KEY=VALUE` on the command line.
    pub parameters: BTreeMap<String, String>,
    pub no_sandbox: bool,
    pub keep_undefined_parameters: bool,
    /// Workspace used inside `node {}` blocks.
    pub run_workspace: Option<PathBuf>,
    /// SCM definition file for the project.
    pub scm: Option<PathBuf>,
    pub no_build_logs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            definition: PathBuf::from(DEFAULT_DEFINITION_FILE),
            job_name: DEFAULT_JOB_NAME.to_string(),
            cause: None,
            build_number: 1,
            parameters: BTreeMap::new(),
            no_sandbox: false,
            keep_undefined_parameters: false,
            run_workspace: None,
            scm: None,
            no_build_logs: false,
        }
    }
}

impl RunOptions {
    /// The definition file to load: `definition` itself, or
    /// `definition/Jenkinsfile` when it names a directory.
    pub fn definition_file(&self) -> PathBuf {
        resolve_definition(&self.definition)
    }

    /// Job name split into its folder segments.
    pub fn job_segments(&self) -> impl Iterator<Item = &str> {
        self.job_name.split('/')
    }

    /// Parse one `KEY=VALUE` build parameter. The value may itself contain `=`.
    pub fn parse_parameter(arg: &str) -> Result<(String, String), RunError> {
        match arg.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(RunError::InvalidParameter {
                arg: arg.to_string(),
            }),
        }
    }
}

fn resolve_definition(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_DEFINITION_FILE)
    } else {
        path.to_path_buf()
    }
}
