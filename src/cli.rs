//! 命令行界面定义
//!
//! `pipeline-runner [run options]` runs a pipeline; the other subcommands
//! inspect or prepare an installation.
use clap::{Args, Parser, Subcommand};
use runner_common::options::DEFAULT_DEFINITION_FILE;
use runner_common::{DEFAULT_CONFIG_FILE, LayoutConfig, RunError, RunOptions};
use std::ffi::OsString;
use std::path::PathBuf;

/// Multi-letter single-dash flags accepted for compatibility.
const LEGACY_FLAGS: &[(&str, &str)] = &[("-ns", "--no-sandbox"), ("-nbl", "--no-build-logs")];

/// Rewrite `-ns` and `-nbl` to their long forms; clap would otherwise read
/// them as `-n s` and `-n bl`.
pub(crate) fn expand_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            LEGACY_FLAGS
                .iter()
                .find(|(short, _)| arg == *short)
                .map(|(_, long)| OsString::from(long))
                .unwrap_or(arg)
        })
        .collect()
}

#[derive(Parser, Debug)]
#[command(name = "pipeline-runner")]
#[command(version)]
#[command(about = "Run a pipeline definition once in an isolated, layered host environment")]
#[command(args_conflicts_with_subcommands = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    #[command(flatten)]
    pub(crate) run: RunArgs,

    /// Configuration file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run a pipeline (default)
    Run(RunArgs),

    /// Check a pipeline definition without running it
    Lint(LintArgs),

    /// Test configuration file
    Check {
        /// Configuration file path (optional, defaults to --config)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },

    /// Print the boot realm hierarchy as JSON
    Inspect {
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Install extension archives and their dependencies into a home
    Assemble {
        /// Home directory; archives land in <home>/plugins
        #[arg(long)]
        home: PathBuf,

        /// Extension archive to install
        #[arg(long = "plugin", required = true)]
        plugins: Vec<PathBuf>,

        /// Directory searched for dependencies
        #[arg(long)]
        search: Vec<PathBuf>,
    },

    /// Print version information
    Version,
}

/// Installation layout overrides.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct LayoutArgs {
    /// Exploded host application directory
    #[arg(short = 'w', long)]
    pub(crate) host_dir: Option<PathBuf>,

    /// Extension module directory or plugin list file
    #[arg(short = 'p', long)]
    pub(crate) plugins: Option<PathBuf>,

    /// Application module repository
    #[arg(long)]
    pub(crate) app_repo: Option<PathBuf>,

    /// Directory holding the setup and payload archives
    #[arg(long)]
    pub(crate) lib_path: Option<PathBuf>,

    /// Local cache of extension archives referenced by a plugin list
    #[arg(long)]
    pub(crate) cache_dir: Option<PathBuf>,
}

impl LayoutArgs {
    pub(crate) fn apply(&self, layout: &mut LayoutConfig) {
        if let Some(dir) = &self.host_dir {
            layout.host_dir = Some(dir.clone());
        }
        if let Some(plugins) = &self.plugins {
            layout.plugins = plugins.clone();
        }
        if let Some(repo) = &self.app_repo {
            layout.app_repo = Some(repo.clone());
        }
        if let Some(lib) = &self.lib_path {
            layout.lib_path = Some(lib.clone());
        }
        if let Some(cache) = &self.cache_dir {
            layout.cache_dir = Some(cache.clone());
        }
    }
}

/// Host home preparation shared by `run` and `lint`.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct HomeArgs {
    /// Empty directory used as the host home (a temporary one otherwise)
    #[arg(long)]
    pub(crate) run_home: Option<PathBuf>,

    /// Directory of Groovy init hooks copied into <home>/init.groovy.d
    #[arg(long)]
    pub(crate) with_init_hooks: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct LintArgs {
    #[command(flatten)]
    pub(crate) layout: LayoutArgs,

    #[command(flatten)]
    pub(crate) home: HomeArgs,

    /// Pipeline definition file, or a directory containing a Jenkinsfile
    #[arg(short = 'f', long = "file", default_value = DEFAULT_DEFINITION_FILE)]
    pub(crate) definition: PathBuf,
}

impl LintArgs {
    pub(crate) fn to_options(&self) -> RunOptions {
        RunOptions {
            definition: self.definition.clone(),
            ..RunOptions::default()
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) layout: LayoutArgs,

    #[command(flatten)]
    pub(crate) home: HomeArgs,

    /// Pipeline definition file, or a directory containing a Jenkinsfile
    #[arg(short = 'f', long = "file", default_value = DEFAULT_DEFINITION_FILE)]
    pub(crate) definition: PathBuf,

    /// Job name, `/`-separated for folders
    #[arg(short = 'n', long, default_value = runner_common::options::DEFAULT_JOB_NAME)]
    pub(crate) job_name: String,

    /// Build cause
    #[arg(short = 'c', long)]
    pub(crate) cause: Option<String>,

    #[arg(short = 'b', long, default_value_t = 1)]
    pub(crate) build_number: u32,

    /// Build parameter, KEY=VALUE
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE")]
    pub(crate) args: Vec<String>,

    /// Disable the script security sandbox (`-ns`)
    #[arg(long)]
    pub(crate) no_sandbox: bool,

    /// Keep parameters the pipeline does not declare
    #[arg(short = 'u', long)]
    pub(crate) keep_undefined_parameters: bool,

    /// Workspace used inside node blocks
    #[arg(long)]
    pub(crate) run_workspace: Option<PathBuf>,

    /// SCM definition file
    #[arg(long)]
    pub(crate) scm: Option<PathBuf>,

    /// Suppress build log output (`-nbl`)
    #[arg(long)]
    pub(crate) no_build_logs: bool,
}

impl RunArgs {
    pub(crate) fn to_options(&self) -> Result<RunOptions, RunError> {
        let parameters = self
            .args
            .iter()
            .map(|arg| RunOptions::parse_parameter(arg))
            .collect::<Result<_, _>>()?;

        Ok(RunOptions {
            definition: self.definition.clone(),
            job_name: self.job_name.clone(),
            cause: self.cause.clone(),
            build_number: self.build_number,
            parameters,
            no_sandbox: self.no_sandbox,
            keep_undefined_parameters: self.keep_undefined_parameters,
            run_workspace: self.run_workspace.clone(),
            scm: self.scm.clone(),
            no_build_logs: self.no_build_logs,
        })
    }
}
