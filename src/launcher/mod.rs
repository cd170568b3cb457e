//! 分层启动器
//!
//! Builds the boot realm hierarchy for one installation and hands control to
//! the setup layer, which in turn boots the host and runs the payload.

pub mod boot;
pub mod contract;
pub mod environment;
pub mod host;
pub mod payload;
pub mod plugins;
pub mod setup;

pub use boot::{BootLayout, BootRealms};
pub use contract::{LAUNCH_TYPE, PAYLOAD_LINTER_TYPE, PAYLOAD_RUNNER_TYPE, SETUP_APP_TYPE};

use crate::error::Result;
use runner_common::RunOptions;
use std::path::PathBuf;
use tracing::info;

/// What the payload is asked to do with the definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LaunchMode {
    #[default]
    Run,
    Lint,
}

/// Per-run settings the setup layer acts on.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Extension module directory or plugin list file.
    pub plugins: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub run_home: Option<PathBuf>,
    /// Directory of Groovy init hooks copied into the home before boot.
    pub init_hooks: Option<PathBuf>,
    pub mode: LaunchMode,
    pub options: RunOptions,
}

/// Everything the setup entry point receives.
#[derive(Debug)]
pub struct Launch {
    pub layout: BootLayout,
    pub realms: BootRealms,
    pub settings: LaunchSettings,
}

/// Build the boot realms and run the setup layer. Returns the exit status.
pub fn run(layout: BootLayout, settings: LaunchSettings) -> Result<i32> {
    info!(
        "Launching {:?} ({:?}) from host {:?}",
        settings.options.definition, settings.mode, layout.host_dir
    );
    let realms = BootRealms::build(&layout)?;
    let launch = Launch {
        layout,
        realms,
        settings,
    };
    boot::enter_setup(&launch)
}
