//! Boot realm hierarchy
//!
//! Wires platform ← host ← setup in strict order and enters the setup
//! layer's entry point. Payload archives are kept out of the setup realm so
//! the payload is only ever loaded by its own realm later on.

use super::Launch;
use super::contract::{self, SetupApp};
use crate::error::{Error, Result};
use runner_common::{LayoutConfig, RUN_OPTIONS_TYPE};
use runner_realm::{
    ArchiveScanner, DiscoveryError, DispatchError, Dispatcher, FallbackPolicy, PlatformRealm,
    Realm, RealmBuilder, RealmSnapshot, Resolver,
};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Resolved directory layout of one installation.
#[derive(Debug, Clone, Serialize)]
pub struct BootLayout {
    pub host_dir: PathBuf,
    pub app_repo: PathBuf,
    pub lib_path: PathBuf,
    pub host_lib_subdir: String,
    pub host_launcher: String,
    pub compat_path: String,
    pub payload_path: String,
    pub module_extensions: Vec<String>,
    pub extension_module_extensions: Vec<String>,
    pub fallback_policy: FallbackPolicy,
}

impl BootLayout {
    pub fn from_config(layout: &LayoutConfig) -> Result<Self> {
        let fallback_policy = FallbackPolicy::from_str(&layout.fallback_policy).map_err(|_| {
            runner_common::ConfigError::invalid_value(
                "layout.fallback_policy",
                layout.fallback_policy.clone(),
            )
        })?;

        Ok(Self {
            host_dir: layout.host_dir()?.clone(),
            app_repo: layout.app_repo()?,
            lib_path: layout.lib_path()?,
            host_lib_subdir: layout.host_lib_subdir.clone(),
            host_launcher: layout.host_launcher.clone(),
            compat_path: layout.compat_path.clone(),
            payload_path: layout.payload_path.clone(),
            module_extensions: layout.module_extensions.clone(),
            extension_module_extensions: layout.extension_module_extensions.clone(),
            fallback_policy,
        })
    }

    pub fn host_lib_dir(&self) -> PathBuf {
        self.host_dir.join(&self.host_lib_subdir)
    }

    pub fn host_launcher_archive(&self) -> PathBuf {
        self.host_dir.join(&self.host_launcher)
    }

    pub fn compat_dir(&self) -> PathBuf {
        self.app_repo.join(&self.compat_path)
    }

    pub fn setup_dir(&self) -> PathBuf {
        self.lib_path.join("setup")
    }

    /// Bundled payload location inside the app repository, then the slim
    /// packaging payload directory.
    pub fn payload_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.app_repo.join(&self.payload_path),
            self.lib_path.join("payload"),
        ]
    }

    pub fn module_scanner(&self) -> ArchiveScanner {
        ArchiveScanner::new(&self.module_extensions)
    }

    pub fn extension_scanner(&self) -> ArchiveScanner {
        ArchiveScanner::new(&self.extension_module_extensions)
    }
}

/// The realm every other realm ultimately delegates to.
pub fn platform_realm() -> PlatformRealm {
    PlatformRealm::default().expose(RUN_OPTIONS_TYPE)
}

/// Sealed host and setup realms plus their shared platform parent.
#[derive(Debug, Clone)]
pub struct BootRealms {
    pub platform: Arc<PlatformRealm>,
    pub host: Arc<Realm>,
    pub setup: Arc<Realm>,
}

impl BootRealms {
    pub fn build(layout: &BootLayout) -> Result<Self> {
        let platform = Arc::new(platform_realm());

        let host = RealmBuilder::new("host", Some(platform.clone() as Arc<dyn Resolver>))
            .with_scanner(layout.module_scanner())
            .collect(layout.host_lib_dir())?
            .collect(layout.host_launcher_archive())?
            .collect(layout.compat_dir())?
            .make()?;
        let host = Arc::new(host);

        let setup_dir = layout.setup_dir();
        if !setup_dir.exists() {
            return Err(DiscoveryError::MissingDirectory {
                path: setup_dir,
                what: "setup archive directory".to_string(),
            }
            .into());
        }

        let mut builder = RealmBuilder::new("setup", Some(host.clone() as Arc<dyn Resolver>))
            .with_scanner(layout.module_scanner())
            .collect(&layout.app_repo)?
            .collect(&setup_dir)?;
        for dir in layout.payload_dirs() {
            builder = builder.exclude(dir)?;
        }
        let setup = Arc::new(builder.make()?);

        info!(
            "Boot realms ready: host {} archives, setup {} archives",
            host.archives().len(),
            setup.archives().len()
        );
        Ok(Self {
            platform,
            host,
            setup,
        })
    }

    pub fn snapshots(&self) -> Vec<RealmSnapshot> {
        vec![self.host.snapshot(), self.setup.snapshot()]
    }
}

/// Locate the setup entry point in the setup realm and run it.
pub fn enter_setup(launch: &Launch) -> Result<i32> {
    let linker = contract::setup_linker();
    let binding = contract::setup_binding();

    Dispatcher::<dyn SetupApp>::new(&linker)
        .dispatch(launch.realms.setup.as_ref(), &binding, |app| app.run(launch))
        .map_err(|err| match err {
            DispatchError::TargetNotFound(not_found) => {
                let repo = &launch.layout.app_repo;
                let repo = std::path::absolute(repo).unwrap_or_else(|_| repo.clone());
                Error::from((*not_found).with_context([repo, launch.layout.host_lib_dir()]))
            }
            DispatchError::Invocation(err) => err,
        })
}
