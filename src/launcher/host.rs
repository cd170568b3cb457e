//! Host application boot
//!
//! Loads the installed extension modules into the host's extension registry
//! realm and announces the "fully started" milestone once it is sealed.

use crate::error::Result;
use chrono::{DateTime, Local};
use runner_realm::{ArchiveScanner, Realm, RealmBuilder, Resolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A booted host application.
#[derive(Debug)]
pub struct HostEngine {
    home: PathBuf,
    registry: Arc<Realm>,
    started_at: DateTime<Local>,
}

impl HostEngine {
    /// Build the extension registry realm from `plugins_dir` on top of the
    /// host realm, then call `on_started` with it.
    pub fn boot<F>(
        host: Arc<dyn Resolver>,
        home: &Path,
        plugins_dir: &Path,
        scanner: ArchiveScanner,
        on_started: F,
    ) -> Result<Self>
    where
        F: FnOnce(Arc<dyn Resolver>) -> Result<()>,
    {
        debug!("Booting host in {:?} with extension modules from {:?}", home, plugins_dir);

        let registry = RealmBuilder::new("extensions", Some(host))
            .with_scanner(scanner)
            .collect(plugins_dir)?
            .make()?;
        let registry = Arc::new(registry);

        let engine = Self {
            home: home.to_path_buf(),
            registry,
            started_at: Local::now(),
        };
        info!(
            "Host fully started at {} with {} extension modules",
            engine.started_at.format("%Y-%m-%d %H:%M:%S"),
            engine.registry.archives().len()
        );

        on_started(engine.registry.clone() as Arc<dyn Resolver>)?;
        Ok(engine)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The realm extension-module types resolve through.
    pub fn registry(&self) -> &Arc<Realm> {
        &self.registry
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}
