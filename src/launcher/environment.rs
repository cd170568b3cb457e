//! Extension environment assembly
//!
//! Installs a batch of extension archives into `<home>/plugins` together
//! with every dependency their manifests declare.

use crate::error::Result;
use runner_realm::{
    ArchiveLocation, ArchiveScanner, InstallationReport, ManifestDependencyResolver,
    ManifestDescriptor, SearchScope,
};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn assemble(
    home: &Path,
    archives: &[PathBuf],
    search: &[PathBuf],
    scanner: &ArchiveScanner,
) -> Result<InstallationReport> {
    let descriptors = archives
        .iter()
        .map(|path| -> Result<ManifestDescriptor> {
            let archive = ArchiveLocation::new(path)?;
            Ok(ManifestDescriptor::read(&archive)?)
        })
        .collect::<Result<Vec<_>>>()?;

    let scope = SearchScope::scan(scanner, search)?;
    info!(
        "Assembling {} extension modules into {:?} from {}",
        descriptors.len(),
        home,
        scope
    );

    let report =
        ManifestDependencyResolver::new(home.join("plugins")).resolve(&descriptors, &scope)?;
    Ok(report)
}
