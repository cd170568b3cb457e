//! Archive manifests
//!
//! Every archive starts with a main manifest section of `Name: value`
//! attributes. Lines starting with a single space continue the previous value
//! and the first blank line ends the section.

use crate::archive::ArchiveLocation;
use crate::error::{DiscoveryError, ManifestError};
use std::fs;

/// Extension-module short name.
pub const SHORT_NAME: &str = "Short-Name";
/// Extension-module version.
pub const PLUGIN_VERSION: &str = "Plugin-Version";
/// Comma separated `name:version[;resolution:=optional]` list.
pub const PLUGIN_DEPENDENCIES: &str = "Plugin-Dependencies";
/// Comma separated qualified type names defined by the archive.
pub const EXPORT_TYPES: &str = "Export-Types";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut attributes: Vec<(String, String)> = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            if line.is_empty() {
                break;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                let Some((_, value)) = attributes.last_mut() else {
                    return Err(ManifestError::DanglingContinuation { line: line_no });
                };
                value.push_str(rest);
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(ManifestError::MalformedLine { line: line_no });
            };
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ManifestError::MalformedLine { line: line_no });
            }
            let value = value.strip_prefix(' ').unwrap_or(value);
            attributes.push((name.to_string(), value.to_string()));
        }

        Ok(Self { attributes })
    }

    pub fn read(archive: &ArchiveLocation) -> Result<Self, DiscoveryError> {
        let bytes = fs::read(archive.path()).map_err(|e| DiscoveryError::io(archive.path(), e))?;
        let text = String::from_utf8(bytes).map_err(|_| DiscoveryError::Manifest {
            archive: archive.clone(),
            source: ManifestError::NotUtf8,
        })?;
        Self::parse(&text).map_err(|source| DiscoveryError::Manifest {
            archive: archive.clone(),
            source,
        })
    }

    /// Case-insensitive lookup; a repeated attribute keeps its last value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn short_name(&self) -> Option<&str> {
        self.get(SHORT_NAME)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn exported_types(&self) -> impl Iterator<Item = &str> {
        self.get(EXPORT_TYPES)
            .into_iter()
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
