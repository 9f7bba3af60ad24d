use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::ExtensionSection;
use crate::error::{HarnessError, HarnessResult};

const DEFAULT_UNPACKED_DIR: &str = "./web-extensions/chrome";
const DEFAULT_ARCHIVE_DIR: &str = "./build";

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    name: String,
    version: String,
}

/// The web-extension under test, as seen from the filesystem.
///
/// Chrome loads the unpacked sources through `--load-extension`;
/// Firefox installs the packaged `{name}-{version}.zip` as a temporary
/// addon. Both paths are computed from the manifest.
#[derive(Debug, Clone)]
pub struct ExtensionBundle {
    name: String,
    version: String,
    unpacked_path: PathBuf,
    packed_path: PathBuf,
}

impl ExtensionBundle {
    pub fn load(section: &ExtensionSection) -> HarnessResult<Self> {
        let unpacked_path = section
            .unpacked_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UNPACKED_DIR));
        let unpacked_path = canonical_or_self(&unpacked_path);
        let manifest_path = unpacked_path.join("manifest.json");
        let raw = std::fs::read_to_string(&manifest_path).map_err(|err| {
            HarnessError::Configuration(format!(
                "cannot read extension manifest {}: {err}",
                manifest_path.display()
            ))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw)?;

        let archive_dir = section
            .archive_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR));
        let name = manifest.name.to_lowercase();
        let packed_path = canonical_or_self(&archive_dir.join(format!(
            "{}-{}.zip",
            name, manifest.version
        )));

        Ok(Self {
            name,
            version: manifest.version,
            unpacked_path,
            packed_path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn archive_name(&self) -> String {
        format!("{}-{}.zip", self.name, self.version)
    }

    pub fn unpacked_path(&self) -> &Path {
        &self.unpacked_path
    }

    pub fn packed_path(&self) -> &Path {
        &self.packed_path
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, name: &str, version: &str) {
        std::fs::write(
            dir.join("manifest.json"),
            format!(r#"{{"name": "{name}", "version": "{version}", "manifest_version": 2}}"#),
        )
        .unwrap();
    }

    #[test]
    fn archive_name_is_lowercased_name_dash_version() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), "BookMyComics", "0.0.1");
        let section = ExtensionSection {
            unpacked_dir: Some(dir.path().to_path_buf()),
            archive_dir: Some(PathBuf::from("/tmp/build")),
        };
        let bundle = ExtensionBundle::load(&section).unwrap();
        assert_eq!(bundle.archive_name(), "bookmycomics-0.0.1.zip");
        assert!(bundle
            .packed_path()
            .ends_with("build/bookmycomics-0.0.1.zip"));
    }

    #[test]
    fn missing_manifest_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let section = ExtensionSection {
            unpacked_dir: Some(dir.path().to_path_buf()),
            archive_dir: None,
        };
        let err = ExtensionBundle::load(&section).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
    }
}
