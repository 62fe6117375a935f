use crate::storage::{Error, Result, ASSET_METADATA_FILENAME, FOLDER_FILENAME, PROJECT_FILENAME};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// A small YAML record stored next to (inside) the directory it describes.
pub trait Descriptor: Serialize + DeserializeOwned {
    /// File name of the descriptor inside the described directory.
    const FILE_NAME: &'static str;

    fn path_in(dir: &Path) -> PathBuf {
        dir.join(Self::FILE_NAME)
    }
}

/// `folder.yaml`: tags any directory with a node kind and an optional subkind.
///
/// The kind is kept as a raw string so that unknown values survive a read and can
/// be mapped to the documented fallback by the classifier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "subtype", default, skip_serializing_if = "Option::is_none")]
    pub subkind: Option<String>,
}

impl Descriptor for FolderDescriptor {
    const FILE_NAME: &'static str = FOLDER_FILENAME;
}

/// `project.yaml`: its presence marks a project root.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
}

impl Descriptor for ProjectDescriptor {
    const FILE_NAME: &'static str = PROJECT_FILENAME;
}

/// `metadata.yaml` inside `versions/<entry>/`: describes one asset version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AssetDescriptor {
    // Written as either an integer or a string ("3", "v003") in the wild
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
}

impl Descriptor for AssetDescriptor {
    const FILE_NAME: &'static str = ASSET_METADATA_FILENAME;
}

impl AssetDescriptor {
    pub fn new(version: u32, root: impl Into<String>, asset_type: impl Into<String>) -> Self {
        AssetDescriptor {
            version: Some(serde_yaml::Value::Number(u64::from(version).into())),
            root: Some(root.into()),
            asset_type: Some(asset_type.into()),
        }
    }

    /// Returns the stored version as an integer, accepting `3`, `"3"`, `"v003"` and `"V3"`.
    pub fn version(&self) -> Option<u32> {
        match self.version.as_ref()? {
            serde_yaml::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            serde_yaml::Value::String(s) => {
                let s = s.trim();
                let digits = s.strip_prefix(['v', 'V']).unwrap_or(s);
                digits.parse().ok()
            }
            _ => None,
        }
    }
}

/// Reads the descriptor of type `D` stored in `dir`.
///
/// Never fails: a missing file, an unreadable file and a file that does not parse
/// all yield `None`. Parse failures are logged since they usually mean a write was
/// interrupted.
#[instrument(level = "trace", skip(dir), fields(dir = %dir.display()))]
pub async fn read_descriptor<D: Descriptor>(dir: &Path) -> Option<D> {
    let path = D::path_in(dir);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return None;
        }
        Err(e) => {
            warn!("Failed to read descriptor '{}': {}", path.display(), e);
            return None;
        }
    };

    match serde_yaml::from_str(&content) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            warn!("Failed to parse descriptor '{}': {}", path.display(), e);
            None
        }
    }
}

/// Serializes `descriptor` into its file inside `dir`, replacing any previous content.
///
/// The write is not atomic. A crash mid-write leaves a file that readers will treat
/// as absent.
pub async fn write_descriptor<D: Descriptor>(dir: &Path, descriptor: &D) -> Result<()> {
    let path = D::path_in(dir);
    let content = serde_yaml::to_string(descriptor).map_err(Error::Descriptor)?;
    fs::write(&path, content).await.map_err(Error::Io)?;
    debug!("Descriptor written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_folder_descriptor_roundtrip() {
        let dir = tempdir().unwrap();
        let descriptor = FolderDescriptor {
            kind: Some("taskarea".into()),
            subkind: Some("shot".into()),
        };
        write_descriptor(dir.path(), &descriptor).await.unwrap();

        let content = fs::read_to_string(dir.path().join(FOLDER_FILENAME)).await.unwrap();
        assert!(content.contains("type: taskarea"));
        assert!(content.contains("subtype: shot"));

        let read: FolderDescriptor = read_descriptor(dir.path()).await.unwrap();
        assert_eq!(read, descriptor);
    }

    #[tokio::test]
    async fn test_missing_descriptor_is_none() {
        let dir = tempdir().unwrap();
        assert!(read_descriptor::<FolderDescriptor>(dir.path()).await.is_none());
        assert!(read_descriptor::<ProjectDescriptor>(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_descriptor_is_none() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FOLDER_FILENAME), "type: [unterminated").await.unwrap();
        assert!(read_descriptor::<FolderDescriptor>(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FOLDER_FILENAME), "type: task\n").await.unwrap();
        let read: FolderDescriptor = read_descriptor(dir.path()).await.unwrap();
        assert_eq!(read.kind.as_deref(), Some("task"));
        assert_eq!(read.subkind, None);
    }

    #[test]
    fn test_asset_version_accepts_int_and_string() {
        let parse = |yaml: &str| serde_yaml::from_str::<AssetDescriptor>(yaml).unwrap().version();

        assert_eq!(parse("version: 3"), Some(3));
        assert_eq!(parse("version: \"3\""), Some(3));
        assert_eq!(parse("version: v003"), Some(3));
        assert_eq!(parse("version: V12"), Some(12));
        assert_eq!(parse("version: latest"), None);
        assert_eq!(parse("version: -1"), None);
        assert_eq!(parse("root: /tmp/x"), None);
    }

    #[test]
    fn test_asset_descriptor_new_serializes_int_version() {
        let descriptor = AssetDescriptor::new(7, "/show/a.usd", "usd");
        let yaml = serde_yaml::to_string(&descriptor).unwrap();
        assert!(yaml.contains("version: 7"));
        assert!(yaml.contains("type: usd"));
        assert_eq!(descriptor.version(), Some(7));
    }
}
