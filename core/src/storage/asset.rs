use crate::storage::classify::{classify, NodeKind};
use crate::storage::metadata::{read_descriptor, AssetDescriptor};
use crate::storage::project::absolute_path;
use crate::storage::publish::is_published;
use crate::storage::tree::list_subdirectories;
use crate::storage::version::{extract_version, strip_version};
use crate::storage::VERSIONS_DIR_NAME;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

pub const DEFAULT_ASSET_TYPE: &str = "usd";

/// Asset types whose `root` is a directory of frames rather than a single file.
pub const SEQUENCE_TYPES: [&str; 4] = ["sequence", "imagesequence", "image_sequence", "exr"];

const THUMBNAIL_NAMES: [&str; 2] = ["thumbnail.png", "thumbnail.jpg"];

/// One version of a deliverable, found at `<task>/versions/<name>_vNNN`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Asset {
    /// Logical name, with the version tag removed.
    pub name: String,
    /// The version entry directory.
    pub path: PathBuf,
    pub version: u32,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Primary content of this version.
    pub root: PathBuf,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub published: bool,
    pub thumbnails: Vec<PathBuf>,
}

impl Asset {
    /// The task folder owning this asset (`<task>/versions/<entry>` → `<task>`).
    pub fn task_path(&self) -> Option<&Path> {
        self.path.parent()?.parent()
    }

    pub fn is_sequence(&self) -> bool {
        is_sequence_type(&self.asset_type)
    }
}

fn is_sequence_type(asset_type: &str) -> bool {
    SEQUENCE_TYPES.iter().any(|t| t.eq_ignore_ascii_case(asset_type))
}

/// Resolves the version entry at `entry` into an [`Asset`].
///
/// Returns `None` when the entry has no readable `metadata.yaml`: such entries
/// are partial or invalid versions. A `root` that cannot be stat-ed leaves size
/// and modification time empty. Paths in the result are absolute.
#[instrument(level = "debug", skip(entry), fields(entry = %entry.display()))]
pub async fn read_asset(entry: &Path) -> Option<Asset> {
    let entry = absolute_path(entry);
    let entry = entry.as_path();
    let Some(descriptor) = read_descriptor::<AssetDescriptor>(entry).await else {
        debug!("Skipping version without metadata: {}", entry.display());
        return None;
    };

    let entry_name = entry.file_name()?.to_string_lossy().into_owned();
    let root = match descriptor.root.as_deref().map(str::trim) {
        Some(root) if !root.is_empty() => entry.join(root),
        _ => entry.to_path_buf(),
    };
    let asset_type = descriptor
        .asset_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ASSET_TYPE.to_string());

    let (size, modified) = if is_sequence_type(&asset_type) {
        sequence_stats(&root).await
    } else {
        file_stats(&root).await
    };

    let mut asset = Asset {
        name: strip_version(&entry_name),
        path: entry.to_path_buf(),
        version: extract_version(&entry_name),
        size,
        modified,
        root,
        asset_type,
        published: false,
        thumbnails: thumbnails(entry).await,
    };
    asset.published = is_published(&asset).await;
    Some(asset)
}

/// Lists every asset version below `root`.
///
/// `root` may be a task or any folder above tasks: non-task directories are
/// descended into until task folders are reached, and only tasks contribute
/// assets. The result is in discovery order; see [`sort_assets`].
#[instrument(skip(root), fields(root = %root.display()))]
pub async fn list_assets(root: &Path) -> Vec<Asset> {
    let mut assets = Vec::new();
    let mut pending: VecDeque<PathBuf> = VecDeque::from([absolute_path(root)]);

    while let Some(dir) = pending.pop_front() {
        if classify(&dir).await.kind == NodeKind::Task {
            assets.extend(task_assets(&dir).await);
        } else {
            pending.extend(list_subdirectories(&dir).await);
        }
    }

    debug!("Found {} assets", assets.len());
    assets
}

async fn task_assets(task: &Path) -> Vec<Asset> {
    let entries = list_subdirectories(&task.join(VERSIONS_DIR_NAME)).await;
    join_all(entries.iter().map(|entry| read_asset(entry)))
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn file_stats(path: &Path) -> (u64, Option<DateTime<Utc>>) {
    match fs::metadata(path).await {
        Ok(meta) => (meta.len(), meta.modified().ok().map(DateTime::<Utc>::from)),
        Err(e) => {
            warn!("Failed to stat asset root '{}': {}", path.display(), e);
            (0, None)
        }
    }
}

/// Sums the sizes of the files directly inside `dir`; the newest of them sets the
/// modification time.
async fn sequence_stats(dir: &Path) -> (u64, Option<DateTime<Utc>>) {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) => {
            warn!("Failed to read sequence root '{}': {}", dir.display(), e);
            return (0, None);
        }
    };

    let mut size = 0;
    let mut modified: Option<DateTime<Utc>> = None;
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        // Follows symlinked frames
        let Ok(meta) = fs::metadata(entry.path()).await else { continue };
        if !meta.is_file() {
            continue;
        }
        size += meta.len();
        if let Ok(time) = meta.modified() {
            let time = DateTime::<Utc>::from(time);
            modified = Some(modified.map_or(time, |m| m.max(time)));
        }
    }
    (size, modified)
}

async fn thumbnails(entry: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for name in THUMBNAIL_NAMES {
        let path = entry.join(name);
        if fs::try_exists(&path).await.unwrap_or(false) {
            found.push(path);
        }
    }
    found
}

/// Column to order asset and work file listings by.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetSort {
    Name,
    Version,
    Size,
    #[default]
    Modified,
}

pub(crate) fn compare_by(
    key: AssetSort,
    a: (&str, u32, u64, Option<DateTime<Utc>>),
    b: (&str, u32, u64, Option<DateTime<Utc>>),
) -> Ordering {
    match key {
        AssetSort::Name => a.0.cmp(b.0).then(a.1.cmp(&b.1)),
        AssetSort::Version => a.1.cmp(&b.1).then(a.0.cmp(b.0)),
        AssetSort::Size => a.2.cmp(&b.2),
        AssetSort::Modified => a.3.cmp(&b.3),
    }
}

/// Sorts `assets` in place. The sort is stable.
pub fn sort_assets(assets: &mut [Asset], key: AssetSort, ascending: bool) {
    assets.sort_by(|a, b| {
        let ordering = compare_by(
            key,
            (a.name.as_str(), a.version, a.size, a.modified),
            (b.name.as_str(), b.version, b.size, b.modified),
        );
        if ascending { ordering } else { ordering.reverse() }
    });
}
