//! Publish pointers: `<task>/published/<name>` is a symlink to the version of
//! `<name>` under `<task>/versions/` that is currently published.

use crate::storage::asset::Asset;
use crate::storage::folder::remove_link_or_file;
use crate::storage::metadata::{read_descriptor, AssetDescriptor};
use crate::storage::project::absolute_path;
use crate::storage::version::extract_version;
use crate::storage::{Error, Result, PUBLISHED_DIR_NAME};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

fn pointer_path(task: &Path, logical_name: &str) -> PathBuf {
    task.join(PUBLISHED_DIR_NAME).join(logical_name)
}

/// Returns the version the publish pointer for `logical_name` in `task` refers to.
///
/// The target's `metadata.yaml` decides. When it carries no usable version, the
/// version tag in the link target's name is used instead; this fallback goes
/// beyond what the descriptor records. A missing or dangling pointer yields `None`.
pub async fn published_version(task: &Path, logical_name: &str) -> Option<u32> {
    let pointer = pointer_path(task, logical_name);
    if fs::symlink_metadata(&pointer).await.is_err() {
        return None;
    }
    if fs::metadata(&pointer).await.is_err() {
        debug!("Publish pointer is dangling: {}", pointer.display());
        return None;
    }

    if let Some(version) = read_descriptor::<AssetDescriptor>(&pointer)
        .await
        .and_then(|descriptor| descriptor.version())
    {
        return Some(version);
    }

    let target = fs::read_link(&pointer).await.ok()?;
    let name = target.file_name()?.to_string_lossy().into_owned();
    Some(extract_version(&name))
}

/// Returns whether `asset` is the version its publish pointer refers to.
pub async fn is_published(asset: &Asset) -> bool {
    let Some(task) = asset.task_path() else { return false };
    published_version(task, &asset.name).await == Some(asset.version)
}

/// Points the publish pointer for `asset.name` at `asset.path`.
///
/// The link target is always absolute; a relative `asset.path` is resolved
/// against the process working directory. An existing pointer is removed first. The two steps are not atomic: a crash in
/// between leaves the asset unpublished.
#[instrument(skip(asset), fields(asset = %asset.path.display()))]
pub async fn publish(asset: &Asset) -> Result<()> {
    let target = absolute_path(&asset.path);
    let task = target
        .parent()
        .and_then(Path::parent)
        .ok_or_else(|| Error::NoParentDirectory(target.clone()))?;
    if fs::metadata(&target).await.is_err() {
        return Err(Error::DirectoryNotFound(target.clone()));
    }

    let published_dir = task.join(PUBLISHED_DIR_NAME);
    fs::create_dir_all(&published_dir).await.map_err(Error::Io)?;

    let pointer = pointer_path(task, &asset.name);
    remove_pointer(&pointer).await?;

    create_pointer(&target, &pointer).await.map_err(|e| {
        warn!("Failed to create publish pointer {}: {}", pointer.display(), e);
        Error::Io(e)
    })?;
    info!("Published {} v{:03}", asset.name, asset.version);
    Ok(())
}

/// Removes the publish pointer for `logical_name` in `task`, if there is one.
pub async fn unpublish(task: &Path, logical_name: &str) -> Result<()> {
    remove_pointer(&pointer_path(task, logical_name)).await
}

async fn remove_pointer(pointer: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(pointer).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io(e)),
    };

    debug!("Removing existing publish pointer {}", pointer.display());
    if meta.is_dir() {
        // A real directory copied in place of a link
        fs::remove_dir_all(pointer).await.map_err(Error::Io)
    } else {
        remove_link_or_file(pointer).await.map_err(Error::Io)
    }
}

#[cfg(unix)]
async fn create_pointer(target: &Path, pointer: &Path) -> std::io::Result<()> {
    fs::symlink(target, pointer).await
}

#[cfg(windows)]
async fn create_pointer(target: &Path, pointer: &Path) -> std::io::Result<()> {
    if fs::metadata(target).await?.is_dir() {
        fs::symlink_dir(target, pointer).await
    } else {
        fs::symlink_file(target, pointer).await
    }
}
