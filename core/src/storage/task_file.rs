use crate::application::Application;
use crate::storage::asset::{compare_by, AssetSort};
use crate::storage::classify::{classify, NodeKind};
use crate::storage::project::{absolute_path, Context};
use crate::storage::version::{extract_version, make_versioned_name_in, strip_version, VersionScan};
use crate::storage::{Error, Result, WIP_DIR_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Extensions of the authoring tools' scene files.
pub const TASK_FILE_EXTENSIONS: [&str; 4] = ["blend", "hip", "hipnc", "nk"];

const TASK_FILE_STEM: &str = "scene";

/// A work file below `<task>/wip/`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskFile {
    /// File name with the version tag removed.
    pub name: String,
    pub path: PathBuf,
    pub version: u32,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// The per-application folder directly under `wip/` holding this file, if any.
    pub app: Option<String>,
}

/// Lists the work files of `task` with a recognized extension, at any depth under `wip/`.
pub async fn list_task_files(task: &Path) -> Vec<TaskFile> {
    list_task_files_with(task, &TASK_FILE_EXTENSIONS).await
}

/// Like [`list_task_files`] with a custom extension set. Extensions match
/// case-insensitively and are given without the leading dot.
#[instrument(skip(task, extensions), fields(task = %task.display()))]
pub async fn list_task_files_with(task: &Path, extensions: &[&str]) -> Vec<TaskFile> {
    let wip = absolute_path(task).join(WIP_DIR_NAME);
    let mut files = Vec::new();
    let mut pending: VecDeque<PathBuf> = VecDeque::from([wip.clone()]);

    while let Some(dir) = pending.pop_front() {
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No work files in missing directory {}", dir.display());
                continue;
            }
            Err(e) => {
                warn!("Failed to read directory '{}': {}", dir.display(), e);
                continue;
            }
        };

        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let path = entry.path();
            // Symlinked directories are not followed
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                pending.push_back(path);
                continue;
            }
            if !has_extension(&path, extensions) {
                continue;
            }
            let meta = match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping unreadable work file '{}': {}", path.display(), e);
                    continue;
                }
            };

            let file_name = entry.file_name().to_string_lossy().into_owned();
            files.push(TaskFile {
                name: strip_version(&file_name),
                version: extract_version(&file_name),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                app: app_folder(&wip, &path),
                path,
            });
        }
    }

    debug!("Found {} work files", files.len());
    files
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(&ext)))
}

// wip/<app>/.../file -> <app>; files directly in wip/ have none
fn app_folder(wip: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(wip).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}

/// Sorts `files` in place by the same keys as assets. The sort is stable.
pub fn sort_task_files(files: &mut [TaskFile], key: AssetSort, ascending: bool) {
    files.sort_by(|a, b| {
        let ordering = compare_by(
            key,
            (a.name.as_str(), a.version, a.size, a.modified),
            (b.name.as_str(), b.version, b.size, b.modified),
        );
        if ascending { ordering } else { ordering.reverse() }
    });
}

/// Prepares a new work file for `app` in the task at `context.cwd`.
///
/// Creates `wip/<app id>/` when needed and returns the path of the next free
/// `scene_vNNN.<ext>` in it, where `<ext>` is the application's first extension.
/// The file itself is left to the application to create.
///
/// # Errors
///
/// Fails if `context.cwd` is not a task, if the application declares no extension,
/// or if the folder cannot be created.
#[instrument(skip(app, context), fields(app = %app.id, cwd = %context.cwd.display()))]
pub async fn create_task_file(app: &Application, context: &Context) -> Result<PathBuf> {
    let task = absolute_path(&context.cwd);
    if classify(&task).await.kind != NodeKind::Task {
        return Err(Error::NotATask(task));
    }
    let extension = app
        .primary_extension()
        .ok_or_else(|| Error::NoFileExtension(app.id.clone()))?;

    let app_dir = task.join(WIP_DIR_NAME).join(&app.id);
    fs::create_dir_all(&app_dir).await.map_err(Error::Io)?;

    let base_name = format!("{}.{}", TASK_FILE_STEM, extension);
    let name = make_versioned_name_in(&base_name, &app_dir, VersionScan::files().recursive(true)).await;
    let path = app_dir.join(name);
    info!("New work file: {}", path.display());
    Ok(path)
}
