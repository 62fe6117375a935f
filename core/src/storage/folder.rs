use crate::storage::classify::{NodeKind, DEFAULT_SUBKIND};
use crate::storage::metadata::{write_descriptor, FolderDescriptor, ProjectDescriptor};
use crate::storage::project::Project;
use crate::storage::{Error, Result, PUBLISHED_DIR_NAME, VERSIONS_DIR_NAME, WIP_DIR_NAME};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Plain folders created inside every new project.
pub const DEFAULT_PROJECT_STRUCTURE: [&str; 4] = ["sandbox", "build", "sequence", "editorial"];

const TASK_SUBAREAS: [&str; 3] = [PUBLISHED_DIR_NAME, VERSIONS_DIR_NAME, WIP_DIR_NAME];

/// Tasks created automatically inside a new task area of the given subkind.
pub fn default_tasks(taskarea_subkind: &str) -> &'static [&'static str] {
    match taskarea_subkind {
        "asset" => &["model", "texture", "lookdev"],
        "shot" => &["layout", "animate", "fx", "light", "comp"],
        _ => &[],
    }
}

/// Creates a new project at `path`: the directory, its descriptors and the
/// default folder structure.
///
/// # Errors
///
/// Fails if `path` already exists. A failure part-way leaves whatever was created
/// so far on disk.
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn create_project(name: &str, path: &Path) -> Result<Project> {
    if fs::try_exists(path).await.map_err(Error::Io)? {
        debug!("Project creation failed: path already exists");
        return Err(Error::AlreadyExists(path.to_path_buf()));
    }

    create_folder(path, NodeKind::Project, DEFAULT_SUBKIND).await?;

    let descriptor = ProjectDescriptor {
        name: name.to_string(),
        path: path.display().to_string(),
    };
    write_descriptor(path, &descriptor).await?;

    for folder in DEFAULT_PROJECT_STRUCTURE {
        create_folder(&path.join(folder), NodeKind::Folder, DEFAULT_SUBKIND).await?;
    }

    info!("Project '{}' created", name);
    Ok(Project::new(name, path))
}

/// Creates the directory at `path` and tags it with `kind` and `subkind`.
///
/// Task areas receive their default tasks (see [`default_tasks`]), and tasks
/// receive their `published/`, `versions/` and `wip/` areas. Existing content at
/// `path` is not checked for conflicts and descriptors are overwritten.
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn create_folder(path: &Path, kind: NodeKind, subkind: &str) -> Result<()> {
    init_folder(path, kind, subkind).await?;

    match kind {
        NodeKind::TaskArea => {
            for task in default_tasks(subkind) {
                let task_path = path.join(task);
                init_folder(&task_path, NodeKind::Task, task).await?;
                init_task_areas(&task_path).await?;
            }
        }
        NodeKind::Task => init_task_areas(path).await?,
        NodeKind::Project | NodeKind::Folder => {}
    }
    Ok(())
}

async fn init_folder(path: &Path, kind: NodeKind, subkind: &str) -> Result<()> {
    fs::create_dir_all(path).await.map_err(Error::Io)?;
    let descriptor = FolderDescriptor {
        kind: Some(kind.to_string()),
        subkind: Some(subkind.to_string()),
    };
    write_descriptor(path, &descriptor).await?;
    debug!("Created {} '{}' at {}", kind, subkind, path.display());
    Ok(())
}

async fn init_task_areas(task: &Path) -> Result<()> {
    for area in TASK_SUBAREAS {
        fs::create_dir_all(task.join(area)).await.map_err(Error::Io)?;
    }
    Ok(())
}

/// Deletes the file, symlink or directory tree at `path`.
///
/// Symlinks are removed without touching their target. No kind-based guard is
/// applied here, callers decide what may be deleted (see [`NodeKind::is_deletable`]).
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn delete_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;

    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        remove_link_or_file(path).await
    };

    result.map_err(|e| {
        warn!("Failed to delete {}: {}", path.display(), e);
        Error::Io(e)
    })?;
    info!("Deleted {}", path.display());
    Ok(())
}

/// Removes a file or a symlink. Directory symlinks on Windows need `remove_dir`.
pub(crate) async fn remove_link_or_file(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if cfg!(windows) => fs::remove_dir(path).await.map_err(|_| e),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::classify::classify;
    use crate::storage::metadata::read_descriptor;
    use crate::storage::tree::list_subdirectories;
    use crate::storage::{FOLDER_FILENAME, PROJECT_FILENAME};
    use tempfile::tempdir;

    async fn sorted_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = list_subdirectories(dir)
            .await
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_create_project_writes_structure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("show");

        let project = create_project("Show", &path).await.unwrap();
        assert_eq!(project.name, "Show");
        assert_eq!(project.path, path);
        assert!(path.join(PROJECT_FILENAME).is_file());
        assert_eq!(classify(&path).await.kind, NodeKind::Project);

        let stored: ProjectDescriptor = read_descriptor(&path).await.unwrap();
        assert_eq!(stored.name, "Show");

        assert_eq!(sorted_names(&path).await, vec!["build", "editorial", "sandbox", "sequence"]);
        for folder in DEFAULT_PROJECT_STRUCTURE {
            let classification = classify(&path.join(folder)).await;
            assert_eq!(classification.kind, NodeKind::Folder);
            assert_eq!(classification.subkind, "custom");
        }
    }

    #[tokio::test]
    async fn test_create_project_refuses_existing_path() {
        let dir = tempdir().unwrap();
        let result = create_project("Show", dir.path()).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_create_asset_taskarea() {
        let dir = tempdir().unwrap();
        let area = dir.path().join("chair");
        create_folder(&area, NodeKind::TaskArea, "asset").await.unwrap();

        assert_eq!(sorted_names(&area).await, vec!["lookdev", "model", "texture"]);
        for task in ["model", "texture", "lookdev"] {
            let descriptor: FolderDescriptor = read_descriptor(&area.join(task)).await.unwrap();
            assert_eq!(descriptor.kind.as_deref(), Some("task"));
            assert_eq!(descriptor.subkind.as_deref(), Some(task));
            assert_eq!(sorted_names(&area.join(task)).await, vec!["published", "versions", "wip"]);
        }
    }

    #[tokio::test]
    async fn test_create_shot_taskarea_and_custom() {
        let dir = tempdir().unwrap();
        let shot = dir.path().join("sh010");
        create_folder(&shot, NodeKind::TaskArea, "shot").await.unwrap();
        assert_eq!(sorted_names(&shot).await, vec!["animate", "comp", "fx", "layout", "light"]);

        let custom = dir.path().join("misc");
        create_folder(&custom, NodeKind::TaskArea, "custom").await.unwrap();
        assert!(sorted_names(&custom).await.is_empty());
        assert!(custom.join(FOLDER_FILENAME).is_file());
    }

    #[tokio::test]
    async fn test_create_task_adds_subareas() {
        let dir = tempdir().unwrap();
        let task = dir.path().join("rig");
        create_folder(&task, NodeKind::Task, "rig").await.unwrap();
        assert_eq!(sorted_names(&task).await, vec!["published", "versions", "wip"]);
        assert_eq!(classify(&task).await.subkind, "rig");
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("a").join("b");
        fs::create_dir_all(&tree).await.unwrap();
        fs::write(tree.join("file.txt"), "x").await.unwrap();

        delete_entry(&dir.path().join("a")).await.unwrap();
        assert!(!dir.path().join("a").exists());

        let result = delete_entry(&dir.path().join("a")).await;
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
