//! Provides the filesystem model for production projects: folder classification,
//! tree discovery, versioned assets, work files and publish pointers.
//!
//! Everything in this module works directly on directories and small YAML sidecar
//! files. There is no database and no cache that outlives a call; every listing is
//! recomputed from disk.
//!
//! # Core Concepts
//!
//! *   **[`Project`]:** The root of a hierarchy, marked by a `project.yaml` file
//!     directly inside the directory. A [`Context`] pairs the current project with
//!     the directory the user is browsing.
//! *   **Node kinds:** Every directory below a project is classified as one of
//!     [`NodeKind::Project`], [`NodeKind::Folder`], [`NodeKind::TaskArea`] or
//!     [`NodeKind::Task`] by reading its `folder.yaml`. A missing or broken
//!     descriptor means "custom folder".
//! *   **[`TreeNode`]:** One classified directory. Children are produced lazily by
//!     [`list_children`] or eagerly by [`scan_tree`]; tasks never have children.
//! *   **[`Asset`]:** One version of a deliverable living in `<task>/versions/<name>_vNNN`,
//!     described by a `metadata.yaml` file.
//! *   **[`TaskFile`]:** One version of an authoring file living anywhere below
//!     `<task>/wip/`.
//! *   **Publish pointer:** A symlink `<task>/published/<name>` pointing at the
//!     version of `<name>` that is currently published.
//!
//! # Directory Layout
//!
//! ```text
//! <project>/project.yaml
//! <project>/<folder>/folder.yaml
//! <project>/.../<taskarea>/folder.yaml
//! <project>/.../<taskarea>/<task>/folder.yaml
//! <project>/.../<task>/versions/<name>_v<NNN>/metadata.yaml
//! <project>/.../<task>/published/<name>        (symlink -> versions/<name>_v<NNN>)
//! <project>/.../<task>/wip/<app>/<name>_v<NNN>.<ext>
//! ```
//!
//! # Failure Policy
//!
//! Reads are best effort. A descriptor that is missing or cannot be parsed resolves
//! to its default, a directory that disappears or cannot be read mid-scan simply
//! contributes nothing, and a single unreadable entry never aborts a listing. Only
//! operations that mutate the tree (`create_*`, [`publish`], [`delete_entry`])
//! return errors, and none of them roll back steps that already succeeded.
//!
//! # Asynchronous API
//!
//! All filesystem I/O is `async` and relies on the `tokio` runtime. Independent
//! calls touch disjoint directories and share no state, so callers are free to run
//! them concurrently.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use studiotools_core::storage::{self, Context, NodeKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let project = storage::create_project("demo", "/tmp/demo".as_ref()).await?;
//!     let area = project.path.join("build").join("chair");
//!     storage::create_folder(&area, NodeKind::TaskArea, "asset").await?;
//!
//!     let context = Context::for_project(project).with_cwd(area.join("model")).await;
//!     for asset in storage::list_assets(&context.cwd).await {
//!         println!("{} v{:03} published={}", asset.name, asset.version, asset.published);
//!     }
//!     Ok(())
//! }
//! ```

pub use self::asset::{read_asset, list_assets, sort_assets, Asset, AssetSort, SEQUENCE_TYPES};
pub use self::classify::{classify, subkind_options, Classification, NodeKind, DEFAULT_SUBKIND};
pub use self::folder::{
    create_folder, create_project, default_tasks, delete_entry, DEFAULT_PROJECT_STRUCTURE,
};
pub use self::metadata::{
    read_descriptor, write_descriptor, AssetDescriptor, Descriptor, FolderDescriptor,
    ProjectDescriptor,
};
pub use self::project::{absolute_path, find_project, Context, Project};
pub use self::publish::{is_published, publish, published_version, unpublish};
pub use self::task_file::{
    create_task_file, list_task_files, list_task_files_with, sort_task_files, TaskFile,
    TASK_FILE_EXTENSIONS,
};
pub use self::tree::{list_children, scan_tree, TreeNode, TreeState};
pub use self::version::{
    compose_versioned_name, extract_version, format_version, latest_version, make_versioned_name,
    make_versioned_name_in, next_global_version, next_version, strip_version, EntryFilter,
    VersionScan,
};

mod asset;
mod classify;
mod folder;
mod metadata;
mod project;
mod publish;
mod task_file;
mod tree;
mod version;

use std::path::PathBuf;
use thiserror::Error;

pub const PROJECT_FILENAME: &str = "project.yaml";
pub const FOLDER_FILENAME: &str = "folder.yaml";
pub const ASSET_METADATA_FILENAME: &str = "metadata.yaml";
pub const APPS_FILENAME: &str = "apps.yaml";

pub const VERSIONS_DIR_NAME: &str = "versions";
pub const PUBLISHED_DIR_NAME: &str = "published";
pub const WIP_DIR_NAME: &str = "wip";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Descriptor serialization/deserialization error")]
    Descriptor(#[from] serde_yaml::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Path is not a project (missing 'project.yaml'): {0}")]
    NotAProject(PathBuf),

    #[error("Path is not a task folder: {0}")]
    NotATask(PathBuf),

    #[error("Path already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Path does not have a valid parent directory: {0}")]
    NoParentDirectory(PathBuf),

    #[error("Application '{0}' does not declare a file extension")]
    NoFileExtension(String),

    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Spells `path` relative to the process working directory (`../../tmp/...`).
#[cfg(all(test, unix))]
pub(crate) fn relative_to_cwd(path: &std::path::Path) -> PathBuf {
    let cwd = std::env::current_dir().expect("Test helper: Failed to read cwd");
    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.push(path.strip_prefix("/").expect("Test helper: Path must be absolute"));
    relative
}
