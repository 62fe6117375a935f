use crate::storage::metadata::{read_descriptor, ProjectDescriptor};
use crate::storage::{Error, Result, PROJECT_FILENAME};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// The root of a project hierarchy.
///
/// An empty project (no name, no path) stands for "no project found".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Project { name: name.into(), path: path.into() }
    }

    pub fn empty() -> Self {
        Project::default()
    }

    pub fn is_empty(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Opens the project rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a directory or has no `project.yaml`.
    pub async fn open(path: &Path) -> Result<Project> {
        let meta = fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DirectoryNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }
        if !fs::try_exists(path.join(PROJECT_FILENAME)).await.map_err(Error::Io)? {
            return Err(Error::NotAProject(path.to_path_buf()));
        }
        Ok(project_at(path).await)
    }
}

/// The directory the user is browsing, together with the project it belongs to.
///
/// Whenever `project` is non-empty its path is an ancestor of (or equal to) `cwd`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Context {
    pub project: Project,
    pub cwd: PathBuf,
}

impl Context {
    pub fn for_project(project: Project) -> Context {
        let cwd = project.path.clone();
        Context { project, cwd }
    }

    /// Returns a context browsing `cwd`, with the project re-derived from it.
    ///
    /// The project becomes empty when no ancestor of `cwd` is a project root. A
    /// relative `cwd` is resolved against the process working directory.
    pub async fn with_cwd(&self, cwd: impl Into<PathBuf>) -> Context {
        let cwd = absolute_path(&cwd.into());
        let project = find_project(&cwd).await.unwrap_or_default();
        Context { project, cwd }
    }
}

/// Walks upward from `cwd` to the nearest directory containing `project.yaml`.
#[instrument(skip(cwd), fields(cwd = %cwd.display()))]
pub async fn find_project(cwd: &Path) -> Option<Project> {
    let cwd = absolute_path(cwd);
    for dir in cwd.ancestors() {
        if dir.as_os_str().is_empty() {
            continue;
        }
        if fs::try_exists(dir.join(PROJECT_FILENAME)).await.unwrap_or(false) {
            debug!("Found project root: {}", dir.display());
            return Some(project_at(dir).await);
        }
    }
    debug!("No project root above cwd");
    None
}

/// Makes `path` absolute against the process working directory and removes `.`
/// and `..` components lexically, so that one directory has one spelling.
///
/// Symlinks are not resolved. If the working directory cannot be determined the
/// path is only cleaned up.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() || path.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        match std::path::absolute(path) {
            Ok(absolute) => absolute,
            Err(e) => {
                warn!("Cannot make '{}' absolute: {}", path.display(), e);
                path.to_path_buf()
            }
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.file_name().is_some() {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Builds the project for a directory known to be a project root.
///
/// The stored name wins over the directory name; the stored path is ignored so the
/// project always points at where it was found.
async fn project_at(dir: &Path) -> Project {
    let descriptor = read_descriptor::<ProjectDescriptor>(dir).await;
    let name = descriptor
        .map(|d| d.name)
        .filter(|name| !name.trim().is_empty())
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    Project::new(name, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::metadata::write_descriptor;
    use crate::storage::relative_to_cwd;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_find_project_walks_upward() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("show");
        let deep = root.join("sequence").join("sq010").join("sh010");
        fs::create_dir_all(&deep).await.unwrap();
        write_descriptor(&root, &ProjectDescriptor { name: "Show".into(), path: "/elsewhere".into() })
            .await
            .unwrap();

        let project = find_project(&deep).await.unwrap();
        assert_eq!(project.name, "Show");
        assert_eq!(project.path, root);
        assert!(deep.starts_with(&project.path));
    }

    #[tokio::test]
    async fn test_find_project_none() {
        let dir = tempdir().unwrap();
        assert!(find_project(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_context_with_cwd_rederives_project() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(a.join("inner")).await.unwrap();
        fs::create_dir_all(&b).await.unwrap();
        fs::write(a.join(PROJECT_FILENAME), "name: ''\npath: ''\n").await.unwrap();

        let context = Context::default().with_cwd(a.join("inner")).await;
        assert_eq!(context.project.path, a);
        assert_eq!(context.project.name, "a");

        let moved = context.with_cwd(&b).await;
        assert!(moved.project.is_empty());
        assert_eq!(moved.cwd, b);
        // The original value is untouched
        assert_eq!(context.project.path, a);
    }

    #[tokio::test]
    async fn test_open_requires_descriptor() {
        let dir = tempdir().unwrap();
        assert!(matches!(Project::open(dir.path()).await, Err(Error::NotAProject(_))));
        assert!(matches!(
            Project::open(&dir.path().join("missing")).await,
            Err(Error::DirectoryNotFound(_))
        ));

        fs::write(dir.path().join(PROJECT_FILENAME), "name: demo\n").await.unwrap();
        let project = Project::open(dir.path()).await.unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(Context::for_project(project.clone()).cwd, project.path);
    }

    #[test]
    fn test_absolute_path_cleans_components() {
        assert_eq!(absolute_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(absolute_path(Path::new("/a/b/")), PathBuf::from("/a/b"));
        assert_eq!(absolute_path(Path::new("/../a")), PathBuf::from("/a"));

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute_path(Path::new("x/./y")), cwd.join("x").join("y"));
        assert!(absolute_path(Path::new("..")).is_absolute());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_cwd_finds_project() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("show");
        let anim = root.join("anim");
        fs::create_dir_all(&anim).await.unwrap();
        fs::write(root.join(PROJECT_FILENAME), "name: show\n").await.unwrap();

        let relative = relative_to_cwd(&anim);
        assert!(relative.is_relative());

        let project = find_project(&relative).await.unwrap();
        assert_eq!(project.path, root);

        let context = Context::default().with_cwd(relative).await;
        assert_eq!(context.cwd, anim);
        assert_eq!(context.project.path, root);
    }
}
