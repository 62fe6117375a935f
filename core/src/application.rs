//! Project-local application launchers.
//!
//! A project may list custom applications in `apps.yaml` at its root:
//!
//! ```yaml
//! apps:
//!   - id: blender
//!     name: Blender 4.2
//!     executable: /opt/blender/blender
//!     extensions: [blend]
//!     preload: /studio/plugins/blender/preload.sh
//! ```
//!
//! Discovering applications installed on the machine is not handled here.

use crate::storage::{Context, Error, Project, Result, APPS_FILENAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

pub const ENV_PROJECT: &str = "ST_PROJECT";
pub const ENV_TASK: &str = "ST_TASK";
pub const ENV_TASKAREA: &str = "ST_TASKAREA";
pub const ENV_CWD: &str = "ST_CWD";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Also names the application's folder under `wip/`.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "path")]
    pub executable: PathBuf,
    #[serde(default, alias = "extension")]
    pub extensions: Vec<String>,
    /// Wrapper invoked as `<preload> <executable> <file>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload: Option<PathBuf>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Application {
    pub fn new<E>(
        id: impl Into<String>,
        name: impl Into<String>,
        executable: impl Into<PathBuf>,
        extensions: E,
    ) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Application {
            id: id.into(),
            name: name.into(),
            executable: executable.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            preload: None,
            enabled: true,
        }
    }

    pub fn with_preload(mut self, preload: impl Into<PathBuf>) -> Self {
        self.preload = Some(preload.into());
        self
    }

    /// The extension new work files are created with, without a leading dot.
    pub fn primary_extension(&self) -> Option<&str> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.'))
            .find(|ext| !ext.is_empty())
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }

    /// Returns whether `path` has one of this application's extensions.
    pub fn handles(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
struct AppsFile {
    #[serde(default)]
    apps: Vec<Application>,
}

fn apps_path(project: &Project) -> PathBuf {
    project.path.join(APPS_FILENAME)
}

/// Loads the applications configured for `project`.
///
/// A missing or malformed `apps.yaml` yields an empty list.
#[instrument(skip(project), fields(project = %project.path.display()))]
pub async fn load_project_applications(project: &Project) -> Vec<Application> {
    if project.is_empty() {
        return Vec::new();
    }
    let path = apps_path(project);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No {} in project", APPS_FILENAME);
            return Vec::new();
        }
        Err(e) => {
            warn!("Failed to read '{}': {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_yaml::from_str::<Option<AppsFile>>(&content) {
        Ok(file) => file.unwrap_or_default().apps,
        Err(e) => {
            warn!("Failed to parse '{}': {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Replaces the application list stored in `project`'s `apps.yaml`.
pub async fn save_project_applications(project: &Project, apps: &[Application]) -> Result<()> {
    if project.is_empty() {
        return Err(Error::NotAProject(project.path.clone()));
    }
    let file = AppsFile { apps: apps.to_vec() };
    let content = serde_yaml::to_string(&file)?;
    fs::write(apps_path(project), content).await?;
    debug!("Saved {} applications", apps.len());
    Ok(())
}

/// Builds the command that opens `file` in `app` for the task at `context.cwd`.
///
/// The child gets `ST_PROJECT`, `ST_TASK`, `ST_TASKAREA` and `ST_CWD` on top of the
/// current environment. The command is not spawned.
pub fn launch_command(app: &Application, file: &Path, context: &Context) -> Command {
    let mut command = match &app.preload {
        Some(preload) => {
            let mut command = Command::new(preload);
            command.arg(&app.executable);
            command
        }
        None => Command::new(&app.executable),
    };
    command.arg(file);

    let cwd = &context.cwd;
    command
        .env(ENV_PROJECT, &context.project.path)
        .env(ENV_TASK, base_name(cwd))
        .env(ENV_TASKAREA, cwd.parent().map(base_name).unwrap_or_default())
        .env(ENV_CWD, cwd);
    command
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
