use std::path::{Path, PathBuf};

use studiotools_core::storage::{absolute_path, Context};

pub mod cli;
pub mod commands;

/// State shared by all command handlers.
pub struct AppContext {
    /// Project and directory the command runs in.
    pub context: Context,
}

impl AppContext {
    /// A relative `cwd` is taken from the process working directory.
    pub async fn new(cwd: PathBuf) -> Self {
        let context = Context::default().with_cwd(cwd).await;
        AppContext { context }
    }

    /// Resolves a user-supplied path against the working directory. The result
    /// is absolute, with `.` and `..` removed, so it can key tree state.
    pub fn resolve(&self, path: Option<&Path>) -> PathBuf {
        match path {
            Some(path) => absolute_path(&self.context.cwd.join(path)),
            None => self.context.cwd.clone(),
        }
    }
}
