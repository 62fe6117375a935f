use crate::storage::metadata::{read_descriptor, FolderDescriptor};
use crate::storage::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};

pub const DEFAULT_SUBKIND: &str = "custom";

/// Semantic type of a directory inside a project.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Project,
    #[default]
    Folder,
    TaskArea,
    Task,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [NodeKind::Project, NodeKind::Folder, NodeKind::TaskArea, NodeKind::Task];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Project => "project",
            NodeKind::Folder => "folder",
            NodeKind::TaskArea => "taskarea",
            NodeKind::Task => "task",
        }
    }

    /// Kinds that may be created directly beneath a node of this kind.
    pub fn child_kinds(&self) -> &'static [NodeKind] {
        match self {
            NodeKind::Project => &[NodeKind::Folder],
            NodeKind::Folder => &[NodeKind::Folder, NodeKind::TaskArea],
            NodeKind::TaskArea => &[NodeKind::Task],
            NodeKind::Task => &[],
        }
    }

    /// Project roots are never offered for deletion.
    pub fn is_deletable(&self) -> bool {
        !matches!(self, NodeKind::Project)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownNodeKind(s.to_string()))
    }
}

/// Result of [`classify`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: NodeKind,
    pub subkind: String,
}

impl Default for Classification {
    fn default() -> Self {
        Classification { kind: NodeKind::Folder, subkind: DEFAULT_SUBKIND.to_string() }
    }
}

impl From<FolderDescriptor> for Classification {
    fn from(descriptor: FolderDescriptor) -> Self {
        let kind = descriptor
            .kind
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        let subkind = descriptor
            .subkind
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBKIND.to_string());
        Classification { kind, subkind }
    }
}

/// Determines the kind and subkind of `dir` from its `folder.yaml`.
///
/// A missing or unreadable descriptor classifies as a custom folder, and an
/// unrecognized kind falls back to [`NodeKind::Folder`]. Each call performs one
/// read; nothing is cached.
pub async fn classify(dir: &Path) -> Classification {
    match read_descriptor::<FolderDescriptor>(dir).await {
        Some(descriptor) => {
            let classification = Classification::from(descriptor);
            trace!("Classified {} as {}", dir.display(), classification.kind);
            classification
        }
        None => {
            debug!("No folder descriptor in {}, using default", dir.display());
            Classification::default()
        }
    }
}

/// Subkinds offered when creating a child beneath a node of `parent_kind` and
/// `parent_subkind`.
///
/// Task areas narrow the task subkinds to those of their own subkind; `custom` is
/// always available.
pub fn subkind_options(parent_kind: NodeKind, parent_subkind: &str) -> Vec<&'static str> {
    let mut options = Vec::new();
    match parent_kind {
        NodeKind::Folder => options.extend(["asset", "shot"]),
        NodeKind::TaskArea => {
            match parent_subkind {
                "asset" => options.extend(["scan", "model", "texture", "lookdev", "rig", "fx"]),
                "shot" => options.extend(["track", "layout", "animate", "fx", "light", "comp"]),
                _ => {}
            }
            options.push("tool");
        }
        NodeKind::Project | NodeKind::Task => {}
    }
    options.push(DEFAULT_SUBKIND);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::metadata::write_descriptor;
    use crate::storage::FOLDER_FILENAME;
    use tempfile::tempdir;
    use tokio::fs;

    #[test]
    fn test_parse_kind_case_insensitive() {
        assert_eq!("Task".parse::<NodeKind>().unwrap(), NodeKind::Task);
        assert_eq!("TASKAREA".parse::<NodeKind>().unwrap(), NodeKind::TaskArea);
        assert_eq!(" project ".parse::<NodeKind>().unwrap(), NodeKind::Project);
        assert!(matches!("shot".parse::<NodeKind>(), Err(Error::UnknownNodeKind(_))));
    }

    #[tokio::test]
    async fn test_classify_without_descriptor() {
        let dir = tempdir().unwrap();
        let classification = classify(dir.path()).await;
        assert_eq!(classification.kind, NodeKind::Folder);
        assert_eq!(classification.subkind, "custom");
    }

    #[tokio::test]
    async fn test_classify_reads_descriptor() {
        let dir = tempdir().unwrap();
        let descriptor = FolderDescriptor { kind: Some("TaskArea".into()), subkind: Some("shot".into()) };
        write_descriptor(dir.path(), &descriptor).await.unwrap();

        let classification = classify(dir.path()).await;
        assert_eq!(classification.kind, NodeKind::TaskArea);
        assert_eq!(classification.subkind, "shot");
    }

    #[tokio::test]
    async fn test_classify_unknown_kind_falls_back_to_folder() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FOLDER_FILENAME), "type: sequence\nsubtype: edit\n").await.unwrap();

        let classification = classify(dir.path()).await;
        assert_eq!(classification.kind, NodeKind::Folder);
        assert_eq!(classification.subkind, "edit");
    }

    #[tokio::test]
    async fn test_classify_task_without_subkind() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FOLDER_FILENAME), "type: task\n").await.unwrap();

        let classification = classify(dir.path()).await;
        assert_eq!(classification.kind, NodeKind::Task);
        assert_eq!(classification.subkind, "custom");
    }

    #[test]
    fn test_child_kinds_and_options() {
        assert_eq!(NodeKind::Project.child_kinds(), &[NodeKind::Folder]);
        assert!(NodeKind::Task.child_kinds().is_empty());
        assert!(!NodeKind::Project.is_deletable());
        assert!(NodeKind::Task.is_deletable());

        assert_eq!(subkind_options(NodeKind::Folder, "custom"), vec!["asset", "shot", "custom"]);
        assert_eq!(
            subkind_options(NodeKind::TaskArea, "shot"),
            vec!["track", "layout", "animate", "fx", "light", "comp", "tool", "custom"]
        );
        assert_eq!(subkind_options(NodeKind::TaskArea, "prop"), vec!["tool", "custom"]);
    }
}
