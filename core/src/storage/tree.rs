use crate::storage::classify::{classify, Classification, NodeKind};
use crate::storage::project::absolute_path;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// A classified directory in the project hierarchy.
///
/// The `id` is the absolute path of the directory and doubles as a stable key.
/// `children` is only filled in by [`scan_tree`]; lazy consumers use
/// [`list_children`] or [`TreeState`] instead.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: PathBuf,
    pub label: String,
    pub kind: NodeKind,
    pub subkind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    pub has_children: bool,
}

impl TreeNode {
    /// Builds the node for `path`, classifying it and probing for subdirectories.
    ///
    /// The node's id is the absolute form of `path` (see [`absolute_path`]); nodes
    /// listed below it inherit absolute ids.
    pub async fn load(path: &Path) -> TreeNode {
        let id = absolute_path(path);
        let classification = classify(&id).await;
        let has_children = classification.kind != NodeKind::Task && has_subdirectory(&id).await;
        TreeNode::new(id, classification, has_children)
    }

    fn new(id: PathBuf, classification: Classification, has_children: bool) -> TreeNode {
        let label = id
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.display().to_string());
        TreeNode {
            id,
            label,
            kind: classification.kind,
            subkind: classification.subkind,
            children: None,
            has_children,
        }
    }

    pub fn path(&self) -> &Path {
        &self.id
    }
}

/// Lists the immediate subdirectories of `node` as classified tree nodes.
///
/// Tasks never expose children here: their `versions/`, `wip/` and `published/`
/// areas belong to the asset and work file resolvers. A directory that cannot be
/// read yields an empty list, and entries that vanish between listing and
/// classification are dropped. Output follows the directory listing order.
#[instrument(skip(node), fields(path = %node.id.display()))]
pub async fn list_children(node: &TreeNode) -> Vec<TreeNode> {
    if node.kind == NodeKind::Task {
        return Vec::new();
    }

    let dirs = list_subdirectories(&node.id).await;

    // Siblings are independent, classify them together
    let nodes = join_all(dirs.into_iter().map(|dir| async move {
        let classification = classify(&dir).await;
        let has_children = classification.kind != NodeKind::Task && has_subdirectory(&dir).await;
        TreeNode::new(dir, classification, has_children)
    }))
    .await;

    debug!("Found {} child nodes", nodes.len());
    nodes
}

/// Scans the whole subtree below `root` and returns it with `children` filled in.
///
/// Traversal is breadth-first. Directories reached twice (through symlinks) are
/// only expanded once.
#[instrument(skip(root), fields(path = %root.display()))]
pub async fn scan_tree(root: &Path) -> TreeNode {
    let mut root_node = TreeNode::load(root).await;

    let mut children_of: HashMap<PathBuf, Vec<TreeNode>> = HashMap::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending: VecDeque<TreeNode> = VecDeque::from([root_node.clone()]);

    while let Some(node) = pending.pop_front() {
        let key = fs::canonicalize(&node.id).await.unwrap_or_else(|_| node.id.clone());
        if !visited.insert(key) {
            debug!("Skipping already scanned directory: {}", node.id.display());
            continue;
        }

        let children = list_children(&node).await;
        pending.extend(children.iter().filter(|child| child.has_children).cloned());
        children_of.insert(node.id.clone(), children);
    }

    attach_children(&mut root_node, &mut children_of);
    root_node
}

fn attach_children(node: &mut TreeNode, children_of: &mut HashMap<PathBuf, Vec<TreeNode>>) {
    if let Some(mut children) = children_of.remove(&node.id) {
        for child in children.iter_mut() {
            attach_children(child, children_of);
        }
        node.children = Some(children);
    }
}

/// Expansion state of a lazily browsed tree, independent of any widget toolkit.
///
/// Children are listed the first time a node is expanded and kept until the node
/// disappears from view. [`TreeState::reload`] refreshes every node that is
/// currently expanded and visible; nodes that were never opened are not touched.
#[derive(Debug, Clone)]
pub struct TreeState {
    root: TreeNode,
    expanded: HashSet<PathBuf>,
    children: HashMap<PathBuf, Vec<TreeNode>>,
}

impl TreeState {
    pub async fn open(root: &Path) -> TreeState {
        TreeState::new(TreeNode::load(root).await)
    }

    pub fn new(root: TreeNode) -> TreeState {
        TreeState { root, expanded: HashSet::new(), children: HashMap::new() }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn is_expanded(&self, id: &Path) -> bool {
        self.expanded.contains(id)
    }

    /// Returns the cached children of `id`, if it has been expanded before.
    pub fn children(&self, id: &Path) -> Option<&[TreeNode]> {
        self.children.get(id).map(Vec::as_slice)
    }

    /// Marks `node` as expanded, listing its children on first expansion.
    pub async fn expand(&mut self, node: &TreeNode) -> &[TreeNode] {
        if !self.children.contains_key(&node.id) {
            let children = list_children(node).await;
            self.children.insert(node.id.clone(), children);
        }
        self.expanded.insert(node.id.clone());
        self.children.get(&node.id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn collapse(&mut self, id: &Path) {
        self.expanded.remove(id);
    }

    /// Re-lists every expanded node that is reachable through expanded ancestors.
    ///
    /// Cached listings of nodes that are no longer visible are dropped so that a
    /// later expansion lists them fresh.
    #[instrument(skip(self), fields(root = %self.root.id.display()))]
    pub async fn reload(&mut self) {
        let root_id = self.root.id.clone();
        self.root = TreeNode::load(&root_id).await;

        let mut refreshed: HashMap<PathBuf, Vec<TreeNode>> = HashMap::new();
        let mut pending: VecDeque<TreeNode> = VecDeque::from([self.root.clone()]);

        while let Some(node) = pending.pop_front() {
            if !self.expanded.contains(&node.id) || refreshed.contains_key(&node.id) {
                continue;
            }
            let children = list_children(&node).await;
            pending.extend(children.iter().cloned());
            refreshed.insert(node.id.clone(), children);
        }

        self.expanded.retain(|id| refreshed.contains_key(id));
        self.children = refreshed;
        debug!("Reloaded {} expanded nodes", self.children.len());
    }

    /// Flattens the visible part of the tree in display order, with depth.
    pub fn visible_rows(&self) -> Vec<(usize, &TreeNode)> {
        let mut rows = Vec::new();
        let mut stack: Vec<(usize, &TreeNode)> = vec![(0, &self.root)];

        while let Some((depth, node)) = stack.pop() {
            rows.push((depth, node));
            if !self.expanded.contains(&node.id) {
                continue;
            }
            if let Some(children) = self.children.get(&node.id) {
                stack.extend(children.iter().rev().map(|child| (depth + 1, child)));
            }
        }
        rows
    }
}

/// Lists subdirectories of `dir` that still exist, in listing order.
pub(crate) async fn list_subdirectories(dir: &Path) -> Vec<PathBuf> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Directory not found, returning empty list: {}", dir.display());
            return Vec::new();
        }
        Err(e) => {
            warn!("Failed to read directory '{}': {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                // Follows symlinks and drops entries removed since the listing
                if let Ok(meta) = fs::metadata(&path).await {
                    if meta.is_dir() {
                        dirs.push(path);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read entry in '{}': {}", dir.display(), e);
                break;
            }
        }
    }
    dirs
}

async fn has_subdirectory(dir: &Path) -> bool {
    let Ok(mut read_dir) = fs::read_dir(dir).await else { return false };
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        if let Ok(meta) = fs::metadata(entry.path()).await {
            if meta.is_dir() {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::metadata::{write_descriptor, FolderDescriptor};
    use tempfile::tempdir;

    async fn make_folder(path: &Path, kind: &str, subkind: Option<&str>) {
        fs::create_dir_all(path).await.expect("Failed to create dir");
        let descriptor = FolderDescriptor {
            kind: Some(kind.to_string()),
            subkind: subkind.map(str::to_string),
        };
        write_descriptor(path, &descriptor).await.expect("Failed to write descriptor");
    }

    #[tokio::test]
    async fn test_list_children_classifies_and_looks_ahead() {
        let dir = tempdir().unwrap();
        let shots = dir.path().join("shots");
        make_folder(&shots, "folder", None).await;
        make_folder(&shots.join("shot010"), "taskarea", Some("shot")).await;
        fs::create_dir_all(dir.path().join("empty")).await.unwrap();
        fs::write(dir.path().join("notes.txt"), "").await.unwrap();

        let root = TreeNode::load(dir.path()).await;
        assert!(root.has_children);

        let mut children = list_children(&root).await;
        children.sort_by(|a, b| a.label.cmp(&b.label));
        assert_eq!(children.len(), 2);

        assert_eq!(children[0].label, "empty");
        assert_eq!(children[0].kind, NodeKind::Folder);
        assert!(!children[0].has_children);

        assert_eq!(children[1].label, "shots");
        assert!(children[1].has_children);

        let grandchildren = list_children(&children[1]).await;
        assert_eq!(grandchildren.len(), 1);
        assert_eq!(grandchildren[0].kind, NodeKind::TaskArea);
        assert_eq!(grandchildren[0].subkind, "shot");
    }

    #[tokio::test]
    async fn test_task_has_no_tree_children() {
        let dir = tempdir().unwrap();
        let task = dir.path().join("anim");
        make_folder(&task, "task", None).await;
        for area in ["versions", "wip", "published"] {
            fs::create_dir_all(task.join(area)).await.unwrap();
        }

        let node = TreeNode::load(&task).await;
        assert_eq!(node.kind, NodeKind::Task);
        assert!(!node.has_children);
        assert!(list_children(&node).await.is_empty());

        let parent = TreeNode::load(dir.path()).await;
        let children = list_children(&parent).await;
        assert_eq!(children.len(), 1);
        assert!(!children[0].has_children);
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let dir = tempdir().unwrap();
        let node = TreeNode::load(&dir.path().join("gone")).await;
        assert!(list_children(&node).await.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_child_is_omitted() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).await.unwrap();
        fs::create_dir_all(dir.path().join("b")).await.unwrap();
        let root = TreeNode::load(dir.path()).await;
        assert_eq!(list_children(&root).await.len(), 2);

        fs::remove_dir_all(dir.path().join("a")).await.unwrap();
        let children = list_children(&root).await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].label, "b");
    }

    #[tokio::test]
    async fn test_scan_tree_builds_full_hierarchy() {
        let dir = tempdir().unwrap();
        let area = dir.path().join("build").join("chair");
        make_folder(&dir.path().join("build"), "folder", None).await;
        make_folder(&area, "taskarea", Some("asset")).await;
        make_folder(&area.join("model"), "task", Some("model")).await;
        fs::create_dir_all(area.join("model").join("wip")).await.unwrap();

        let tree = scan_tree(dir.path()).await;
        let build = &tree.children.as_ref().unwrap()[0];
        assert_eq!(build.label, "build");
        let chair = &build.children.as_ref().unwrap()[0];
        assert_eq!(chair.kind, NodeKind::TaskArea);
        let model = &chair.children.as_ref().unwrap()[0];
        assert_eq!(model.kind, NodeKind::Task);
        assert!(model.children.is_none());
    }

    #[tokio::test]
    async fn test_tree_state_reload_refreshes_only_expanded() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a").join("x")).await.unwrap();
        fs::create_dir_all(dir.path().join("b").join("y")).await.unwrap();

        let mut state = TreeState::open(dir.path()).await;
        let root = state.root().clone();
        let children = state.expand(&root).await.to_vec();
        assert_eq!(children.len(), 2);

        let a = children.iter().find(|c| c.label == "a").unwrap().clone();
        state.expand(&a).await;
        assert_eq!(state.visible_rows().len(), 4);

        fs::create_dir_all(dir.path().join("a").join("z")).await.unwrap();
        fs::create_dir_all(dir.path().join("b").join("w")).await.unwrap();
        // Cached until reload
        assert_eq!(state.children(&a.id).unwrap().len(), 1);

        state.reload().await;
        assert_eq!(state.children(&a.id).unwrap().len(), 2);
        assert!(state.children(&dir.path().join("b")).is_none());

        state.collapse(&a.id);
        assert_eq!(state.visible_rows().len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_root_yields_absolute_ids() {
        let dir = tempdir().unwrap();
        make_folder(&dir.path().join("shots"), "folder", None).await;
        fs::create_dir_all(dir.path().join("shots").join("sh010")).await.unwrap();

        let relative = crate::storage::relative_to_cwd(dir.path());
        let mut state = TreeState::open(&relative).await;
        assert_eq!(state.root().id, dir.path());

        let root = state.root().clone();
        let children = state.expand(&root).await.to_vec();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, dir.path().join("shots"));
        assert!(children[0].has_children);

        // Same directory, other spelling: same key
        let respelled = TreeNode::load(&dir.path().join("shots").join("..")).await;
        assert!(state.is_expanded(&respelled.id));
        assert_eq!(state.children(&respelled.id).map(<[TreeNode]>::len), Some(1));
    }
}
