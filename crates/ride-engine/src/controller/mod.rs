//! Controller layer: the arena-backed tree of open data files.
//!
//! All mutation flows through the project's `execute`; this module owns the
//! structure the commands operate on and the addressing scheme
//! ([`CtrlRef`]) commands use to find their target.

pub mod arena;
pub mod node;

pub use arena::{Arena, NodeId};
pub use node::{FileNode, NodeKind};

use std::path::{Path, PathBuf};

use crate::error::CommandError;
use crate::model::{DataFileKind, Step};

/// An item inside a file node. Indexes address into the node's data and
/// stay valid only until the next structural edit of that list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    File,
    Test(usize),
    Keyword(usize),
    Variable(usize),
    Import(usize),
}

/// Address of a command target: a node plus an item within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlRef {
    pub node: NodeId,
    pub item: ItemRef,
}

impl CtrlRef {
    pub fn file(node: NodeId) -> Self {
        Self {
            node,
            item: ItemRef::File,
        }
    }

    pub fn test(node: NodeId, index: usize) -> Self {
        Self {
            node,
            item: ItemRef::Test(index),
        }
    }

    pub fn keyword(node: NodeId, index: usize) -> Self {
        Self {
            node,
            item: ItemRef::Keyword(index),
        }
    }

    pub fn variable(node: NodeId, index: usize) -> Self {
        Self {
            node,
            item: ItemRef::Variable(index),
        }
    }

    pub fn import(node: NodeId, index: usize) -> Self {
        Self {
            node,
            item: ItemRef::Import(index),
        }
    }
}

/// The open project's node tree: one root subtree plus external resources
/// imported from outside the root directory.
#[derive(Debug, Default)]
pub struct NodeTree {
    arena: Arena<FileNode>,
    pub root: Option<NodeId>,
    external_resources: Vec<NodeId>,
    /// Project-wide flag: false when import resolution (known_imports)
    /// must be recomputed before use.
    pub resolution_valid: bool,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&FileNode> {
        self.arena.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut FileNode> {
        self.arena.get_mut(id)
    }

    /// Node lookup that treats a dangling id as a caller bug surfaced as
    /// an error, not a panic.
    pub fn expect_node(&self, id: NodeId) -> Result<&FileNode, CommandError> {
        self.node(id)
            .ok_or_else(|| CommandError::InvalidTarget(format!("node {id:?} no longer exists")))
    }

    pub fn expect_node_mut(&mut self, id: NodeId) -> Result<&mut FileNode, CommandError> {
        self.node_mut(id)
            .ok_or_else(|| CommandError::InvalidTarget(format!("node {id:?} no longer exists")))
    }

    /// Insert a node. With a parent, the child's path must be strictly
    /// inside the parent directory and its filename unique among siblings.
    pub fn insert(
        &mut self,
        kind: NodeKind,
        data: crate::model::DataFile,
        parent: Option<NodeId>,
    ) -> Result<NodeId, CommandError> {
        if let Some(parent_id) = parent {
            let parent_node = self.expect_node(parent_id)?;
            let parent_dir = parent_node.data.directory().to_path_buf();
            if !strictly_inside(&data.source, &parent_dir) {
                return Err(CommandError::InvalidTarget(format!(
                    "{} is not inside {}",
                    data.source.display(),
                    parent_dir.display()
                )));
            }
            let filename = data
                .source
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            for child in &parent_node.children {
                if self
                    .node(*child)
                    .is_some_and(|c| c.contains_filename(&filename))
                {
                    return Err(CommandError::InvalidTarget(format!(
                        "{filename} already exists in {}",
                        parent_dir.display()
                    )));
                }
            }
        }

        Ok(self.arena.alloc_with(|id| FileNode::new(id, kind, data)))
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Register an external resource, keeping the list sorted
    /// case-insensitively by name.
    pub fn add_external_resource(&mut self, id: NodeId) {
        if self.external_resources.contains(&id) {
            return;
        }
        self.external_resources.push(id);
        let mut names: Vec<(String, NodeId)> = self
            .external_resources
            .iter()
            .map(|id| {
                let name = self
                    .node(*id)
                    .map(|n| n.name().to_lowercase())
                    .unwrap_or_default();
                (name, *id)
            })
            .collect();
        names.sort();
        self.external_resources = names.into_iter().map(|(_, id)| id).collect();
    }

    pub fn external_resources(&self) -> &[NodeId] {
        &self.external_resources
    }

    /// Every data file in display order: root subtree depth-first with a
    /// directory's init file before its children, then external resources.
    pub fn datafiles(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.walk(root, &mut out);
        }
        out.extend(self.external_resources.iter().copied());
        out
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if self.node(id).is_none() {
            return;
        }
        out.push(id);
        if let Some(node) = self.node(id) {
            for child in node.children.clone() {
                self.walk(child, out);
            }
        }
    }

    /// Every live node in allocation order, including ones not yet
    /// attached to the root subtree.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.arena.iter().map(|(id, _)| id).collect()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<NodeId> {
        self.arena
            .iter()
            .find(|(_, node)| node.data.source == path)
            .map(|(id, _)| id)
    }

    /// Detach `id` from its parent and remove it and its whole subtree.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|c| *c != id);
            }
        }
        self.external_resources.retain(|r| *r != id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.remove(current) {
                stack.extend(node.children);
            }
        }
        self.invalidate_resolution();
    }

    pub fn invalidate_resolution(&mut self) {
        self.resolution_valid = false;
    }

    /// Whether any file in the subtree under `id` (inclusive) is dirty.
    pub fn subtree_dirty(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        node.dirty || node.children.iter().any(|c| self.subtree_dirty(*c))
    }

    /// On-disk entries under a directory node that are not yet in the
    /// model. Hidden and underscore-prefixed entries are skipped.
    pub fn unloaded_children(&self, id: NodeId) -> std::io::Result<Vec<PathBuf>> {
        let Some(node) = self.node(id) else {
            return Ok(Vec::new());
        };
        if !node.is_directory() {
            return Ok(Vec::new());
        }
        let loaded: Vec<&Path> = node
            .children
            .iter()
            .filter_map(|c| self.node(*c))
            .map(|c| c.data.source.as_path())
            .collect();
        let mut out = Vec::new();
        for entry in std::fs::read_dir(node.data.directory())? {
            let path = entry?.path();
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if name.starts_with('.') || name.starts_with('_') {
                continue;
            }
            if loaded.iter().any(|l| *l == path) {
                continue;
            }
            out.push(path);
        }
        out.sort();
        Ok(out)
    }

    /// Steps of the addressed test or keyword.
    pub fn steps(&self, target: CtrlRef) -> Option<&Vec<Step>> {
        let node = self.node(target.node)?;
        match target.item {
            ItemRef::Test(i) => node.data.tests.get(i).map(|t| &t.steps),
            ItemRef::Keyword(i) => node.data.keywords.get(i).map(|k| &k.steps),
            _ => None,
        }
    }

    pub fn steps_mut(&mut self, target: CtrlRef) -> Option<&mut Vec<Step>> {
        let node = self.node_mut(target.node)?;
        match target.item {
            ItemRef::Test(i) => node.data.tests.get_mut(i).map(|t| &mut t.steps),
            ItemRef::Keyword(i) => node.data.keywords.get_mut(i).map(|k| &mut k.steps),
            _ => None,
        }
    }

    /// Display name of the addressed item.
    pub fn item_name(&self, target: CtrlRef) -> String {
        let Some(node) = self.node(target.node) else {
            return String::new();
        };
        match target.item {
            ItemRef::File => node.name().to_string(),
            ItemRef::Test(i) => node.data.tests.get(i).map(|t| t.name.clone()).unwrap_or_default(),
            ItemRef::Keyword(i) => node
                .data
                .keywords
                .get(i)
                .map(|k| k.name.clone())
                .unwrap_or_default(),
            ItemRef::Variable(i) => node
                .data
                .variable_table
                .variables
                .get(i)
                .map(|v| v.name.clone())
                .unwrap_or_default(),
            ItemRef::Import(i) => node
                .data
                .setting_table
                .imports
                .get(i)
                .map(|imp| imp.name.clone())
                .unwrap_or_default(),
        }
    }

    /// Register a parent/child edge after `insert`.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
    }
}

fn strictly_inside(path: &Path, dir: &Path) -> bool {
    path != dir && path.starts_with(dir)
}

/// Suites and resources load as `Suite`/`Resource` nodes; directories as
/// `Directory` nodes.
pub fn kind_for(data: &crate::model::DataFile) -> NodeKind {
    match data.kind {
        DataFileKind::Suite => NodeKind::Suite,
        DataFileKind::Directory => NodeKind::Directory,
        DataFileKind::Resource => NodeKind::Resource,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataFile;
    use pretty_assertions::assert_eq;

    fn tree_with_root(path: &str) -> (NodeTree, NodeId) {
        let mut tree = NodeTree::new();
        let root = tree
            .insert(
                NodeKind::Directory,
                DataFile::new(path, DataFileKind::Directory),
                None,
            )
            .unwrap();
        tree.set_root(root);
        (tree, root)
    }

    #[test]
    fn child_paths_must_be_inside_the_parent() {
        let (mut tree, root) = tree_with_root("/suites");
        let err = tree
            .insert(
                NodeKind::Suite,
                DataFile::new("/elsewhere/s.robot", DataFileKind::Suite),
                Some(root),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidTarget(_)));
    }

    #[test]
    fn sibling_filenames_are_unique() {
        let (mut tree, root) = tree_with_root("/suites");
        let child = tree
            .insert(
                NodeKind::Suite,
                DataFile::new("/suites/login.robot", DataFileKind::Suite),
                Some(root),
            )
            .unwrap();
        tree.attach(root, child);
        let err = tree
            .insert(
                NodeKind::Suite,
                DataFile::new("/suites/LOGIN.robot", DataFileKind::Suite),
                Some(root),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidTarget(_)));
    }

    #[test]
    fn datafiles_order_is_parent_first_then_externals_sorted() {
        let (mut tree, root) = tree_with_root("/suites");
        let a = tree
            .insert(
                NodeKind::Suite,
                DataFile::new("/suites/a.robot", DataFileKind::Suite),
                Some(root),
            )
            .unwrap();
        tree.attach(root, a);

        let zed = tree
            .insert(
                NodeKind::Resource,
                DataFile::new("/lib/Zed.resource", DataFileKind::Resource),
                None,
            )
            .unwrap();
        let apple = tree
            .insert(
                NodeKind::Resource,
                DataFile::new("/lib/apple.resource", DataFileKind::Resource),
                None,
            )
            .unwrap();
        tree.add_external_resource(zed);
        tree.add_external_resource(apple);

        assert_eq!(tree.datafiles(), vec![root, a, apple, zed]);
    }

    #[test]
    fn remove_subtree_drops_descendants_and_dangles_ids() {
        let (mut tree, root) = tree_with_root("/suites");
        let sub = tree
            .insert(
                NodeKind::Directory,
                DataFile::new("/suites/inner", DataFileKind::Directory),
                Some(root),
            )
            .unwrap();
        tree.attach(root, sub);
        let leaf = tree
            .insert(
                NodeKind::Suite,
                DataFile::new("/suites/inner/s.robot", DataFileKind::Suite),
                Some(sub),
            )
            .unwrap();
        tree.attach(sub, leaf);

        tree.remove_subtree(sub);
        assert!(tree.node(sub).is_none());
        assert!(tree.node(leaf).is_none());
        assert_eq!(tree.datafiles(), vec![root]);
    }

    #[test]
    fn subtree_dirtiness_bubbles_up() {
        let (mut tree, root) = tree_with_root("/suites");
        let child = tree
            .insert(
                NodeKind::Suite,
                DataFile::new("/suites/s.robot", DataFileKind::Suite),
                Some(root),
            )
            .unwrap();
        tree.attach(root, child);
        assert!(!tree.subtree_dirty(root));
        tree.node_mut(child).unwrap().mark_dirty();
        assert!(tree.subtree_dirty(root));
    }
}
