//! One controller node: a file or directory in the open project.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::commands::UndoEntry;
use crate::controller::NodeId;
use crate::model::{DataFile, FileFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    Suite,
    Resource,
    /// A directory matched by the exclude list. Stays in the tree for
    /// display but refuses all mutation.
    ExcludedDirectory,
}

/// Controller state for one data file. Structural links are ids into the
/// arena; dirtiness and the undo/redo stacks live here, on the file that
/// owns the edited data.
pub struct FileNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    pub data: DataFile,
    pub dirty: bool,
    pub read_only: bool,
    /// Modification time observed at load/save, for external-change checks.
    pub stat: Option<SystemTime>,
    pub undo: Vec<UndoEntry>,
    pub redo: Vec<UndoEntry>,
    /// Nodes whose imports resolve to this resource.
    pub known_imports: Vec<NodeId>,
}

impl FileNode {
    pub fn new(id: NodeId, kind: NodeKind, data: DataFile) -> Self {
        let stat = crate::io::mtime(&data.source);
        Self {
            id,
            parent: None,
            children: Vec::new(),
            kind,
            data,
            dirty: false,
            read_only: false,
            stat,
            undo: Vec::new(),
            redo: Vec::new(),
            known_imports: Vec::new(),
        }
    }

    pub fn is_excluded(&self) -> bool {
        self.kind == NodeKind::ExcludedDirectory
    }

    pub fn is_modifiable(&self) -> bool {
        !self.read_only && !self.is_excluded()
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory | NodeKind::ExcludedDirectory)
    }

    pub fn is_resource(&self) -> bool {
        self.kind == NodeKind::Resource
    }

    /// Display name: file basename, or the directory name itself.
    pub fn name(&self) -> &str {
        if self.is_directory() {
            self.data
                .source
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("")
        } else {
            self.data.basename()
        }
    }

    /// Mark dirty; true when this transitions clean to dirty.
    pub fn mark_dirty(&mut self) -> bool {
        !std::mem::replace(&mut self.dirty, true)
    }

    /// Clear dirty; true when this transitions dirty to clean.
    pub fn clear_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn refresh_stat(&mut self) {
        self.stat = crate::io::mtime(&self.data.source);
    }

    /// Whether this node's file is `filename` (case-insensitive).
    pub fn contains_filename(&self, filename: &str) -> bool {
        self.data
            .source
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(filename))
    }

    /// Rename the file's basename, keeping directory and extension.
    pub fn set_basename(&mut self, basename: &str) -> PathBuf {
        let old = self.data.source.clone();
        let extension = self.data.format.extension();
        let parent = old.parent().unwrap_or(Path::new(""));
        self.data.source = parent.join(format!("{basename}.{extension}"));
        old
    }

    /// Switch serialisation format, updating the extension.
    pub fn change_format(&mut self, format: FileFormat) -> PathBuf {
        let old = self.data.source.clone();
        self.data.format = format;
        if !self.is_directory() {
            self.data.source = old.with_extension(format.extension());
        }
        old
    }

    pub fn add_known_import(&mut self, importer: NodeId) {
        if !self.known_imports.contains(&importer) {
            self.known_imports.push(importer);
        }
    }

    pub fn remove_known_import(&mut self, importer: NodeId) {
        self.known_imports.retain(|id| *id != importer);
    }

    /// A resource is used iff something imports it.
    pub fn is_used(&self) -> bool {
        !self.known_imports.is_empty()
    }
}

impl std::fmt::Debug for FileNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("source", &self.data.source)
            .field("dirty", &self.dirty)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
