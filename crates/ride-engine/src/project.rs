//! The project facade: owns the node tree, the event bus, settings, the
//! parser collaborator and the namespace, and is the sole mutation entry
//! point via [`Project::execute`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use ride_config::Settings;

use crate::commands::{
    Command, CommandResult, Context, CreateNewDirectoryProject, CreateNewFileProject,
    CreateNewResource, SaveAll, SaveFile,
};
use crate::controller::{CtrlRef, NodeId, NodeKind, NodeTree, kind_for};
use crate::error::{CommandError, ParseError};
use crate::io::DataParser;
use crate::library::{KeywordInfo, LibraryManager};
use crate::messages::{Publisher, RideMessage};
use crate::model::{DataFile, DataFileKind, FileFormat, Variable};
use crate::namespace::Namespace;
use crate::observer::LoadObserver;

/// How often the loading thread is polled for completion, which is also
/// the cancellation granularity of [`LoadObserver::notify`].
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Project {
    pub tree: NodeTree,
    pub publisher: Publisher,
    pub settings: Settings,
    pub namespace: Namespace,
    parser: Arc<dyn DataParser>,
    manager: Arc<dyn LibraryManager>,
}

impl Project {
    pub fn new(
        settings: Settings,
        parser: Arc<dyn DataParser>,
        manager: Arc<dyn LibraryManager>,
    ) -> Self {
        if let Err(err) = manager.start() {
            tracing::warn!(%err, "library manager failed to start");
        }
        Self {
            tree: NodeTree::new(),
            publisher: Publisher::new(),
            settings,
            namespace: Namespace::new(Arc::clone(&manager)),
            parser,
            manager,
        }
    }

    /// Execute a command against a target. Modifying commands against
    /// read-only or excluded targets are suppressed with a
    /// `ModificationPrevented` event. A reversible execution lands on the
    /// target file's undo stack and clears its redo stack.
    pub fn execute(
        &mut self,
        target: CtrlRef,
        command: &dyn Command,
    ) -> Result<CommandResult, CommandError> {
        if command.modifying()
            && let Some(node) = self.tree.node(target.node)
            && !node.is_modifiable()
        {
            self.publisher.publish(&RideMessage::ModificationPrevented {
                item: self.tree.item_name(target),
            });
            return Ok(CommandResult::Rejected(
                "target cannot be modified".to_string(),
            ));
        }
        self.namespace.invalidate();
        let output = command.execute(&mut self.context(target))?;
        if let Some(inverse) = output.inverse
            && let Some(node) = self.tree.node_mut(target.node)
        {
            node.undo.push((target, inverse));
            node.redo.clear();
        }
        Ok(output.result)
    }

    /// Pop and apply the newest undo entry of `file`. Applying the inverse
    /// yields its own inverse, which moves onto the redo stack; the redo
    /// stack is never cleared here.
    pub fn undo(&mut self, file: NodeId) -> Result<Option<CommandResult>, CommandError> {
        let Some((target, inverse)) = self.tree.node_mut(file).and_then(|n| n.undo.pop()) else {
            return Ok(None);
        };
        self.namespace.invalidate();
        let output = inverse.execute(&mut self.context(target))?;
        if let Some(redo) = output.inverse
            && let Some(node) = self.tree.node_mut(file)
        {
            node.redo.push((target, redo));
        }
        Ok(Some(output.result))
    }

    /// Pop and apply the newest redo entry of `file`, moving its inverse
    /// back onto the undo stack.
    pub fn redo(&mut self, file: NodeId) -> Result<Option<CommandResult>, CommandError> {
        let Some((target, entry)) = self.tree.node_mut(file).and_then(|n| n.redo.pop()) else {
            return Ok(None);
        };
        self.namespace.invalidate();
        let output = entry.execute(&mut self.context(target))?;
        if let Some(undo) = output.inverse
            && let Some(node) = self.tree.node_mut(file)
        {
            node.undo.push((target, undo));
        }
        Ok(Some(output.result))
    }

    pub fn can_undo(&self, file: NodeId) -> bool {
        self.tree.node(file).is_some_and(|n| !n.undo.is_empty())
    }

    pub fn can_redo(&self, file: NodeId) -> bool {
        self.tree.node(file).is_some_and(|n| !n.redo.is_empty())
    }

    fn context(&mut self, target: CtrlRef) -> Context<'_> {
        Context {
            tree: &mut self.tree,
            publisher: &self.publisher,
            settings: &mut self.settings,
            parser: self.parser.as_ref(),
            namespace: &mut self.namespace,
            target,
            suppress_steps_events: false,
        }
    }

    /// Open the suite, directory or resource at `path`, replacing the
    /// current project for suites and directories. Parsing runs on a
    /// worker thread; the observer is polled for cancellation while it
    /// runs and between directory entries.
    pub fn load_data(
        &mut self,
        path: &Path,
        observer: &dyn LoadObserver,
    ) -> Result<NodeId, CommandError> {
        let result = self.load_data_inner(path, observer);
        match &result {
            Ok(_) => observer.finish(),
            Err(err) => observer.error(&err.to_string()),
        }
        result
    }

    fn load_data_inner(
        &mut self,
        path: &Path,
        observer: &dyn LoadObserver,
    ) -> Result<NodeId, CommandError> {
        if path.is_dir() {
            return self.load_directory_project(path, observer);
        }
        let data = self.parse_polled(path, observer)?;
        let is_resource = data.kind == DataFileKind::Resource;
        if is_resource {
            let id = self.insert_into_suite_structure(data)?;
            self.namespace.invalidate();
            self.publisher.publish(&RideMessage::OpenResource {
                path: path.to_path_buf(),
            });
            return Ok(id);
        }
        self.tree = NodeTree::new();
        self.namespace.reset();
        let id = self.tree.insert(NodeKind::Suite, data, None)?;
        self.tree.set_root(id);
        self.publisher.publish(&RideMessage::OpenSuite {
            path: path.to_path_buf(),
        });
        Ok(id)
    }

    fn load_directory_project(
        &mut self,
        path: &Path,
        observer: &dyn LoadObserver,
    ) -> Result<NodeId, CommandError> {
        self.tree = NodeTree::new();
        self.namespace.reset();
        let data = DataFile::new(path, DataFileKind::Directory);
        let root = self.tree.insert(NodeKind::Directory, data, None)?;
        self.tree.set_root(root);
        self.load_children(root, observer)?;
        self.publisher.publish(&RideMessage::OpenSuite {
            path: path.to_path_buf(),
        });
        Ok(root)
    }

    /// Load a directory node's on-disk children, depth first. Excluded
    /// directories become `ExcludedDirectory` nodes whose contents are
    /// never read. A `false` from the observer stops the walk where it is.
    fn load_children(
        &mut self,
        dir: NodeId,
        observer: &dyn LoadObserver,
    ) -> Result<(), CommandError> {
        for path in self.tree.unloaded_children(dir)? {
            if !observer.notify() {
                return Ok(());
            }
            if path.is_dir() {
                let kind = if self.is_excluded(&path) {
                    NodeKind::ExcludedDirectory
                } else {
                    NodeKind::Directory
                };
                let data = DataFile::new(&path, DataFileKind::Directory);
                let id = self.tree.insert(kind, data, Some(dir))?;
                self.tree.attach(dir, id);
                if kind == NodeKind::Directory {
                    self.load_children(id, observer)?;
                }
                continue;
            }
            if FileFormat::from_path(&path).is_none() {
                continue;
            }
            match self.parser.parse(&path) {
                Ok(data) => {
                    let id = self.tree.insert(kind_for(&data), data, Some(dir))?;
                    self.tree.attach(dir, id);
                }
                Err(err) => observer.error(&err.to_string()),
            }
        }
        Ok(())
    }

    /// Parse on a worker thread, polling the observer while waiting.
    fn parse_polled(
        &self,
        path: &Path,
        observer: &dyn LoadObserver,
    ) -> Result<DataFile, ParseError> {
        let parser = Arc::clone(&self.parser);
        let target = path.to_path_buf();
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::spawn(move || {
            let _ = tx.send(parser.parse(&target));
        });
        loop {
            match rx.recv_timeout(LOAD_POLL_INTERVAL) {
                Ok(result) => {
                    let _ = worker.join();
                    return result;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if !observer.notify() {
                        return Err(ParseError::new(path, "load cancelled"));
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ParseError::new(path, "parser thread terminated"));
                }
            }
        }
    }

    /// Place a parsed file where it belongs: under the directory node that
    /// owns its path, or among the external resources.
    pub fn insert_into_suite_structure(&mut self, data: DataFile) -> Result<NodeId, CommandError> {
        if let Some(existing) = self.tree.find_by_path(&data.source) {
            return Ok(existing);
        }
        let parent = data
            .source
            .parent()
            .and_then(|dir| self.tree.find_by_path(dir));
        let kind = kind_for(&data);
        let id = self.tree.insert(kind, data, parent)?;
        match parent {
            Some(parent) => self.tree.attach(parent, id),
            None => self.tree.add_external_resource(id),
        }
        self.tree.invalidate_resolution();
        Ok(id)
    }

    /// A resource import row changed: resolve it against `dir` and bring
    /// the file into the model when it parses.
    pub fn resource_import_modified(&mut self, path: &Path, dir: &Path) -> Option<NodeId> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            dir.join(path)
        };
        if let Some(existing) = self.tree.find_by_path(&resolved) {
            return Some(existing);
        }
        if !resolved.is_file() {
            return None;
        }
        match self.parser.parse(&resolved) {
            Ok(data) => {
                let id = self.insert_into_suite_structure(data).ok()?;
                self.namespace.invalidate();
                Some(id)
            }
            Err(err) => {
                self.publisher.publish(&RideMessage::ParserLog {
                    message: err.to_string(),
                });
                None
            }
        }
    }

    pub fn save(&mut self, file: NodeId) -> Result<CommandResult, CommandError> {
        self.execute(CtrlRef::file(file), &SaveFile::new())
    }

    pub fn save_all(&mut self) -> Result<CommandResult, CommandError> {
        let target = CtrlRef::file(self.tree.root.unwrap_or(NodeId::DETACHED));
        self.execute(target, &SaveAll::new())
    }

    pub fn is_dirty(&self) -> bool {
        self.tree
            .datafiles()
            .into_iter()
            .any(|id| self.tree.node(id).is_some_and(|n| n.dirty))
    }

    /// Re-parse a file from disk, discarding in-memory edits and the
    /// file's undo history.
    pub fn reload(&mut self, file: NodeId) -> Result<(), CommandError> {
        let path = self.tree.expect_node(file)?.data.source.clone();
        let data = self.parser.parse(&path)?;
        let node = self.tree.expect_node_mut(file)?;
        node.data = data;
        node.undo.clear();
        node.redo.clear();
        let was_dirty = node.clear_dirty();
        node.refresh_stat();
        self.namespace.invalidate();
        self.tree.invalidate_resolution();
        self.publisher
            .publish(&RideMessage::DataFileSet { path: path.clone() });
        if was_dirty {
            self.publisher
                .publish(&RideMessage::DataDirtyCleared { path });
        }
        Ok(())
    }

    /// Resolve `name` from `file`'s point of view: local keywords first,
    /// then resource imports, libraries and built-ins.
    pub fn keyword_info(&mut self, file: NodeId, name: &str) -> Option<KeywordInfo> {
        self.namespace.find_keyword(&self.tree, file, name)
    }

    /// The variables defined in `file`'s own variable table.
    pub fn local_variables(&self, file: NodeId) -> Vec<Variable> {
        self.tree
            .node(file)
            .map(|n| n.data.variable_table.variables.clone())
            .unwrap_or_default()
    }

    /// Switch a file's serialisation format, renaming it on disk.
    pub fn change_format(
        &mut self,
        file: NodeId,
        format: FileFormat,
    ) -> Result<(), CommandError> {
        let node = self.tree.expect_node_mut(file)?;
        if node.is_directory() || node.data.format == format {
            return Ok(());
        }
        let old = node.change_format(format);
        let new = node.data.source.clone();
        if old.exists() {
            std::fs::rename(&old, &new)?;
        }
        node.mark_dirty();
        self.namespace.expire_resource(&old);
        self.publisher
            .publish(&RideMessage::FileNameChanged {
                path: new,
                old_basename: old
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string(),
            });
        Ok(())
    }

    pub fn change_format_recursive(
        &mut self,
        dir: NodeId,
        format: FileFormat,
    ) -> Result<(), CommandError> {
        let mut stack = vec![dir];
        let mut files = Vec::new();
        while let Some(id) = stack.pop() {
            let Some(node) = self.tree.node(id) else {
                continue;
            };
            stack.extend(node.children.iter().copied());
            if !node.is_directory() {
                files.push(id);
            }
        }
        for file in files {
            self.change_format(file, format)?;
        }
        Ok(())
    }

    pub fn remove_datafile(&mut self, file: NodeId) {
        self.tree.remove_subtree(file);
        self.namespace.invalidate();
    }

    pub fn remove_resource(&mut self, resource: NodeId) {
        self.tree.remove_subtree(resource);
        self.namespace.invalidate();
    }

    pub fn new_file_project(&mut self, path: &Path) -> Result<NodeId, CommandError> {
        self.execute(
            CtrlRef::file(NodeId::DETACHED),
            &CreateNewFileProject {
                path: path.to_path_buf(),
            },
        )?;
        self.tree
            .root
            .ok_or_else(|| CommandError::InvalidTarget("project has no root".to_string()))
    }

    pub fn new_directory_project(&mut self, path: &Path) -> Result<NodeId, CommandError> {
        self.execute(
            CtrlRef::file(NodeId::DETACHED),
            &CreateNewDirectoryProject {
                path: path.to_path_buf(),
            },
        )?;
        self.tree
            .root
            .ok_or_else(|| CommandError::InvalidTarget("project has no root".to_string()))
    }

    pub fn new_resource(&mut self, path: &Path) -> Result<NodeId, CommandError> {
        self.execute(
            CtrlRef::file(NodeId::DETACHED),
            &CreateNewResource {
                path: path.to_path_buf(),
            },
        )?;
        self.tree
            .find_by_path(path)
            .ok_or_else(|| CommandError::InvalidTarget("resource was not created".to_string()))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.settings.excludes().contains(path)
    }

    pub fn datafiles(&self) -> Vec<PathBuf> {
        self.tree
            .datafiles()
            .into_iter()
            .filter_map(|id| self.tree.node(id))
            .map(|n| n.data.source.clone())
            .collect()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if self.manager.is_alive()
            && let Err(err) = self.manager.stop()
        {
            tracing::warn!(%err, "library manager failed to stop");
        }
    }
}
