//! Structural commands: tests, keywords, files, directories and the
//! project tree itself.

use std::fs;
use std::path::PathBuf;

use crate::commands::{Command, CommandOutput, Context};
use crate::controller::{ItemRef, NodeId, NodeKind, NodeTree};
use crate::error::CommandError;
use crate::messages::RideMessage;
use crate::model::{DataFile, DataFileKind, TestCase, UserKeyword, name_taken};
use crate::namespace::validate_keyword_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Test,
    Keyword,
}

pub(crate) enum MacroBody {
    Test(TestCase),
    Keyword(UserKeyword),
}

/// Rename the targeted test case.
pub struct RenameTest {
    pub new_name: String,
}

impl Command for RenameTest {
    fn name(&self) -> &'static str {
        "rename test"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let ItemRef::Test(index) = ctx.target.item else {
            return Err(CommandError::InvalidTarget("target is not a test".to_string()));
        };
        if self.new_name.trim().is_empty() {
            return Ok(ctx.reject("test name cannot be empty"));
        }
        let data = &ctx.node()?.data;
        let taken = data
            .tests
            .iter()
            .enumerate()
            .any(|(i, t)| i != index && crate::model::eq_normalized(&t.name, &self.new_name));
        if taken {
            return Ok(ctx.reject(format!("test {} already exists", self.new_name)));
        }
        let node = ctx.node_mut()?;
        let test = node
            .data
            .tests
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no test {index}")))?;
        let old_name = std::mem::replace(&mut test.name, self.new_name.clone());
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::ItemNameChanged {
            item: self.new_name.clone(),
            old_name: old_name.clone(),
        });
        Ok(CommandOutput::reversible(RenameTest { new_name: old_name }))
    }
}

/// Duplicate the targeted test or keyword under a new name.
pub struct CopyMacroAs {
    pub new_name: String,
}

impl Command for CopyMacroAs {
    fn name(&self) -> &'static str {
        "copy macro"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if self.new_name.trim().is_empty() {
            return Ok(ctx.reject("name cannot be empty"));
        }
        match ctx.target.item {
            ItemRef::Test(index) => {
                if name_taken(ctx.node()?.data.test_names(), &self.new_name) {
                    return Ok(ctx.reject(format!("test {} already exists", self.new_name)));
                }
                let node = ctx.node_mut()?;
                let mut copy = node
                    .data
                    .tests
                    .get(index)
                    .cloned()
                    .ok_or_else(|| CommandError::InvalidTarget(format!("no test {index}")))?;
                copy.name = self.new_name.clone();
                node.data.tests.push(copy);
                let at = node.data.tests.len() - 1;
                ctx.mark_dirty()?;
                ctx.publish(RideMessage::TestCaseAdded {
                    name: self.new_name.clone(),
                });
                Ok(CommandOutput::reversible(RemoveMacro {
                    kind: MacroKind::Test,
                    index: at,
                }))
            }
            ItemRef::Keyword(index) => {
                if name_taken(ctx.node()?.data.keyword_names(), &self.new_name) {
                    return Ok(ctx.reject(format!("keyword {} already exists", self.new_name)));
                }
                let node = ctx.node_mut()?;
                let mut copy = node
                    .data
                    .keywords
                    .get(index)
                    .cloned()
                    .ok_or_else(|| CommandError::InvalidTarget(format!("no keyword {index}")))?;
                copy.name = self.new_name.clone();
                node.data.keywords.push(copy);
                let at = node.data.keywords.len() - 1;
                ctx.mark_dirty()?;
                ctx.publish(RideMessage::UserKeywordAdded {
                    name: self.new_name.clone(),
                });
                Ok(CommandOutput::reversible(RemoveMacro {
                    kind: MacroKind::Keyword,
                    index: at,
                }))
            }
            _ => Err(CommandError::InvalidTarget(
                "target is not a test or keyword".to_string(),
            )),
        }
    }
}

pub struct AddTestCase {
    pub name: String,
}

impl Command for AddTestCase {
    fn name(&self) -> &'static str {
        "add test case"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if self.name.trim().is_empty() {
            return Ok(ctx.reject("test name cannot be empty"));
        }
        if name_taken(ctx.node()?.data.test_names(), &self.name) {
            return Ok(ctx.reject(format!("test {} already exists", self.name)));
        }
        let node = ctx.node_mut()?;
        node.data.tests.push(TestCase::new(&self.name));
        let index = node.data.tests.len() - 1;
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::TestCaseAdded {
            name: self.name.clone(),
        });
        Ok(CommandOutput::reversible(RemoveMacro {
            kind: MacroKind::Test,
            index,
        }))
    }
}

pub struct AddKeyword {
    pub name: String,
    pub args: Vec<String>,
}

impl Command for AddKeyword {
    fn name(&self) -> &'static str {
        "add keyword"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if let Err(message) = validate_keyword_name(&self.name) {
            return Ok(ctx.reject(message));
        }
        if name_taken(ctx.node()?.data.keyword_names(), &self.name) {
            return Ok(ctx.reject(format!("keyword {} already exists", self.name)));
        }
        let node = ctx.node_mut()?;
        let mut keyword = UserKeyword::new(&self.name);
        keyword.args = self.args.clone();
        node.data.keywords.push(keyword);
        let index = node.data.keywords.len() - 1;
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::UserKeywordAdded {
            name: self.name.clone(),
        });
        Ok(CommandOutput::reversible(RemoveMacro {
            kind: MacroKind::Keyword,
            index,
        }))
    }
}

/// Remove a test or keyword by index.
pub struct RemoveMacro {
    pub kind: MacroKind,
    pub index: usize,
}

impl Command for RemoveMacro {
    fn name(&self) -> &'static str {
        "remove macro"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        let (body, name) = match self.kind {
            MacroKind::Test => {
                if index >= node.data.tests.len() {
                    return Err(CommandError::InvalidTarget(format!("no test {index}")));
                }
                let removed = node.data.tests.remove(index);
                let name = removed.name.clone();
                (MacroBody::Test(removed), name)
            }
            MacroKind::Keyword => {
                if index >= node.data.keywords.len() {
                    return Err(CommandError::InvalidTarget(format!("no keyword {index}")));
                }
                let removed = node.data.keywords.remove(index);
                let name = removed.name.clone();
                (MacroBody::Keyword(removed), name)
            }
        };
        ctx.mark_dirty()?;
        ctx.publish(match self.kind {
            MacroKind::Test => RideMessage::TestCaseRemoved { name },
            MacroKind::Keyword => RideMessage::UserKeywordRemoved { name },
        });
        Ok(CommandOutput::reversible(RecreateMacro { index, body }))
    }
}

/// Put a removed test or keyword back where it was.
pub struct RecreateMacro {
    pub(crate) index: usize,
    pub(crate) body: MacroBody,
}

impl Command for RecreateMacro {
    fn name(&self) -> &'static str {
        "recreate macro"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let (kind, index, name) = match &self.body {
            MacroBody::Test(test) => {
                let at = self.index.min(node.data.tests.len());
                node.data.tests.insert(at, test.clone());
                (MacroKind::Test, at, test.name.clone())
            }
            MacroBody::Keyword(keyword) => {
                let at = self.index.min(node.data.keywords.len());
                node.data.keywords.insert(at, keyword.clone());
                (MacroKind::Keyword, at, keyword.name.clone())
            }
        };
        ctx.mark_dirty()?;
        ctx.publish(match kind {
            MacroKind::Test => RideMessage::TestCaseAdded { name },
            MacroKind::Keyword => RideMessage::UserKeywordAdded { name },
        });
        Ok(CommandOutput::reversible(RemoveMacro { kind, index }))
    }
}

pub struct SortTests;

impl Command for SortTests {
    fn name(&self) -> &'static str {
        "sort tests"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let snapshot = node.data.tests.clone();
        node.data.tests.sort_by_key(|t| t.name.to_lowercase());
        if node.data.tests == snapshot {
            return Ok(CommandOutput::done());
        }
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreTestOrder {
            tests: snapshot,
        }))
    }
}

pub struct RestoreTestOrder {
    pub tests: Vec<TestCase>,
}

impl Command for RestoreTestOrder {
    fn name(&self) -> &'static str {
        "restore test order"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let old = std::mem::replace(&mut node.data.tests, self.tests.clone());
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreTestOrder { tests: old }))
    }
}

pub struct SortKeywords;

impl Command for SortKeywords {
    fn name(&self) -> &'static str {
        "sort keywords"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let snapshot = node.data.keywords.clone();
        node.data.keywords.sort_by_key(|k| k.name.to_lowercase());
        if node.data.keywords == snapshot {
            return Ok(CommandOutput::done());
        }
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreKeywordOrder {
            keywords: snapshot,
        }))
    }
}

pub struct RestoreKeywordOrder {
    pub keywords: Vec<UserKeyword>,
}

impl Command for RestoreKeywordOrder {
    fn name(&self) -> &'static str {
        "restore keyword order"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let old = std::mem::replace(&mut node.data.keywords, self.keywords.clone());
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreKeywordOrder {
            keywords: old,
        }))
    }
}

pub struct SortVariables;

impl Command for SortVariables {
    fn name(&self) -> &'static str {
        "sort variables"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let snapshot = node.data.variable_table.variables.clone();
        node.data
            .variable_table
            .variables
            .sort_by_key(|v| v.name.to_lowercase());
        if node.data.variable_table.variables == snapshot {
            return Ok(CommandOutput::done());
        }
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreVariableOrder {
            variables: snapshot,
        }))
    }
}

pub struct RestoreVariableOrder {
    pub variables: Vec<crate::model::Variable>,
}

impl Command for RestoreVariableOrder {
    fn name(&self) -> &'static str {
        "restore variable order"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let old = std::mem::replace(
            &mut node.data.variable_table.variables,
            self.variables.clone(),
        );
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreVariableOrder {
            variables: old,
        }))
    }
}

/// Tag lists of the target: a test's or keyword's own tags, or the
/// suite-level force and default tags when the target is the file.
fn tag_snapshot(ctx: &Context) -> Result<TagsSnapshot, CommandError> {
    let data = &ctx.node()?.data;
    Ok(match ctx.target.item {
        ItemRef::Test(i) => TagsSnapshot::Item(
            data.tests
                .get(i)
                .map(|t| t.tags.clone())
                .ok_or_else(|| CommandError::InvalidTarget(format!("no test {i}")))?,
        ),
        ItemRef::Keyword(i) => TagsSnapshot::Item(
            data.keywords
                .get(i)
                .map(|k| k.tags.clone())
                .ok_or_else(|| CommandError::InvalidTarget(format!("no keyword {i}")))?,
        ),
        ItemRef::File => TagsSnapshot::File(
            data.setting_table.force_tags.clone(),
            data.setting_table.default_tags.clone(),
        ),
        _ => {
            return Err(CommandError::InvalidTarget(
                "target carries no tags".to_string(),
            ));
        }
    })
}

fn with_tags(
    ctx: &mut Context,
    mut apply: impl FnMut(&mut Vec<String>),
) -> Result<(), CommandError> {
    let item = ctx.target.item;
    let node = ctx.node_mut()?;
    match item {
        ItemRef::Test(i) => apply(&mut node.data.tests[i].tags),
        ItemRef::Keyword(i) => apply(&mut node.data.keywords[i].tags),
        ItemRef::File => {
            apply(&mut node.data.setting_table.force_tags);
            apply(&mut node.data.setting_table.default_tags);
        }
        _ => unreachable!("tag_snapshot validated the target"),
    }
    Ok(())
}

pub(crate) enum TagsSnapshot {
    Item(Vec<String>),
    File(Vec<String>, Vec<String>),
}

pub(crate) struct RestoreTags {
    snapshot: TagsSnapshot,
}

impl Command for RestoreTags {
    fn name(&self) -> &'static str {
        "restore tags"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let old = tag_snapshot(ctx)?;
        let item = ctx.target.item;
        let node = ctx.node_mut()?;
        match (&self.snapshot, item) {
            (TagsSnapshot::Item(tags), ItemRef::Test(i)) => {
                node.data.tests[i].tags = tags.clone();
            }
            (TagsSnapshot::Item(tags), ItemRef::Keyword(i)) => {
                node.data.keywords[i].tags = tags.clone();
            }
            (TagsSnapshot::File(force, default), ItemRef::File) => {
                node.data.setting_table.force_tags = force.clone();
                node.data.setting_table.default_tags = default.clone();
            }
            _ => {
                return Err(CommandError::InvalidTarget(
                    "tag snapshot does not fit the target".to_string(),
                ));
            }
        }
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreTags { snapshot: old }))
    }
}

pub struct ChangeTag {
    pub old: String,
    pub new: String,
}

impl Command for ChangeTag {
    fn name(&self) -> &'static str {
        "change tag"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if self.new.trim().is_empty() {
            return Ok(ctx.reject("tag cannot be empty"));
        }
        let snapshot = tag_snapshot(ctx)?;
        let mut changed = false;
        with_tags(ctx, |tags| {
            for tag in tags.iter_mut() {
                if *tag == self.old {
                    *tag = self.new.clone();
                    changed = true;
                }
            }
        })?;
        if !changed {
            return Ok(CommandOutput::rejected(format!("no tag {}", self.old)));
        }
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreTags { snapshot }))
    }
}

pub struct DeleteTag {
    pub tag: String,
}

impl Command for DeleteTag {
    fn name(&self) -> &'static str {
        "delete tag"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let snapshot = tag_snapshot(ctx)?;
        let mut changed = false;
        with_tags(ctx, |tags| {
            let before = tags.len();
            tags.retain(|t| *t != self.tag);
            changed |= tags.len() != before;
        })?;
        if !changed {
            return Ok(CommandOutput::rejected(format!("no tag {}", self.tag)));
        }
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(RestoreTags { snapshot }))
    }
}

/// Exclude the targeted directory from the project. Fails when any file
/// under it has unsaved changes.
pub struct Exclude;

impl Command for Exclude {
    fn name(&self) -> &'static str {
        "exclude"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if ctx.tree.subtree_dirty(ctx.target.node) {
            return Err(CommandError::DirtyData);
        }
        let path = ctx.node()?.data.source.clone();
        ctx.settings
            .update_excludes([path.to_string_lossy().into_owned()]);
        ctx.node_mut()?.kind = NodeKind::ExcludedDirectory;
        ctx.publish(RideMessage::ExcludesChanged);
        Ok(CommandOutput::done())
    }
}

/// Bring an excluded directory back into the project.
pub struct Include;

impl Command for Include {
    fn name(&self) -> &'static str {
        "include"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let path = ctx.node()?.data.source.clone();
        ctx.settings
            .remove_excludes([path.to_string_lossy().into_owned()]);
        ctx.node_mut()?.kind = NodeKind::Directory;
        ctx.publish(RideMessage::ExcludesChanged);
        Ok(CommandOutput::done())
    }
}

/// Replace the target node's parsed data wholesale.
pub struct SetDataFile {
    pub data: DataFile,
}

impl Command for SetDataFile {
    fn name(&self) -> &'static str {
        "set data file"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let old = std::mem::replace(&mut node.data, self.data.clone());
        let path = node.data.source.clone();
        ctx.tree.invalidate_resolution();
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::DataFileSet { path });
        Ok(CommandOutput::reversible(SetDataFile { data: old }))
    }
}

/// Rename the target's file on disk and in the model.
pub struct RenameFile {
    pub new_basename: String,
}

impl Command for RenameFile {
    fn name(&self) -> &'static str {
        "rename file"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if self.new_basename.trim().is_empty() {
            return Ok(ctx.reject("file name cannot be empty"));
        }
        let old_basename = ctx.node()?.data.basename().to_string();
        let old_path = rename_on_disk(ctx, &self.new_basename)?;
        ctx.namespace.expire_resource(&old_path);
        let path = ctx.node()?.data.source.clone();
        ctx.publish(RideMessage::FileNameChanged { path, old_basename });
        Ok(CommandOutput::reversible(RenameFile {
            new_basename: ctx_old_basename(&old_path),
        }))
    }
}

fn ctx_old_basename(old_path: &std::path::Path) -> String {
    old_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

fn rename_on_disk(ctx: &mut Context, new_basename: &str) -> Result<PathBuf, CommandError> {
    let node = ctx.node_mut()?;
    let old_path = node.set_basename(new_basename);
    let new_path = node.data.source.clone();
    if old_path.exists() {
        fs::rename(&old_path, &new_path)?;
    }
    node.refresh_stat();
    Ok(old_path)
}

/// Rename a resource file, optionally rewriting the import rows of every
/// file that imports it.
pub struct RenameResourceFile {
    pub new_basename: String,
    pub should_modify_imports: bool,
}

impl Command for RenameResourceFile {
    fn name(&self) -> &'static str {
        "rename resource file"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if self.new_basename.trim().is_empty() {
            return Ok(ctx.reject("file name cannot be empty"));
        }
        let target = ctx.target.node;
        let importers = ctx.namespace.get_where_used(ctx.tree, target);
        let old_basename = ctx.node()?.data.basename().to_string();
        let old_path = rename_on_disk(ctx, &self.new_basename)?;
        ctx.namespace.expire_resource(&old_path);

        let old_filename = old_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let new_filename = ctx
            .node()?
            .data
            .source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if self.should_modify_imports {
            for importer in importers {
                rewrite_imports(ctx, importer, &old_filename, &new_filename)?;
            }
        }
        let path = ctx.node()?.data.source.clone();
        ctx.publish(RideMessage::FileNameChanged { path, old_basename });
        Ok(CommandOutput::reversible(RenameResourceFile {
            new_basename: ctx_old_basename(&old_path),
            should_modify_imports: self.should_modify_imports,
        }))
    }
}

fn rewrite_imports(
    ctx: &mut Context,
    importer: NodeId,
    old_filename: &str,
    new_filename: &str,
) -> Result<(), CommandError> {
    let mut changed = Vec::new();
    if let Some(node) = ctx.tree.node_mut(importer) {
        for import in &mut node.data.setting_table.imports {
            if import
                .name
                .to_lowercase()
                .ends_with(&old_filename.to_lowercase())
            {
                let split = import.name.len() - old_filename.len();
                import.name = format!("{}{}", &import.name[..split], new_filename);
                changed.push(import.name.clone());
            }
        }
        if !changed.is_empty() {
            node.mark_dirty();
        }
    }
    for name in changed {
        ctx.publish(RideMessage::ImportSettingChanged { name });
    }
    ctx.tree.invalidate_resolution();
    Ok(())
}

/// Move the target file under another directory node.
pub struct MoveTo {
    pub new_parent: NodeId,
}

impl Command for MoveTo {
    fn name(&self) -> &'static str {
        "move to"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let target = ctx.target.node;
        let old_parent = ctx
            .node()?
            .parent
            .ok_or_else(|| CommandError::InvalidTarget("target has no parent".to_string()))?;
        let parent_dir = ctx
            .tree
            .expect_node(self.new_parent)?
            .data
            .directory()
            .to_path_buf();
        let filename = ctx
            .node()?
            .data
            .source
            .file_name()
            .ok_or_else(|| CommandError::InvalidTarget("target has no file name".to_string()))?
            .to_os_string();
        let new_path = parent_dir.join(&filename);

        let old_path = {
            let node = ctx.node_mut()?;
            let old = node.data.source.clone();
            node.data.source = new_path.clone();
            old
        };
        if old_path.exists() {
            fs::rename(&old_path, &new_path)?;
        }
        if let Some(parent) = ctx.tree.node_mut(old_parent) {
            parent.children.retain(|c| *c != target);
        }
        ctx.tree.attach(self.new_parent, target);
        ctx.namespace.expire_resource(&old_path);
        ctx.tree.invalidate_resolution();
        ctx.publish(RideMessage::DataFileSet { path: new_path });
        Ok(CommandOutput::reversible(MoveTo {
            new_parent: old_parent,
        }))
    }
}

/// Delete the target file from disk and drop it from the tree. Not
/// undoable.
pub struct DeleteFile;

impl Command for DeleteFile {
    fn name(&self) -> &'static str {
        "delete file"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let path = ctx.node()?.data.source.clone();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        ctx.tree.remove_subtree(ctx.target.node);
        Ok(CommandOutput::done())
    }
}

/// Delete the target directory recursively. Not undoable.
pub struct DeleteFolder;

impl Command for DeleteFolder {
    fn name(&self) -> &'static str {
        "delete folder"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let path = ctx.node()?.data.source.clone();
        match fs::remove_dir_all(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        ctx.tree.remove_subtree(ctx.target.node);
        Ok(CommandOutput::done())
    }
}

/// Delete a resource file and remove the import rows pointing at it.
pub struct DeleteResourceAndImports;

impl Command for DeleteResourceAndImports {
    fn name(&self) -> &'static str {
        "delete resource and imports"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        remove_imports_of(ctx, ctx.target.node)?;
        DeleteFile.execute(ctx)
    }
}

/// Delete a directory and the import rows pointing at any resource in it.
pub struct DeleteFolderAndImports;

impl Command for DeleteFolderAndImports {
    fn name(&self) -> &'static str {
        "delete folder and imports"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let mut resources = Vec::new();
        collect_resources(ctx.tree, ctx.target.node, &mut resources);
        for resource in resources {
            remove_imports_of(ctx, resource)?;
        }
        DeleteFolder.execute(ctx)
    }
}

fn collect_resources(tree: &NodeTree, id: NodeId, out: &mut Vec<NodeId>) {
    let Some(node) = tree.node(id) else { return };
    if node.is_resource() {
        out.push(id);
    }
    for child in &node.children {
        collect_resources(tree, *child, out);
    }
}

fn remove_imports_of(ctx: &mut Context, resource: NodeId) -> Result<(), CommandError> {
    let importers = ctx.namespace.get_where_used(ctx.tree, resource);
    let filename = ctx
        .tree
        .expect_node(resource)?
        .data
        .source
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    for importer in importers {
        let mut removed = Vec::new();
        if let Some(node) = ctx.tree.node_mut(importer) {
            node.data.setting_table.imports.retain(|import| {
                let matches = import.name.to_lowercase().ends_with(&filename);
                if matches {
                    removed.push(import.name.clone());
                }
                !matches
            });
            if !removed.is_empty() {
                node.mark_dirty();
            }
        }
        for name in removed {
            ctx.publish(RideMessage::ImportSettingRemoved { name });
        }
    }
    ctx.tree.invalidate_resolution();
    Ok(())
}

/// Create a new resource file node; external when the path is outside the
/// project root.
pub struct CreateNewResource {
    pub path: PathBuf,
}

impl Command for CreateNewResource {
    fn name(&self) -> &'static str {
        "create new resource"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let data = DataFile::new(&self.path, DataFileKind::Resource);
        let inside_root = ctx
            .tree
            .root
            .and_then(|root| ctx.tree.node(root))
            .is_some_and(|root| self.path.starts_with(root.data.directory()));
        let parent = if inside_root { ctx.tree.root } else { None };
        let id = ctx.tree.insert(NodeKind::Resource, data, parent)?;
        if let Some(parent) = parent {
            ctx.tree.attach(parent, id);
        } else {
            ctx.tree.add_external_resource(id);
        }
        if let Some(node) = ctx.tree.node_mut(id) {
            node.mark_dirty();
        }
        ctx.tree.invalidate_resolution();
        ctx.publish(RideMessage::OpenResource {
            path: self.path.clone(),
        });
        Ok(CommandOutput::done())
    }
}

/// Create a new test case file under the targeted directory.
pub struct AddTestCaseFile {
    pub path: PathBuf,
}

impl Command for AddTestCaseFile {
    fn name(&self) -> &'static str {
        "add test case file"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let data = DataFile::new(&self.path, DataFileKind::Suite);
        let id = ctx.tree.insert(NodeKind::Suite, data, Some(ctx.target.node))?;
        ctx.tree.attach(ctx.target.node, id);
        if let Some(node) = ctx.tree.node_mut(id) {
            node.mark_dirty();
        }
        ctx.publish(RideMessage::DataFileSet {
            path: self.path.clone(),
        });
        Ok(CommandOutput::done())
    }
}

/// Create a new test data directory under the targeted directory.
pub struct AddTestDataDirectory {
    pub path: PathBuf,
}

impl Command for AddTestDataDirectory {
    fn name(&self) -> &'static str {
        "add test data directory"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        fs::create_dir_all(&self.path)?;
        let data = DataFile::new(&self.path, DataFileKind::Directory);
        let id = ctx
            .tree
            .insert(NodeKind::Directory, data, Some(ctx.target.node))?;
        ctx.tree.attach(ctx.target.node, id);
        ctx.publish(RideMessage::DataFileSet {
            path: self.path.clone(),
        });
        Ok(CommandOutput::done())
    }
}

/// Start a fresh single-file project.
pub struct CreateNewFileProject {
    pub path: PathBuf,
}

impl Command for CreateNewFileProject {
    fn name(&self) -> &'static str {
        "create new file project"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        *ctx.tree = NodeTree::new();
        ctx.namespace.reset();
        let data = DataFile::new(&self.path, DataFileKind::Suite);
        let id = ctx.tree.insert(NodeKind::Suite, data, None)?;
        ctx.tree.set_root(id);
        if let Some(node) = ctx.tree.node_mut(id) {
            node.mark_dirty();
        }
        ctx.publish(RideMessage::NewProject {
            path: self.path.clone(),
        });
        Ok(CommandOutput::done())
    }
}

/// Start a fresh directory project.
pub struct CreateNewDirectoryProject {
    pub path: PathBuf,
}

impl Command for CreateNewDirectoryProject {
    fn name(&self) -> &'static str {
        "create new directory project"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        fs::create_dir_all(&self.path)?;
        *ctx.tree = NodeTree::new();
        ctx.namespace.reset();
        let data = DataFile::new(&self.path, DataFileKind::Directory);
        let id = ctx.tree.insert(NodeKind::Directory, data, None)?;
        ctx.tree.set_root(id);
        ctx.publish(RideMessage::NewProject {
            path: self.path.clone(),
        });
        Ok(CommandOutput::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::Fixture;
    use crate::commands::CommandResult;
    use crate::controller::CtrlRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_remove_test_case_round_trip() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddTestCase {
            name: "New Test".to_string(),
        })
        .unwrap();
        assert_eq!(fx.node().data.tests.len(), 1);
        fx.undo().unwrap();
        assert!(fx.node().data.tests.is_empty());
        fx.redo().unwrap();
        assert_eq!(fx.node().data.tests[0].name, "New Test");
    }

    #[test]
    fn duplicate_test_names_are_rejected_normalised() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddTestCase {
            name: "Login User".to_string(),
        })
        .unwrap();
        let result = fx
            .execute(AddTestCase {
                name: "login_user".to_string(),
            })
            .unwrap();
        assert!(matches!(result, CommandResult::Rejected(_)));
        assert_eq!(fx.node().data.tests.len(), 1);
    }

    #[test]
    fn rename_test_round_trips() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddTestCase {
            name: "Old Name".to_string(),
        })
        .unwrap();
        fx.target = CtrlRef::test(fx.node_id, 0);
        fx.execute(RenameTest {
            new_name: "New Name".to_string(),
        })
        .unwrap();
        assert_eq!(fx.node().data.tests[0].name, "New Name");
        fx.undo().unwrap();
        assert_eq!(fx.node().data.tests[0].name, "Old Name");
    }

    #[test]
    fn copy_macro_duplicates_steps() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddKeyword {
            name: "Original".to_string(),
            args: vec!["${x}".to_string()],
        })
        .unwrap();
        fx.target = CtrlRef::keyword(fx.node_id, 0);
        fx.execute(CopyMacroAs {
            new_name: "Copy".to_string(),
        })
        .unwrap();
        let kws = &fx.node().data.keywords;
        assert_eq!(kws.len(), 2);
        assert_eq!(kws[1].name, "Copy");
        assert_eq!(kws[1].args, vec!["${x}"]);
    }

    #[test]
    fn sort_tests_and_undo_restores_order() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        for name in ["zeta", "Alpha", "midway"] {
            fx.execute(AddTestCase {
                name: name.to_string(),
            })
            .unwrap();
        }
        fx.execute(SortTests).unwrap();
        let names: Vec<String> = fx.node().data.tests.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["Alpha", "midway", "zeta"]);
        fx.undo().unwrap();
        let names: Vec<String> = fx.node().data.tests.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["zeta", "Alpha", "midway"]);
    }

    #[test]
    fn change_tag_applies_to_suite_level_lists() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.node_mut().data.setting_table.force_tags = vec!["smoke".to_string()];
        fx.node_mut().data.setting_table.default_tags = vec!["smoke".to_string(), "slow".to_string()];

        fx.execute(ChangeTag {
            old: "smoke".to_string(),
            new: "regression".to_string(),
        })
        .unwrap();
        assert_eq!(fx.node().data.setting_table.force_tags, vec!["regression"]);
        assert_eq!(
            fx.node().data.setting_table.default_tags,
            vec!["regression", "slow"]
        );
        fx.undo().unwrap();
        assert_eq!(fx.node().data.setting_table.force_tags, vec!["smoke"]);
    }

    #[test]
    fn delete_tag_round_trips() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddTestCase {
            name: "T".to_string(),
        })
        .unwrap();
        fx.node_mut().data.tests[0].tags = vec!["a".to_string(), "b".to_string()];
        fx.target = CtrlRef::test(fx.node_id, 0);
        fx.execute(DeleteTag {
            tag: "a".to_string(),
        })
        .unwrap();
        assert_eq!(fx.node().data.tests[0].tags, vec!["b"]);
        fx.undo().unwrap();
        assert_eq!(fx.node().data.tests[0].tags, vec!["a", "b"]);
    }
}
