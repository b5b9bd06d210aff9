//! The closed command set: every mutation of the data model is a command
//! executed through the project, so undo, dirtiness and events stay in one
//! place.
//!
//! Reversible commands synthesise their inverse while executing and return
//! it in [`CommandOutput`]; the project pairs it with the execution target
//! on the owning file's undo stack.

pub mod io_cmds;
pub mod occurrences;
pub mod steps;
pub mod structural;
pub mod values;

pub use io_cmds::{SaveAll, SaveFile};
pub use occurrences::{
    FindOccurrences, FindVariableOccurrences, Occurrence, RenameKeywordOccurrences,
};
pub use steps::{
    AddRow, ChangeCellValue, CommentRow, DeleteCell, DeleteRow, ExtractKeyword, InsertCell,
    MoveRowsDown, MoveRowsUp, Purify, SharpCommentRow, SharpUncommentRow, UncommentRow,
};
pub use structural::{
    AddKeyword, AddTestCase, AddTestCaseFile, AddTestDataDirectory, ChangeTag, CopyMacroAs,
    CreateNewDirectoryProject, CreateNewFileProject, CreateNewResource, DeleteFile, DeleteFolder,
    DeleteFolderAndImports, DeleteResourceAndImports, DeleteTag, Exclude, Include, MacroKind,
    MoveTo,
    RecreateMacro, RemoveMacro, RenameFile, RenameResourceFile, RenameTest, RestoreKeywordOrder,
    RestoreTestOrder, RestoreVariableOrder, SetDataFile, SortKeywords, SortTests, SortVariables,
};
pub use values::{
    AddLibrary, AddResource, AddVariable, AddVariablesFileImport, MoveVariableDown,
    MoveVariableUp, RemoveVariable, SetValues, SettingTarget, UpdateVariable, UpdateVariableName,
};

use ride_config::Settings;

use crate::controller::{CtrlRef, FileNode, NodeTree};
use crate::error::CommandError;
use crate::io::DataParser;
use crate::messages::{Publisher, RideMessage};
use crate::model::Step;
use crate::namespace::Namespace;

/// One undoable edit: the target it was executed against and the command
/// that reverses it.
pub type UndoEntry = (CtrlRef, Box<dyn Command>);

/// Everything a command may touch during execution.
pub struct Context<'a> {
    pub tree: &'a mut NodeTree,
    pub publisher: &'a Publisher,
    pub settings: &'a mut Settings,
    pub parser: &'a dyn DataParser,
    pub namespace: &'a mut Namespace,
    pub target: CtrlRef,
    /// Set by [`StepsChangingCompositeCommand`] so inner commands publish
    /// one aggregated steps-changed event instead of one each.
    pub suppress_steps_events: bool,
}

impl Context<'_> {
    pub fn node(&self) -> Result<&FileNode, CommandError> {
        self.tree.expect_node(self.target.node)
    }

    pub fn node_mut(&mut self) -> Result<&mut FileNode, CommandError> {
        self.tree.expect_node_mut(self.target.node)
    }

    pub fn steps(&self) -> Result<&Vec<Step>, CommandError> {
        self.tree
            .steps(self.target)
            .ok_or_else(|| CommandError::InvalidTarget("target has no steps".to_string()))
    }

    pub fn steps_mut(&mut self) -> Result<&mut Vec<Step>, CommandError> {
        self.tree
            .steps_mut(self.target)
            .ok_or_else(|| CommandError::InvalidTarget("target has no steps".to_string()))
    }

    pub fn item_name(&self) -> String {
        self.tree.item_name(self.target)
    }

    pub fn publish(&self, message: RideMessage) {
        self.publisher.publish(&message);
    }

    /// Mark the target's file dirty, announcing the transition once.
    pub fn mark_dirty(&mut self) -> Result<(), CommandError> {
        let path = self.node()?.data.source.clone();
        if self.node_mut()?.mark_dirty() {
            self.publish(RideMessage::DataChangedToDirty { path });
        }
        Ok(())
    }

    /// Steps-changed notification, folded into one event inside a
    /// steps-changing composite.
    pub fn notify_steps_changed(&self) {
        if !self.suppress_steps_events {
            self.publish(RideMessage::ItemStepsChanged {
                item: self.item_name(),
            });
        }
    }

    /// Publish a validation failure and build the matching falsy output.
    pub fn reject(&self, message: impl Into<String>) -> CommandOutput {
        let message = message.into();
        self.publish(RideMessage::InputValidationError {
            message: message.clone(),
        });
        CommandOutput::rejected(message)
    }
}

/// What a command execution produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Done,
    /// Falsy outcome: nothing changed.
    Rejected(String),
    Occurrences(Vec<Occurrence>),
}

pub struct CommandOutput {
    pub result: CommandResult,
    pub inverse: Option<Box<dyn Command>>,
}

impl CommandOutput {
    pub fn done() -> Self {
        Self {
            result: CommandResult::Done,
            inverse: None,
        }
    }

    pub fn reversible(inverse: impl Command + 'static) -> Self {
        Self {
            result: CommandResult::Done,
            inverse: Some(Box::new(inverse)),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            result: CommandResult::Rejected(message.into()),
            inverse: None,
        }
    }

    pub fn occurrences(found: Vec<Occurrence>) -> Self {
        Self {
            result: CommandResult::Occurrences(found),
            inverse: None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.result, CommandResult::Rejected(_))
    }
}

/// A single edit operation.
pub trait Command {
    fn name(&self) -> &'static str;

    /// Whether execution mutates data; modifying commands are suppressed
    /// against read-only and excluded targets.
    fn modifying(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError>;
}

/// In-order execution with all-or-nothing semantics: when a member fails
/// or is rejected, the inverses accumulated so far roll the earlier
/// members back before the outcome surfaces.
pub struct CompositeCommand {
    name: &'static str,
    commands: Vec<Box<dyn Command>>,
}

impl CompositeCommand {
    pub fn new(name: &'static str, commands: Vec<Box<dyn Command>>) -> Self {
        Self { name, commands }
    }
}

impl Command for CompositeCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let mut rollback = Rollback::new();
        for command in &self.commands {
            let output = match command.execute(ctx) {
                Ok(output) => output,
                Err(err) => {
                    rollback.run(ctx);
                    return Err(err);
                }
            };
            if output.is_rejected() {
                rollback.run(ctx);
                return Ok(output);
            }
            if let Some(inverse) = output.inverse {
                rollback.push(inverse);
            }
        }
        Ok(rollback.into_inverse(self.name))
    }
}

/// Accumulated inverses of the composite members executed so far.
struct Rollback {
    inverses: Vec<Box<dyn Command>>,
}

impl Rollback {
    fn new() -> Self {
        Self {
            inverses: Vec::new(),
        }
    }

    fn push(&mut self, inverse: Box<dyn Command>) {
        self.inverses.push(inverse);
    }

    /// Undo the applied members, newest first. Rollback failures are
    /// logged, not propagated; the original outcome wins.
    fn run(&mut self, ctx: &mut Context) {
        while let Some(inverse) = self.inverses.pop() {
            if let Err(err) = inverse.execute(ctx) {
                tracing::error!(command = inverse.name(), %err, "rollback step failed");
            }
        }
    }

    /// Completed composite: inverses compose in reverse order.
    fn into_inverse(mut self, name: &'static str) -> CommandOutput {
        if self.inverses.is_empty() {
            return CommandOutput::done();
        }
        self.inverses.reverse();
        CommandOutput::reversible(CompositeCommand::new(name, self.inverses))
    }
}

/// Composite that additionally folds the members' steps-changed
/// notifications into a single event.
pub struct StepsChangingCompositeCommand {
    inner: CompositeCommand,
}

impl StepsChangingCompositeCommand {
    pub fn new(name: &'static str, commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            inner: CompositeCommand::new(name, commands),
        }
    }
}

impl Command for StepsChangingCompositeCommand {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let was_suppressed = ctx.suppress_steps_events;
        ctx.suppress_steps_events = true;
        let result = self.inner.execute(ctx);
        ctx.suppress_steps_events = was_suppressed;
        let output = result?;
        if !output.is_rejected() {
            ctx.notify_steps_changed();
        }
        Ok(output)
    }
}
