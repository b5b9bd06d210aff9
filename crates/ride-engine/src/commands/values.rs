//! Settings, import and variable commands.

use ride_syntax::variables::is_variable;

use crate::commands::{Command, CommandOutput, Context};
use crate::controller::ItemRef;
use crate::error::CommandError;
use crate::messages::RideMessage;
use crate::model::{Import, Step, Variable};

/// Which setting of the target item a [`SetValues`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingTarget {
    Documentation,
    Setup,
    Teardown,
    Template,
    Timeout,
    Tags,
    Arguments,
    ReturnValues,
    ForceTags,
    DefaultTags,
    SuiteSetup,
    SuiteTeardown,
    TestSetup,
    TestTeardown,
    TestTemplate,
    TestTimeout,
}

/// Replace a setting's value list. The empty list clears the setting.
pub struct SetValues {
    pub setting: SettingTarget,
    pub values: Vec<String>,
}

impl SetValues {
    pub fn new(setting: SettingTarget, values: Vec<String>) -> Self {
        Self { setting, values }
    }
}

impl Command for SetValues {
    fn name(&self) -> &'static str {
        "set values"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let item = ctx.target.item;
        let node = ctx.node_mut()?;
        let old = read_setting(&node.data, item, self.setting)?;
        write_setting(&mut node.data, item, self.setting, &self.values)?;
        ctx.mark_dirty()?;
        Ok(CommandOutput::reversible(SetValues {
            setting: self.setting,
            values: old,
        }))
    }
}

fn read_setting(
    data: &crate::model::DataFile,
    item: ItemRef,
    setting: SettingTarget,
) -> Result<Vec<String>, CommandError> {
    use SettingTarget::*;
    let values = match (item, setting) {
        (ItemRef::Test(i), _) => {
            let test = data
                .tests
                .get(i)
                .ok_or_else(|| CommandError::InvalidTarget(format!("no test {i}")))?;
            match setting {
                Documentation => doc_values(&test.doc),
                Setup => step_values(&test.setup),
                Teardown => step_values(&test.teardown),
                Template => opt_values(&test.template),
                Timeout => opt_values(&test.timeout),
                Tags => test.tags.clone(),
                _ => return Err(bad_setting(setting)),
            }
        }
        (ItemRef::Keyword(i), _) => {
            let kw = data
                .keywords
                .get(i)
                .ok_or_else(|| CommandError::InvalidTarget(format!("no keyword {i}")))?;
            match setting {
                Documentation => doc_values(&kw.doc),
                Teardown => step_values(&kw.teardown),
                Timeout => opt_values(&kw.timeout),
                Tags => kw.tags.clone(),
                Arguments => kw.args.clone(),
                ReturnValues => kw.return_values.clone(),
                _ => return Err(bad_setting(setting)),
            }
        }
        (ItemRef::File, _) => {
            let table = &data.setting_table;
            match setting {
                Documentation => doc_values(&table.doc),
                SuiteSetup => step_values(&table.suite_setup),
                SuiteTeardown => step_values(&table.suite_teardown),
                TestSetup => step_values(&table.test_setup),
                TestTeardown => step_values(&table.test_teardown),
                ForceTags => table.force_tags.clone(),
                DefaultTags => table.default_tags.clone(),
                TestTemplate => opt_values(&table.test_template),
                TestTimeout => opt_values(&table.test_timeout),
                _ => return Err(bad_setting(setting)),
            }
        }
        _ => return Err(bad_setting(setting)),
    };
    Ok(values)
}

fn write_setting(
    data: &mut crate::model::DataFile,
    item: ItemRef,
    setting: SettingTarget,
    values: &[String],
) -> Result<(), CommandError> {
    use SettingTarget::*;
    match (item, setting) {
        (ItemRef::Test(i), _) => {
            let test = data
                .tests
                .get_mut(i)
                .ok_or_else(|| CommandError::InvalidTarget(format!("no test {i}")))?;
            match setting {
                Documentation => test.doc = join_doc(values),
                Setup => test.setup = to_step(values),
                Teardown => test.teardown = to_step(values),
                Template => test.template = to_opt(values),
                Timeout => test.timeout = to_opt(values),
                Tags => test.tags = values.to_vec(),
                _ => return Err(bad_setting(setting)),
            }
        }
        (ItemRef::Keyword(i), _) => {
            let kw = data
                .keywords
                .get_mut(i)
                .ok_or_else(|| CommandError::InvalidTarget(format!("no keyword {i}")))?;
            match setting {
                Documentation => kw.doc = join_doc(values),
                Teardown => kw.teardown = to_step(values),
                Timeout => kw.timeout = to_opt(values),
                Tags => kw.tags = values.to_vec(),
                Arguments => kw.args = values.to_vec(),
                ReturnValues => kw.return_values = values.to_vec(),
                _ => return Err(bad_setting(setting)),
            }
        }
        (ItemRef::File, _) => {
            let table = &mut data.setting_table;
            match setting {
                Documentation => table.doc = join_doc(values),
                SuiteSetup => table.suite_setup = to_step(values),
                SuiteTeardown => table.suite_teardown = to_step(values),
                TestSetup => table.test_setup = to_step(values),
                TestTeardown => table.test_teardown = to_step(values),
                ForceTags => table.force_tags = values.to_vec(),
                DefaultTags => table.default_tags = values.to_vec(),
                TestTemplate => table.test_template = to_opt(values),
                TestTimeout => table.test_timeout = to_opt(values),
                _ => return Err(bad_setting(setting)),
            }
        }
        _ => return Err(bad_setting(setting)),
    }
    Ok(())
}

fn bad_setting(setting: SettingTarget) -> CommandError {
    CommandError::InvalidTarget(format!("{setting:?} does not apply to this item"))
}

fn doc_values(doc: &str) -> Vec<String> {
    if doc.is_empty() {
        Vec::new()
    } else {
        vec![doc.to_string()]
    }
}

fn join_doc(values: &[String]) -> String {
    values.join(" ")
}

fn step_values(step: &Option<Step>) -> Vec<String> {
    step.as_ref().map(|s| s.cells.clone()).unwrap_or_default()
}

fn to_step(values: &[String]) -> Option<Step> {
    if values.is_empty() {
        None
    } else {
        Some(Step::new(values.to_vec()))
    }
}

fn opt_values(value: &Option<String>) -> Vec<String> {
    value.iter().cloned().collect()
}

fn to_opt(values: &[String]) -> Option<String> {
    values.first().filter(|v| !v.is_empty()).cloned()
}

pub struct AddLibrary {
    pub name: String,
    pub args: Vec<String>,
    pub alias: Option<String>,
}

impl Command for AddLibrary {
    fn name(&self) -> &'static str {
        "add library"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let import = Import::library(&self.name, self.args.clone(), self.alias.clone());
        add_import(ctx, import)
    }
}

pub struct AddResource {
    pub path: String,
}

impl Command for AddResource {
    fn name(&self) -> &'static str {
        "add resource"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        add_import(ctx, Import::resource(&self.path))
    }
}

pub struct AddVariablesFileImport {
    pub path: String,
    pub args: Vec<String>,
}

impl Command for AddVariablesFileImport {
    fn name(&self) -> &'static str {
        "add variables import"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        add_import(ctx, Import::variables(&self.path, self.args.clone()))
    }
}

fn add_import(ctx: &mut Context, import: Import) -> Result<CommandOutput, CommandError> {
    let name = import.name.clone();
    let node = ctx.node_mut()?;
    node.data.setting_table.imports.push(import);
    let index = node.data.setting_table.imports.len() - 1;
    ctx.tree.invalidate_resolution();
    ctx.mark_dirty()?;
    ctx.publish(RideMessage::ImportSettingAdded { name });
    Ok(CommandOutput::reversible(RemoveImportAt { index }))
}

pub(crate) struct RemoveImportAt {
    pub index: usize,
}

impl Command for RemoveImportAt {
    fn name(&self) -> &'static str {
        "remove import"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        if index >= node.data.setting_table.imports.len() {
            return Err(CommandError::InvalidTarget(format!("no import {index}")));
        }
        let removed = node.data.setting_table.imports.remove(index);
        ctx.tree.invalidate_resolution();
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::ImportSettingRemoved {
            name: removed.name.clone(),
        });
        Ok(CommandOutput::reversible(InsertImportAt {
            index,
            import: removed,
        }))
    }
}

pub(crate) struct InsertImportAt {
    pub index: usize,
    pub import: Import,
}

impl Command for InsertImportAt {
    fn name(&self) -> &'static str {
        "insert import"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        let at = index.min(node.data.setting_table.imports.len());
        node.data.setting_table.imports.insert(at, self.import.clone());
        ctx.tree.invalidate_resolution();
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::ImportSettingAdded {
            name: self.import.name.clone(),
        });
        Ok(CommandOutput::reversible(RemoveImportAt { index: at }))
    }
}

/// Add a variable to the file's variable table. Names must carry a valid
/// sigil form and be unique under normalisation.
pub struct AddVariable {
    pub name: String,
    pub values: Vec<String>,
    pub comment: Option<String>,
}

impl Command for AddVariable {
    fn name(&self) -> &'static str {
        "add variable"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if !is_variable(self.name.trim()) {
            return Ok(ctx.reject(format!("invalid variable name: {}", self.name)));
        }
        if ctx.node()?.data.variable_table.contains(&self.name) {
            return Ok(ctx.reject(format!("variable {} already exists", self.name)));
        }
        let mut variable = Variable::new(self.name.trim(), self.values.clone());
        variable.comment = self.comment.clone();
        let node = ctx.node_mut()?;
        node.data.variable_table.variables.push(variable);
        let index = node.data.variable_table.variables.len() - 1;
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableAdded {
            name: self.name.clone(),
        });
        Ok(CommandOutput::reversible(RemoveVariable { index }))
    }
}

pub struct RemoveVariable {
    pub index: usize,
}

impl Command for RemoveVariable {
    fn name(&self) -> &'static str {
        "remove variable"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        if index >= node.data.variable_table.variables.len() {
            return Err(CommandError::InvalidTarget(format!("no variable {index}")));
        }
        let removed = node.data.variable_table.variables.remove(index);
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableRemoved {
            name: removed.name.clone(),
        });
        Ok(CommandOutput::reversible(InsertVariableAt {
            index,
            variable: removed,
        }))
    }
}

pub(crate) struct InsertVariableAt {
    pub index: usize,
    pub variable: Variable,
}

impl Command for InsertVariableAt {
    fn name(&self) -> &'static str {
        "insert variable"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node_mut()?;
        let at = self.index.min(node.data.variable_table.variables.len());
        node.data
            .variable_table
            .variables
            .insert(at, self.variable.clone());
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableAdded {
            name: self.variable.name.clone(),
        });
        Ok(CommandOutput::reversible(RemoveVariable { index: at }))
    }
}

pub struct UpdateVariable {
    pub index: usize,
    pub values: Vec<String>,
    pub comment: Option<String>,
}

impl Command for UpdateVariable {
    fn name(&self) -> &'static str {
        "update variable"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        let variable = node
            .data
            .variable_table
            .variables
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no variable {index}")))?;
        let old_values = std::mem::replace(&mut variable.values, self.values.clone());
        let old_comment = std::mem::replace(&mut variable.comment, self.comment.clone());
        let name = variable.name.clone();
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableUpdated { name });
        Ok(CommandOutput::reversible(UpdateVariable {
            index,
            values: old_values,
            comment: old_comment,
        }))
    }
}

pub struct UpdateVariableName {
    pub index: usize,
    pub new_name: String,
}

impl Command for UpdateVariableName {
    fn name(&self) -> &'static str {
        "update variable name"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if !is_variable(self.new_name.trim()) {
            return Ok(ctx.reject(format!("invalid variable name: {}", self.new_name)));
        }
        let index = self.index;
        let table = &ctx.node()?.data.variable_table;
        let taken = table
            .position(&self.new_name)
            .is_some_and(|pos| pos != index);
        if taken {
            return Ok(ctx.reject(format!("variable {} already exists", self.new_name)));
        }
        let node = ctx.node_mut()?;
        let variable = node
            .data
            .variable_table
            .variables
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no variable {index}")))?;
        let old = std::mem::replace(&mut variable.name, self.new_name.trim().to_string());
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableUpdated {
            name: self.new_name.clone(),
        });
        Ok(CommandOutput::reversible(UpdateVariableName {
            index,
            new_name: old,
        }))
    }
}

pub struct MoveVariableUp {
    pub index: usize,
}

impl Command for MoveVariableUp {
    fn name(&self) -> &'static str {
        "move variable up"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        let variables = &mut node.data.variable_table.variables;
        if index == 0 || index >= variables.len() {
            return Ok(CommandOutput::rejected("variable cannot move up"));
        }
        variables.swap(index, index - 1);
        let name = variables[index - 1].name.clone();
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableMovedUp { name });
        Ok(CommandOutput::reversible(MoveVariableDown {
            index: index - 1,
        }))
    }
}

pub struct MoveVariableDown {
    pub index: usize,
}

impl Command for MoveVariableDown {
    fn name(&self) -> &'static str {
        "move variable down"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let node = ctx.node_mut()?;
        let variables = &mut node.data.variable_table.variables;
        if index + 1 >= variables.len() {
            return Ok(CommandOutput::rejected("variable cannot move down"));
        }
        variables.swap(index, index + 1);
        let name = variables[index + 1].name.clone();
        ctx.mark_dirty()?;
        ctx.publish(RideMessage::VariableMovedDown { name });
        Ok(CommandOutput::reversible(MoveVariableUp { index: index + 1 }))
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
    fn set_values_round_trips_suite_documentation() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(SetValues::new(
            SettingTarget::Documentation,
            vec!["A suite".to_string()],
        ))
        .unwrap();
        assert_eq!(fx.node().data.setting_table.doc, "A suite");
        fx.undo().unwrap();
        assert_eq!(fx.node().data.setting_table.doc, "");
        fx.redo().unwrap();
        assert_eq!(fx.node().data.setting_table.doc, "A suite");
    }

    #[test]
    fn add_library_and_undo() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddLibrary {
            name: "Collections".to_string(),
            args: vec![],
            alias: None,
        })
        .unwrap();
        assert_eq!(fx.node().data.setting_table.imports.len(), 1);
        assert!(fx.topics().contains(&"ride.import.setting.added".to_string()));
        fx.undo().unwrap();
        assert!(fx.node().data.setting_table.imports.is_empty());
    }

    #[test]
    fn add_variable_rejects_duplicates_with_one_event() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddVariable {
            name: "${HOST}".to_string(),
            values: vec!["localhost".to_string()],
            comment: None,
        })
        .unwrap();
        fx.clear_topics();

        let result = fx
            .execute(AddVariable {
                name: "${host}".to_string(),
                values: vec!["other".to_string()],
                comment: None,
            })
            .unwrap();
        assert!(matches!(result, CommandResult::Rejected(_)));
        assert_eq!(
            fx.topics(),
            vec!["ride.input.validation.error".to_string()]
        );
        assert_eq!(fx.node().data.variable_table.variables.len(), 1);
    }

    #[test]
    fn variable_rename_keeps_uniqueness() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddVariable {
            name: "${A}".to_string(),
            values: vec![],
            comment: None,
        })
        .unwrap();
        fx.execute(AddVariable {
            name: "${B}".to_string(),
            values: vec![],
            comment: None,
        })
        .unwrap();

        let result = fx
            .execute(UpdateVariableName {
                index: 1,
                new_name: "${a}".to_string(),
            })
            .unwrap();
        assert!(matches!(result, CommandResult::Rejected(_)));

        fx.execute(UpdateVariableName {
            index: 1,
            new_name: "${C}".to_string(),
        })
        .unwrap();
        assert_eq!(fx.node().data.variable_table.variables[1].name, "${C}");
        fx.undo().unwrap();
        assert_eq!(fx.node().data.variable_table.variables[1].name, "${B}");
    }

    #[test]
    fn move_variable_up_and_down() {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        for name in ["${A}", "${B}"] {
            fx.execute(AddVariable {
                name: name.to_string(),
                values: vec![],
                comment: None,
            })
            .unwrap();
        }
        fx.execute(MoveVariableUp { index: 1 }).unwrap();
        assert_eq!(fx.node().data.variable_table.variables[0].name, "${B}");
        fx.undo().unwrap();
        assert_eq!(fx.node().data.variable_table.variables[0].name, "${A}");

        let result = fx.execute(MoveVariableUp { index: 0 }).unwrap();
        assert!(matches!(result, CommandResult::Rejected(_)));
    }
}
