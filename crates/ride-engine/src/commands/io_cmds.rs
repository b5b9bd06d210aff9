//! Save commands. Writes go through [`crate::io::serialize_file`], so a
//! failed save never loses the previous file contents.

use crate::commands::{Command, CommandOutput, Context};
use crate::error::CommandError;
use crate::io::{WriteOptions, serialize_file};
use crate::messages::RideMessage;

/// Save the targeted file. Clean files are skipped unless `reformat` is
/// set, which rewrites them with the current serialisation settings.
pub struct SaveFile {
    pub reformat: bool,
}

impl SaveFile {
    pub fn new() -> Self {
        Self { reformat: false }
    }
}

impl Default for SaveFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for SaveFile {
    fn name(&self) -> &'static str {
        "save file"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let node = ctx.node()?;
        if node.is_directory() {
            return Ok(CommandOutput::done());
        }
        if !node.dirty && !self.reformat {
            return Ok(CommandOutput::done());
        }
        let path = node.data.source.clone();
        ctx.publish(RideMessage::BeforeSaving { path: path.clone() });
        let options = WriteOptions::from_settings(ctx.settings);
        if let Err(err) = serialize_file(ctx.parser, &ctx.node()?.data, &options) {
            tracing::error!(path = %path.display(), %err, "save failed");
            ctx.publish(RideMessage::Log {
                message: format!("could not save {}: {err}", path.display()),
            });
            // The backup restore may have touched the file on disk.
            ctx.node_mut()?.refresh_stat();
            return Err(err);
        }
        let node = ctx.node_mut()?;
        let was_dirty = node.clear_dirty();
        node.refresh_stat();
        ctx.publish(RideMessage::Saved { path: path.clone() });
        if was_dirty {
            ctx.publish(RideMessage::DataDirtyCleared { path });
        }
        Ok(CommandOutput::done())
    }
}

/// Save every dirty file in the project. One failing file does not stop
/// the others; failures are reported in a single log message at the end.
pub struct SaveAll {
    pub reformat: bool,
}

impl SaveAll {
    pub fn new() -> Self {
        Self { reformat: false }
    }
}

impl Default for SaveAll {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for SaveAll {
    fn name(&self) -> &'static str {
        "save all"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let options = WriteOptions::from_settings(ctx.settings);
        let mut failures = Vec::new();
        for id in ctx.tree.datafiles() {
            let Some(node) = ctx.tree.node(id) else {
                continue;
            };
            if node.is_directory() || (!node.dirty && !self.reformat) {
                continue;
            }
            let path = node.data.source.clone();
            ctx.publish(RideMessage::BeforeSaving { path: path.clone() });
            match serialize_file(ctx.parser, &node.data, &options) {
                Ok(()) => {
                    let Some(node) = ctx.tree.node_mut(id) else {
                        continue;
                    };
                    let was_dirty = node.clear_dirty();
                    node.refresh_stat();
                    ctx.publish(RideMessage::Saved { path: path.clone() });
                    if was_dirty {
                        ctx.publish(RideMessage::DataDirtyCleared { path });
                    }
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "save failed");
                    if let Some(node) = ctx.tree.node_mut(id) {
                        node.refresh_stat();
                    }
                    failures.push((path, err));
                }
            }
        }
        if !failures.is_empty() {
            let listing = failures
                .iter()
                .map(|(path, err)| format!("{}: {err}", path.display()))
                .collect::<Vec<_>>()
                .join("\n");
            ctx.publish(RideMessage::Log {
                message: format!("could not save:\n{listing}"),
            });
        }
        ctx.publish(RideMessage::SaveAll);
        Ok(CommandOutput::done())
    }
}
