//! Step editing commands. All of them target a test case or user keyword
//! and operate on its flat step list.

use crate::commands::{Command, CommandOutput, Context};
use crate::error::CommandError;
use crate::messages::RideMessage;
use crate::model::{Step, name_taken, normalize};
use crate::namespace::validate_keyword_name;

/// Swap the whole step list; inverse of the multi-row edits.
pub(crate) struct ReplaceSteps {
    pub steps: Vec<Step>,
}

impl Command for ReplaceSteps {
    fn name(&self) -> &'static str {
        "replace steps"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let old = std::mem::replace(ctx.steps_mut()?, self.steps.clone());
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(ReplaceSteps { steps: old }))
    }
}

/// Swap one row; inverse of the single-row text transforms.
pub(crate) struct ReplaceRow {
    pub index: usize,
    pub step: Step,
}

impl Command for ReplaceRow {
    fn name(&self) -> &'static str {
        "replace row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let steps = ctx.steps_mut()?;
        let old = steps
            .get_mut(self.index)
            .map(|row| std::mem::replace(row, self.step.clone()))
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {}", self.index)))?;
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(ReplaceRow {
            index: self.index,
            step: old,
        }))
    }
}

/// Set or insert a cell value. Rows are padded with empty steps when the
/// row index is past the end; embedded newlines become literal `\n`.
pub struct ChangeCellValue {
    pub row: usize,
    pub col: usize,
    pub value: String,
    pub insert: bool,
}

impl ChangeCellValue {
    pub fn new(row: usize, col: usize, value: impl Into<String>) -> Self {
        Self {
            row,
            col,
            value: value.into(),
            insert: false,
        }
    }

    pub fn inserting(mut self) -> Self {
        self.insert = true;
        self
    }
}

impl Command for ChangeCellValue {
    fn name(&self) -> &'static str {
        "change cell value"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let snapshot = ctx.steps()?.clone();
        let escaped = self.value.replace('\n', "\\n");
        let steps = ctx.steps_mut()?;
        while steps.len() <= self.row {
            steps.push(Step::default());
        }
        if self.insert {
            steps[self.row].insert_cell(self.col, escaped);
        } else {
            steps[self.row].change_cell(self.col, escaped);
        }
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(ReplaceSteps { steps: snapshot }))
    }
}

/// Insert a cell, shifting the rest of the row right.
pub struct InsertCell {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

impl InsertCell {
    pub fn empty(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            value: String::new(),
        }
    }
}

impl Command for InsertCell {
    fn name(&self) -> &'static str {
        "insert cell"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let row = self.row;
        let steps = ctx.steps_mut()?;
        let step = steps
            .get_mut(row)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {row}")))?;
        step.insert_cell(self.col, self.value.clone());
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(DeleteCell {
            row: self.row,
            col: self.col,
        }))
    }
}

/// Remove a cell, shifting the rest of the row left.
pub struct DeleteCell {
    pub row: usize,
    pub col: usize,
}

impl Command for DeleteCell {
    fn name(&self) -> &'static str {
        "delete cell"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let row = self.row;
        let steps = ctx.steps_mut()?;
        let step = steps
            .get_mut(row)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {row}")))?;
        let Some(removed) = step.delete_cell(self.col) else {
            return Ok(CommandOutput::done());
        };
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(InsertCell {
            row: self.row,
            col: self.col,
            value: removed,
        }))
    }
}

/// Insert a row at `index`, or append with `None`.
pub struct AddRow {
    pub index: Option<usize>,
    pub step: Step,
}

impl AddRow {
    pub fn empty(index: Option<usize>) -> Self {
        Self {
            index,
            step: Step::default(),
        }
    }
}

impl Command for AddRow {
    fn name(&self) -> &'static str {
        "add row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let steps = ctx.steps_mut()?;
        let index = self.index.unwrap_or(steps.len()).min(steps.len());
        steps.insert(index, self.step.clone());
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(DeleteRow { index }))
    }
}

pub struct DeleteRow {
    pub index: usize,
}

impl Command for DeleteRow {
    fn name(&self) -> &'static str {
        "delete row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let steps = ctx.steps_mut()?;
        if index >= steps.len() {
            return Err(CommandError::InvalidTarget(format!("no row {index}")));
        }
        let removed = steps.remove(index);
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(AddRow {
            index: Some(index),
            step: removed,
        }))
    }
}

/// Disable a row by routing it through the `Comment` built-in.
pub struct CommentRow {
    pub index: usize,
}

impl Command for CommentRow {
    fn name(&self) -> &'static str {
        "comment row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let steps = ctx.steps_mut()?;
        let step = steps
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {index}")))?;
        let at = step.indent();
        step.insert_cell(at, "Comment".to_string());
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(UncommentRow { index }))
    }
}

pub struct UncommentRow {
    pub index: usize,
}

impl Command for UncommentRow {
    fn name(&self) -> &'static str {
        "uncomment row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let steps = ctx.steps_mut()?;
        let step = steps
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {index}")))?;
        let at = step.indent();
        let is_comment_call = step
            .cells
            .get(at)
            .is_some_and(|c| c.eq_ignore_ascii_case("Comment"));
        if !is_comment_call {
            return Ok(CommandOutput::done());
        }
        step.delete_cell(at);
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(CommentRow { index }))
    }
}

/// Disable a row with a literal `# ` prefix.
pub struct SharpCommentRow {
    pub index: usize,
}

impl Command for SharpCommentRow {
    fn name(&self) -> &'static str {
        "sharp comment row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let steps = ctx.steps_mut()?;
        let step = steps
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {index}")))?;
        let old = step.clone();
        let at = step.indent();
        let Some(cell) = step.cells.get_mut(at) else {
            return Ok(CommandOutput::done());
        };
        *cell = format!("# {cell}");
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(ReplaceRow { index, step: old }))
    }
}

pub struct SharpUncommentRow {
    pub index: usize,
}

impl Command for SharpUncommentRow {
    fn name(&self) -> &'static str {
        "sharp uncomment row"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let index = self.index;
        let steps = ctx.steps_mut()?;
        let step = steps
            .get_mut(index)
            .ok_or_else(|| CommandError::InvalidTarget(format!("no row {index}")))?;
        let old = step.clone();
        let at = step.indent();
        let Some(cell) = step.cells.get_mut(at) else {
            return Ok(CommandOutput::done());
        };
        let stripped = cell
            .strip_prefix("# ")
            .or_else(|| cell.strip_prefix('#'))
            .map(str::to_string);
        let Some(stripped) = stripped else {
            return Ok(CommandOutput::done());
        };
        *cell = stripped;
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(ReplaceRow { index, step: old }))
    }
}

/// Move the given rows one position up, adjusting block indentation when
/// a row crosses a FOR/IF/WHILE/TRY/GROUP opener or an `END`.
pub struct MoveRowsUp {
    pub rows: Vec<usize>,
}

impl Command for MoveRowsUp {
    fn name(&self) -> &'static str {
        "move rows up"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let snapshot = ctx.steps()?.clone();
        let steps = ctx.steps_mut()?;
        let mut rows = self.rows.clone();
        rows.sort_unstable();
        rows.dedup();
        if rows.is_empty() || rows[0] == 0 || rows.iter().any(|r| *r >= steps.len()) {
            return Ok(CommandOutput::rejected("rows cannot move up"));
        }
        for &row in &rows {
            move_row_up(steps, row);
        }
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        ctx.publish(RideMessage::ItemMovedUp {
            item: ctx.item_name(),
        });
        Ok(CommandOutput::reversible(ReplaceSteps { steps: snapshot }))
    }
}

pub struct MoveRowsDown {
    pub rows: Vec<usize>,
}

impl Command for MoveRowsDown {
    fn name(&self) -> &'static str {
        "move rows down"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let snapshot = ctx.steps()?.clone();
        let steps = ctx.steps_mut()?;
        let mut rows = self.rows.clone();
        rows.sort_unstable();
        rows.dedup();
        let last_ok = rows.last().is_some_and(|r| r + 1 < steps.len());
        if rows.is_empty() || !last_ok {
            return Ok(CommandOutput::rejected("rows cannot move down"));
        }
        for &row in rows.iter().rev() {
            move_row_down(steps, row);
        }
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        ctx.publish(RideMessage::ItemMovedDown {
            item: ctx.item_name(),
        });
        Ok(CommandOutput::reversible(ReplaceSteps { steps: snapshot }))
    }
}

/// A row moving up past `END` enters the block below it and gains one
/// indent level (`END` itself never does); past an opener it leaves the
/// block and loses one. A moved opener pulls the exchanged row into its
/// block. Row count is untouched in every case.
fn move_row_up(steps: &mut [Step], i: usize) {
    let above_is_end = steps[i - 1].is_end();
    let above_is_opener = steps[i - 1].is_indent_start();
    let moved_is_opener = steps[i].is_indent_start();
    let moved_is_end = steps[i].is_end();
    steps.swap(i, i - 1);
    // moved row is now at i-1, the exchanged row at i
    if above_is_end && !moved_is_end {
        steps[i - 1].add_indent();
    }
    if above_is_opener {
        steps[i - 1].dedent();
    }
    if moved_is_opener {
        steps[i].add_indent();
    }
}

fn move_row_down(steps: &mut [Step], i: usize) {
    let below_is_end = steps[i + 1].is_end();
    let below_is_opener = steps[i + 1].is_indent_start();
    let moved_is_opener = steps[i].is_indent_start();
    let moved_is_end = steps[i].is_end();
    steps.swap(i, i + 1);
    // moved row is now at i+1, the exchanged row at i
    if below_is_opener && !moved_is_end {
        steps[i + 1].add_indent();
    }
    if below_is_end {
        steps[i + 1].dedent();
    }
    if moved_is_opener {
        steps[i].dedent();
    }
}

/// Pull rows `start..=end` out into a new user keyword and replace them
/// with a call to it.
pub struct ExtractKeyword {
    pub new_name: String,
    pub start: usize,
    pub end: usize,
}

impl Command for ExtractKeyword {
    fn name(&self) -> &'static str {
        "extract keyword"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if let Err(message) = validate_keyword_name(&self.new_name) {
            return Ok(ctx.reject(message));
        }
        if name_taken(ctx.node()?.data.keyword_names(), &self.new_name) {
            return Ok(ctx.reject(format!("keyword {} already exists", self.new_name)));
        }
        let snapshot = ctx.steps()?.clone();
        if self.start > self.end || self.end >= snapshot.len() {
            return Err(CommandError::InvalidTarget(format!(
                "rows {}..{} out of range",
                self.start, self.end
            )));
        }
        let steps = ctx.steps_mut()?;
        let extracted: Vec<Step> = steps.drain(self.start..=self.end).collect();
        steps.insert(self.start, Step::new(vec![self.new_name.clone()]));

        let keyword = crate::model::UserKeyword::new(&self.new_name).with_steps(extracted);
        ctx.node_mut()?.data.keywords.push(keyword);

        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        ctx.publish(RideMessage::UserKeywordAdded {
            name: self.new_name.clone(),
        });
        Ok(CommandOutput::reversible(UnextractKeyword {
            steps: snapshot,
            keyword_name: self.new_name.clone(),
            start: self.start,
            end: self.end,
        }))
    }
}

/// Inverse of [`ExtractKeyword`]: restores the original rows and removes
/// the keyword it created.
pub(crate) struct UnextractKeyword {
    steps: Vec<Step>,
    keyword_name: String,
    start: usize,
    end: usize,
}

impl Command for UnextractKeyword {
    fn name(&self) -> &'static str {
        "unextract keyword"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        *ctx.steps_mut()? = self.steps.clone();
        let wanted = normalize(&self.keyword_name);
        let node = ctx.node_mut()?;
        if let Some(pos) = node
            .data
            .keywords
            .iter()
            .rposition(|kw| normalize(&kw.name) == wanted)
        {
            node.data.keywords.remove(pos);
        }
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        ctx.publish(RideMessage::UserKeywordRemoved {
            name: self.keyword_name.clone(),
        });
        Ok(CommandOutput::reversible(ExtractKeyword {
            new_name: self.keyword_name.clone(),
            start: self.start,
            end: self.end,
        }))
    }
}

/// Drop empty rows and strip trailing empty cells from the survivors.
pub struct Purify;

impl Command for Purify {
    fn name(&self) -> &'static str {
        "purify"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let snapshot = ctx.steps()?.clone();
        let steps = ctx.steps_mut()?;
        steps.retain(|step| !step.is_empty());
        for step in steps.iter_mut() {
            while step.cells.last().is_some_and(String::is_empty) {
                step.cells.pop();
            }
        }
        if *ctx.steps()? == snapshot {
            return Ok(CommandOutput::done());
        }
        ctx.mark_dirty()?;
        ctx.notify_steps_changed();
        Ok(CommandOutput::reversible(ReplaceSteps { steps: snapshot }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::Fixture;
    use pretty_assertions::assert_eq;

    fn rows(cells: &[&[&str]]) -> Vec<Step> {
        cells.iter().map(|row| Step::from_strs(row)).collect()
    }

    #[test]
    fn change_cell_pads_rows_and_escapes_newlines() {
        let mut fx = Fixture::with_steps(rows(&[&["Log", "x"]]));
        fx.execute(ChangeCellValue::new(2, 1, "a\nb")).unwrap();
        let steps = fx.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].cells, vec!["", "a\\nb"]);
        assert!(fx.node().dirty);
    }

    #[test]
    fn change_cell_undo_removes_padding() {
        let mut fx = Fixture::with_steps(rows(&[&["Log", "x"]]));
        fx.execute(ChangeCellValue::new(3, 0, "late")).unwrap();
        fx.undo().unwrap();
        assert_eq!(fx.steps(), rows(&[&["Log", "x"]]));
    }

    #[test]
    fn insert_and_delete_cell_are_inverses() {
        let mut fx = Fixture::with_steps(rows(&[&["Log", "one", "two"]]));
        fx.execute(DeleteCell { row: 0, col: 1 }).unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["Log", "two"]);
        fx.undo().unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["Log", "one", "two"]);
        fx.redo().unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["Log", "two"]);
    }

    #[test]
    fn comment_row_wraps_and_uncomment_restores() {
        let mut fx = Fixture::with_steps(rows(&[&["", "Log", "x"]]));
        fx.execute(CommentRow { index: 0 }).unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["", "Comment", "Log", "x"]);
        fx.execute(UncommentRow { index: 0 }).unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["", "Log", "x"]);
    }

    #[test]
    fn sharp_comment_round_trips_through_undo() {
        let mut fx = Fixture::with_steps(rows(&[&["Log", "x"]]));
        fx.execute(SharpCommentRow { index: 0 }).unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["# Log", "x"]);
        fx.execute(SharpUncommentRow { index: 0 }).unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["Log", "x"]);
        fx.undo().unwrap();
        assert_eq!(fx.steps()[0].cells, vec!["# Log", "x"]);
    }

    #[test]
    fn move_up_at_top_is_rejected_without_changes() {
        let mut fx = Fixture::with_steps(rows(&[&["Log", "a"], &["Log", "b"]]));
        let result = fx.execute(MoveRowsUp { rows: vec![0] }).unwrap();
        assert!(matches!(
            result,
            crate::commands::CommandResult::Rejected(_)
        ));
        assert!(!fx.node().dirty);
    }

    #[test]
    fn moving_down_into_a_for_block_gains_indent() {
        let mut fx = Fixture::with_steps(rows(&[
            &["Log", "before"],
            &["FOR", "${i}", "IN", "a", "b"],
            &["", "Log", "${i}"],
            &["END"],
        ]));
        fx.execute(MoveRowsDown { rows: vec![0] }).unwrap();
        let steps = fx.steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].cells[0], "FOR");
        assert_eq!(steps[1].cells, vec!["", "Log", "before"]);
    }

    #[test]
    fn moving_up_out_of_a_block_loses_indent() {
        let mut fx = Fixture::with_steps(rows(&[
            &["FOR", "${i}", "IN", "a"],
            &["", "Log", "${i}"],
            &["END"],
        ]));
        fx.execute(MoveRowsUp { rows: vec![1] }).unwrap();
        let steps = fx.steps();
        assert_eq!(steps[0].cells, vec!["Log", "${i}"]);
        assert_eq!(steps[1].cells[0], "FOR");
    }

    #[test]
    fn end_never_gains_indent_when_moved_up() {
        let mut fx = Fixture::with_steps(rows(&[
            &["FOR", "${i}", "IN", "a"],
            &["", "Log", "one"],
            &["END"],
            &["Log", "after"],
        ]));
        // Move the trailing row up past END: it enters the block.
        fx.execute(MoveRowsUp { rows: vec![3] }).unwrap();
        let steps = fx.steps();
        assert_eq!(steps[2].cells, vec!["", "Log", "after"]);
        assert_eq!(steps[3].cells, vec!["END"]);
        assert_eq!(steps.len(), 4);
    }

    #[test]
    fn move_round_trip_restores_exact_steps() {
        let original = rows(&[
            &["Log", "x"],
            &["FOR", "${i}", "IN", "a"],
            &["", "Log", "${i}"],
            &["END"],
        ]);
        let mut fx = Fixture::with_steps(original.clone());
        fx.execute(MoveRowsDown { rows: vec![0] }).unwrap();
        fx.undo().unwrap();
        assert_eq!(fx.steps(), original);
    }

    #[test]
    fn extract_keyword_replaces_rows_and_creates_keyword() {
        let mut fx = Fixture::with_steps(rows(&[
            &["Open Page"],
            &["Enter Name", "alice"],
            &["Enter Password", "secret"],
            &["Press Login"],
        ]));
        fx.execute(ExtractKeyword {
            new_name: "Fill Credentials".to_string(),
            start: 1,
            end: 2,
        })
        .unwrap();
        let steps = fx.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].cells, vec!["Fill Credentials"]);
        assert_eq!(fx.node().data.keywords.len(), 1);
        assert_eq!(fx.node().data.keywords[0].steps.len(), 2);

        fx.undo().unwrap();
        assert_eq!(fx.steps().len(), 4);
        assert!(fx.node().data.keywords.is_empty());
    }

    #[test]
    fn extract_keyword_rejects_duplicate_names() {
        let mut fx = Fixture::with_steps(rows(&[&["Log", "x"]]));
        fx.node_mut()
            .data
            .keywords
            .push(crate::model::UserKeyword::new("Existing"));
        let result = fx
            .execute(ExtractKeyword {
                new_name: "existing".to_string(),
                start: 0,
                end: 0,
            })
            .unwrap();
        assert!(matches!(
            result,
            crate::commands::CommandResult::Rejected(_)
        ));
        assert_eq!(fx.steps().len(), 1);
    }

    #[test]
    fn purify_drops_empty_rows_and_trailing_cells() {
        let mut fx = Fixture::with_steps(vec![
            Step::from_strs(&["Log", "x", "", ""]),
            Step::from_strs(&["", ""]),
            Step::from_strs(&["Log", "y"]),
        ]);
        fx.execute(Purify).unwrap();
        assert_eq!(fx.steps(), rows(&[&["Log", "x"], &["Log", "y"]]));
        fx.undo().unwrap();
        assert_eq!(fx.steps().len(), 3);
    }
}
