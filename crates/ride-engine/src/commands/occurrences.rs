//! Project-wide keyword and variable usage search, and rename across
//! every usage site.

use std::sync::Arc;

use ride_syntax::variables::{find_variables, variable_base};

use crate::commands::{Command, CommandOutput, Context};
use crate::controller::{CtrlRef, NodeId};
use crate::error::CommandError;
use crate::library::KeywordInfo;
use crate::messages::RideMessage;
use crate::model::{DataFile, Step, eq_normalized};
use crate::namespace::{
    EmbeddedArgsMatcher, name_matches, strip_source_prefix, validate_keyword_name,
};
use crate::observer::LoadObserver;

/// One item that uses a searched name, with how often it does.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub item: CtrlRef,
    pub item_name: String,
    /// The usage text as written at the first hit.
    pub value: String,
    pub count: usize,
}

/// Find every usage of a keyword across the whole project.
///
/// Calls match case- and underscore-insensitively, with embedded-argument
/// placeholders binding any text. A Gherkin prefix on the call is stripped
/// and the rest retried; a `prefix` (the defining file's basename) lets
/// qualified calls like `common.Login` match too.
pub struct FindOccurrences {
    pub keyword_name: String,
    pub prefix: Option<String>,
    /// Already-resolved definition; supplies the canonical name and the
    /// qualifier source without another namespace lookup.
    pub keyword_info: Option<KeywordInfo>,
    observer: Option<Arc<dyn LoadObserver>>,
}

impl FindOccurrences {
    pub fn new(keyword_name: impl Into<String>) -> Self {
        Self {
            keyword_name: keyword_name.into(),
            prefix: None,
            keyword_info: None,
            observer: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_info(mut self, info: KeywordInfo) -> Self {
        self.keyword_info = Some(info);
        self
    }

    /// Attach a cancellation observer; the scan checks it between files.
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn target_name(&self) -> &str {
        self.keyword_info
            .as_ref()
            .map_or(&self.keyword_name, |info| info.name.as_str())
    }

    fn qualifier(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .or_else(|| self.keyword_info.as_ref().map(|info| info.source.as_str()))
    }

    fn matches(&self, ctx: &Context, cell: &str) -> bool {
        call_matches(ctx, self.target_name(), self.qualifier(), cell)
    }
}

impl Command for FindOccurrences {
    fn name(&self) -> &'static str {
        "find occurrences"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let mut found = Vec::new();
        for id in ctx.tree.datafiles() {
            if let Some(observer) = &self.observer
                && !observer.notify()
            {
                break;
            }
            let Some(node) = ctx.tree.node(id) else {
                continue;
            };
            collect_usages(&node.data, id, &mut found, |cell| self.matches(ctx, cell));
            for (i, kw) in node.data.keywords.iter().enumerate() {
                if eq_normalized(&kw.name, self.target_name()) {
                    found.push(Occurrence {
                        item: CtrlRef::keyword(id, i),
                        item_name: kw.name.clone(),
                        value: kw.name.clone(),
                        count: 1,
                    });
                }
            }
        }
        Ok(CommandOutput::occurrences(coalesce(found)))
    }
}

/// Find every usage of a variable: step cells, setting values, and the
/// variable tables themselves.
pub struct FindVariableOccurrences {
    pub name: String,
    observer: Option<Arc<dyn LoadObserver>>,
}

impl FindVariableOccurrences {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn cell_uses(&self, cell: &str) -> bool {
        let base = variable_base(&self.name).unwrap_or_else(|| self.name.clone());
        find_variables(cell)
            .iter()
            .any(|m| eq_normalized(m.base(cell), &base))
    }
}

impl Command for FindVariableOccurrences {
    fn name(&self) -> &'static str {
        "find variable occurrences"
    }

    fn modifying(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        let mut found = Vec::new();
        for id in ctx.tree.datafiles() {
            if let Some(observer) = &self.observer
                && !observer.notify()
            {
                break;
            }
            let Some(node) = ctx.tree.node(id) else {
                continue;
            };
            collect_usages(&node.data, id, &mut found, |cell| self.cell_uses(cell));
            for (i, var) in node.data.variable_table.variables.iter().enumerate() {
                let in_name = var.matches_name(&self.name);
                let in_values = var.values.iter().any(|v| self.cell_uses(v));
                if in_name || in_values {
                    found.push(Occurrence {
                        item: CtrlRef::variable(id, i),
                        item_name: var.name.clone(),
                        value: var.name.clone(),
                        count: 1,
                    });
                }
            }
        }
        Ok(CommandOutput::occurrences(coalesce(found)))
    }
}

/// Rename a keyword and rewrite every call to it, preserving Gherkin
/// prefixes, source qualifiers and embedded-argument values.
pub struct RenameKeywordOccurrences {
    pub old_name: String,
    pub new_name: String,
    pub prefix: Option<String>,
    /// Resolved definition of the keyword being renamed; supplies the
    /// canonical old name and the qualifier source.
    pub keyword_info: Option<KeywordInfo>,
    observer: Option<Arc<dyn LoadObserver>>,
}

impl RenameKeywordOccurrences {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
            prefix: None,
            keyword_info: None,
            observer: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_info(mut self, info: KeywordInfo) -> Self {
        self.keyword_info = Some(info);
        self
    }

    /// Attach a cancellation observer; the pass checks it between files.
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn target_name(&self) -> &str {
        self.keyword_info
            .as_ref()
            .map_or(&self.old_name, |info| info.name.as_str())
    }

    fn qualifier(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .or_else(|| self.keyword_info.as_ref().map(|info| info.source.as_str()))
    }
}

impl Command for RenameKeywordOccurrences {
    fn name(&self) -> &'static str {
        "rename keyword occurrences"
    }

    fn execute(&self, ctx: &mut Context) -> Result<CommandOutput, CommandError> {
        if let Err(message) = validate_keyword_name(&self.new_name) {
            return Ok(ctx.reject(message));
        }
        let language = ctx.namespace.language.clone();
        let rw = Rewrite {
            old: self.target_name(),
            new: &self.new_name,
            prefix: self.qualifier(),
            language: &language,
        };
        let mut touched: Vec<(NodeId, String)> = Vec::new();
        for id in ctx.tree.datafiles() {
            if let Some(observer) = &self.observer
                && !observer.notify()
            {
                break;
            }
            let mut changed_items = Vec::new();
            {
                let Some(node) = ctx.tree.node_mut(id) else {
                    continue;
                };
                for test in &mut node.data.tests {
                    let mut changed = rw.steps(&mut test.steps);
                    changed |= rw.opt_step(&mut test.setup);
                    changed |= rw.opt_step(&mut test.teardown);
                    if let Some(template) = &mut test.template {
                        changed |= rw.cell(template);
                    }
                    if changed {
                        changed_items.push(test.name.clone());
                    }
                }
                for kw in &mut node.data.keywords {
                    let mut changed = rw.steps(&mut kw.steps);
                    changed |= rw.opt_step(&mut kw.teardown);
                    if eq_normalized(&kw.name, self.target_name()) {
                        let old = std::mem::replace(&mut kw.name, self.new_name.clone());
                        ctx.publisher.publish(&RideMessage::ItemNameChanged {
                            item: self.new_name.clone(),
                            old_name: old,
                        });
                        changed = true;
                    }
                    if changed {
                        changed_items.push(kw.name.clone());
                    }
                }
                let table = &mut node.data.setting_table;
                let mut table_changed = false;
                for slot in [
                    &mut table.suite_setup,
                    &mut table.suite_teardown,
                    &mut table.test_setup,
                    &mut table.test_teardown,
                ] {
                    table_changed |= rw.opt_step(slot);
                }
                if let Some(template) = &mut table.test_template {
                    table_changed |= rw.cell(template);
                }
                if table_changed {
                    changed_items.push(node.name().to_string());
                }
                if !changed_items.is_empty() {
                    let path = node.data.source.clone();
                    if node.mark_dirty() {
                        ctx.publisher
                            .publish(&RideMessage::DataChangedToDirty { path });
                    }
                }
            }
            for item in changed_items {
                touched.push((id, item));
            }
        }
        ctx.namespace.invalidate();
        ctx.tree.invalidate_resolution();
        for (_, item) in &touched {
            ctx.publish(RideMessage::ItemStepsChanged { item: item.clone() });
        }
        let mut inverse = RenameKeywordOccurrences::new(&self.new_name, self.target_name());
        inverse.prefix = self.prefix.clone();
        Ok(CommandOutput::reversible(inverse))
    }
}

/// Whether `cell` is a call to `keyword_name`, tolerating a Gherkin
/// prefix and an optional `prefix.` source qualifier.
fn call_matches(ctx: &Context, keyword_name: &str, prefix: Option<&str>, cell: &str) -> bool {
    let candidates = call_forms(ctx, cell);
    for (_, candidate) in candidates {
        if name_matches(keyword_name, candidate) {
            return true;
        }
        if let Some(prefix) = prefix
            && let Some(rest) = strip_source_prefix(candidate, prefix)
            && name_matches(keyword_name, rest)
        {
            return true;
        }
    }
    false
}

/// The call texts to try for a cell: as written, and with the Gherkin
/// prefix stripped. Each form keeps the leading text to put back on
/// rewrite.
fn call_forms<'a>(ctx: &Context, cell: &'a str) -> Vec<(&'a str, &'a str)> {
    let mut forms = vec![("", cell)];
    if let Some((head, rest)) = ctx.namespace.language.strip_bdd_prefix(cell) {
        forms.push((head, rest));
    }
    forms
}

/// One rename rewrite, applied cell by cell. Gherkin prefixes and the
/// source qualifier survive the rewrite; embedded-argument values carry
/// over into the new name's placeholder spans in order.
struct Rewrite<'a> {
    old: &'a str,
    new: &'a str,
    prefix: Option<&'a str>,
    language: &'a ride_syntax::language::LanguagePack,
}

impl Rewrite<'_> {
    fn steps(&self, steps: &mut [Step]) -> bool {
        let mut changed = false;
        for step in steps {
            for cell in &mut step.cells {
                changed |= self.cell(cell);
            }
        }
        changed
    }

    fn opt_step(&self, step: &mut Option<Step>) -> bool {
        match step {
            Some(step) => {
                let mut changed = false;
                for cell in &mut step.cells {
                    changed |= self.cell(cell);
                }
                changed
            }
            None => false,
        }
    }

    fn cell(&self, cell: &mut String) -> bool {
        match self.rewritten(cell) {
            Some(next) => {
                *cell = next;
                true
            }
            None => false,
        }
    }

    fn rewritten(&self, cell: &str) -> Option<String> {
        let mut forms = vec![("", cell)];
        if let Some((head, rest)) = self.language.strip_bdd_prefix(cell) {
            forms.push((head, rest));
        }
        for (head, candidate) in forms {
            let (qualifier, bare) = match self
                .prefix
                .and_then(|p| strip_source_prefix(candidate, p))
            {
                Some(rest) => (&candidate[..candidate.len() - rest.len()], rest),
                None => ("", candidate),
            };
            if eq_normalized(self.old, bare) {
                return Some(format!("{head}{qualifier}{}", self.new));
            }
            if let Some(matcher) = EmbeddedArgsMatcher::new(self.old)
                && let Some(args) = matcher.extract_args(bare)
            {
                return Some(format!(
                    "{head}{qualifier}{}",
                    splice_embedded_args(self.new, &args)
                ));
            }
        }
        None
    }
}

/// Substitute extracted argument values into the new name's placeholder
/// spans, in order. Placeholders beyond the extracted values stay as
/// written.
fn splice_embedded_args(new_name: &str, args: &[&str]) -> String {
    let spans = find_variables(new_name);
    let mut out = String::new();
    let mut pos = 0;
    for (span, arg) in spans.iter().zip(args) {
        out.push_str(&new_name[pos..span.start]);
        out.push_str(arg);
        pos = span.end;
    }
    out.push_str(&new_name[pos..]);
    out
}

/// Collect matching cells from every steps-bearing location of a file.
fn collect_usages(
    data: &DataFile,
    id: NodeId,
    out: &mut Vec<Occurrence>,
    mut matches: impl FnMut(&str) -> bool,
) {
    let mut push = |item: CtrlRef, item_name: &str, cell: &str| {
        out.push(Occurrence {
            item,
            item_name: item_name.to_string(),
            value: cell.to_string(),
            count: 1,
        });
    };
    for (i, test) in data.tests.iter().enumerate() {
        let item = CtrlRef::test(id, i);
        for step in &test.steps {
            for cell in &step.cells {
                if matches(cell) {
                    push(item, &test.name, cell);
                }
            }
        }
        for step in test.setup.iter().chain(test.teardown.iter()) {
            for cell in &step.cells {
                if matches(cell) {
                    push(item, &test.name, cell);
                }
            }
        }
        if let Some(template) = &test.template
            && matches(template)
        {
            push(item, &test.name, template);
        }
    }
    for (i, kw) in data.keywords.iter().enumerate() {
        let item = CtrlRef::keyword(id, i);
        for step in &kw.steps {
            for cell in &step.cells {
                if matches(cell) {
                    push(item, &kw.name, cell);
                }
            }
        }
        if let Some(step) = &kw.teardown {
            for cell in &step.cells {
                if matches(cell) {
                    push(item, &kw.name, cell);
                }
            }
        }
    }
    let table = &data.setting_table;
    let file_item = CtrlRef::file(id);
    for step in [
        &table.suite_setup,
        &table.suite_teardown,
        &table.test_setup,
        &table.test_teardown,
    ]
    .into_iter()
    .flatten()
    {
        for cell in &step.cells {
            if matches(cell) {
                push(file_item, data.basename(), cell);
            }
        }
    }
    if let Some(template) = &table.test_template
        && matches(template)
    {
        push(file_item, data.basename(), template);
    }
}

/// Merge hits on the same item into one occurrence with a count.
fn coalesce(found: Vec<Occurrence>) -> Vec<Occurrence> {
    let mut merged: Vec<Occurrence> = Vec::new();
    for hit in found {
        if let Some(existing) = merged.iter_mut().find(|o| o.item == hit.item) {
            existing.count += hit.count;
        } else {
            merged.push(hit);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::Fixture;
    use crate::commands::{AddKeyword, AddTestCase, CommandResult};
    use crate::model::Step;
    use pretty_assertions::assert_eq;

    fn suite_with_calls(calls: &[&str]) -> Fixture {
        let mut fx = Fixture::suite();
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddTestCase {
            name: "Scenario".to_string(),
        })
        .unwrap();
        fx.node_mut().data.tests[0].steps = calls
            .iter()
            .copied()
            .map(|c| Step::from_strs(&[c]))
            .collect();
        fx
    }

    #[test]
    fn finds_calls_across_normalisation_and_gherkin() {
        let mut fx = suite_with_calls(&["Login User", "Given login_user", "Log"]);
        let result = fx.execute(FindOccurrences::new("Login User")).unwrap();
        let CommandResult::Occurrences(found) = result else {
            panic!("expected occurrences");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].count, 2);
        assert_eq!(found[0].item_name, "Scenario");
    }

    #[test]
    fn embedded_argument_calls_are_found() {
        let mut fx = suite_with_calls(&["Select cat From List", "Select From List"]);
        let result = fx
            .execute(FindOccurrences::new("Select ${animal} From List"))
            .unwrap();
        let CommandResult::Occurrences(found) = result else {
            panic!("expected occurrences");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].count, 1);
        assert_eq!(found[0].value, "Select cat From List");
    }

    #[test]
    fn rename_rewrites_calls_and_definition() {
        let mut fx = suite_with_calls(&["Given Old Name", "old_name"]);
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(AddKeyword {
            name: "Old Name".to_string(),
            args: vec![],
        })
        .unwrap();
        fx.execute(RenameKeywordOccurrences::new("Old Name", "New Name"))
            .unwrap();
        let steps = &fx.node().data.tests[0].steps;
        assert_eq!(steps[0].cells, vec!["Given New Name"]);
        assert_eq!(steps[1].cells, vec!["New Name"]);
        assert_eq!(fx.node().data.keywords[0].name, "New Name");
    }

    #[test]
    fn rename_carries_embedded_argument_values_over() {
        let mut fx = suite_with_calls(&["Select cat From List"]);
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(RenameKeywordOccurrences::new(
            "Select ${animal} From List",
            "Pick ${animal} From Menu",
        ))
        .unwrap();
        assert_eq!(
            fx.node().data.tests[0].steps[0].cells,
            vec!["Pick cat From Menu"]
        );
    }

    #[test]
    fn rename_undo_restores_old_calls() {
        let mut fx = suite_with_calls(&["Old Name"]);
        fx.target = CtrlRef::file(fx.node_id);
        fx.execute(RenameKeywordOccurrences::new("Old Name", "New Name"))
            .unwrap();
        fx.undo().unwrap();
        assert_eq!(fx.node().data.tests[0].steps[0].cells, vec!["Old Name"]);
    }

    #[test]
    fn qualified_calls_match_with_prefix() {
        let mut fx = suite_with_calls(&["common.Login User", "other.Login User"]);
        let result = fx
            .execute(FindOccurrences::new("Login User").with_prefix("common"))
            .unwrap();
        let CommandResult::Occurrences(found) = result else {
            panic!("expected occurrences");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "common.Login User");
    }

    #[test]
    fn resolved_definition_supplies_name_and_qualifier() {
        let mut fx = suite_with_calls(&["common.Login User", "login_user"]);
        let result = fx
            .execute(
                FindOccurrences::new("anything")
                    .with_info(KeywordInfo::library("Login User", "common")),
            )
            .unwrap();
        let CommandResult::Occurrences(found) = result else {
            panic!("expected occurrences");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].count, 2);
    }

    #[test]
    fn variable_occurrences_cover_cells_and_tables() {
        let mut fx = suite_with_calls(&["Log", "${greeting}"]);
        fx.node_mut()
            .data
            .variable_table
            .variables
            .push(crate::model::Variable::new("${GREETING}", vec!["hello".into()]));
        let result = fx
            .execute(FindVariableOccurrences::new("${greeting}"))
            .unwrap();
        let CommandResult::Occurrences(found) = result else {
            panic!("expected occurrences");
        };
        assert_eq!(found.len(), 2);
    }
}
