//! End-to-end scenarios through the public project API.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use ride_config::Settings;
use ride_engine::commands::{
    AddTestCase, ChangeCellValue, Exclude, FindOccurrences, MoveRowsDown,
    RenameKeywordOccurrences,
};
use ride_engine::controller::{CtrlRef, NodeId, NodeKind, kind_for};
use ride_engine::error::{CommandError, ParseError};
use ride_engine::io::{DataParser, WriteOptions};
use ride_engine::library::StaticLibraryManager;
use ride_engine::model::{
    DataFile, DataFileKind, Import, Step, TestCase, UserKeyword,
};
use ride_engine::observer::{LoadObserver, NullObserver};
use ride_engine::{CommandResult, Project};

struct EmptyParser;

impl DataParser for EmptyParser {
    fn parse(&self, path: &Path) -> Result<DataFile, ParseError> {
        let kind = if path.extension().is_some_and(|e| e == "resource") {
            DataFileKind::Resource
        } else {
            DataFileKind::Suite
        };
        Ok(DataFile::new(path, kind))
    }

    fn write(
        &self,
        _data: &DataFile,
        path: &Path,
        _options: &WriteOptions,
    ) -> Result<(), ParseError> {
        std::fs::write(path, "saved").map_err(|e| ParseError::new(path, e.to_string()))
    }
}

/// Writer that leaves a partial file behind and fails, like a full disk.
struct BrokenWriter;

impl DataParser for BrokenWriter {
    fn parse(&self, path: &Path) -> Result<DataFile, ParseError> {
        Ok(DataFile::new(path, DataFileKind::Suite))
    }

    fn write(
        &self,
        _data: &DataFile,
        path: &Path,
        _options: &WriteOptions,
    ) -> Result<(), ParseError> {
        let _ = std::fs::write(path, "partial");
        Err(ParseError::new(path, "disk full"))
    }
}

fn project_with(parser: Arc<dyn DataParser>) -> (Project, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load_from_path(&dir.path().join("settings.toml")).unwrap();
    let project = Project::new(settings, parser, Arc::new(StaticLibraryManager::default()));
    (project, dir)
}

fn add_file(project: &mut Project, data: DataFile, parent: Option<NodeId>) -> NodeId {
    let kind = kind_for(&data);
    let id = project.tree.insert(kind, data, parent).unwrap();
    match parent {
        Some(parent) => project.tree.attach(parent, id),
        None => project.tree.set_root(id),
    }
    id
}

fn suite_with_test(path: &Path, steps: Vec<Step>) -> DataFile {
    let mut data = DataFile::new(path, DataFileKind::Suite);
    let mut test = TestCase::new("Scenario");
    test.steps = steps;
    data.tests.push(test);
    data
}

#[test]
fn rename_rewrites_embedded_argument_calls_everywhere() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let suite = add_file(
        &mut project,
        suite_with_test(
            &dir.path().join("suite.robot"),
            vec![
                Step::from_strs(&["Select cat From List"]),
                Step::from_strs(&["Select ${pet} From List"]),
            ],
        ),
        None,
    );
    project
        .tree
        .node_mut(suite)
        .unwrap()
        .data
        .keywords
        .push(UserKeyword::new("Select ${animal} From List"));

    project
        .execute(
            CtrlRef::file(suite),
            &RenameKeywordOccurrences::new("Select ${animal} From List", "Pick ${animal} From Menu"),
        )
        .unwrap();

    let node = project.tree.node(suite).unwrap();
    assert_eq!(node.data.tests[0].steps[0].cells, vec!["Pick cat From Menu"]);
    assert_eq!(
        node.data.tests[0].steps[1].cells,
        vec!["Pick ${pet} From Menu"]
    );
    assert_eq!(node.data.keywords[0].name, "Pick ${animal} From Menu");
}

#[test]
fn rename_preserves_gherkin_prefixes() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let suite = add_file(
        &mut project,
        suite_with_test(
            &dir.path().join("suite.robot"),
            vec![
                Step::from_strs(&["Given Open Page"]),
                Step::from_strs(&["When open_page"]),
                Step::from_strs(&["Open Page"]),
            ],
        ),
        None,
    );

    project
        .execute(
            CtrlRef::file(suite),
            &RenameKeywordOccurrences::new("Open Page", "Open Start Page"),
        )
        .unwrap();

    let steps = &project.tree.node(suite).unwrap().data.tests[0].steps;
    assert_eq!(steps[0].cells, vec!["Given Open Start Page"]);
    assert_eq!(steps[1].cells, vec!["When Open Start Page"]);
    assert_eq!(steps[2].cells, vec!["Open Start Page"]);
}

#[test]
fn keyword_resolution_survives_import_cycles() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let base = dir.path();

    let mut suite_data = suite_with_test(&base.join("suite.robot"), vec![]);
    suite_data
        .setting_table
        .imports
        .push(Import::resource("a.resource"));
    let suite = add_file(&mut project, suite_data, None);

    let mut a = DataFile::new(&base.join("a.resource"), DataFileKind::Resource);
    a.setting_table.imports.push(Import::resource("b.resource"));
    add_file(&mut project, a, Some(suite));

    let mut b = DataFile::new(&base.join("b.resource"), DataFileKind::Resource);
    // Cycle back to the first resource.
    b.setting_table.imports.push(Import::resource("a.resource"));
    b.keywords.push(UserKeyword::new("Deep Keyword"));
    add_file(&mut project, b, Some(suite));

    let found = project
        .namespace
        .find_keyword(&project.tree, suite, "deep_keyword")
        .expect("keyword reachable through the cycle");
    assert_eq!(found.name, "Deep Keyword");
}

#[test]
fn moving_rows_keeps_block_indentation_and_length() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let suite = add_file(
        &mut project,
        suite_with_test(
            &dir.path().join("suite.robot"),
            vec![
                Step::from_strs(&["Log", "before"]),
                Step::from_strs(&["FOR", "${i}", "IN", "a"]),
                Step::from_strs(&["", "Log", "${i}"]),
                Step::from_strs(&["END"]),
            ],
        ),
        None,
    );
    let target = CtrlRef::test(suite, 0);

    project
        .execute(target, &MoveRowsDown { rows: vec![0] })
        .unwrap();
    let steps = project.tree.steps(target).unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].cells[0], "FOR");
    // The moved row entered the block, gaining one indent cell.
    assert_eq!(steps[1].cells, vec!["", "Log", "before"]);
    assert_eq!(steps[3].cells, vec!["END"]);

    project.undo(suite).unwrap();
    let steps = project.tree.steps(target).unwrap();
    assert_eq!(steps[0].cells, vec!["Log", "before"]);
    assert_eq!(steps.len(), 4);
}

#[test]
fn failed_save_restores_previous_file_contents() {
    let (mut project, dir) = project_with(Arc::new(BrokenWriter));
    let path = dir.path().join("suite.robot");
    std::fs::write(&path, "original contents").unwrap();
    let suite = project.load_data(&path, &NullObserver).unwrap();

    let topics = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&topics);
    project.publisher.subscribe(
        "ride.log",
        Box::new(move |message| {
            sink.borrow_mut().push(message.topic().to_string());
            Ok(())
        }),
    );

    project
        .execute(
            CtrlRef::file(suite),
            &AddTestCase {
                name: "T".to_string(),
            },
        )
        .unwrap();
    assert!(project.is_dirty());

    let err = project.save(suite).unwrap_err();
    assert!(matches!(err, CommandError::Parse(_)));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "original contents"
    );
    // The failed save must not clear dirtiness.
    assert!(project.is_dirty());
    // Exactly one error logged, and the stat matches the restored file.
    assert_eq!(*topics.borrow(), vec!["ride.log".to_string()]);
    assert_eq!(
        project.tree.node(suite).unwrap().stat,
        ride_engine::io::mtime(&path)
    );
}

/// Observer that allows a fixed number of progress checks, then cancels.
struct CancelAfter {
    limit: usize,
    seen: AtomicUsize,
}

impl CancelAfter {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
        }
    }
}

impl LoadObserver for CancelAfter {
    fn notify(&self) -> bool {
        self.seen.fetch_add(1, Ordering::SeqCst) < self.limit
    }

    fn finish(&self) {}

    fn error(&self, _message: &str) {}
}

#[test]
fn cancelled_observer_stops_a_rename_pass_between_files() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let base = dir.path();
    let root = add_file(
        &mut project,
        DataFile::new(&base.join("suite"), DataFileKind::Directory),
        None,
    );
    let first = add_file(
        &mut project,
        suite_with_test(
            &base.join("suite/a.robot"),
            vec![Step::from_strs(&["Old Name"])],
        ),
        Some(root),
    );
    let second = add_file(
        &mut project,
        suite_with_test(
            &base.join("suite/b.robot"),
            vec![Step::from_strs(&["Old Name"])],
        ),
        Some(root),
    );

    // Directory and first suite pass the check; the second suite cancels.
    let command = RenameKeywordOccurrences::new("Old Name", "New Name")
        .with_observer(Arc::new(CancelAfter::new(2)));
    project.execute(CtrlRef::file(root), &command).unwrap();

    let first_steps = &project.tree.node(first).unwrap().data.tests[0].steps;
    assert_eq!(first_steps[0].cells, vec!["New Name"]);
    let second_steps = &project.tree.node(second).unwrap().data.tests[0].steps;
    assert_eq!(second_steps[0].cells, vec!["Old Name"]);
}

#[test]
fn cancelled_observer_stops_an_occurrence_scan() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let base = dir.path();
    let root = add_file(
        &mut project,
        DataFile::new(&base.join("suite"), DataFileKind::Directory),
        None,
    );
    for name in ["a.robot", "b.robot"] {
        let data = suite_with_test(
            &base.join("suite").join(name),
            vec![Step::from_strs(&["Target Kw"])],
        );
        add_file(&mut project, data, Some(root));
    }

    let command =
        FindOccurrences::new("Target Kw").with_observer(Arc::new(CancelAfter::new(2)));
    let result = project.execute(CtrlRef::file(root), &command).unwrap();
    let CommandResult::Occurrences(found) = result else {
        panic!("expected occurrences");
    };
    // Only the first suite was scanned before cancellation.
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].count, 1);
}

#[test]
fn excluding_a_dirty_directory_is_refused() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let base = dir.path();
    let root = add_file(
        &mut project,
        DataFile::new(&base.join("suite"), DataFileKind::Directory),
        None,
    );
    let sub = add_file(
        &mut project,
        DataFile::new(&base.join("suite/sub"), DataFileKind::Directory),
        Some(root),
    );
    let file = add_file(
        &mut project,
        suite_with_test(
            &base.join("suite/sub/cases.robot"),
            vec![Step::from_strs(&["Log", "x"])],
        ),
        Some(sub),
    );

    project
        .execute(
            CtrlRef::test(file, 0),
            &ChangeCellValue::new(0, 1, "changed"),
        )
        .unwrap();
    assert!(project.tree.node(file).unwrap().dirty);

    let err = project.execute(CtrlRef::file(sub), &Exclude).unwrap_err();
    assert!(matches!(err, CommandError::DirtyData));
    assert_eq!(project.tree.node(sub).unwrap().kind, NodeKind::Directory);

    // Once saved, the exclusion goes through and the subtree refuses edits.
    project.tree.node_mut(file).unwrap().clear_dirty();
    project.execute(CtrlRef::file(sub), &Exclude).unwrap();
    assert!(project.tree.node(sub).unwrap().is_excluded());
    let result = project
        .execute(
            CtrlRef::file(sub),
            &AddTestCase {
                name: "Nope".to_string(),
            },
        )
        .unwrap();
    assert!(matches!(result, CommandResult::Rejected(_)));
}

#[test]
fn local_keywords_shadow_resources_which_shadow_builtins() {
    let (mut project, dir) = project_with(Arc::new(EmptyParser));
    let base = dir.path();

    let mut suite_data = suite_with_test(&base.join("suite.robot"), vec![]);
    suite_data
        .setting_table
        .imports
        .push(Import::resource("common.resource"));
    suite_data.keywords.push(UserKeyword::new("Local Kw"));
    let suite = add_file(&mut project, suite_data, None);

    let mut resource = DataFile::new(&base.join("common.resource"), DataFileKind::Resource);
    resource.keywords.push(UserKeyword::new("Local Kw"));
    resource.keywords.push(UserKeyword::new("Log"));
    add_file(&mut project, resource, Some(suite));

    let local = project
        .namespace
        .find_keyword(&project.tree, suite, "Local Kw")
        .unwrap();
    assert_eq!(local.source, "suite");

    let shadowed_builtin = project
        .namespace
        .find_keyword(&project.tree, suite, "Log")
        .unwrap();
    assert_eq!(shadowed_builtin.source, "common");
}
