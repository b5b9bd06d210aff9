//! Keyword and variable resolution across the import graph.
//!
//! Lookup precedence is fixed: the file's own keywords win over resource
//! imports (depth-first, first hit), which win over library imports, which
//! win over the built-in library. Resource import graphs may be cyclic;
//! traversal carries a visited set seeded with the starting file, so a
//! cycle simply terminates the walk.

pub mod cache;
pub mod embedded;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ride_syntax::LanguagePack;
use ride_syntax::variables::find_variables;

use crate::controller::{NodeId, NodeTree};
use crate::library::{KeywordInfo, KeywordOrigin, LibraryManager, find_builtin};
use crate::model::{UserKeyword, eq_normalized, normalize};
use cache::{LibraryCache, ResolutionCache, ResourceCache};
pub use embedded::EmbeddedArgsMatcher;

/// Variables available in every file without declaration.
pub const BUILTIN_VARIABLES: &[&str] = &[
    "${TEMPDIR}",
    "${EXECDIR}",
    "${CURDIR}",
    "${/}",
    "${:}",
    "${\\n}",
    "${SPACE}",
    "${EMPTY}",
    "@{EMPTY}",
    "&{EMPTY}",
    "${True}",
    "${False}",
    "${None}",
    "${null}",
    "${TEST_NAME}",
    "@{TEST_TAGS}",
    "${TEST_DOCUMENTATION}",
    "${SUITE_NAME}",
    "${SUITE_SOURCE}",
    "${SUITE_DOCUMENTATION}",
    "${PREV_TEST_NAME}",
    "${PREV_TEST_STATUS}",
    "${PREV_TEST_MESSAGE}",
    "${LOG_LEVEL}",
    "${OUTPUT_FILE}",
    "${LOG_FILE}",
    "${REPORT_FILE}",
    "${DEBUG_FILE}",
    "${OUTPUT_DIR}",
    "${KEYWORD_STATUS}",
    "${KEYWORD_MESSAGE}",
];

/// A resolved variable: its declared name and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: String,
    pub source: String,
}

pub struct Namespace {
    pub language: LanguagePack,
    manager: Arc<dyn LibraryManager>,
    libraries: LibraryCache,
    resources: ResourceCache,
    resolutions: ResolutionCache,
}

impl Namespace {
    pub fn new(manager: Arc<dyn LibraryManager>) -> Self {
        Self {
            language: LanguagePack::english(),
            manager,
            libraries: LibraryCache::default(),
            resources: ResourceCache::default(),
            resolutions: ResolutionCache::default(),
        }
    }

    pub fn with_language(mut self, language: LanguagePack) -> Self {
        self.language = language;
        self
    }

    pub fn manager(&self) -> &dyn LibraryManager {
        self.manager.as_ref()
    }

    /// Drop everything cached, for project reloads.
    pub fn reset(&mut self) {
        self.libraries.clear();
        self.resources.clear();
        self.resolutions.clear();
    }

    /// Drop per-file resolutions; called before any mutation is observable.
    pub fn invalidate(&mut self) {
        self.resolutions.clear();
    }

    /// Invalidate one resource path, after a filename change.
    pub fn expire_resource(&mut self, path: &Path) {
        self.resources.expire(path);
        self.resolutions.clear();
    }

    /// Resolve a keyword call from `node`. Gherkin prefixes are stripped
    /// and retried when the full name does not resolve.
    pub fn find_keyword(
        &mut self,
        tree: &NodeTree,
        node: NodeId,
        name: &str,
    ) -> Option<KeywordInfo> {
        let key = normalize(name);
        if let Some(cached) = self.resolutions.get(node, &key) {
            return cached.clone();
        }
        let found = self.lookup(tree, node, name).or_else(|| {
            self.language
                .strip_bdd_prefix(name)
                .and_then(|(_, rest)| self.lookup(tree, node, rest))
        });
        self.resolutions.insert(node, key, found.clone());
        found
    }

    fn lookup(&mut self, tree: &NodeTree, node: NodeId, name: &str) -> Option<KeywordInfo> {
        let files = self.reachable_files(tree, node);
        for &fid in &files {
            if let Some(info) = find_user_keyword_in(tree, fid, node, name) {
                return Some(info);
            }
        }
        for &fid in &files {
            let imports: Vec<(String, Vec<String>, Option<String>)> = tree
                .node(fid)
                .map(|n| {
                    n.data
                        .setting_table
                        .library_imports()
                        .map(|i| (i.name.clone(), i.args.clone(), i.alias.clone()))
                        .collect()
                })
                .unwrap_or_default();
            for (lib, args, alias) in imports {
                let keywords =
                    self.libraries
                        .keywords(&*self.manager, &lib, &args, alias.as_deref());
                if let Some(info) = keywords.iter().find(|kw| library_matches(kw, name)) {
                    return Some(info.clone());
                }
            }
        }
        find_builtin(name)
    }

    /// The start file followed by every resource reachable through its
    /// imports, depth-first, each file once.
    fn reachable_files(&mut self, tree: &NodeTree, start: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([start]);
        let mut order = vec![start];
        self.visit_imports(tree, start, &mut visited, &mut order);
        order
    }

    fn visit_imports(
        &mut self,
        tree: &NodeTree,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) {
        let raws: Vec<String> = tree
            .node(id)
            .map(|n| {
                n.data
                    .setting_table
                    .resource_imports()
                    .map(|i| i.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        for raw in raws {
            if let Some(rid) = self.resolve_resource(tree, id, &raw) {
                if visited.insert(rid) {
                    order.push(rid);
                    self.visit_imports(tree, rid, visited, order);
                }
            }
        }
    }

    /// Node a resource import resolves to, via the path cache.
    pub fn resolve_resource(
        &mut self,
        tree: &NodeTree,
        importer: NodeId,
        raw: &str,
    ) -> Option<NodeId> {
        let path = self.resolve_import_path(tree, importer, raw);
        if let Some(cached) = self.resources.get(&path) {
            if tree.node(cached).is_some() {
                return Some(cached);
            }
            self.resources.expire(&path);
        }
        let id = tree.find_by_path(&path)?;
        self.resources.insert(path, id);
        Some(id)
    }

    /// Absolute path of an import, with `${/}`, `${CURDIR}`, `${EXECDIR}`
    /// and local scalar variables substituted first.
    pub fn resolve_import_path(&self, tree: &NodeTree, node: NodeId, raw: &str) -> PathBuf {
        let substituted = self.substitute_variables(tree, node, raw);
        let path = PathBuf::from(substituted);
        if path.is_absolute() {
            return normalize_path(&path);
        }
        let base = tree
            .node(node)
            .map(|n| n.data.directory().to_path_buf())
            .unwrap_or_default();
        normalize_path(&base.join(path))
    }

    fn substitute_variables(&self, tree: &NodeTree, node: NodeId, raw: &str) -> String {
        let spans = find_variables(raw);
        if spans.is_empty() {
            return raw.to_string();
        }
        let mut out = String::with_capacity(raw.len());
        let mut pos = 0;
        for span in &spans {
            out.push_str(&raw[pos..span.start]);
            let name = &raw[span.start..span.end];
            out.push_str(&self.variable_value(tree, node, name));
            pos = span.end;
        }
        out.push_str(&raw[pos..]);
        out
    }

    fn variable_value(&self, tree: &NodeTree, node: NodeId, name: &str) -> String {
        if eq_normalized(name, "${/}") {
            return std::path::MAIN_SEPARATOR.to_string();
        }
        if eq_normalized(name, "${CURDIR}") {
            return tree
                .node(node)
                .map(|n| n.data.directory().to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if eq_normalized(name, "${EXECDIR}") {
            return std::env::current_dir()
                .map(|d| d.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        tree.node(node)
            .and_then(|n| n.data.variable_table.find(name))
            .and_then(|v| v.values.first().cloned())
            // Unknown variables stay verbatim so the failure is visible.
            .unwrap_or_else(|| name.to_string())
    }

    /// Resolve a variable reference from `node`: local declarations shadow
    /// imported ones, which shadow the built-in set.
    pub fn find_variable(
        &mut self,
        tree: &NodeTree,
        node: NodeId,
        name: &str,
    ) -> Option<VariableInfo> {
        for fid in self.reachable_files(tree, node) {
            let file = tree.node(fid)?;
            if let Some(var) = file.data.variable_table.find(name) {
                return Some(VariableInfo {
                    name: var.name.clone(),
                    source: file.data.basename().to_string(),
                });
            }
        }
        BUILTIN_VARIABLES
            .iter()
            .find(|v| eq_normalized(v, name))
            .map(|v| VariableInfo {
                name: v.to_string(),
                source: "BuiltIn".to_string(),
            })
    }

    /// Completion candidates: every visible keyword whose normalised name
    /// starts with the normalised input, sorted case-insensitively.
    pub fn suggestions(
        &mut self,
        tree: &NodeTree,
        node: NodeId,
        start: &str,
    ) -> Vec<KeywordInfo> {
        let wanted = normalize(start);
        let files = self.reachable_files(tree, node);
        let mut out: Vec<KeywordInfo> = Vec::new();

        for &fid in &files {
            let Some(file) = tree.node(fid) else { continue };
            let source = file.data.basename().to_string();
            let origin = if fid == node {
                KeywordOrigin::UserKeyword
            } else {
                KeywordOrigin::Resource
            };
            for kw in &file.data.keywords {
                out.push(KeywordInfo {
                    name: kw.name.clone(),
                    source: source.clone(),
                    origin,
                    args: kw.args.clone(),
                    doc: kw.doc.clone(),
                });
            }
        }
        for &fid in &files {
            let imports: Vec<(String, Vec<String>, Option<String>)> = tree
                .node(fid)
                .map(|n| {
                    n.data
                        .setting_table
                        .library_imports()
                        .map(|i| (i.name.clone(), i.args.clone(), i.alias.clone()))
                        .collect()
                })
                .unwrap_or_default();
            for (lib, args, alias) in imports {
                out.extend(
                    self.libraries
                        .keywords(&*self.manager, &lib, &args, alias.as_deref())
                        .iter()
                        .cloned(),
                );
            }
        }
        out.extend(
            crate::library::BUILTIN_KEYWORDS
                .iter()
                .map(|kw| KeywordInfo::library(*kw, crate::library::BUILTIN_LIBRARY)),
        );

        out.retain(|kw| normalize(&kw.name).starts_with(&wanted));
        out.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.source.cmp(&b.source))
        });
        out.dedup_by(|a, b| normalize(&a.name) == normalize(&b.name) && a.source == b.source);
        out
    }

    /// Recompute `known_imports` on every resource node and mark the
    /// project-wide resolution flag valid.
    pub fn refresh_known_imports(&mut self, tree: &mut NodeTree) {
        let ids = tree.all_nodes();
        for id in &ids {
            if let Some(node) = tree.node_mut(*id) {
                node.known_imports.clear();
            }
        }
        for id in ids {
            let raws: Vec<String> = tree
                .node(id)
                .map(|n| {
                    n.data
                        .setting_table
                        .resource_imports()
                        .map(|i| i.name.clone())
                        .collect()
                })
                .unwrap_or_default();
            for raw in raws {
                if let Some(rid) = self.resolve_resource(tree, id, &raw) {
                    if let Some(resource) = tree.node_mut(rid) {
                        resource.add_known_import(id);
                    }
                }
            }
        }
        tree.resolution_valid = true;
    }

    /// Importing sites of a resource, re-resolving lazily when the
    /// project-wide flag says resolution is stale.
    pub fn get_where_used(&mut self, tree: &mut NodeTree, node: NodeId) -> Vec<NodeId> {
        if !tree.resolution_valid {
            self.refresh_known_imports(tree);
        }
        tree.node(node)
            .map(|n| n.known_imports.clone())
            .unwrap_or_default()
    }
}

/// Whether a new keyword name is acceptable.
pub fn validate_keyword_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("keyword name cannot be empty".to_string());
    }
    Ok(())
}

fn find_user_keyword_in(
    tree: &NodeTree,
    fid: NodeId,
    origin_node: NodeId,
    call: &str,
) -> Option<KeywordInfo> {
    let file = tree.node(fid)?;
    let basename = file.data.basename();
    let kw = file
        .data
        .keywords
        .iter()
        .find(|kw| keyword_matches(kw, call, basename))?;
    Some(KeywordInfo {
        name: kw.name.clone(),
        source: basename.to_string(),
        origin: if fid == origin_node {
            KeywordOrigin::UserKeyword
        } else {
            KeywordOrigin::Resource
        },
        args: kw.args.clone(),
        doc: kw.doc.clone(),
    })
}

/// Plain, embedded-argument and `basename.name`-qualified matching.
pub fn keyword_matches(kw: &UserKeyword, call: &str, source_basename: &str) -> bool {
    if name_matches(&kw.name, call) {
        return true;
    }
    strip_source_prefix(call, source_basename).is_some_and(|rest| name_matches(&kw.name, rest))
}

/// Strip a `basename.` qualifier; the basename compares case-insensitively.
pub fn strip_source_prefix<'a>(call: &'a str, basename: &str) -> Option<&'a str> {
    let (head, rest) = call.split_once('.')?;
    if head.eq_ignore_ascii_case(basename) && !rest.is_empty() {
        Some(rest)
    } else {
        None
    }
}

pub fn name_matches(name: &str, call: &str) -> bool {
    if eq_normalized(name, call) {
        return true;
    }
    EmbeddedArgsMatcher::new(name).is_some_and(|m| m.matches(call))
}

fn library_matches(kw: &KeywordInfo, call: &str) -> bool {
    if kw.matches_name(call) {
        return true;
    }
    strip_source_prefix(call, &kw.source).is_some_and(|rest| eq_normalized(&kw.name, rest))
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{NodeKind, NodeTree};
    use crate::library::StaticLibraryManager;
    use crate::model::{DataFile, DataFileKind, Import, UserKeyword, Variable};
    use pretty_assertions::assert_eq;

    fn namespace() -> Namespace {
        Namespace::new(Arc::new(StaticLibraryManager::new()))
    }

    fn suite(tree: &mut NodeTree, path: &str) -> NodeId {
        tree.insert(
            NodeKind::Suite,
            DataFile::new(path, DataFileKind::Suite),
            None,
        )
        .unwrap()
    }

    fn resource(tree: &mut NodeTree, path: &str) -> NodeId {
        tree.insert(
            NodeKind::Resource,
            DataFile::new(path, DataFileKind::Resource),
            None,
        )
        .unwrap()
    }

    fn add_keyword(tree: &mut NodeTree, node: NodeId, name: &str) {
        tree.node_mut(node)
            .unwrap()
            .data
            .keywords
            .push(UserKeyword::new(name));
    }

    fn add_resource_import(tree: &mut NodeTree, node: NodeId, path: &str) {
        tree.node_mut(node)
            .unwrap()
            .data
            .setting_table
            .imports
            .push(Import::resource(path));
    }

    #[test]
    fn local_keyword_wins_over_resource() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        let r = resource(&mut tree, "/p/common.resource");
        add_keyword(&mut tree, s, "Login");
        add_keyword(&mut tree, r, "Login");
        add_resource_import(&mut tree, s, "common.resource");

        let info = namespace().find_keyword(&tree, s, "Login").unwrap();
        assert_eq!(info.origin, KeywordOrigin::UserKeyword);
        assert_eq!(info.source, "s");
    }

    #[test]
    fn resource_keyword_found_through_import_chain() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        let r1 = resource(&mut tree, "/p/first.resource");
        let r2 = resource(&mut tree, "/p/second.resource");
        add_resource_import(&mut tree, s, "first.resource");
        add_resource_import(&mut tree, r1, "second.resource");
        add_keyword(&mut tree, r2, "Deep Keyword");

        let info = namespace().find_keyword(&tree, s, "Deep Keyword").unwrap();
        assert_eq!(info.source, "second");
        assert_eq!(info.origin, KeywordOrigin::Resource);
    }

    #[test]
    fn cyclic_imports_terminate_and_still_resolve() {
        let mut tree = NodeTree::new();
        let a = resource(&mut tree, "/p/a.resource");
        let b = resource(&mut tree, "/p/b.resource");
        add_resource_import(&mut tree, a, "b.resource");
        add_resource_import(&mut tree, b, "a.resource");
        add_keyword(&mut tree, b, "Shared");

        let mut ns = namespace();
        let info = ns.find_keyword(&tree, a, "Shared").unwrap();
        assert_eq!(info.source, "b");
        assert_eq!(ns.find_keyword(&tree, a, "Missing"), None);
    }

    #[test]
    fn self_import_cycle_is_harmless() {
        let mut tree = NodeTree::new();
        let a = resource(&mut tree, "/p/a.resource");
        add_resource_import(&mut tree, a, "a.resource");
        add_keyword(&mut tree, a, "Own");
        assert!(namespace().find_keyword(&tree, a, "Own").is_some());
    }

    #[test]
    fn embedded_argument_keywords_resolve() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        add_keyword(&mut tree, s, "Select ${animal} From List");

        let info = namespace()
            .find_keyword(&tree, s, "Select cat From List")
            .unwrap();
        assert_eq!(info.name, "Select ${animal} From List");
    }

    #[test]
    fn gherkin_prefix_is_stripped_before_lookup() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        add_keyword(&mut tree, s, "login page is open");

        assert!(
            namespace()
                .find_keyword(&tree, s, "Given login page is open")
                .is_some()
        );
    }

    #[test]
    fn resource_qualified_calls_match_only_their_resource() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        let r = resource(&mut tree, "/p/common.resource");
        add_resource_import(&mut tree, s, "common.resource");
        add_keyword(&mut tree, r, "Login");

        let mut ns = namespace();
        assert!(ns.find_keyword(&tree, s, "common.Login").is_some());
        assert!(ns.find_keyword(&tree, s, "COMMON.Login").is_some());
        assert!(ns.find_keyword(&tree, s, "other.Login").is_none());
    }

    #[test]
    fn builtin_is_the_last_resort() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        let info = namespace().find_keyword(&tree, s, "Log").unwrap();
        assert_eq!(info.source, "BuiltIn");

        add_keyword(&mut tree, s, "Log");
        let info = namespace().find_keyword(&tree, s, "Log").unwrap();
        assert_eq!(info.origin, KeywordOrigin::UserKeyword);
    }

    #[test]
    fn import_paths_substitute_variables() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/sub/s.robot");
        tree.node_mut(s)
            .unwrap()
            .data
            .variable_table
            .variables
            .push(Variable::new("${RES DIR}", vec!["/shared/res".to_string()]));

        let ns = namespace();
        assert_eq!(
            ns.resolve_import_path(&tree, s, "../common.resource"),
            PathBuf::from("/p/common.resource")
        );
        assert_eq!(
            ns.resolve_import_path(&tree, s, "${CURDIR}${/}x.resource"),
            PathBuf::from("/p/sub/x.resource")
        );
        assert_eq!(
            ns.resolve_import_path(&tree, s, "${RES_DIR}/y.resource"),
            PathBuf::from("/shared/res/y.resource")
        );
    }

    #[test]
    fn variables_shadow_in_precedence_order() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        let r = resource(&mut tree, "/p/vars.resource");
        add_resource_import(&mut tree, s, "vars.resource");
        tree.node_mut(r)
            .unwrap()
            .data
            .variable_table
            .variables
            .push(Variable::new("${HOST}", vec!["from-resource".to_string()]));

        let mut ns = namespace();
        assert_eq!(ns.find_variable(&tree, s, "${HOST}").unwrap().source, "vars");

        tree.node_mut(s)
            .unwrap()
            .data
            .variable_table
            .variables
            .push(Variable::new("${HOST}", vec!["local".to_string()]));
        assert_eq!(ns.find_variable(&tree, s, "${HOST}").unwrap().source, "s");

        assert_eq!(
            ns.find_variable(&tree, s, "${TEMPDIR}").unwrap().source,
            "BuiltIn"
        );
        assert_eq!(ns.find_variable(&tree, s, "${nope}"), None);
    }

    #[test]
    fn suggestions_filter_and_sort() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        add_keyword(&mut tree, s, "Should Do Things");

        let mut ns = namespace();
        let all = ns.suggestions(&tree, s, "should be eq");
        assert!(!all.is_empty());
        assert!(all.iter().all(|k| normalize(&k.name).starts_with("shouldbeeq")));
        let names: Vec<&str> = all.iter().map(|k| k.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_by_key(|n| n.to_lowercase());
        assert_eq!(names, sorted);
    }

    #[test]
    fn where_used_re_resolves_lazily() {
        let mut tree = NodeTree::new();
        let s = suite(&mut tree, "/p/s.robot");
        let r = resource(&mut tree, "/p/common.resource");
        add_resource_import(&mut tree, s, "common.resource");

        let mut ns = namespace();
        assert!(!tree.resolution_valid);
        assert_eq!(ns.get_where_used(&mut tree, r), vec![s]);
        assert!(tree.resolution_valid);
        assert!(tree.node(r).unwrap().is_used());
    }
}
