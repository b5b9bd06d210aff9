//! Resolution caches.
//!
//! Three layers with different lifetimes: library keyword lists survive
//! until an explicit reset, resource path resolutions until the file is
//! renamed or expired, and per-file keyword resolutions only until the
//! next mutation anywhere in the project.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::controller::NodeId;
use crate::library::{KeywordInfo, LibraryManager};

type LibraryKey = (String, Vec<String>, Option<String>);

/// Keyword lists per `(library name, args, alias)` import.
#[derive(Default)]
pub struct LibraryCache {
    entries: HashMap<LibraryKey, Vec<KeywordInfo>>,
}

impl LibraryCache {
    pub fn keywords(
        &mut self,
        manager: &dyn LibraryManager,
        name: &str,
        args: &[String],
        alias: Option<&str>,
    ) -> &[KeywordInfo] {
        let key = (
            name.to_string(),
            args.to_vec(),
            alias.map(str::to_string),
        );
        self.entries.entry(key).or_insert_with(|| {
            manager.keywords(name, args, alias).unwrap_or_else(|err| {
                tracing::warn!(library = name, %err, "library query failed");
                Vec::new()
            })
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Resolved resource nodes keyed by absolute import path.
#[derive(Default)]
pub struct ResourceCache {
    entries: HashMap<PathBuf, NodeId>,
}

impl ResourceCache {
    pub fn get(&self, path: &Path) -> Option<NodeId> {
        self.entries.get(path).copied()
    }

    pub fn insert(&mut self, path: PathBuf, node: NodeId) {
        self.entries.insert(path, node);
    }

    /// Invalidate one path, e.g. after a filename change.
    pub fn expire(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Per-file keyword resolutions, including negative results.
#[derive(Default)]
pub struct ResolutionCache {
    entries: HashMap<(NodeId, String), Option<KeywordInfo>>,
}

impl ResolutionCache {
    pub fn get(&self, node: NodeId, normalized: &str) -> Option<&Option<KeywordInfo>> {
        self.entries.get(&(node, normalized.to_string()))
    }

    pub fn insert(&mut self, node: NodeId, normalized: String, info: Option<KeywordInfo>) {
        self.entries.insert((node, normalized), info);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
