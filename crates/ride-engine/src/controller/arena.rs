//! Slot arena for controller nodes.
//!
//! Controllers form a cyclic graph (parents, children, importing sites),
//! so nodes are stored in one arena and refer to each other by id. Ids are
//! never reused; removing a node leaves a dead slot behind so a stale id
//! resolves to `None` instead of to an unrelated node.

/// Stable identity of a controller node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Target id for project-scoped commands that address no node. Never
    /// allocated, so lookups resolve to `None`.
    pub const DETACHED: NodeId = NodeId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn alloc(&mut self, value: T) -> NodeId {
        self.alloc_with(|_| value)
    }

    /// Allocate with the new id in hand, for values that store their own id.
    pub fn alloc_with(&mut self, f: impl FnOnce(NodeId) -> T) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(f(id)));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        self.slots.get_mut(id.index())?.take()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Live nodes in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (NodeId(i as u32), v)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
