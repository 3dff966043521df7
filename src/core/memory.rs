//! Purpose: Provide the in-process reference backend for the node store.
//! Exports: `MemoryStore`.
//! Role: Backs local notebooks, servers, and tests.
//! Invariants: One RwLock guards the whole tree; mutations hold it
//! exclusively, reads share it, so no partial mutation is ever observable.
//! Invariants: A parent's child list and its children's parent fields agree.
//! Invariants: Children keep insertion order; a moved node re-enters at the end.

use crate::core::error::{Error, ErrorKind};
use crate::core::node::{Attrs, Node, NodeId, TitleMatch};
use crate::core::store::{NodeStore, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct NodeRecord {
    parent: Option<NodeId>,
    attrs: Attrs,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Inner {
    root: NodeId,
    nodes: HashMap<NodeId, NodeRecord>,
}

/// Cloning shares the underlying tree; an embedding application may hand a
/// clone to a `Server` and keep direct access, with the lock as the
/// synchronization point.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_root_id(NodeId::generate())
    }

    pub fn with_root_id(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            NodeRecord {
                parent: None,
                attrs: Attrs::new(),
                children: Vec::new(),
            },
        );
        Self {
            inner: Arc::new(RwLock::new(Inner { root, nodes })),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for MemoryStore {
    fn root_id(&self) -> StoreResult<NodeId> {
        Ok(self.inner.read().root.clone())
    }

    fn node(&self, id: &NodeId) -> StoreResult<Node> {
        let inner = self.inner.read();
        let record = inner.nodes.get(id).ok_or_else(|| not_found(id))?;
        Ok(Node {
            id: id.clone(),
            parent: record.parent.clone(),
            attrs: record.attrs.clone(),
            children: record.children.clone(),
        })
    }

    fn create_node(
        &self,
        parent: &NodeId,
        attrs: Attrs,
        id: Option<NodeId>,
    ) -> StoreResult<NodeId> {
        let mut inner = self.inner.write();
        if let Some(explicit) = &id {
            if inner.nodes.contains_key(explicit) {
                return Err(Error::new(ErrorKind::DuplicateId)
                    .with_message("node id already exists")
                    .with_node(explicit.as_str()));
            }
        }
        let Some(parent_record) = inner.nodes.get_mut(parent) else {
            return Err(not_found(parent));
        };
        let id = id.unwrap_or_else(NodeId::generate);
        parent_record.children.push(id.clone());
        inner.nodes.insert(
            id.clone(),
            NodeRecord {
                parent: Some(parent.clone()),
                attrs,
                children: Vec::new(),
            },
        );
        Ok(id)
    }

    fn set_attrs(&self, id: &NodeId, partial: Attrs) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let Some(record) = inner.nodes.get_mut(id) else {
            return Err(not_found(id));
        };
        for (key, value) in partial {
            record.attrs.insert(key, value);
        }
        Ok(())
    }

    fn delete_node(&self, id: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(id) {
            return Err(not_found(id));
        }
        if *id == inner.root {
            return Err(Error::new(ErrorKind::InvalidOperation)
                .with_message("the root node cannot be deleted")
                .with_node(id.as_str()));
        }
        let parent = inner.nodes.get(id).and_then(|record| record.parent.clone());
        if let Some(parent) = parent {
            if let Some(record) = inner.nodes.get_mut(&parent) {
                record.children.retain(|child| child != id);
            }
        }
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if let Some(record) = inner.nodes.remove(&next) {
                stack.extend(record.children);
            }
        }
        Ok(())
    }

    fn move_node(&self, id: &NodeId, new_parent: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(id) {
            return Err(not_found(id));
        }
        if !inner.nodes.contains_key(new_parent) {
            return Err(not_found(new_parent));
        }
        if *id == inner.root {
            return Err(Error::new(ErrorKind::InvalidOperation)
                .with_message("the root node cannot be moved")
                .with_node(id.as_str()));
        }
        // Walk ancestors of the target; hitting `id` means the move would
        // detach the subtree from the tree. Covers new_parent == id.
        let mut cursor = Some(new_parent.clone());
        while let Some(current) = cursor {
            if current == *id {
                return Err(Error::new(ErrorKind::CycleDetected)
                    .with_message("new parent is the node or one of its descendants")
                    .with_node(id.as_str()));
            }
            cursor = inner
                .nodes
                .get(&current)
                .and_then(|record| record.parent.clone());
        }
        let old_parent = inner.nodes.get(id).and_then(|record| record.parent.clone());
        if let Some(old_parent) = old_parent {
            if let Some(record) = inner.nodes.get_mut(&old_parent) {
                record.children.retain(|child| child != id);
            }
        }
        if let Some(record) = inner.nodes.get_mut(new_parent) {
            record.children.push(id.clone());
        }
        if let Some(record) = inner.nodes.get_mut(id) {
            record.parent = Some(new_parent.clone());
        }
        Ok(())
    }

    fn search_title(&self, query: &str) -> StoreResult<Vec<TitleMatch>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read();
        let mut matches: Vec<TitleMatch> = inner
            .nodes
            .iter()
            .filter_map(|(id, record)| {
                let title = record.attrs.get("title")?.as_str()?;
                title
                    .to_lowercase()
                    .contains(&needle)
                    .then(|| TitleMatch {
                        nodeid: id.clone(),
                        title: title.to_string(),
                    })
            })
            .collect();
        matches.sort_by(|a, b| (&a.title, &a.nodeid).cmp(&(&b.title, &b.nodeid)));
        Ok(matches)
    }
}

fn not_found(id: &NodeId) -> Error {
    Error::new(ErrorKind::NodeNotFound)
        .with_message("no such node")
        .with_node(id.as_str())
}
