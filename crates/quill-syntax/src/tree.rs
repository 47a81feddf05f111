//! Arena-backed mutable syntax tree.
//!
//! Node ids are indices into the arena and are never reused. Removing a
//! subtree marks its nodes dead instead of freeing them, so a handle taken
//! before a mutation can always be revalidated with [`Tree::ensure_alive`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use text_size::{TextRange, TextSize};
use thiserror::Error;

use crate::kind::NodeKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        NodeId(raw)
    }

    pub fn to_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    pub fn from_raw(raw: u32) -> Self {
        FileId(raw)
    }

    pub fn to_raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0:?} is no longer part of the tree")]
    Stale(NodeId),
    #[error("node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeId),
    #[error("node {0:?} is not attached to a parent")]
    Detached(NodeId),
    #[error("file `{path}` is read-only")]
    ReadOnly { path: String },
    #[error("child index {index} is out of bounds for node {parent:?}")]
    OutOfBounds { parent: NodeId, index: usize },
    #[error("unknown file {0:?}")]
    UnknownFile(FileId),
}

#[derive(Clone, Debug)]
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    range: Option<TextRange>,
    alive: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileContent {
    Java { root: NodeId },
    /// Non-code file (properties, XML, docs) searched for text occurrences.
    Text { text: String },
}

#[derive(Clone, Debug)]
pub struct SourceFile {
    id: FileId,
    path: String,
    content: FileContent,
    read_only: bool,
}

impl SourceFile {
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    pub fn root(&self) -> Option<NodeId> {
        match self.content {
            FileContent::Java { root } => Some(root),
            FileContent::Text { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            FileContent::Text { text } => Some(text),
            FileContent::Java { .. } => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[derive(Clone, Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    files: Vec<SourceFile>,
    revision: u64,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.alloc_with_range(kind, None)
    }

    pub fn alloc_with_range(&mut self, kind: NodeKind, range: Option<TextRange>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            range,
            alive: true,
        });
        id
    }

    /// Allocates a node and moves `children` under it, detaching them from any
    /// previous parent.
    pub fn build(&mut self, kind: NodeKind, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let id = self.alloc(kind);
        for child in children {
            self.unlink(child);
            self.nodes[child.index()].parent = Some(id);
            self.nodes[id.index()].children.push(child);
        }
        id
    }

    pub(crate) fn set_range(&mut self, id: NodeId, range: TextRange) {
        self.nodes[id.index()].range = Some(range);
    }

    pub fn add_java_file(&mut self, path: impl Into<String>, root: NodeId) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            id,
            path: path.into(),
            content: FileContent::Java { root },
            read_only: false,
        });
        id
    }

    pub fn add_text_file(&mut self, path: impl Into<String>, text: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            id,
            path: path.into(),
            content: FileContent::Text { text: text.into() },
            read_only: false,
        });
        id
    }

    pub fn set_read_only(&mut self, file: FileId, read_only: bool) -> Result<(), TreeError> {
        let entry = self
            .files
            .get_mut(file.0 as usize)
            .ok_or(TreeError::UnknownFile(file))?;
        entry.read_only = read_only;
        Ok(())
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    pub fn file_by_path(&self, path: &str) -> Option<FileId> {
        self.files.iter().find(|f| f.path == path).map(|f| f.id)
    }

    /// `(file, root)` for every Java file.
    pub fn java_files(&self) -> impl Iterator<Item = (FileId, NodeId)> + '_ {
        self.files.iter().filter_map(|f| f.root().map(|root| (f.id, root)))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(index).copied()
    }

    pub fn range(&self, id: NodeId) -> Option<TextRange> {
        self.nodes[id.index()].range
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(|node| node.alive)
    }

    pub fn ensure_alive(&self, id: NodeId) -> Result<(), TreeError> {
        if self.is_alive(id) {
            Ok(())
        } else {
            Err(TreeError::Stale(id))
        }
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// `id` and all of its descendants in preorder.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    pub fn file_of(&self, id: NodeId) -> Option<FileId> {
        let root = self.root_of(id);
        self.files
            .iter()
            .find(|f| f.root() == Some(root))
            .map(|f| f.id)
    }

    /// Whether `node` is `outer` or lies inside it.
    pub fn is_within(&self, node: NodeId, outer: NodeId) -> bool {
        node == outer || self.ancestors(node).any(|a| a == outer)
    }

    /// The child of `ancestor` on the path down to `node`.
    pub fn child_towards(&self, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            let parent = self.parent(current)?;
            if parent == ancestor {
                return Some(current);
            }
            current = parent;
        }
    }

    pub fn check_writable(&self, id: NodeId) -> Result<(), TreeError> {
        match self.file_of(id).and_then(|f| self.file(f)) {
            Some(file) if file.read_only => Err(TreeError::ReadOnly {
                path: file.path.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn kind_mut(&mut self, id: NodeId) -> Result<&mut NodeKind, TreeError> {
        self.ensure_alive(id)?;
        self.check_writable(id)?;
        self.revision += 1;
        Ok(&mut self.nodes[id.index()].kind)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.ensure_alive(parent)?;
        self.ensure_alive(child)?;
        self.check_writable(parent)?;
        if self.parent(child).is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        if index > self.children(parent).len() {
            return Err(TreeError::OutOfBounds { parent, index });
        }
        self.nodes[parent.index()].children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
        self.revision += 1;
        Ok(())
    }

    /// Unlinks `id` from its parent; the subtree stays alive.
    pub fn detach(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        self.ensure_alive(id)?;
        let parent = self.parent(id).ok_or(TreeError::Detached(id))?;
        self.check_writable(parent)?;
        self.unlink(id);
        self.revision += 1;
        Ok(id)
    }

    /// Unlinks `id` (if attached) and marks its whole subtree dead.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.ensure_alive(id)?;
        if let Some(parent) = self.parent(id) {
            self.check_writable(parent)?;
            self.unlink(id);
        }
        self.kill(id);
        self.revision += 1;
        Ok(())
    }

    /// Puts the detached node `new` into the slot of `old` and kills `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), TreeError> {
        self.replace_keep(old, new)?;
        self.kill(old);
        Ok(())
    }

    /// Puts the detached node `new` into the slot of `old`; `old` stays alive
    /// but detached so it can be re-attached elsewhere.
    pub fn replace_keep(&mut self, old: NodeId, new: NodeId) -> Result<(), TreeError> {
        self.ensure_alive(old)?;
        self.ensure_alive(new)?;
        if self.parent(new).is_some() {
            return Err(TreeError::AlreadyAttached(new));
        }
        let parent = self.parent(old).ok_or(TreeError::Detached(old))?;
        self.check_writable(parent)?;
        let index = self
            .index_in_parent(old)
            .ok_or(TreeError::Detached(old))?;
        self.nodes[parent.index()].children[index] = new;
        self.nodes[new.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
        self.revision += 1;
        Ok(())
    }

    /// Copies the subtree rooted at `id`; the copy is detached and has no ranges.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        self.deep_copy_with_map(id).0
    }

    /// Like [`Tree::deep_copy`], also returning the original -> copy mapping.
    pub fn deep_copy_with_map(&mut self, id: NodeId) -> (NodeId, HashMap<NodeId, NodeId>) {
        let mut map = HashMap::new();
        let copy = self.copy_rec(id, &mut map);
        (copy, map)
    }

    fn copy_rec(&mut self, id: NodeId, map: &mut HashMap<NodeId, NodeId>) -> NodeId {
        let kind = self.kind(id).clone();
        let children = self.children(id).to_vec();
        let copy = self.alloc(kind);
        map.insert(id, copy);
        for child in children {
            let child_copy = self.copy_rec(child, map);
            self.nodes[child_copy.index()].parent = Some(copy);
            self.nodes[copy.index()].children.push(child_copy);
        }
        copy
    }

    /// Innermost node of `file` whose source range contains `offset`.
    pub fn node_at_offset(&self, file: FileId, offset: TextSize) -> Option<NodeId> {
        let root = self.file(file)?.root()?;
        let mut current = root;
        'descend: loop {
            for &child in self.children(current) {
                if self.range(child).is_some_and(|r| r.contains(offset)) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    fn kill(&mut self, id: NodeId) {
        for node in self.descendants(id) {
            self.nodes[node.index()].alive = false;
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}
