use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-assigned identity of a live UI element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// Position of a node inside one [`UiSnapshot`]. Meaningless across snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

/// Handle to an interactive element, handed back to [`UiTree::set_text`] and
/// [`UiTree::click`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub id: SurfaceId,
    pub class_name: String,
    pub label: Option<String>,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}#{} {label:?}", self.class_name, self.id.0),
            None => write!(f, "{}#{}", self.class_name, self.id.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiNode {
    pub id: SurfaceId,
    pub text: Option<String>,
    pub class_name: String,
    pub view_id: Option<String>,
    pub clickable: bool,
    pub enabled: bool,
    pub focused: bool,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
}

/// Owned, read-only copy of the host's UI tree at one point in time.
///
/// Nodes are stored in pre-order, so iterating [`UiSnapshot::pre_order`] is the
/// same walk a recursive depth-first search would do.
#[derive(Debug, Clone)]
pub struct UiSnapshot {
    nodes: Vec<UiNode>,
}

impl UiSnapshot {
    /// Materialize a snapshot from a declarative tree.
    ///
    /// Nodes without an explicit `id` get their pre-order position as id.
    pub fn from_spec(root: &NodeSpec) -> Self {
        let mut snapshot = Self { nodes: Vec::new() };
        snapshot.push_spec(root, None);
        snapshot
    }

    fn push_spec(&mut self, spec: &NodeSpec, parent: Option<NodeIndex>) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(UiNode {
            id: SurfaceId(spec.id.unwrap_or(index.0 as u64)),
            text: spec.text.clone(),
            class_name: spec.class_name.clone(),
            view_id: spec.view_id.clone(),
            clickable: spec.clickable,
            enabled: spec.enabled,
            focused: spec.focused,
            parent,
            children: Vec::with_capacity(spec.children.len()),
        });

        for child in &spec.children {
            let child_index = self.push_spec(child, Some(index));
            self.nodes[index.0].children.push(child_index);
        }

        index
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn node(&self, index: NodeIndex) -> &UiNode {
        &self.nodes[index.0]
    }

    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.nodes[index.0].parent
    }

    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index.0].children
    }

    /// Ancestors of `index`, nearest first. Does not include `index` itself.
    pub fn ancestors(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.parent(index), move |&i| self.parent(i))
    }

    pub fn pre_order(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn find(&self, id: SurfaceId) -> Option<NodeIndex> {
        self.pre_order().find(|&i| self.node(i).id == id)
    }

    pub fn surface(&self, index: NodeIndex) -> Surface {
        let node = self.node(index);
        Surface {
            id: node.id,
            class_name: node.class_name.clone(),
            label: node.text.clone().or_else(|| node.view_id.clone()),
        }
    }
}

/// Declarative description of a UI tree, used by hosts to build snapshots and
/// by the CLI to load JSON fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub id: Option<u64>,
    pub text: Option<String>,
    pub class_name: String,
    pub view_id: Option<String>,
    pub clickable: bool,
    pub enabled: bool,
    pub focused: bool,
    pub children: Vec<NodeSpec>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            id: None,
            text: None,
            class_name: "android.view.View".to_string(),
            view_id: None,
            clickable: false,
            enabled: true,
            focused: false,
            children: Vec::new(),
        }
    }
}

impl NodeSpec {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first search for the node with `id`, for hosts that keep their
    /// live state as a `NodeSpec` tree.
    pub fn find_mut(&mut self, id: u64) -> Option<&mut NodeSpec> {
        if self.id == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Give every node without an explicit id its pre-order position, so ids
    /// stay stable when the tree is edited and re-snapshotted.
    pub fn assign_ids(&mut self) {
        fn walk(node: &mut NodeSpec, next: &mut u64) {
            if node.id.is_none() {
                node.id = Some(*next);
            }
            *next += 1;
            for child in &mut node.children {
                walk(child, next);
            }
        }
        let mut next = 0;
        walk(self, &mut next);
    }
}

/// The live UI of the application being driven.
///
/// Mutations report failure by returning `false`; callers treat that as
/// recoverable. Implementations that must touch the UI from a particular
/// thread are expected to marshal the call themselves.
pub trait UiTree: Send {
    fn current_root(&mut self) -> Option<UiSnapshot>;

    /// Replace the whole text content of `surface`.
    fn set_text(&mut self, surface: &Surface, text: &str) -> bool;

    fn click(&mut self, surface: &Surface) -> bool;
}
