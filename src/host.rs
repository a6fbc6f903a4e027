use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::tree::{NodeSpec, Surface, SurfaceId, UiSnapshot, UiTree};

/// A mutation the engine made against a [`MemoryTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SetText { id: SurfaceId, text: String },
    Click { id: SurfaceId },
}

/// Shared, append-only record of [`UiEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<UiEvent>>>);

impl EventLog {
    fn push(&self, event: UiEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn snapshot(&self) -> Vec<UiEvent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Texts written by `SetText` events, in order.
    pub fn texts(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::SetText { text, .. } => Some(text),
                UiEvent::Click { .. } => None,
            })
            .collect()
    }
}

/// In-process UI tree backed by a [`NodeSpec`].
///
/// `set_text` edits the node's text so later snapshots reflect it. Used by the
/// CLI to dry-run the engine against a JSON fixture, and by tests.
#[derive(Debug)]
pub struct MemoryTree {
    root: NodeSpec,
    events: EventLog,
    trace: bool,
}

impl MemoryTree {
    pub fn new(mut root: NodeSpec) -> Self {
        root.assign_ids();
        Self {
            root,
            events: EventLog::default(),
            trace: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let root: NodeSpec = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse UI tree JSON in {}", path.display()))?;
        Ok(Self::new(root))
    }

    /// Echo every mutation to stderr.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    pub fn snapshot(&self) -> UiSnapshot {
        UiSnapshot::from_spec(&self.root)
    }
}

impl UiTree for MemoryTree {
    fn current_root(&mut self) -> Option<UiSnapshot> {
        Some(self.snapshot())
    }

    fn set_text(&mut self, surface: &Surface, text: &str) -> bool {
        let Some(node) = self.root.find_mut(surface.id.0) else {
            return false;
        };
        node.text = Some(text.to_string());
        self.events.push(UiEvent::SetText {
            id: surface.id,
            text: text.to_string(),
        });
        if self.trace {
            print_trace_line(TraceKind::SetText, &format!("{text:?}"));
        }
        true
    }

    fn click(&mut self, surface: &Surface) -> bool {
        if self.root.find_mut(surface.id.0).is_none() {
            return false;
        }
        self.events.push(UiEvent::Click { id: surface.id });
        if self.trace {
            print_trace_line(TraceKind::Click, &surface.to_string());
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum TraceKind {
    SetText,
    Click,
}

fn print_trace_line(kind: TraceKind, rest: &str) {
    const RESET: &str = "\x1b[0m";
    const SET_TEXT: &str = "\x1b[34m";
    const CLICK: &str = "\x1b[33m";

    match kind {
        TraceKind::SetText => eprintln!("{SET_TEXT}SetText{RESET} {rest}"),
        TraceKind::Click => eprintln!("{CLICK}Click{RESET} {rest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_text_is_visible_in_next_snapshot() {
        let mut tree = MemoryTree::new(
            NodeSpec::new("Root").child(NodeSpec::new("android.widget.EditText")),
        );
        let snapshot = tree.snapshot();
        let field = snapshot.surface(snapshot.children(snapshot.root())[0]);

        assert!(tree.set_text(&field, "hi"));
        let after = tree.current_root().expect("memory tree always has a root");
        let node = after.node(after.find(field.id).expect("field still present"));
        assert_eq!(node.text.as_deref(), Some("hi"));
        assert_eq!(tree.events().texts(), ["hi"]);
    }

    #[test]
    fn mutations_on_unknown_surfaces_fail() {
        let mut tree = MemoryTree::new(NodeSpec::new("Root"));
        let ghost = Surface {
            id: SurfaceId(42),
            class_name: "Button".to_string(),
            label: None,
        };
        assert!(!tree.set_text(&ghost, "x"));
        assert!(!tree.click(&ghost));
        assert!(tree.events().is_empty());
    }
}
