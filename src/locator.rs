use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tree::{NodeIndex, Surface, UiSnapshot};

/// Labels and identifiers the locator looks for, in priority order.
///
/// Labels are compared to node text exactly, whitespace included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorProfile {
    /// Placeholder texts shown by the input surface before it is focused.
    pub input_hints: Vec<String>,
    /// Element kind of an editable text field.
    pub text_field_class: String,
    /// Visible labels of the submit control.
    pub submit_labels: Vec<String>,
    /// Stable platform identifier of the submit control.
    pub submit_view_id: String,
}

impl Default for LocatorProfile {
    fn default() -> Self {
        Self {
            input_hints: [
                "说点什么",
                "发送弹幕",
                "说说你的想法",
                "发条弹幕",
                "Say something...",
                "Add a comment...",
            ]
            .map(String::from)
            .to_vec(),
            text_field_class: "android.widget.EditText".to_string(),
            submit_labels: ["发送", "发布", "Send", "Post"].map(String::from).to_vec(),
            submit_view_id: "send_btn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accept {
    ClickableOrEnabled,
    ClickableOnly,
}

impl Accept {
    fn accepts(self, snapshot: &UiSnapshot, index: NodeIndex) -> bool {
        let node = snapshot.node(index);
        match self {
            Accept::ClickableOrEnabled => node.clickable || node.enabled,
            Accept::ClickableOnly => node.clickable,
        }
    }
}

fn text_matches<'a>(
    snapshot: &'a UiSnapshot,
    label: &'a str,
) -> impl Iterator<Item = NodeIndex> + 'a {
    snapshot
        .pre_order()
        .filter(move |&i| snapshot.node(i).text.as_deref() == Some(label))
}

/// First node matching one of `labels` (in label order) that is itself
/// acceptable, or has a clickable ancestor.
fn find_by_labels(snapshot: &UiSnapshot, labels: &[String], accept: Accept) -> Option<NodeIndex> {
    for label in labels {
        for index in text_matches(snapshot, label) {
            if accept.accepts(snapshot, index) {
                debug!(label = %label, "matched labelled node");
                return Some(index);
            }

            if let Some(ancestor) = snapshot
                .ancestors(index)
                .find(|&a| snapshot.node(a).clickable)
            {
                debug!(label = %label, "matched clickable ancestor of labelled node");
                return Some(ancestor);
            }
        }
    }
    None
}

fn first_of_class(snapshot: &UiSnapshot, class_name: &str) -> Option<NodeIndex> {
    snapshot
        .pre_order()
        .find(|&i| snapshot.node(i).class_name == class_name)
}

/// Locate the surface to tap so the application opens its text input.
pub fn find_input_surface(snapshot: &UiSnapshot, profile: &LocatorProfile) -> Option<Surface> {
    find_by_labels(snapshot, &profile.input_hints, Accept::ClickableOrEnabled)
        .or_else(|| first_of_class(snapshot, &profile.text_field_class))
        .map(|i| snapshot.surface(i))
}

/// Locate the control that sends the typed text.
pub fn find_submit_control(snapshot: &UiSnapshot, profile: &LocatorProfile) -> Option<Surface> {
    find_by_labels(snapshot, &profile.submit_labels, Accept::ClickableOnly)
        .or_else(|| {
            snapshot.pre_order().find(|&i| {
                snapshot.node(i).view_id.as_deref() == Some(profile.submit_view_id.as_str())
            })
        })
        .map(|i| snapshot.surface(i))
}

/// Resolve the element that should receive text once the input surface has
/// been tapped: the focused node, else the first text field, else `tapped`.
pub fn find_typing_target(
    snapshot: &UiSnapshot,
    profile: &LocatorProfile,
    tapped: &Surface,
) -> Surface {
    snapshot
        .pre_order()
        .find(|&i| snapshot.node(i).focused)
        .or_else(|| first_of_class(snapshot, &profile.text_field_class))
        .map(|i| snapshot.surface(i))
        .unwrap_or_else(|| tapped.clone())
}
