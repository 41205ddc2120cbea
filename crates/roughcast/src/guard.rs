//! Idempotency and identity guard.
//!
//! Every diagram surface moves through `Unseen -> Processing -> Processed` exactly once. The
//! processed set is keyed by [`NodeId`] and owned by the caller's context; the
//! [`PROCESSED_ATTR`] marker written on the root only mirrors it so that re-parsed output is
//! still recognized as done.

use crate::dom::{Document, NodeId};
use rustc_hash::FxHashMap;

/// Marks an element generated as the hand-drawn replacement of a primitive.
pub const REPLACEMENT_ATTR: &str = "data-sketch-replacement";
/// Marks a diagram root whose pass has completed.
pub const PROCESSED_ATTR: &str = "data-sketch-processed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Unseen,
    Processing,
    Processed,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    states: FxHashMap<NodeId, SurfaceState>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, surface: NodeId) -> SurfaceState {
        self.states
            .get(&surface)
            .copied()
            .unwrap_or(SurfaceState::Unseen)
    }

    pub fn is_processed(&self, surface: NodeId) -> bool {
        self.state(surface) == SurfaceState::Processed
    }

    /// Moves `surface` from `Unseen` to `Processing`. Returns `false` (and changes nothing) for
    /// any other starting state.
    pub fn begin(&mut self, surface: NodeId) -> bool {
        if self.state(surface) != SurfaceState::Unseen {
            return false;
        }
        self.states.insert(surface, SurfaceState::Processing);
        true
    }

    /// Terminal transition. Also accepts `Unseen` so that roots found already marked in the
    /// document can be recorded directly.
    pub fn finish(&mut self, surface: NodeId) {
        self.states.insert(surface, SurfaceState::Processed);
    }

    pub fn processed_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == SurfaceState::Processed)
            .count()
    }
}

/// Containers whose content is never painted directly (referenced definitions, markers, clip
/// paths, embedded foreign content).
pub fn is_template_container(local_name: &str) -> bool {
    matches!(
        local_name,
        "defs"
            | "marker"
            | "foreignObject"
            | "symbol"
            | "clipPath"
            | "mask"
            | "pattern"
            | "linearGradient"
            | "radialGradient"
            | "filter"
    )
}

/// Whether `id` sits under a template container or an existing replacement, looking no further
/// up than `surface`.
pub fn is_excluded(doc: &Document, id: NodeId, surface: NodeId) -> bool {
    for a in doc.ancestors(id) {
        if let Some(el) = doc.element(a) {
            if is_template_container(el.local_name()) || el.has_attr(REPLACEMENT_ATTR) {
                return true;
            }
        }
        if a == surface {
            break;
        }
    }
    false
}

pub fn is_marked_processed(doc: &Document, surface: NodeId) -> bool {
    doc.element(surface)
        .and_then(|el| el.attr(PROCESSED_ATTR))
        .is_some_and(|v| v == "true")
}

pub fn mark_processed(doc: &mut Document, surface: NodeId) {
    if let Some(el) = doc.element_mut(surface) {
        el.set_attr(PROCESSED_ATTR, "true");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_is_one_way() {
        let doc = Document::parse("<svg/>").unwrap();
        let svg = doc.root_element().unwrap();
        let mut set = ProcessedSet::new();
        assert_eq!(set.state(svg), SurfaceState::Unseen);
        assert!(set.begin(svg));
        assert!(!set.begin(svg));
        set.finish(svg);
        assert!(set.is_processed(svg));
        assert!(!set.begin(svg));
        assert_eq!(set.processed_count(), 1);
    }

    #[test]
    fn exclusion_covers_defs_markers_and_foreign_content() {
        let doc = Document::parse(
            r#"<svg><defs><path d="M0 0"/></defs><marker><path d="M0 0"/></marker><foreignObject><div/></foreignObject><g><rect/></g></svg>"#,
        )
        .unwrap();
        let svg = doc.root_element().unwrap();
        let excluded: Vec<bool> = doc
            .descendants(svg)
            .into_iter()
            .filter(|&id| {
                doc.element(id)
                    .is_some_and(|e| matches!(e.local_name(), "path" | "div" | "rect"))
            })
            .map(|id| is_excluded(&doc, id, svg))
            .collect();
        assert_eq!(excluded, vec![true, true, true, false]);
    }
}
