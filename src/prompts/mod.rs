//! Click prompts that steer external inference, stored per label.

mod request;

pub use request::{RequestGenerations, RequestTicket};

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::math::{IndexPoint, Point3};
use crate::volume::{Label, VoxelVolume};

/// Whether a click marks the structure or its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Foreground,
    Background,
}

/// A single click in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prompt {
    pub world_point: Point3,
    pub kind: PromptKind,
}

/// The ordered prompts recorded for one label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromptSet {
    pub label: String,
    pub prompts: Vec<Prompt>,
}

impl PromptSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompts of one kind, in click order.
    pub fn of_kind(&self, kind: PromptKind) -> impl Iterator<Item = &Prompt> {
        self.prompts.iter().filter(move |p| p.kind == kind)
    }
}

/// Result of [`AnnotationPromptStore::switch_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSwitch {
    /// True the first time a label is selected in this store. Hosts use it
    /// to run inference automatically on first selection.
    pub first_visit: bool,
}

/// Index-space payload for one inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferencePrompts {
    pub label: String,
    /// Class the response should be written as.
    pub class: Label,
    pub foreground: Vec<IndexPoint>,
    pub background: Vec<IndexPoint>,
}

/// Visible prompts of the active label plus saved sets for every other
/// label.
#[derive(Debug, Clone, Default)]
pub struct AnnotationPromptStore {
    active: Vec<Prompt>,
    saved: HashMap<String, PromptSet>,
    current_label: Option<String>,
    visited: HashSet<String>,
}

impl AnnotationPromptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a click on the visible surface.
    pub fn add_prompt(&mut self, world_point: Point3, kind: PromptKind) {
        self.active.push(Prompt { world_point, kind });
    }

    /// The visible prompts, in click order.
    #[must_use]
    pub fn active(&self) -> &[Prompt] {
        &self.active
    }

    #[must_use]
    pub fn current_label(&self) -> Option<&str> {
        self.current_label.as_deref()
    }

    /// Snapshots the visible prompts as the saved set for `label`.
    pub fn save(&mut self, label: &str) -> PromptSet {
        let set = PromptSet {
            label: label.to_owned(),
            prompts: self.active.clone(),
        };
        self.saved.insert(label.to_owned(), set.clone());
        set
    }

    /// Replaces the visible prompts with the saved set for `label`, or
    /// clears them if nothing was saved.
    pub fn restore(&mut self, label: &str) {
        self.active = self
            .saved
            .get(label)
            .map(|set| set.prompts.clone())
            .unwrap_or_default();
    }

    /// Drops the saved prompts for `label`, and the visible prompts too
    /// when `label` is current. Other labels are untouched.
    pub fn clear(&mut self, label: &str) {
        self.saved.remove(label);
        if self.current_label.as_deref() == Some(label) {
            self.active.clear();
        }
    }

    /// Drops every saved set and the visible prompts.
    pub fn clear_all(&mut self) {
        self.saved.clear();
        self.active.clear();
    }

    /// The saved set for `label`.
    #[must_use]
    pub fn saved(&self, label: &str) -> Option<&PromptSet> {
        self.saved.get(label)
    }

    /// Makes `label` current: saves the outgoing label's visible prompts
    /// (dropping its saved set if none are visible) and restores the
    /// incoming label's.
    pub fn switch_label(&mut self, label: &str) -> LabelSwitch {
        if let Some(previous) = self.current_label.take() {
            if previous != label {
                if self.active.is_empty() {
                    self.saved.remove(&previous);
                } else {
                    self.save(&previous);
                }
                self.restore(label);
            }
        } else {
            self.restore(label);
        }
        self.current_label = Some(label.to_owned());
        let first_visit = self.visited.insert(label.to_owned());
        debug!(label, first_visit, "prompt label switched");
        LabelSwitch { first_visit }
    }

    /// Labels with a non-empty saved set, sorted.
    #[must_use]
    pub fn annotated_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .saved
            .values()
            .filter(|set| !set.is_empty())
            .map(|set| set.label.clone())
            .collect();
        labels.sort();
        labels
    }

    /// Maps the prompts of one kind to the nearest voxel indices, in click
    /// order. Indices may fall outside the volume.
    #[must_use]
    pub fn to_index_space_points(
        volume: &VoxelVolume,
        set: &PromptSet,
        kind: PromptKind,
    ) -> Vec<IndexPoint> {
        set.of_kind(kind)
            .map(|p| volume.world_to_index(&p.world_point))
            .collect()
    }

    /// Builds the inference payload for `label`. The current label's
    /// visible prompts take precedence over its saved set. Points outside
    /// the volume or with non-finite coordinates are dropped.
    #[must_use]
    pub fn prompt_payload(&self, volume: &VoxelVolume, label: &str, class: Label) -> InferencePrompts {
        let set = if self.current_label.as_deref() == Some(label) {
            PromptSet {
                label: label.to_owned(),
                prompts: self.active.clone(),
            }
        } else {
            self.saved.get(label).cloned().unwrap_or_else(|| PromptSet {
                label: label.to_owned(),
                prompts: Vec::new(),
            })
        };

        let in_volume = |kind| {
            let total = set.of_kind(kind).count();
            let kept: Vec<IndexPoint> = set
                .of_kind(kind)
                .filter_map(|p| volume.world_to_index_in_bounds(&p.world_point).ok())
                .collect();
            if kept.len() < total {
                debug!(label, dropped = total - kept.len(), "prompts outside volume dropped");
            }
            kept
        };

        InferencePrompts {
            label: label.to_owned(),
            class,
            foreground: in_volume(PromptKind::Foreground),
            background: in_volume(PromptKind::Background),
        }
    }
}
