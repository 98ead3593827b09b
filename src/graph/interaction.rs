//! Pointer-driven hover, selection and drag state, and the highlight policy
//! derived from it.

use std::collections::HashSet;

use egui::Pos2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::GraphModel;
use super::scene::Scene;
use super::simulation::ForceSimulation;

/// Selected glyph radius multiplier
const SELECTED_RADIUS_SCALE: f32 = 1.2;
/// Incident edge width multiplier for the selected vertex
const SELECTED_EDGE_SCALE: f32 = 1.5;

/// Which vertices get labels when hover and selection are both present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelPrecedence {
    /// The hovered neighborhood wins while hovering; selection otherwise
    #[default]
    HoverFirst,
    /// Hovered and selected neighborhoods are both labeled
    Union,
}

impl LabelPrecedence {
    pub fn label(&self) -> &'static str {
        match self {
            LabelPrecedence::HoverFirst => "Hover first",
            LabelPrecedence::Union => "Hover + selection",
        }
    }
}

/// Outgoing selection notification. `Cleared` is reported to callers as an
/// empty id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    Selected(String),
    Cleared,
}

impl SelectionEvent {
    pub fn as_id(&self) -> &str {
        match self {
            SelectionEvent::Selected(id) => id,
            SelectionEvent::Cleared => "",
        }
    }
}

#[derive(Debug, Default)]
pub struct InteractionController {
    /// Sticky until another click or an external change
    selected: Option<String>,
    hovered: Option<String>,
    /// Declared neighbours of the hovered vertex
    hovered_neighbors: HashSet<String>,
    dragging: Option<usize>,
}

impl InteractionController {
    pub fn new(selected: Option<String>) -> Self {
        Self {
            selected,
            ..Default::default()
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn hovered_neighbors(&self) -> &HashSet<String> {
        &self.hovered_neighbors
    }

    pub fn dragging(&self) -> Option<usize> {
        self.dragging
    }

    /// Pointer entered a glyph. Ignored mid-drag. Returns true on change.
    pub fn pointer_enter(&mut self, model: &GraphModel, index: usize) -> bool {
        if self.dragging.is_some() {
            return false;
        }
        self.set_hover(model, index)
    }

    /// Pointer left every glyph. Ignored mid-drag. Returns true on change.
    pub fn pointer_leave(&mut self) -> bool {
        if self.dragging.is_some() || self.hovered.is_none() {
            return false;
        }
        self.hovered = None;
        self.hovered_neighbors.clear();
        true
    }

    fn set_hover(&mut self, model: &GraphModel, index: usize) -> bool {
        let Some(vertex) = model.vertices.get(index) else {
            return false;
        };
        if self.hovered.as_deref() == Some(vertex.id.as_str()) {
            return false;
        }
        self.hovered = Some(vertex.id.clone());
        self.hovered_neighbors = vertex.neighbor_ids.iter().cloned().collect();
        true
    }

    pub fn click_vertex(&mut self, model: &GraphModel, index: usize) -> Option<SelectionEvent> {
        let id = model.vertices.get(index)?.id.clone();
        debug!(id = %id, "Vertex selected");
        self.selected = Some(id.clone());
        Some(SelectionEvent::Selected(id))
    }

    pub fn click_canvas(&mut self) -> SelectionEvent {
        if self.selected.take().is_some() {
            debug!("Selection cleared");
        }
        SelectionEvent::Cleared
    }

    /// Selection set from outside the canvas. Ids absent from the model are
    /// ignored. Returns true when the selection changed.
    pub fn select(&mut self, model: &GraphModel, id: Option<&str>) -> bool {
        match id {
            Some(id) if !model.contains(id) => false,
            _ if self.selected.as_deref() == id => false,
            _ => {
                self.selected = id.map(str::to_string);
                true
            }
        }
    }

    /// Start dragging a vertex: it becomes hovered and is pinned at `pos`.
    pub fn drag_start(&mut self, model: &GraphModel, simulation: &mut ForceSimulation, index: usize, pos: Pos2) {
        if index >= model.len() {
            return;
        }
        self.set_hover(model, index);
        self.dragging = Some(index);
        simulation.drag_start(index, pos);
    }

    pub fn drag_move(&mut self, simulation: &mut ForceSimulation, pos: Pos2) {
        if let Some(index) = self.dragging {
            simulation.drag_to(index, pos);
        }
    }

    /// Release the dragged vertex. Returns true if a drag was in progress.
    pub fn drag_end(&mut self, simulation: &mut ForceSimulation) -> bool {
        match self.dragging.take() {
            Some(index) => {
                simulation.drag_end(index);
                true
            }
            None => false,
        }
    }

    /// Vertices whose labels are shown.
    pub fn visible_labels(
        &self,
        model: &GraphModel,
        show_all: bool,
        precedence: LabelPrecedence,
    ) -> HashSet<usize> {
        if show_all {
            return (0..model.len()).collect();
        }

        let hovered = self.hovered.as_deref().and_then(|id| model.index_of(id)).map(|index| {
            let mut set: HashSet<usize> = self
                .hovered_neighbors
                .iter()
                .filter_map(|id| model.index_of(id))
                .collect();
            set.insert(index);
            set
        });
        let selected = self.selected.as_deref().and_then(|id| model.index_of(id)).map(|index| {
            let mut set: HashSet<usize> = model.neighbor_indices(index).into_iter().collect();
            set.insert(index);
            set
        });

        match (precedence, hovered, selected) {
            (LabelPrecedence::HoverFirst, Some(hovered), _) => hovered,
            (LabelPrecedence::Union, Some(hovered), Some(selected)) => &hovered | &selected,
            (_, Some(hovered), None) => hovered,
            (_, None, Some(selected)) => selected,
            (_, None, None) => HashSet::new(),
        }
    }

    /// Recompute every glyph, line and label encoding from scratch.
    pub fn apply_highlight(
        &self,
        model: &GraphModel,
        scene: &mut Scene,
        show_all: bool,
        precedence: LabelPrecedence,
    ) {
        scene.reset_highlight();

        if let Some(index) = self.selected.as_deref().and_then(|id| model.index_of(id)) {
            scene.highlight_glyph(index, SELECTED_RADIUS_SCALE);
            for edge in model.incident_edges(index) {
                scene.highlight_line(edge, SELECTED_EDGE_SCALE);
            }
        }

        let visible = self.visible_labels(model, show_all, precedence);
        scene.hide_all_labels();
        for index in visible {
            scene.set_label_visible(index, true);
        }
    }
}
