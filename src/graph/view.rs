//! The graph canvas for one topology snapshot.
//!
//! A [`GraphView`] owns the model, the simulation, the scene and the
//! interaction state built from one snapshot. A new snapshot means a new
//! view; the old one is dropped first, taking its simulation subscriptions
//! with it.

use std::cell::Cell;
use std::rc::Rc;

use egui::{PointerButton, Pos2, Sense, Vec2};
use tracing::{debug, info};

use super::camera::{CameraController, INITIAL_FOCUS_DELAY};
use super::config::SimulationConfig;
use super::events::Subscription;
use super::interaction::{InteractionController, LabelPrecedence, SelectionEvent};
use super::model::GraphModel;
use super::scene::Scene;
use super::simulation::{ForceSimulation, SimulationEvent};
use super::types::NetworkNode;
use crate::theme::Palette;

pub struct GraphView {
    model: GraphModel,
    simulation: ForceSimulation,
    scene: Scene,
    interaction: InteractionController,
    camera: CameraController,
    config: SimulationConfig,
    precedence: LabelPrecedence,
    /// Set by the simulation on every tick, cleared once the scene is synced
    positions_dirty: Rc<Cell<bool>>,
    subscriptions: Vec<Subscription>,
    /// A drag that started on empty canvas pans the viewport
    panning: bool,
}

impl GraphView {
    /// Build model, simulation and scene for `nodes`. An initial selection
    /// present in the snapshot is kept and focused after a short delay.
    pub fn new(
        nodes: &[NetworkNode],
        config: SimulationConfig,
        precedence: LabelPrecedence,
        palette: Palette,
        initial_selection: Option<&str>,
        now: f64,
    ) -> Self {
        let config = config.sanitized();
        let model = GraphModel::build(nodes, config.node_size);
        let mut scene = Scene::new(&model, palette, config.font_size, config.link_width);
        let simulation = ForceSimulation::new(&model, config, scene.canvas_center());

        let positions_dirty = Rc::new(Cell::new(true));
        let dirty = Rc::clone(&positions_dirty);
        let subscriptions = vec![simulation.subscribe(move |event| match event {
            SimulationEvent::Tick { .. } => dirty.set(true),
            SimulationEvent::Settled => debug!("Layout settled"),
        })];

        let selection = initial_selection.filter(|id| model.contains(id));
        let mut camera = CameraController::default();
        if let Some(id) = selection {
            camera.focus_later(id, now + INITIAL_FOCUS_DELAY);
        }
        let interaction = InteractionController::new(selection.map(str::to_string));

        scene.sync_positions(&simulation);
        interaction.apply_highlight(&model, &mut scene, config.show_all_ips, precedence);

        info!(
            vertices = model.vertices.len(),
            edges = model.edges.len(),
            "Built graph view"
        );

        Self {
            model,
            simulation,
            scene,
            interaction,
            camera,
            config,
            precedence,
            positions_dirty,
            subscriptions,
            panning: false,
        }
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn simulation(&self) -> &ForceSimulation {
        &self.simulation
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn selected(&self) -> Option<&str> {
        self.interaction.selected()
    }

    #[cfg(test)]
    pub fn is_focusing(&self) -> bool {
        self.camera.is_busy()
    }

    #[cfg(test)]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Hot-apply a parameter bundle to the running layout. Positions are
    /// kept; a node size change re-derives radii in place.
    pub fn apply_config(&mut self, config: SimulationConfig) {
        let config = config.sanitized();
        if config == self.config {
            return;
        }

        if self.config.resizes_vertices(&config) {
            self.model.resize_vertices(config.node_size);
            self.scene.set_base_radii(&self.model);
            self.simulation.set_radii(self.model.radii());
        }
        self.scene.set_font_size(config.font_size);
        self.scene.set_link_width(config.link_width);
        self.simulation.apply_config(config);
        self.config = config;
        self.refresh_highlight();
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.scene.set_palette(palette, &self.model);
        self.refresh_highlight();
    }

    pub fn set_precedence(&mut self, precedence: LabelPrecedence) {
        self.precedence = precedence;
        self.refresh_highlight();
    }

    /// Selection driven from outside the canvas (search, details panel).
    /// A new selection is focused; re-selecting the current id does nothing.
    pub fn set_selected_external(&mut self, id: Option<&str>, now: f64) -> bool {
        if !self.interaction.select(&self.model, id) {
            return false;
        }
        debug!(id = ?id, "External selection");
        self.refresh_highlight();
        if let Some(id) = id {
            self.focus(id, now);
        }
        true
    }

    fn focus(&mut self, id: &str, now: f64) -> bool {
        let target = self
            .model
            .index_of(id)
            .and_then(|index| self.simulation.position(index));
        match target {
            Some(target) => self.camera.focus(&self.scene, target, now),
            None => false,
        }
    }

    /// Track the canvas size; a change recenters the layout and reheats it.
    pub fn resize(&mut self, size: Vec2) {
        if self.scene.set_size(size) {
            self.simulation.set_center(self.scene.canvas_center());
        }
    }

    /// Run at most one tick and advance the camera. Returns true while more
    /// frames are needed.
    pub fn frame(&mut self, now: f64) -> bool {
        self.simulation.tick();
        if self.positions_dirty.replace(false) {
            self.scene.sync_positions(&self.simulation);
        }

        let model = &self.model;
        let simulation = &self.simulation;
        let camera_busy = self.camera.update(&mut self.scene, now, |id| {
            model.index_of(id).and_then(|index| simulation.position(index))
        });

        self.simulation.is_running() || camera_busy || self.interaction.dragging().is_some()
    }

    fn refresh_highlight(&mut self) {
        self.interaction.apply_highlight(
            &self.model,
            &mut self.scene,
            self.config.show_all_ips,
            self.precedence,
        );
    }

    /// Hover tracking; `None` when the pointer is off the canvas.
    pub fn pointer_moved(&mut self, local: Option<Pos2>) {
        let changed = match local.and_then(|pos| self.scene.vertex_at(pos)) {
            Some(index) => self.interaction.pointer_enter(&self.model, index),
            None => self.interaction.pointer_leave(),
        };
        if changed {
            self.refresh_highlight();
        }
    }

    pub fn drag_started(&mut self, local: Pos2) {
        match self.scene.vertex_at(local) {
            Some(index) => {
                let pos = self.scene.viewport.to_model(local);
                self.interaction
                    .drag_start(&self.model, &mut self.simulation, index, pos);
                self.scene.sync_positions(&self.simulation);
                self.refresh_highlight();
            }
            None => {
                self.panning = true;
                self.camera.cancel();
            }
        }
    }

    pub fn dragged(&mut self, local: Pos2, delta: Vec2) {
        if self.interaction.dragging().is_some() {
            let pos = self.scene.viewport.to_model(local);
            self.interaction.drag_move(&mut self.simulation, pos);
            self.scene.sync_positions(&self.simulation);
        } else if self.panning {
            self.scene.viewport.pan(delta);
        }
    }

    pub fn drag_stopped(&mut self) {
        self.interaction.drag_end(&mut self.simulation);
        self.panning = false;
    }

    /// Click on a glyph selects and focuses it; anywhere else clears.
    pub fn click(&mut self, local: Pos2, now: f64) -> SelectionEvent {
        let event = match self.scene.vertex_at(local) {
            Some(index) => match self.interaction.click_vertex(&self.model, index) {
                Some(event) => {
                    self.focus(event.as_id(), now);
                    event
                }
                None => self.interaction.click_canvas(),
            },
            None => self.interaction.click_canvas(),
        };
        self.refresh_highlight();
        event
    }

    pub fn zoom_at(&mut self, local: Pos2, factor: f32) {
        self.camera.cancel();
        self.scene.viewport.zoom_about(local, factor);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.camera.cancel();
        self.scene.viewport.pan(delta);
    }

    /// Allocate the canvas, route pointer input, step and paint. Returns a
    /// selection event when the user clicked.
    pub fn ui(&mut self, ui: &mut egui::Ui) -> Option<SelectionEvent> {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        self.resize(rect.size());

        let now = ui.input(|i| i.time);
        let to_local = |pos: Pos2| (pos - rect.min).to_pos2();

        // Gather all input deltas first (allows simultaneous pan+zoom on trackpad)
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta);
        let zoom_delta = ui.input(|i| i.zoom_delta());
        let hover_pos = response.hover_pos();

        if response.drag_started_by(PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.drag_started(to_local(pos));
            }
        }
        if response.dragged_by(PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.dragged(to_local(pos), response.drag_delta());
            }
        }
        if response.drag_stopped() {
            self.drag_stopped();
        }

        // Two-finger scroll pans, pinch or Ctrl+scroll zooms at the cursor
        if scroll_delta != Vec2::ZERO && response.hovered() {
            self.pan_by(scroll_delta);
        }
        if let Some(cursor) = hover_pos {
            if zoom_delta != 1.0 {
                self.zoom_at(to_local(cursor), zoom_delta);
            }
        }

        self.pointer_moved(hover_pos.map(to_local));

        let mut event = None;
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                event = Some(self.click(to_local(pos), now));
            }
        }

        let busy = self.frame(now);
        self.scene.paint(&painter, rect);
        if busy {
            ui.ctx().request_repaint();
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::camera::FOCUS_ZOOM;

    fn nodes() -> Vec<NetworkNode> {
        vec![
            NetworkNode::new("10.0.0.1").with_name("core").with_neighbours(["10.0.0.2"]),
            NetworkNode::new("10.0.0.2").with_neighbours(["10.0.0.1", "10.0.0.9"]),
            NetworkNode::new("10.0.0.3"),
        ]
    }

    fn view(selection: Option<&str>) -> GraphView {
        let mut view = GraphView::new(
            &nodes(),
            SimulationConfig::default(),
            LabelPrecedence::default(),
            Palette::default(),
            selection,
            0.0,
        );
        view.resize(Vec2::new(800.0, 600.0));
        view
    }

    fn screen_pos(view: &GraphView, id: &str) -> Pos2 {
        let index = view.model().index_of(id).unwrap();
        view.scene().viewport.to_screen(view.scene().glyph(index).unwrap().center)
    }

    fn empty_spot(view: &GraphView) -> Pos2 {
        let far = Pos2::new(-10_000.0, -10_000.0);
        assert!(view.scene().vertex_at(far).is_none());
        far
    }

    #[test]
    fn test_initial_selection_focuses_after_delay() {
        let mut view = view(Some("10.0.0.1"));
        assert_eq!(view.selected(), Some("10.0.0.1"));
        assert_eq!(view.subscription_count(), 1);

        view.frame(0.1);
        assert_eq!(view.scene().viewport.k, 1.0);

        view.frame(0.6);
        assert!(view.is_focusing());
        view.frame(0.6 + 1.0);
        assert_eq!(view.scene().viewport.k, FOCUS_ZOOM);
        assert!(!view.is_focusing());
    }

    #[test]
    fn test_missing_initial_selection_is_dropped() {
        let view = view(Some("10.9.9.9"));
        assert!(view.selected().is_none());
        assert!(!view.is_focusing());
    }

    #[test]
    fn test_external_reselect_does_not_refocus() {
        let mut view = view(None);
        assert!(view.set_selected_external(Some("10.0.0.2"), 1.0));
        assert!(view.is_focusing());
        view.frame(2.0);
        assert!(!view.is_focusing());

        assert!(!view.set_selected_external(Some("10.0.0.2"), 3.0));
        assert!(!view.is_focusing());
    }

    #[test]
    fn test_click_selects_then_canvas_click_clears() {
        let mut view = view(None);
        view.frame(0.0);

        let pos = screen_pos(&view, "10.0.0.3");
        let event = view.click(pos, 1.0);
        assert_eq!(event.as_id(), "10.0.0.3");
        assert_eq!(view.selected(), Some("10.0.0.3"));

        let spot = empty_spot(&view);
        let event = view.click(spot, 2.0);
        assert_eq!(event, SelectionEvent::Cleared);
        assert!(view.selected().is_none());
        assert!(view.scene().glyphs.iter().all(|g| g.label.opacity() == 0.0));
    }

    #[test]
    fn test_drag_tracks_pointer_in_model_space() {
        let mut view = view(None);
        view.frame(0.0);
        view.zoom_at(Pos2::new(400.0, 300.0), 2.0);

        let start = screen_pos(&view, "10.0.0.1");
        view.drag_started(start);
        assert_eq!(view.interaction().hovered(), Some("10.0.0.1"));

        let pointer = start + Vec2::new(40.0, 20.0);
        view.dragged(pointer, Vec2::new(40.0, 20.0));
        assert!(view.frame(0.1));

        let index = view.model().index_of("10.0.0.1").unwrap();
        let expected = view.scene().viewport.to_model(pointer);
        assert!(view.simulation().position(index).unwrap().distance(expected) < 1e-3);

        view.drag_stopped();
        let particle = view.simulation().particle(index).unwrap();
        assert_eq!(particle.velocity, Vec2::ZERO);
        assert!(particle.pinned.is_none());
    }

    #[test]
    fn test_pan_on_empty_canvas_cancels_focus() {
        let mut view = view(None);
        view.set_selected_external(Some("10.0.0.1"), 0.0);
        assert!(view.is_focusing());

        let before = view.scene().viewport;
        let spot = empty_spot(&view);
        view.drag_started(spot);
        view.dragged(spot + Vec2::new(15.0, 5.0), Vec2::new(15.0, 5.0));
        view.drag_stopped();

        assert!(!view.is_focusing());
        assert_eq!(view.scene().viewport.tx, before.tx + 15.0);
        assert_eq!(view.scene().viewport.ty, before.ty + 5.0);
    }

    #[test]
    fn test_node_size_change_keeps_selection_highlight() {
        let mut view = view(Some("10.0.0.1"));
        let positions = view.simulation().positions();

        view.apply_config(SimulationConfig {
            node_size: 16.0,
            show_all_ips: true,
            ..Default::default()
        });

        assert_eq!(view.simulation().positions(), positions);
        let index = view.model().index_of("10.0.0.1").unwrap();
        let glyph = view.scene().glyph(index).unwrap();
        assert!((glyph.base_radius - 16.8).abs() < 1e-4);
        assert!((glyph.radius - 16.8 * 1.2).abs() < 1e-3);
        assert!(view.scene().glyphs.iter().all(|g| g.label.opacity() == 1.0));
        assert!(view.simulation().is_running());
    }

    #[test]
    fn test_empty_snapshot() {
        let mut view = GraphView::new(
            &[],
            SimulationConfig::default(),
            LabelPrecedence::default(),
            Palette::default(),
            Some("10.0.0.1"),
            0.0,
        );
        assert!(!view.frame(0.0));
        assert_eq!(view.click(Pos2::new(10.0, 10.0), 0.0), SelectionEvent::Cleared);
        assert!(!view.set_selected_external(Some("10.0.0.1"), 0.0));
        view.resize(Vec2::new(300.0, 200.0));
        assert!(!view.frame(1.0));
    }
}
