//! Retained drawing state for one snapshot: a glyph and label per vertex, a
//! line per edge, and the viewport transform.
//!
//! Everything is kept in model space; the viewport is applied once, in
//! [`Scene::paint`].

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke, Vec2};

use super::model::GraphModel;
use super::simulation::ForceSimulation;
use crate::theme::{stroke_width, Palette};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 8.0;
/// Canvas size assumed until the first layout pass measures it
pub const FALLBACK_SIZE: Vec2 = Vec2::new(800.0, 600.0);
/// Label sits this many radii below the glyph center
const LABEL_OFFSET: f32 = 1.5;
/// Edge opacity when not highlighted
const EDGE_OPACITY: f32 = 0.6;

/// Affine model-to-canvas transform: `canvas = model * k + (tx, ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub tx: f32,
    pub ty: f32,
    pub k: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            k: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(tx: f32, ty: f32, k: f32) -> Self {
        Self {
            tx,
            ty,
            k: k.clamp(MIN_ZOOM, MAX_ZOOM),
        }
    }

    /// Model point to canvas-local point
    pub fn to_screen(&self, pos: Pos2) -> Pos2 {
        Pos2::new(pos.x * self.k + self.tx, pos.y * self.k + self.ty)
    }

    /// Canvas-local point to model point
    pub fn to_model(&self, pos: Pos2) -> Pos2 {
        Pos2::new((pos.x - self.tx) / self.k, (pos.y - self.ty) / self.k)
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.tx += delta.x;
        self.ty += delta.y;
    }

    /// Multiply zoom by `factor`, keeping the model point under `anchor` fixed.
    pub fn zoom_about(&mut self, anchor: Pos2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let fixed = self.to_model(anchor);
        self.k = (self.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.tx = anchor.x - fixed.x * self.k;
        self.ty = anchor.y - fixed.y * self.k;
    }

    pub fn lerp(&self, to: &Viewport, t: f32) -> Viewport {
        Viewport {
            tx: self.tx + (to.tx - self.tx) * t,
            ty: self.ty + (to.ty - self.ty) * t,
            k: self.k + (to.k - self.k) * t,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub anchor: Pos2,
    pub visible: bool,
}

impl Label {
    /// Labels are either fully shown or fully hidden
    pub fn opacity(&self) -> f32 {
        if self.visible {
            1.0
        } else {
            0.0
        }
    }
}

/// Circle drawn for one vertex
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub vertex: usize,
    pub center: Pos2,
    /// Radius from the model, before highlighting
    pub base_radius: f32,
    pub radius: f32,
    pub fill: Color32,
    pub stroke: Stroke,
    pub label: Label,
}

/// Segment drawn for one edge
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLine {
    pub edge: usize,
    pub source: usize,
    pub target: usize,
    pub from: Pos2,
    pub to: Pos2,
    pub width: f32,
    pub color: Color32,
}

pub struct Scene {
    pub glyphs: Vec<Glyph>,
    pub lines: Vec<EdgeLine>,
    pub viewport: Viewport,
    palette: Palette,
    font_size: f32,
    link_width: f32,
    size: Vec2,
    measured: bool,
}

impl Scene {
    /// One glyph per vertex and one line per edge, all at the origin until
    /// the first [`sync_positions`](Self::sync_positions).
    pub fn new(model: &GraphModel, palette: Palette, font_size: f32, link_width: f32) -> Self {
        let glyphs = model
            .vertices
            .iter()
            .enumerate()
            .map(|(i, vertex)| Glyph {
                vertex: i,
                center: Pos2::ZERO,
                base_radius: vertex.radius,
                radius: vertex.radius,
                fill: palette.group_fill(vertex.group),
                stroke: Stroke::new(stroke_width::NORMAL, palette.stroke),
                label: Label {
                    text: vertex.id.clone(),
                    anchor: Pos2::ZERO,
                    visible: false,
                },
            })
            .collect();

        let lines = model
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| EdgeLine {
                edge: i,
                source: edge.source,
                target: edge.target,
                from: Pos2::ZERO,
                to: Pos2::ZERO,
                width: link_width,
                color: palette.edge.gamma_multiply(EDGE_OPACITY),
            })
            .collect();

        Self {
            glyphs,
            lines,
            viewport: Viewport::default(),
            palette,
            font_size,
            link_width,
            size: FALLBACK_SIZE,
            measured: false,
        }
    }

    /// Copy current simulation positions into glyphs, labels and lines.
    pub fn sync_positions(&mut self, simulation: &ForceSimulation) {
        for glyph in &mut self.glyphs {
            if let Some(pos) = simulation.position(glyph.vertex) {
                glyph.center = pos;
                glyph.label.anchor = pos + Vec2::new(0.0, glyph.radius * LABEL_OFFSET);
            }
        }
        for line in &mut self.lines {
            if let (Some(from), Some(to)) = (simulation.position(line.source), simulation.position(line.target)) {
                line.from = from;
                line.to = to;
            }
        }
    }

    /// Restore baseline encoding: model radius, neutral stroke, plain edges.
    /// Label visibility is left untouched.
    pub fn reset_highlight(&mut self) {
        for glyph in &mut self.glyphs {
            glyph.radius = glyph.base_radius;
            glyph.stroke = Stroke::new(stroke_width::NORMAL, self.palette.stroke);
            glyph.label.anchor = glyph.center + Vec2::new(0.0, glyph.radius * LABEL_OFFSET);
        }
        for line in &mut self.lines {
            line.width = self.link_width;
            line.color = self.palette.edge.gamma_multiply(EDGE_OPACITY);
        }
    }

    /// Emphasize a glyph: scaled radius and accent outline.
    pub fn highlight_glyph(&mut self, vertex: usize, radius_scale: f32) {
        let accent = self.palette.accent;
        if let Some(glyph) = self.glyphs.get_mut(vertex) {
            glyph.radius = glyph.base_radius * radius_scale;
            glyph.stroke = Stroke::new(stroke_width::SELECTED, accent);
            glyph.label.anchor = glyph.center + Vec2::new(0.0, glyph.radius * LABEL_OFFSET);
        }
    }

    /// Emphasize an edge: scaled width and full-opacity accent.
    pub fn highlight_line(&mut self, edge: usize, width_scale: f32) {
        let width = self.link_width * width_scale;
        let accent = self.palette.accent;
        if let Some(line) = self.lines.get_mut(edge) {
            line.width = width;
            line.color = accent;
        }
    }

    pub fn set_label_visible(&mut self, vertex: usize, visible: bool) {
        if let Some(glyph) = self.glyphs.get_mut(vertex) {
            glyph.label.visible = visible;
        }
    }

    pub fn hide_all_labels(&mut self) {
        for glyph in &mut self.glyphs {
            glyph.label.visible = false;
        }
    }

    /// New fills for a theme change; highlight must be re-applied afterwards.
    pub fn set_palette(&mut self, palette: Palette, model: &GraphModel) {
        self.palette = palette;
        for glyph in &mut self.glyphs {
            if let Some(vertex) = model.vertices.get(glyph.vertex) {
                glyph.fill = palette.group_fill(vertex.group);
            }
        }
        self.reset_highlight();
    }

    pub fn set_base_radii(&mut self, model: &GraphModel) {
        for glyph in &mut self.glyphs {
            if let Some(vertex) = model.vertices.get(glyph.vertex) {
                glyph.base_radius = vertex.radius;
            }
        }
    }

    pub fn set_font_size(&mut self, font_size: f32) {
        self.font_size = font_size;
    }

    pub fn set_link_width(&mut self, link_width: f32) {
        self.link_width = link_width;
    }

    /// Record the measured canvas size. Returns true when it changed.
    pub fn set_size(&mut self, size: Vec2) -> bool {
        if size.x <= 0.0 || size.y <= 0.0 || !size.is_finite() {
            return false;
        }
        let changed = !self.measured || size != self.size;
        self.size = size;
        self.measured = true;
        changed
    }

    /// Measured canvas size, or [`FALLBACK_SIZE`] before the first layout
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn is_measured(&self) -> bool {
        self.measured
    }

    /// Model-space point shown at the middle of the canvas under the
    /// identity viewport
    pub fn canvas_center(&self) -> Pos2 {
        (self.size / 2.0).to_pos2()
    }

    pub fn glyph(&self, vertex: usize) -> Option<&Glyph> {
        self.glyphs.get(vertex)
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Topmost glyph under a canvas-local point.
    pub fn vertex_at(&self, local: Pos2) -> Option<usize> {
        let pos = self.viewport.to_model(local);
        self.glyphs
            .iter()
            .rev()
            .find(|glyph| glyph.center.distance(pos) <= glyph.radius)
            .map(|glyph| glyph.vertex)
    }

    /// Draw into `rect`, whose top-left is the canvas-local origin.
    pub fn paint(&self, painter: &Painter, rect: Rect) {
        painter.rect_filled(rect, 0.0, self.palette.background);

        let viewport = self.viewport;
        let k = viewport.k;
        let transform = |pos: Pos2| rect.min + viewport.to_screen(pos).to_vec2();

        // Edges first (behind glyphs)
        for line in &self.lines {
            painter.line_segment(
                [transform(line.from), transform(line.to)],
                Stroke::new(line.width * k, line.color),
            );
        }

        for glyph in &self.glyphs {
            let center = transform(glyph.center);
            let radius = glyph.radius * k;
            if !rect.expand(radius).contains(center) {
                continue;
            }
            painter.circle_filled(center, radius, glyph.fill);
            painter.circle_stroke(center, radius, Stroke::new(glyph.stroke.width * k, glyph.stroke.color));
        }

        // Labels on top of every glyph
        let font = FontId::proportional((self.font_size * k).max(1.0));
        for glyph in self.glyphs.iter().filter(|g| g.label.visible) {
            painter.text(
                transform(glyph.label.anchor),
                Align2::CENTER_TOP,
                &glyph.label.text,
                font.clone(),
                self.palette.label.gamma_multiply(glyph.label.opacity()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::config::SimulationConfig;
    use crate::graph::types::NetworkNode;

    fn model() -> GraphModel {
        let nodes = vec![
            NetworkNode::new("10.0.0.1").with_name("core").with_neighbours(["10.0.0.2"]),
            NetworkNode::new("10.0.0.2"),
        ];
        GraphModel::build(&nodes, 8.0)
    }

    #[test]
    fn test_viewport_round_trip_and_anchor() {
        let mut viewport = Viewport::new(30.0, -20.0, 1.5);
        let pos = Pos2::new(12.0, 34.0);
        let back = viewport.to_model(viewport.to_screen(pos));
        assert!(back.distance(pos) < 1e-4);

        let anchor = Pos2::new(200.0, 150.0);
        let under = viewport.to_model(anchor);
        viewport.zoom_about(anchor, 2.0);
        assert_eq!(viewport.k, 3.0);
        assert!(viewport.to_model(anchor).distance(under) < 1e-3);
    }

    #[test]
    fn test_zoom_is_bounded() {
        let mut viewport = Viewport::default();
        viewport.zoom_about(Pos2::ZERO, 1000.0);
        assert_eq!(viewport.k, MAX_ZOOM);
        viewport.zoom_about(Pos2::ZERO, 1e-6);
        assert_eq!(viewport.k, MIN_ZOOM);
        viewport.zoom_about(Pos2::ZERO, f32::NAN);
        assert_eq!(viewport.k, MIN_ZOOM);
    }

    #[test]
    fn test_sync_positions_places_labels_below() {
        let model = model();
        let sim = ForceSimulation::new(&model, SimulationConfig::default(), Pos2::new(400.0, 300.0));
        let mut scene = Scene::new(&model, Palette::default(), 10.0, 1.5);
        scene.sync_positions(&sim);

        for glyph in &scene.glyphs {
            let pos = sim.position(glyph.vertex).unwrap();
            assert_eq!(glyph.center, pos);
            assert_eq!(glyph.label.anchor, pos + Vec2::new(0.0, glyph.radius * 1.5));
            assert_eq!(glyph.label.opacity(), 0.0);
        }
        let line = &scene.lines[0];
        assert_eq!(line.from, sim.position(line.source).unwrap());
        assert_eq!(line.to, sim.position(line.target).unwrap());
    }

    #[test]
    fn test_vertex_at_picks_topmost_in_model_space() {
        let model = model();
        let mut scene = Scene::new(&model, Palette::default(), 10.0, 1.5);
        scene.glyphs[0].center = Pos2::new(100.0, 100.0);
        scene.glyphs[1].center = Pos2::new(104.0, 100.0);

        assert_eq!(scene.vertex_at(Pos2::new(102.0, 100.0)), Some(1));
        assert_eq!(scene.vertex_at(Pos2::new(93.0, 100.0)), Some(0));
        assert_eq!(scene.vertex_at(Pos2::new(300.0, 300.0)), None);

        scene.viewport = Viewport::new(-100.0, -100.0, 2.0);
        assert_eq!(scene.vertex_at(Pos2::new(90.0, 100.0)), Some(0));
    }

    #[test]
    fn test_unmeasured_scene_uses_fallback_size() {
        let mut scene = Scene::new(&model(), Palette::default(), 10.0, 1.5);
        assert!(!scene.is_measured());
        assert_eq!(scene.size(), FALLBACK_SIZE);
        assert_eq!(scene.canvas_center(), Pos2::new(400.0, 300.0));

        assert!(scene.set_size(Vec2::new(1000.0, 700.0)));
        assert!(!scene.set_size(Vec2::new(1000.0, 700.0)));
        assert!(!scene.set_size(Vec2::ZERO));
        assert!(scene.is_measured());
    }
}
