//! Force-directed layout simulation.
//!
//! Each tick combines, additively:
//! - Link springs toward `link_distance`, weighted by endpoint degree
//! - Repulsion between all vertices, O(n log n) via Barnes-Hut
//! - Centering: rigid translation of the centroid onto the canvas center
//! - Collision: vertices keep `radius * 1.2` apart
//!
//! Energy (`alpha`) decays toward `alpha_target` every tick; once it drops
//! below [`ALPHA_MIN`] the simulation stops until something reheats it.

use egui::{Pos2, Vec2};
use tracing::debug;

use super::config::SimulationConfig;
use super::events::{EventBus, Subscription};
use super::model::GraphModel;
use super::quadtree::{jiggle, Quadtree};

/// Below this energy the simulation stops ticking
pub const ALPHA_MIN: f32 = 0.001;
/// Energy target while a vertex is being dragged
pub const DRAG_ALPHA_TARGET: f32 = 0.3;
/// Minimum energy after the canvas is resized
pub const RESIZE_ALPHA: f32 = 0.3;
/// Barnes-Hut opening angle
const THETA: f32 = 0.9;
/// Collision radius as a multiple of the vertex radius
const COLLISION_PADDING: f32 = 1.2;
/// Phyllotaxis spacing for initial placement
const INITIAL_RADIUS: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationEvent {
    /// Positions changed; carries the energy after the tick
    Tick { alpha: f32 },
    /// Energy crossed below [`ALPHA_MIN`]
    Settled,
}

/// Physical state of one vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Pos2,
    pub velocity: Vec2,
    /// Fixed position while dragged; excluded from integration
    pub pinned: Option<Pos2>,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
    strength: f32,
    /// Share of the correction applied to the target
    bias: f32,
}

/// Owns position, velocity and pin of every vertex of one snapshot.
///
/// Nothing else writes those: callers read through [`positions`](Self::positions)
/// and [`particle`](Self::particle), and mutate only through the pin/drag methods.
pub struct ForceSimulation {
    particles: Vec<Particle>,
    radii: Vec<f32>,
    links: Vec<Link>,
    config: SimulationConfig,
    center: Pos2,
    alpha: f32,
    alpha_target: f32,
    running: bool,
    events: EventBus<SimulationEvent>,
}

impl ForceSimulation {
    /// Start a simulation for `model`, placing vertices on a phyllotaxis
    /// spiral around `center`.
    pub fn new(model: &GraphModel, config: SimulationConfig, center: Pos2) -> Self {
        let config = config.sanitized();
        let particles = (0..model.len())
            .map(|i| Particle {
                position: center + phyllotaxis(i),
                velocity: Vec2::ZERO,
                pinned: None,
            })
            .collect();

        Self {
            particles,
            radii: model.radii(),
            links: build_links(model),
            alpha: config.alpha,
            config,
            center,
            alpha_target: 0.0,
            running: !model.is_empty(),
            events: EventBus::new(),
        }
    }

    /// Receive [`SimulationEvent`]s until the guard is dropped.
    pub fn subscribe(&self, listener: impl FnMut(&SimulationEvent) + 'static) -> Subscription {
        self.events.subscribe(listener)
    }

    /// Advance one step. Returns false, doing nothing, when stopped or empty.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.particles.is_empty() {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        self.apply_links(alpha);
        self.apply_charge(alpha);
        self.apply_centering();
        self.apply_collision(alpha);
        self.integrate();

        self.events.emit(&SimulationEvent::Tick { alpha });

        if self.alpha < ALPHA_MIN {
            self.running = false;
            debug!(alpha = self.alpha, "Simulation settled");
            self.events.emit(&SimulationEvent::Settled);
        }
        true
    }

    /// Springs pull endpoints toward `link_distance`
    fn apply_links(&mut self, alpha: f32) {
        let distance = self.config.link_distance;
        for link in &self.links {
            let source = self.particles[link.source];
            let target = self.particles[link.target];

            let mut delta = (target.position + target.velocity) - (source.position + source.velocity);
            if delta.x == 0.0 {
                delta.x = jiggle();
            }
            if delta.y == 0.0 {
                delta.y = jiggle();
            }
            let length = delta.length();
            let correction = delta * ((length - distance) / length * alpha * link.strength);

            self.particles[link.target].velocity -= correction * link.bias;
            self.particles[link.source].velocity += correction * (1.0 - link.bias);
        }
    }

    /// Barnes-Hut repulsion on current positions
    fn apply_charge(&mut self, alpha: f32) {
        let positions = self.positions();
        let tree = Quadtree::build(&positions, THETA);
        let strength = self.config.repulsion_strength;

        for (i, particle) in self.particles.iter_mut().enumerate() {
            particle.velocity += tree.charge_force(i, positions[i], strength, alpha);
        }
    }

    /// Shift free vertices so the centroid lands on the canvas center
    fn apply_centering(&mut self) {
        let n = self.particles.len() as f32;
        let sum = self
            .particles
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.position.to_vec2());
        let shift = self.center.to_vec2() - sum / n;

        for particle in self.particles.iter_mut().filter(|p| p.pinned.is_none()) {
            particle.position += shift;
        }
    }

    /// Separate overlapping vertices using predicted positions
    fn apply_collision(&mut self, alpha: f32) {
        let predicted: Vec<Pos2> = self
            .particles
            .iter()
            .map(|p| p.position + p.velocity)
            .collect();
        let tree = Quadtree::build(&predicted, THETA);
        let max_radius = self.radii.iter().fold(0.0_f32, |m, r| m.max(*r)) * COLLISION_PADDING;

        let mut candidates = Vec::new();
        for i in 0..self.particles.len() {
            let ri = self.radii[i] * COLLISION_PADDING;
            let predicted_i = predicted[i];

            candidates.clear();
            tree.collect_within(predicted_i, ri + max_radius, &mut candidates);

            for &j in candidates.iter().filter(|&&j| j > i) {
                let rj = self.radii[j] * COLLISION_PADDING;
                let reach = ri + rj;
                let other = self.particles[j].position + self.particles[j].velocity;

                let mut delta = predicted_i - other;
                let mut length_sq = delta.length_sq();
                if length_sq >= reach * reach {
                    continue;
                }
                if delta.x == 0.0 {
                    delta.x = jiggle();
                    length_sq += delta.x * delta.x;
                }
                if delta.y == 0.0 {
                    delta.y = jiggle();
                    length_sq += delta.y * delta.y;
                }

                let length = length_sq.sqrt();
                let push = delta * ((reach - length) / length * alpha);
                let share = (rj * rj) / (ri * ri + rj * rj);
                self.particles[i].velocity += push * share;
                self.particles[j].velocity -= push * (1.0 - share);
            }
        }
    }

    fn integrate(&mut self) {
        let friction = self.config.friction;
        for particle in &mut self.particles {
            match particle.pinned {
                Some(pin) => {
                    particle.position = pin;
                    particle.velocity = Vec2::ZERO;
                }
                None => {
                    particle.velocity *= friction;
                    particle.position += particle.velocity;
                }
            }
        }
    }

    /// Resume ticking if there is anything to simulate.
    pub fn restart(&mut self) {
        self.running = !self.particles.is_empty();
    }

    /// Adopt a new parameter bundle from the next tick on, resetting energy
    /// to `config.alpha`.
    pub fn apply_config(&mut self, config: SimulationConfig) {
        self.config = config.sanitized();
        self.alpha = self.config.alpha;
        self.restart();
    }

    /// Replace collision radii after a node size change.
    pub fn set_radii(&mut self, radii: Vec<f32>) {
        if radii.len() == self.radii.len() {
            self.radii = radii;
        }
    }

    /// Move the centering target, e.g. after a canvas resize.
    pub fn set_center(&mut self, center: Pos2) {
        if center == self.center {
            return;
        }
        self.center = center;
        self.alpha = self.alpha.max(RESIZE_ALPHA);
        self.restart();
    }

    pub fn set_alpha_target(&mut self, target: f32) {
        self.alpha_target = target.clamp(0.0, 1.0);
    }

    /// Fix a vertex at `pos` and reheat toward [`DRAG_ALPHA_TARGET`].
    pub fn drag_start(&mut self, index: usize, pos: Pos2) {
        if index >= self.particles.len() {
            return;
        }
        self.set_alpha_target(DRAG_ALPHA_TARGET);
        self.restart();
        self.pin(index, pos);
    }

    /// Move a pinned vertex with the pointer.
    pub fn drag_to(&mut self, index: usize, pos: Pos2) {
        self.pin(index, pos);
    }

    /// Release a dragged vertex and let energy decay again.
    pub fn drag_end(&mut self, index: usize) {
        self.unpin(index);
        self.set_alpha_target(0.0);
    }

    pub fn pin(&mut self, index: usize, pos: Pos2) {
        if let Some(particle) = self.particles.get_mut(index) {
            particle.pinned = Some(pos);
            particle.position = pos;
            particle.velocity = Vec2::ZERO;
        }
    }

    /// Clear the pin; the vertex resumes from rest.
    pub fn unpin(&mut self, index: usize) {
        if let Some(particle) = self.particles.get_mut(index) {
            particle.pinned = None;
            particle.velocity = Vec2::ZERO;
        }
    }

    pub fn positions(&self) -> Vec<Pos2> {
        self.particles.iter().map(|p| p.position).collect()
    }

    pub fn position(&self, index: usize) -> Option<Pos2> {
        self.particles.get(index).map(|p| p.position)
    }

    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn center(&self) -> Pos2 {
        self.center
    }
}

/// Offset of the `i`th vertex on a sunflower spiral
fn phyllotaxis(i: usize) -> Vec2 {
    let angle_step = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + i as f32).sqrt();
    let angle = i as f32 * angle_step;
    Vec2::new(radius * angle.cos(), radius * angle.sin())
}

/// Springs for every edge between distinct vertices. Strength is the inverse
/// of the smaller endpoint degree; the better connected endpoint moves less.
fn build_links(model: &GraphModel) -> Vec<Link> {
    let mut degree = vec![0u32; model.len()];
    let edges: Vec<_> = model.edges.iter().filter(|e| e.source != e.target).collect();
    for edge in &edges {
        degree[edge.source] += 1;
        degree[edge.target] += 1;
    }

    edges
        .into_iter()
        .map(|edge| {
            let ds = degree[edge.source] as f32;
            let dt = degree[edge.target] as f32;
            Link {
                source: edge.source,
                target: edge.target,
                strength: 1.0 / ds.min(dt),
                bias: ds / (ds + dt),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::NetworkNode;
    use std::cell::Cell;
    use std::rc::Rc;

    fn triangle() -> GraphModel {
        let nodes = vec![
            NetworkNode::new("10.0.0.1").with_name("core").with_neighbours(["10.0.0.2", "10.0.0.3"]),
            NetworkNode::new("10.0.0.2").with_neighbours(["10.0.0.1"]),
            NetworkNode::new("10.0.0.3"),
            NetworkNode::new("10.0.0.4"),
        ];
        GraphModel::build(&nodes, 8.0)
    }

    fn simulation() -> ForceSimulation {
        ForceSimulation::new(&triangle(), SimulationConfig::default(), Pos2::new(400.0, 300.0))
    }

    fn all_finite(sim: &ForceSimulation) -> bool {
        sim.positions().iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    #[test]
    fn test_alpha_decreases_until_settled() {
        let mut sim = simulation();
        let settled = Rc::new(Cell::new(0));
        let sink = Rc::clone(&settled);
        let _subscription = sim.subscribe(move |event| {
            if *event == SimulationEvent::Settled {
                sink.set(sink.get() + 1);
            }
        });

        let mut previous = sim.alpha();
        let mut ticks = 0;
        while sim.tick() {
            assert!(sim.alpha() < previous);
            previous = sim.alpha();
            ticks += 1;
            assert!(ticks < 10_000, "simulation never settled");
        }
        assert!(sim.alpha() < ALPHA_MIN);
        assert_eq!(settled.get(), 1);
        assert!(all_finite(&sim));

        let frozen = sim.positions();
        for _ in 0..5 {
            assert!(!sim.tick());
        }
        assert_eq!(sim.positions(), frozen);
        assert_eq!(settled.get(), 1);
    }

    #[test]
    fn test_empty_graph_is_noop() {
        let mut sim = ForceSimulation::new(&GraphModel::default(), SimulationConfig::default(), Pos2::ZERO);
        assert!(!sim.is_running());
        assert!(!sim.tick());
        sim.apply_config(SimulationConfig::default());
        assert!(!sim.tick());
        assert!(sim.positions().is_empty());
    }

    #[test]
    fn test_initial_placement_is_deterministic() {
        let a = simulation();
        let b = simulation();
        assert_eq!(a.positions(), b.positions());

        let positions = a.positions();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                assert!(positions[i].distance(positions[j]) > 1.0);
            }
        }
    }

    #[test]
    fn test_drag_pins_and_reheats() {
        let mut sim = simulation();
        while sim.tick() {}
        let settled_alpha = sim.alpha();

        let target = Pos2::new(123.0, 45.0);
        sim.drag_start(0, target);
        assert_eq!(sim.alpha_target(), DRAG_ALPHA_TARGET);
        for _ in 0..20 {
            assert!(sim.tick());
            assert_eq!(sim.position(0), Some(target));
            assert_eq!(sim.particle(0).map(|p| p.velocity), Some(Vec2::ZERO));
        }
        assert!(sim.alpha() > settled_alpha);

        let moved = Pos2::new(200.0, 80.0);
        sim.drag_to(0, moved);
        sim.tick();
        assert_eq!(sim.position(0), Some(moved));

        sim.drag_end(0);
        assert_eq!(sim.particle(0).map(|p| p.velocity), Some(Vec2::ZERO));
        assert!(sim.particle(0).is_some_and(|p| p.pinned.is_none()));
        assert_eq!(sim.alpha_target(), 0.0);

        let peak = sim.alpha();
        sim.tick();
        assert!(sim.alpha() < peak);
    }

    #[test]
    fn test_apply_config_resets_alpha() {
        let mut sim = simulation();
        while sim.tick() {}
        assert!(!sim.is_running());

        let config = SimulationConfig {
            alpha: 0.5,
            link_distance: 120.0,
            ..Default::default()
        };
        sim.apply_config(config);
        assert!(sim.is_running());
        assert_eq!(sim.alpha(), 0.5);
        assert_eq!(sim.config().link_distance, 120.0);
    }

    #[test]
    fn test_resize_reheats() {
        let mut sim = simulation();
        while sim.tick() {}

        sim.set_center(Pos2::new(600.0, 400.0));
        assert!(sim.is_running());
        assert!(sim.alpha() >= RESIZE_ALPHA);

        for _ in 0..50 {
            sim.tick();
        }
        assert!(all_finite(&sim));
    }

    #[test]
    fn test_repulsion_separates_isolated_vertices() {
        let nodes = vec![NetworkNode::new("10.0.0.1"), NetworkNode::new("10.0.0.2")];
        let model = GraphModel::build(&nodes, 8.0);
        let mut sim = ForceSimulation::new(&model, SimulationConfig::default(), Pos2::ZERO);

        let before = sim.positions()[0].distance(sim.positions()[1]);
        for _ in 0..30 {
            sim.tick();
        }
        let after = sim.positions()[0].distance(sim.positions()[1]);
        assert!(after > before);
    }

    fn settle(sim: &mut ForceSimulation) {
        let mut ticks = 0;
        while sim.tick() {
            ticks += 1;
            assert!(ticks < 10_000, "simulation never settled");
        }
    }

    #[test]
    fn test_collision_keeps_padded_radii_apart() {
        let nodes = vec![
            NetworkNode::new("10.0.0.1").with_name("a"),
            NetworkNode::new("10.0.0.2").with_name("b"),
            NetworkNode::new("10.0.0.3").with_name("c"),
        ];
        let model = GraphModel::build(&nodes, 16.0);
        let config = SimulationConfig {
            node_size: 16.0,
            repulsion_strength: 0.0,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&model, config, Pos2::new(400.0, 300.0));
        settle(&mut sim);

        let positions = sim.positions();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let reach = (model.vertices[i].radius + model.vertices[j].radius) * COLLISION_PADDING;
                let distance = positions[i].distance(positions[j]);
                assert!(distance >= reach, "{} and {} are {} apart, need {}", i, j, distance, reach);
            }
        }
    }

    #[test]
    fn test_link_settles_near_link_distance() {
        let nodes = vec![
            NetworkNode::new("10.0.0.1").with_neighbours(["10.0.0.2"]),
            NetworkNode::new("10.0.0.2").with_neighbours(["10.0.0.1"]),
        ];
        let model = GraphModel::build(&nodes, 8.0);
        let config = SimulationConfig {
            link_distance: 150.0,
            repulsion_strength: -10.0,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&model, config, Pos2::new(400.0, 300.0));
        settle(&mut sim);

        let distance = sim.positions()[0].distance(sim.positions()[1]);
        assert!((distance - 150.0).abs() < 150.0 * 0.05, "settled at {}", distance);
    }

    #[test]
    fn test_centroid_lands_on_center() {
        let mut sim = simulation();
        settle(&mut sim);

        let positions = sim.positions();
        let centroid = positions
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2())
            / positions.len() as f32;
        assert!(centroid.to_pos2().distance(sim.center()) < 0.1, "centroid {:?}", centroid);
    }

    #[test]
    fn test_tick_events_carry_alpha() {
        let mut sim = simulation();
        let last = Rc::new(Cell::new(None));
        let sink = Rc::clone(&last);
        let subscription = sim.subscribe(move |event| {
            if let SimulationEvent::Tick { alpha } = event {
                sink.set(Some(*alpha));
            }
        });

        sim.tick();
        assert_eq!(last.get(), Some(sim.alpha()));

        drop(subscription);
        last.set(None);
        sim.tick();
        assert_eq!(last.get(), None);
    }
}
