//! Barnes-Hut quadtree for O(n log n) charge and neighborhood queries.
//!
//! Distant groups of vertices are treated as a single body at their center of
//! mass instead of being visited one by one. Every vertex carries the same
//! charge, so the mass of a cell is the number of bodies in it.

use egui::{Pos2, Vec2};

/// Bodies deeper than this share a leaf instead of splitting further
const MAX_DEPTH: u32 = 32;
/// Squared minimum distance used when a body is very close to a cell
const DISTANCE_MIN_SQ: f32 = 1.0;

/// A vertex stored in the tree, keyed by its index in the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub index: usize,
    pub pos: Pos2,
}

#[derive(Debug, Default)]
pub enum QuadNode {
    #[default]
    Empty,
    /// Usually one body; several when they coincide or `MAX_DEPTH` is reached
    Leaf { bodies: Vec<Body> },
    Internal {
        /// Center of mass of all bodies in this cell
        center_of_mass: Pos2,
        /// Number of bodies in this cell
        count: u32,
        /// Children: NW, NE, SW, SE
        children: Box<[QuadNode; 4]>,
    },
}

#[cfg(test)]
impl QuadNode {
    pub fn count(&self) -> u32 {
        match self {
            QuadNode::Empty => 0,
            QuadNode::Leaf { bodies } => bodies.len() as u32,
            QuadNode::Internal { count, .. } => *count,
        }
    }
}

/// Axis-aligned bounding box for quadtree cells
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min: Pos2,
    pub max: Pos2,
}

impl Bounds {
    pub fn new(min: Pos2, max: Pos2) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn size(&self) -> f32 {
        (self.max.x - self.min.x).max(self.max.y - self.min.y)
    }

    pub fn contains(&self, pos: Pos2) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }

    /// True when the square of half-width `reach` around `pos` overlaps this cell.
    pub fn intersects(&self, pos: Pos2, reach: f32) -> bool {
        pos.x + reach >= self.min.x
            && pos.x - reach <= self.max.x
            && pos.y + reach >= self.min.y
            && pos.y - reach <= self.max.y
    }

    /// Get the quadrant for a position (0=NW, 1=NE, 2=SW, 3=SE)
    pub fn quadrant(&self, pos: Pos2) -> usize {
        let center = self.center();
        let east = pos.x >= center.x;
        let south = pos.y >= center.y;
        match (south, east) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }

    /// Get bounds for a specific quadrant
    pub fn child_bounds(&self, quadrant: usize) -> Bounds {
        let center = self.center();
        match quadrant {
            0 => Bounds::new(self.min, center),
            1 => Bounds::new(Pos2::new(center.x, self.min.y), Pos2::new(self.max.x, center.y)),
            2 => Bounds::new(Pos2::new(self.min.x, center.y), Pos2::new(center.x, self.max.y)),
            3 => Bounds::new(center, self.max),
            _ => unreachable!(),
        }
    }
}

pub struct Quadtree {
    pub root: QuadNode,
    pub bounds: Bounds,
    /// Opening angle: a cell is approximated when `size / distance < theta`
    pub theta: f32,
}

impl Quadtree {
    /// Build a tree over `positions`; body `i` is `positions[i]`.
    pub fn build(positions: &[Pos2], theta: f32) -> Self {
        if positions.is_empty() {
            return Self {
                root: QuadNode::Empty,
                bounds: Bounds::new(Pos2::ZERO, Pos2::ZERO),
                theta,
            };
        }

        let mut min = Pos2::new(f32::MAX, f32::MAX);
        let mut max = Pos2::new(f32::MIN, f32::MIN);
        for pos in positions {
            min = min.min(*pos);
            max = max.max(*pos);
        }

        // Pad and make square
        let padding = 1.0;
        min -= Vec2::splat(padding);
        let size = (max.x - min.x).max(max.y - min.y) + padding;
        let bounds = Bounds::new(min, min + Vec2::splat(size));

        let mut tree = Self {
            root: QuadNode::Empty,
            bounds,
            theta,
        };
        for (index, &pos) in positions.iter().enumerate() {
            tree.insert(Body { index, pos });
        }
        tree
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.root.count() as usize
    }

    pub fn insert(&mut self, body: Body) {
        self.root = Self::insert_into(std::mem::take(&mut self.root), body, self.bounds, 0);
    }

    fn insert_into(node: QuadNode, body: Body, bounds: Bounds, depth: u32) -> QuadNode {
        match node {
            QuadNode::Empty => QuadNode::Leaf { bodies: vec![body] },

            QuadNode::Leaf { mut bodies } => {
                let coincident = bodies.first().is_some_and(|b| b.pos == body.pos);
                if coincident || depth >= MAX_DEPTH {
                    bodies.push(body);
                    return QuadNode::Leaf { bodies };
                }

                let mut node = QuadNode::Internal {
                    center_of_mass: Pos2::ZERO,
                    count: 0,
                    children: Box::default(),
                };
                for existing in bodies.into_iter().chain(std::iter::once(body)) {
                    node = Self::insert_into(node, existing, bounds, depth);
                }
                node
            }

            QuadNode::Internal {
                center_of_mass,
                count,
                mut children,
            } => {
                let q = bounds.quadrant(body.pos);
                children[q] = Self::insert_into(
                    std::mem::take(&mut children[q]),
                    body,
                    bounds.child_bounds(q),
                    depth + 1,
                );

                let total = count as f32 + 1.0;
                let center_of_mass = Pos2::new(
                    (center_of_mass.x * count as f32 + body.pos.x) / total,
                    (center_of_mass.y * count as f32 + body.pos.y) / total,
                );

                QuadNode::Internal {
                    center_of_mass,
                    count: count + 1,
                    children,
                }
            }
        }
    }

    /// Velocity change on body `index` at `pos` from every other body, each
    /// carrying `strength` (negative repels), scaled by `alpha`.
    pub fn charge_force(&self, index: usize, pos: Pos2, strength: f32, alpha: f32) -> Vec2 {
        self.charge_recursive(&self.root, self.bounds, index, pos, strength * alpha)
    }

    fn charge_recursive(
        &self,
        node: &QuadNode,
        bounds: Bounds,
        index: usize,
        pos: Pos2,
        weight: f32,
    ) -> Vec2 {
        match node {
            QuadNode::Empty => Vec2::ZERO,

            QuadNode::Leaf { bodies } => {
                let mut force = Vec2::ZERO;
                for body in bodies.iter().filter(|b| b.index != index) {
                    let mut delta = body.pos - pos;
                    if delta == Vec2::ZERO {
                        delta = Vec2::new(jiggle(), jiggle());
                    }
                    force += delta * weight / softened(delta.length_sq());
                }
                force
            }

            QuadNode::Internal {
                center_of_mass,
                count,
                children,
            } => {
                let delta = *center_of_mass - pos;
                let l = delta.length_sq();
                let w = bounds.size();

                // Never approximate a cell containing the body itself
                if !bounds.contains(pos) && w * w < l * self.theta * self.theta {
                    return delta * weight * *count as f32 / softened(l);
                }

                let mut force = Vec2::ZERO;
                for (i, child) in children.iter().enumerate() {
                    force += self.charge_recursive(child, bounds.child_bounds(i), index, pos, weight);
                }
                force
            }
        }
    }

    /// Push the index of every body in a cell overlapping the square of
    /// half-width `reach` around `pos`. Callers filter exact distances.
    pub fn collect_within(&self, pos: Pos2, reach: f32, out: &mut Vec<usize>) {
        Self::collect_recursive(&self.root, self.bounds, pos, reach, out);
    }

    fn collect_recursive(node: &QuadNode, bounds: Bounds, pos: Pos2, reach: f32, out: &mut Vec<usize>) {
        if !bounds.intersects(pos, reach) {
            return;
        }
        match node {
            QuadNode::Empty => {}
            QuadNode::Leaf { bodies } => out.extend(bodies.iter().map(|b| b.index)),
            QuadNode::Internal { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    Self::collect_recursive(child, bounds.child_bounds(i), pos, reach, out);
                }
            }
        }
    }
}

/// Squared distances below the minimum are softened to avoid blow-ups.
fn softened(l: f32) -> f32 {
    if l < DISTANCE_MIN_SQ {
        (DISTANCE_MIN_SQ * l).sqrt().max(f32::EPSILON)
    } else {
        l
    }
}

/// Tiny random offset used to separate coincident bodies.
pub fn jiggle() -> f32 {
    (rand::random::<f32>() - 0.5) * 1e-6
}
