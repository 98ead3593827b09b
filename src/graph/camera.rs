//! Animated focus on a vertex.
//!
//! Times are seconds on the egui input clock (`InputState::time`).

use egui::{Pos2, Vec2};

use super::scene::{Scene, Viewport};

/// Zoom level when centered on a vertex
pub const FOCUS_ZOOM: f32 = 2.0;
/// Length of the focus animation, seconds
pub const FOCUS_DURATION: f64 = 0.75;
/// Delay before focusing the initial selection, so the layout can spread out
pub const INITIAL_FOCUS_DELAY: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Animation {
    from: Viewport,
    to: Viewport,
    start: f64,
}

#[derive(Debug, Default)]
pub struct CameraController {
    animation: Option<Animation>,
    /// Deferred focus target and the time it becomes due
    pending: Option<(String, f64)>,
}

impl CameraController {
    /// Begin animating toward `target` (model space). No-op until the canvas
    /// has been measured.
    pub fn focus(&mut self, scene: &Scene, target: Pos2, now: f64) -> bool {
        if !scene.is_measured() || !target.is_finite() {
            return false;
        }
        self.pending = None;
        self.animation = Some(Animation {
            from: scene.viewport,
            to: focus_transform(target, scene.size(), FOCUS_ZOOM),
            start: now,
        });
        true
    }

    /// Focus `id` once `due` has passed.
    pub fn focus_later(&mut self, id: impl Into<String>, due: f64) {
        self.pending = Some((id.into(), due));
    }

    /// Advance the animation, writing the viewport. `resolve` maps a vertex
    /// id to its current position for deferred focus. Returns true while
    /// more frames are needed.
    pub fn update(&mut self, scene: &mut Scene, now: f64, resolve: impl Fn(&str) -> Option<Pos2>) -> bool {
        if let Some((id, due)) = &self.pending {
            if now >= *due && scene.is_measured() {
                let target = resolve(id);
                self.pending = None;
                if let Some(target) = target {
                    self.focus(scene, target, now);
                }
            }
        }

        if let Some(animation) = self.animation {
            let t = ((now - animation.start) / FOCUS_DURATION).clamp(0.0, 1.0) as f32;
            scene.viewport = animation.from.lerp(&animation.to, ease_in_out_cubic(t));
            if t >= 1.0 {
                scene.viewport = animation.to;
                self.animation = None;
            }
        }

        self.is_busy()
    }

    /// Drop any in-flight or pending focus, e.g. on user pan/zoom.
    pub fn cancel(&mut self) {
        self.animation = None;
        self.pending = None;
    }

    #[cfg(test)]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.animation.is_some() || self.pending.is_some()
    }
}

/// Viewport that shows model point `pos` at the middle of a canvas of `size`
/// at zoom `k`.
pub fn focus_transform(pos: Pos2, size: Vec2, k: f32) -> Viewport {
    Viewport::new(size.x / 2.0 - pos.x * k, size.y / 2.0 - pos.y * k, k)
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::GraphModel;
    use crate::theme::Palette;

    fn measured_scene() -> Scene {
        let mut scene = Scene::new(&GraphModel::default(), Palette::default(), 10.0, 1.5);
        scene.set_size(Vec2::new(800.0, 600.0));
        scene
    }

    #[test]
    fn test_focus_centers_target_at_double_zoom() {
        let mut scene = measured_scene();
        let mut camera = CameraController::default();
        let target = Pos2::new(120.0, -40.0);

        assert!(camera.focus(&scene, target, 10.0));
        assert!(camera.update(&mut scene, 10.4, |_| None));
        assert!(!camera.update(&mut scene, 10.0 + FOCUS_DURATION, |_| None));

        assert_eq!(scene.viewport.k, FOCUS_ZOOM);
        let on_screen = scene.viewport.to_screen(target);
        assert!(on_screen.distance(Pos2::new(400.0, 300.0)) < 1e-3);
    }

    #[test]
    fn test_unmeasured_scene_is_noop() {
        let scene = Scene::new(&GraphModel::default(), Palette::default(), 10.0, 1.5);
        let mut camera = CameraController::default();
        assert!(!camera.focus(&scene, Pos2::ZERO, 0.0));
        assert!(!camera.is_animating());
    }

    #[test]
    fn test_deferred_focus_waits_and_cancel_stops() {
        let mut scene = measured_scene();
        let mut camera = CameraController::default();
        let resolve = |id: &str| (id == "10.0.0.1").then_some(Pos2::new(5.0, 5.0));

        camera.focus_later("10.0.0.1", 1.0 + INITIAL_FOCUS_DELAY);
        assert!(camera.update(&mut scene, 1.2, resolve));
        assert!(!camera.is_animating());

        assert!(camera.update(&mut scene, 1.6, resolve));
        assert!(camera.is_animating());

        camera.cancel();
        let frozen = scene.viewport;
        assert!(!camera.update(&mut scene, 3.0, resolve));
        assert_eq!(scene.viewport, frozen);
    }

    #[test]
    fn test_easing_endpoints() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
        assert!(ease_in_out_cubic(0.25) < 0.25);
    }
}
