//! Topology graph: model building, force layout, rendering and interaction.

pub mod camera;
pub mod config;
pub mod events;
pub mod interaction;
pub mod model;
pub mod quadtree;
pub mod scene;
pub mod simulation;
pub mod types;
pub mod view;

pub use view::GraphView;
