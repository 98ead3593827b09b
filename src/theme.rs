//! Unified theme and color constants for the viewer.
//!
//! Both the graph canvas and the sidebar source their colors from here, per
//! [`ThemeMode`]. The graph only ever sees a resolved [`Palette`].

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::graph::types::Group;

/// Background colors per mode
pub mod bg {
    use super::*;

    /// Dark graph canvas
    pub const GRAPH_DARK: Color32 = Color32::from_rgb(14, 17, 23);

    /// Light graph canvas
    pub const GRAPH_LIGHT: Color32 = Color32::from_rgb(248, 249, 251);
}

/// Accent colors shared by both modes
pub mod accent {
    use super::*;

    /// Selection highlight on the dark canvas
    pub const ORANGE: Color32 = Color32::from_rgb(255, 149, 0);

    /// Selection highlight on the light canvas
    pub const DEEP_ORANGE: Color32 = Color32::from_rgb(230, 81, 0);

    /// Named hosts
    pub const BLUE: Color32 = Color32::from_rgb(59, 130, 246);

    /// Named hosts, light mode
    pub const DEEP_BLUE: Color32 = Color32::from_rgb(29, 78, 216);

    /// Unnamed hosts
    pub const GREEN: Color32 = Color32::from_rgb(34, 197, 94);

    /// Unnamed hosts, light mode
    pub const DEEP_GREEN: Color32 = Color32::from_rgb(21, 128, 61);

    /// Errors in the status line
    pub const RED: Color32 = Color32::from_rgb(239, 68, 68);
}

/// Text colors at different emphasis levels
pub mod text {
    use super::*;

    pub const PRIMARY_DARK: Color32 = Color32::from_rgb(240, 240, 245);
    pub const PRIMARY_LIGHT: Color32 = Color32::from_rgb(30, 32, 38);

    /// Muted text - low contrast for less important info
    pub const MUTED: Color32 = Color32::from_rgb(120, 125, 135);
}

/// Glyph and edge stroke widths
pub mod stroke_width {
    /// Normal node border
    pub const NORMAL: f32 = 1.0;

    /// Selected node border
    pub const SELECTED: f32 = 2.5;
}

/// Light or dark rendering, persisted with the settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn is_dark(&self) -> bool {
        *self == ThemeMode::Dark
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
        }
    }

    pub fn visuals(&self) -> egui::Visuals {
        match self {
            ThemeMode::Light => egui::Visuals::light(),
            ThemeMode::Dark => egui::Visuals::dark(),
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            ThemeMode::Dark => Palette {
                background: bg::GRAPH_DARK,
                edge: Color32::from_rgb(110, 118, 135),
                label: text::PRIMARY_DARK,
                stroke: Color32::from_rgb(200, 205, 215),
                accent: accent::ORANGE,
                named: accent::BLUE,
                unnamed: accent::GREEN,
            },
            ThemeMode::Light => Palette {
                background: bg::GRAPH_LIGHT,
                edge: Color32::from_rgb(150, 155, 165),
                label: text::PRIMARY_LIGHT,
                stroke: Color32::from_rgb(60, 64, 72),
                accent: accent::DEEP_ORANGE,
                named: accent::DEEP_BLUE,
                unnamed: accent::DEEP_GREEN,
            },
        }
    }
}

/// Resolved graph colors for one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color32,
    pub edge: Color32,
    pub label: Color32,
    /// Baseline glyph outline
    pub stroke: Color32,
    /// Selected glyph and its incident edges
    pub accent: Color32,
    pub named: Color32,
    pub unnamed: Color32,
}

impl Palette {
    pub fn group_fill(&self, group: Group) -> Color32 {
        match group {
            Group::Named => self.named,
            Group::Unnamed => self.unnamed,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        ThemeMode::default().palette()
    }
}
