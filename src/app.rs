//! Main application state and UI.

use crate::api::{open_source, SourceError};
use crate::graph::config::{ranges, SimulationConfig};
use crate::graph::interaction::{LabelPrecedence, SelectionEvent};
use crate::graph::types::NetworkNode;
use crate::graph::GraphView;
use crate::search::{FuzzySearch, NodeSearch, SearchHit};
use crate::settings::{Settings, SourceKind};
use crate::theme::{self, ThemeMode};
use eframe::egui::{self, Color32, Rect, Vec2};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;
use tracing::{info, warn};

/// Search results shown under the search box
const SEARCH_LIMIT: usize = 8;

/// A snapshot delivered by the background loader
struct LoadOutcome {
    source: String,
    nodes: Vec<NetworkNode>,
}

type LoadResult = Result<LoadOutcome, SourceError>;

/// Data source state shown at the top of the sidebar
#[derive(Debug, Clone, PartialEq)]
enum Status {
    Idle,
    Loaded { source: String, count: usize },
    Failed(String),
}

/// Everything the details panel shows for the selected vertex
struct SelectionDetails {
    id: String,
    display_name: String,
    group: &'static str,
    domains: Vec<String>,
    neighbours: Vec<(String, bool)>,
}

pub struct NetgraphApp {
    // Current snapshot
    nodes: Vec<NetworkNode>,
    view: Option<GraphView>,

    // Background loading
    load_receiver: Option<Receiver<LoadResult>>,
    status: Status,

    // Search
    search: Box<dyn NodeSearch>,
    search_query: String,
    search_hits: Vec<SearchHit>,

    // Settings persistence
    settings: Settings,
    settings_dirty: bool,
    last_settings_save: Instant,
}

impl NetgraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        // Load saved settings
        let mut app = Self::with_settings(Settings::load());
        app.reload();
        app
    }

    /// App state around `settings` without touching disk or network
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            nodes: Vec::new(),
            view: None,
            load_receiver: None,
            status: Status::Idle,
            search: Box::new(FuzzySearch::default()),
            search_query: String::new(),
            search_hits: Vec::new(),
            settings,
            settings_dirty: false,
            last_settings_save: Instant::now(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.load_receiver.is_some()
    }

    /// Fetch a fresh snapshot on a background thread.
    fn reload(&mut self) {
        let settings = self.settings.clone();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let result = open_source(&settings).and_then(|source| {
                if let Err(e) = source.health() {
                    warn!(error = %e, "Health check failed, fetching anyway");
                }
                let nodes = source.fetch_nodes()?;
                Ok(LoadOutcome {
                    source: source.describe(),
                    nodes,
                })
            });
            // Receiver is gone if the app exited first
            let _ = tx.send(result);
        });

        info!(source = self.settings.source.label(), "Loading topology");
        self.load_receiver = Some(rx);
    }

    /// Pick up a finished load. Returns true while still waiting.
    fn poll_load(&mut self, now: f64) -> bool {
        let Some(rx) = &self.load_receiver else {
            return false;
        };

        match rx.try_recv() {
            Ok(Ok(outcome)) => {
                self.load_receiver = None;
                self.status = Status::Loaded {
                    source: outcome.source,
                    count: outcome.nodes.len(),
                };
                self.apply_snapshot(outcome.nodes, now);
                false
            }
            Ok(Err(e)) => {
                self.load_receiver = None;
                warn!(error = %e, "Failed to load topology");
                self.status = Status::Failed(e.to_string());
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                self.load_receiver = None;
                self.status = Status::Failed("Loader stopped unexpectedly".to_string());
                false
            }
        }
    }

    /// Replace the graph with a new snapshot, keeping the selection when it
    /// is still present.
    fn apply_snapshot(&mut self, nodes: Vec<NetworkNode>, now: f64) {
        let selection = self
            .view
            .as_ref()
            .and_then(|view| view.selected().map(str::to_string))
            .or_else(|| self.settings.selected_node.clone());

        // Tear down the previous simulation before building the next one
        self.view = None;
        let view = GraphView::new(
            &nodes,
            self.settings.simulation,
            self.settings.label_precedence,
            self.settings.theme.palette(),
            selection.as_deref(),
            now,
        );

        if view.selected().map(str::to_string) != self.settings.selected_node {
            self.settings.selected_node = view.selected().map(str::to_string);
            self.mark_settings_dirty();
        }

        self.view = Some(view);
        self.nodes = nodes;
        self.refresh_search();
    }

    /// Mark settings as needing to be saved
    fn mark_settings_dirty(&mut self) {
        self.settings_dirty = true;
    }

    /// Save settings if dirty and enough time has passed (debounce)
    fn maybe_save_settings(&mut self) {
        if self.settings_dirty && self.last_settings_save.elapsed().as_secs() >= 2 {
            self.settings.save();
            self.settings_dirty = false;
            self.last_settings_save = Instant::now();
        }
    }

    fn set_config(&mut self, config: SimulationConfig) {
        let config = config.sanitized();
        if config == self.settings.simulation {
            return;
        }
        self.settings.simulation = config;
        if let Some(view) = &mut self.view {
            view.apply_config(config);
        }
        self.mark_settings_dirty();
    }

    fn set_theme(&mut self, theme: ThemeMode) {
        self.settings.theme = theme;
        if let Some(view) = &mut self.view {
            view.set_palette(theme.palette());
        }
        self.mark_settings_dirty();
    }

    fn set_precedence(&mut self, precedence: LabelPrecedence) {
        self.settings.label_precedence = precedence;
        if let Some(view) = &mut self.view {
            view.set_precedence(precedence);
        }
        self.mark_settings_dirty();
    }

    /// Record a selection made on the canvas.
    fn handle_selection_event(&mut self, event: SelectionEvent) {
        let selected = match event {
            SelectionEvent::Selected(id) => Some(id),
            SelectionEvent::Cleared => None,
        };
        if selected != self.settings.selected_node {
            self.settings.selected_node = selected;
            self.mark_settings_dirty();
        }
    }

    /// Select and focus a vertex from the sidebar, or clear with `None`.
    fn select_node(&mut self, id: Option<&str>, now: f64) {
        let Some(view) = &mut self.view else {
            return;
        };
        view.set_selected_external(id, now);
        let selected = view.selected().map(str::to_string);
        if selected != self.settings.selected_node {
            self.settings.selected_node = selected;
            self.mark_settings_dirty();
        }
    }

    fn refresh_search(&mut self) {
        self.search_hits = self.search.search(&self.nodes, &self.search_query, SEARCH_LIMIT);
    }

    fn selection_details(&self) -> Option<SelectionDetails> {
        let view = self.view.as_ref()?;
        let vertex = view.model().vertex(view.selected()?)?;
        Some(SelectionDetails {
            id: vertex.id.clone(),
            display_name: vertex.display_name.clone(),
            group: vertex.group.label(),
            domains: vertex.domains.clone(),
            neighbours: vertex
                .neighbor_ids
                .iter()
                .map(|id| (id.clone(), view.model().contains(id)))
                .collect(),
        })
    }

    fn render_sidebar(&mut self, ui: &mut egui::Ui, now: f64) {
        ui.heading("Network Topology");
        ui.add_space(10.0);

        // Source status
        ui.horizontal(|ui| {
            if self.is_loading() {
                ui.spinner();
                ui.label("Loading...");
                return;
            }
            let color = status_color(&self.status);
            match &self.status {
                Status::Idle => {
                    ui.colored_label(color, "● Not loaded");
                }
                Status::Loaded { source, count } => {
                    ui.colored_label(color, "●");
                    ui.label(format!("{} nodes from {}", count, source));
                }
                Status::Failed(_) => {
                    ui.colored_label(color, "● Load failed");
                }
            }
        });
        if let Status::Failed(err) = &self.status {
            ui.colored_label(theme::accent::RED, format!("Error: {}", err));
        }

        ui.add_space(10.0);

        // Data source section
        egui::CollapsingHeader::new("Data Source")
            .default_open(true)
            .show(ui, |ui| {
                let prev_source = self.settings.source;
                egui::ComboBox::from_id_salt("source")
                    .selected_text(self.settings.source.label())
                    .show_ui(ui, |ui| {
                        for kind in SourceKind::all() {
                            ui.selectable_value(&mut self.settings.source, *kind, kind.label());
                        }
                    });
                if self.settings.source != prev_source {
                    self.mark_settings_dirty();
                }

                let url = match self.settings.source {
                    SourceKind::Api => &mut self.settings.api_url,
                    SourceKind::Database => &mut self.settings.database_url,
                };
                if ui.text_edit_singleline(url).changed() {
                    self.settings_dirty = true;
                }

                ui.add_space(5.0);
                ui.add_enabled_ui(!self.is_loading(), |ui| {
                    if ui.button("⟳ Reload").clicked() {
                        self.reload();
                    }
                });
            });

        // Search section
        egui::CollapsingHeader::new("Search")
            .default_open(true)
            .show(ui, |ui| {
                if ui.text_edit_singleline(&mut self.search_query).changed() {
                    self.refresh_search();
                }
                let mut chosen = None;
                for hit in &self.search_hits {
                    if ui.selectable_label(false, hit.label.as_str()).clicked() {
                        chosen = Some(hit.ip_addr.clone());
                    }
                }
                if let Some(id) = chosen {
                    self.select_node(Some(&id), now);
                }
            });

        // Layout section
        egui::CollapsingHeader::new("Layout")
            .default_open(true)
            .show(ui, |ui| {
                let mut config = self.settings.simulation;
                let mut changed = false;
                changed |= ui.add(egui::Slider::new(&mut config.node_size, ranges::NODE_SIZE).text("Node size")).changed();
                changed |= ui.add(egui::Slider::new(&mut config.font_size, ranges::FONT_SIZE).text("Font size")).changed();
                changed |= ui
                    .add(egui::Slider::new(&mut config.link_distance, ranges::LINK_DISTANCE).text("Link distance"))
                    .changed();
                changed |= ui.add(egui::Slider::new(&mut config.link_width, ranges::LINK_WIDTH).text("Link width")).changed();
                changed |= ui
                    .add(egui::Slider::new(&mut config.repulsion_strength, ranges::REPULSION_STRENGTH).text("Repulsion"))
                    .changed();
                changed |= ui.add(egui::Slider::new(&mut config.friction, ranges::FRICTION).text("Friction")).changed();
                changed |= ui.add(egui::Slider::new(&mut config.alpha, ranges::ALPHA).text("Energy")).changed();
                changed |= ui
                    .add(egui::Slider::new(&mut config.alpha_decay, ranges::ALPHA_DECAY).text("Energy decay"))
                    .changed();
                changed |= ui.checkbox(&mut config.show_all_ips, "Show all IPs").changed();

                if changed {
                    self.set_config(config);
                }
                if ui.button("↺ Reset layout").clicked() {
                    self.set_config(SimulationConfig::default());
                }
            });

        // Display section
        egui::CollapsingHeader::new("Display")
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(format!("Theme: {}", self.settings.theme.label()));
                    let icon = if self.settings.theme.is_dark() { "☀" } else { "🌙" };
                    if ui.button(icon).on_hover_text("Toggle theme").clicked() {
                        self.set_theme(self.settings.theme.toggled());
                    }
                });

                let prev = self.settings.label_precedence;
                let mut precedence = prev;
                egui::ComboBox::from_id_salt("label_precedence")
                    .selected_text(precedence.label())
                    .show_ui(ui, |ui| {
                        for option in [LabelPrecedence::HoverFirst, LabelPrecedence::Union] {
                            ui.selectable_value(&mut precedence, option, option.label());
                        }
                    });
                if precedence != prev {
                    self.set_precedence(precedence);
                }
            });

        // Selection details
        if let Some(details) = self.selection_details() {
            ui.add_space(10.0);
            ui.separator();
            ui.horizontal(|ui| {
                ui.strong(details.display_name.as_str());
                if ui.small_button("✕").on_hover_text("Clear selection").clicked() {
                    self.select_node(None, now);
                }
            });
            ui.label(format!("{} · {}", details.id, details.group));

            if !details.domains.is_empty() {
                ui.add_space(5.0);
                ui.label("Domains:");
                for domain in &details.domains {
                    ui.label(format!("  {}", domain));
                }
            }

            if !details.neighbours.is_empty() {
                ui.add_space(5.0);
                ui.label("Neighbours:");
                let mut chosen = None;
                for (id, present) in &details.neighbours {
                    if *present {
                        if ui.link(id.as_str()).clicked() {
                            chosen = Some(id.clone());
                        }
                    } else {
                        ui.colored_label(theme::text::MUTED, format!("{} (not in snapshot)", id));
                    }
                }
                if let Some(id) = chosen {
                    self.select_node(Some(&id), now);
                }
            }
        }

        if let Some(view) = &self.view {
            ui.add_space(10.0);
            ui.separator();
            ui.colored_label(
                theme::text::MUTED,
                format!(
                    "{} vertices · {} edges · energy {:.3}",
                    view.model().len(),
                    view.model().edges.len(),
                    view.simulation().alpha()
                ),
            );
        }
    }

    fn render_graph(&mut self, ui: &mut egui::Ui) {
        let rect = ui.max_rect();
        let loading = self.is_loading();

        match &mut self.view {
            Some(view) => {
                if let Some(event) = view.ui(ui) {
                    self.handle_selection_event(event);
                }
            }
            None if !loading => {
                ui.centered_and_justified(|ui| {
                    ui.colored_label(theme::text::MUTED, "No topology loaded");
                });
            }
            None => {}
        }

        if loading {
            let spinner_rect = Rect::from_center_size(rect.center(), Vec2::splat(32.0));
            ui.put(spinner_rect, egui::Spinner::new().size(32.0));
        }
    }
}

impl eframe::App for NetgraphApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time);
        self.maybe_save_settings();

        // Check for a snapshot from the background thread
        if self.poll_load(now) {
            // Still loading, request repaint to check again
            ctx.request_repaint();
        }

        ctx.set_visuals(self.settings.theme.visuals());

        // Sidebar
        egui::SidePanel::left("sidebar")
            .min_width(240.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_sidebar(ui, now);
                });
            });

        // Main graph area
        let background = self.settings.theme.palette().background;
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(background))
            .show(ctx, |ui| {
                self.render_graph(ui);
            });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Force save settings on exit
        if self.settings_dirty {
            self.settings.save();
        }
    }
}

fn status_color(status: &Status) -> Color32 {
    match status {
        Status::Idle => theme::text::MUTED,
        Status::Loaded { .. } => theme::accent::GREEN,
        Status::Failed(_) => theme::accent::RED,
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
