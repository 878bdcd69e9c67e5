//! Interaction engine for the map page: (ViewState, ViewEvent) -> commands.
//!
//! The composed page runs the same transitions in the browser; this module
//! is the reference for them and is what the tests exercise.
//!
//! ## Transitions
//!
//! | Event              | Effect                                                        |
//! |--------------------|---------------------------------------------------------------|
//! | select/next/prev   | select year, fetch its artifact (ends do not wrap)           |
//! | artifact loaded    | replace heat layer if the year is still selected, else drop  |
//! | artifact failed    | clear heat layer if the year is still selected               |
//! | boundaries loaded  | index regions, full-country mask, mark ready                 |
//! | boundaries failed  | mark ready without index; no mask, no search                 |
//! | search             | exact name hit: fit bounds, single-region mask; miss: no-op  |
//! | reset              | full-country mask, default view, clear search input          |

use serde_json::{json, Map, Value};

use crate::aggregate::IntensityPoint;
use crate::boundary::BoundaryIndex;
use crate::emit::artifact_file_name;
use crate::geometry::Bounds;
use crate::logging::{log_view_event, v_str};
use crate::mask::Mask;

// =============================================================================
// Heat layer rendering options
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HeatOptions {
    pub radius: u32,
    pub blur: u32,
    pub max_zoom: u8,
    pub max: f64,
    pub gradient: [(f64, &'static str); 5],
}

pub const HEAT_OPTIONS: HeatOptions = HeatOptions {
    radius: 12,
    blur: 20,
    max_zoom: 10,
    max: 1.0,
    gradient: [(0.0, "blue"), (0.25, "cyan"), (0.5, "lime"), (0.75, "yellow"), (1.0, "red")],
};

impl HeatOptions {
    /// Options object as the heat layer constructor takes it.
    pub fn to_json(&self) -> Value {
        let gradient: Map<String, Value> = self
            .gradient
            .iter()
            .map(|(stop, color)| (format!("{:.2}", stop), json!(color)))
            .collect();
        json!({
            "radius": self.radius,
            "blur": self.blur,
            "maxZoom": self.max_zoom,
            "max": self.max,
            "gradient": gradient,
        })
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Viewport {
    Center { lat: f64, lon: f64, zoom: u8 },
    Fit(Bounds),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatLayer {
    pub year: String,
    pub points: Vec<IntensityPoint>,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    years: Vec<String>,
    selected: Option<usize>,
    focused: Option<String>,
    search_input: String,
    mask: Option<Mask>,
    heat: Option<HeatLayer>,
    viewport: Viewport,
    default_view: Viewport,
    boundaries: Option<BoundaryIndex>,
    ready: bool,
}

#[derive(Debug, Clone)]
pub enum ViewEvent {
    SelectYear(String),
    NextYear,
    PreviousYear,
    ArtifactLoaded { year: String, points: Vec<IntensityPoint> },
    ArtifactFailed { year: String, reason: String },
    BoundariesLoaded(BoundaryIndex),
    BoundariesFailed(String),
    Search(String),
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    FetchArtifact { year: String, file: String },
    SetTitle(String),
    ReplaceHeatLayer { year: String },
    RemoveHeatLayer,
    ReplaceMask { holes: usize },
    SetView(Viewport),
    ClearSearch,
    ReportError(String),
}

impl ViewState {
    /// Page start: the first year is selected and its fetch issued.
    pub fn new(years: Vec<String>, default_view: Viewport) -> (Self, Vec<ViewCommand>) {
        let mut state = Self {
            years,
            selected: None,
            focused: None,
            search_input: String::new(),
            mask: None,
            heat: None,
            viewport: default_view,
            default_view,
            boundaries: None,
            ready: false,
        };
        let mut commands = vec![ViewCommand::SetView(default_view)];
        if !state.years.is_empty() {
            commands.extend(state.select_index(0));
        }
        (state, commands)
    }

    pub fn years(&self) -> &[String] {
        &self.years
    }

    pub fn selected_year(&self) -> Option<&str> {
        self.selected.map(|i| self.years[i].as_str())
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn heat_layer(&self) -> Option<&HeatLayer> {
        self.heat.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Search and reset handlers are attached once this is true.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn can_previous(&self) -> bool {
        matches!(self.selected, Some(i) if i > 0)
    }

    pub fn can_next(&self) -> bool {
        matches!(self.selected, Some(i) if i + 1 < self.years.len())
    }

    fn select_index(&mut self, idx: usize) -> Vec<ViewCommand> {
        self.selected = Some(idx);
        let year = self.years[idx].clone();
        vec![
            ViewCommand::SetTitle(year.clone()),
            ViewCommand::FetchArtifact { file: artifact_file_name(&year), year },
        ]
    }

    fn apply_mask(&mut self, mask: Mask) -> ViewCommand {
        let holes = mask.holes.len();
        self.mask = Some(mask);
        ViewCommand::ReplaceMask { holes }
    }

    fn full_mask(&self) -> Option<Mask> {
        self.boundaries.as_ref().map(BoundaryIndex::full_mask)
    }
}

// =============================================================================
// Reducer
// =============================================================================

pub fn reduce(state: &mut ViewState, event: ViewEvent) -> Vec<ViewCommand> {
    match event {
        ViewEvent::SelectYear(year) => match state.years.iter().position(|y| *y == year) {
            Some(idx) => state.select_index(idx),
            None => Vec::new(),
        },
        ViewEvent::NextYear => {
            if !state.can_next() {
                return Vec::new();
            }
            let idx = state.selected.map_or(0, |i| i + 1);
            state.select_index(idx)
        }
        ViewEvent::PreviousYear => {
            if !state.can_previous() {
                return Vec::new();
            }
            let idx = state.selected.map_or(0, |i| i - 1);
            state.select_index(idx)
        }
        ViewEvent::ArtifactLoaded { year, points } => {
            if state.selected_year() != Some(year.as_str()) {
                log_view_event(
                    "stale_artifact_dropped",
                    &[("year", v_str(&year)), ("selected", json!(state.selected_year()))],
                );
                return Vec::new();
            }
            state.heat = Some(HeatLayer { year: year.clone(), points });
            vec![ViewCommand::ReplaceHeatLayer { year }]
        }
        ViewEvent::ArtifactFailed { year, reason } => {
            let msg = format!("Error loading heatmap data for {}: {}", year, reason);
            if state.selected_year() != Some(year.as_str()) {
                return vec![ViewCommand::ReportError(msg)];
            }
            state.heat = None;
            vec![ViewCommand::RemoveHeatLayer, ViewCommand::ReportError(msg)]
        }
        ViewEvent::BoundariesLoaded(index) => {
            state.boundaries = Some(index);
            state.ready = true;
            match state.full_mask() {
                Some(mask) => vec![state.apply_mask(mask)],
                None => Vec::new(),
            }
        }
        ViewEvent::BoundariesFailed(reason) => {
            state.ready = true;
            vec![ViewCommand::ReportError(format!("Error loading GeoJSON: {}", reason))]
        }
        ViewEvent::Search(name) => {
            if !state.ready {
                return Vec::new();
            }
            let Some(index) = state.boundaries.as_ref() else {
                return Vec::new();
            };
            let (Some(bounds), Some(mask)) = (index.bounds_of(&name), index.region_mask(&name)) else {
                return Vec::new();
            };
            state.viewport = Viewport::Fit(bounds);
            state.focused = Some(name.clone());
            state.search_input = name;
            let mask_cmd = state.apply_mask(mask);
            vec![ViewCommand::SetView(Viewport::Fit(bounds)), mask_cmd]
        }
        ViewEvent::Reset => {
            if !state.ready {
                return Vec::new();
            }
            let mut commands = Vec::new();
            if let Some(mask) = state.full_mask() {
                commands.push(state.apply_mask(mask));
            }
            state.viewport = state.default_view;
            state.focused = None;
            state.search_input.clear();
            commands.push(ViewCommand::SetView(state.default_view));
            commands.push(ViewCommand::ClearSearch);
            commands
        }
    }
}
