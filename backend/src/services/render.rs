//! Card view models.
//!
//! The renderer reads the catalog and a controller snapshot and produces what a page
//! shows: titles, detail lines, control labels and panels. It never mutates either store.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use super::action_controller::ActionController;
use super::actions::{ActionKey, ActionKind, ActionState, ActionStatus, ControlLabel, PanelContent};
use super::catalog::{Generation, SiteCatalog};
use super::gateway::PreviewMetadata;
use crate::models::{ExtractionSummary, Site};

/// Everything needed to draw the results section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogView {
    pub generation: Generation,
    pub summary: Option<ExtractionSummary>,
    pub cards: Vec<SiteCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailLine {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteCard {
    pub index: usize,
    pub title: String,
    pub has_coordinates: bool,
    /// `raw_text`, followed by ` (format)` and ` [datum]` when known.
    pub coordinates: Option<String>,
    pub details: Vec<DetailLine>,
    pub controls: Vec<ControlView>,
    pub panels: Vec<PanelView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlView {
    pub kind: ActionKind,
    pub label: String,
    pub enabled: bool,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub kind: ActionKind,
    pub visible: bool,
    pub body: Option<PanelBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelBody {
    Loading {
        message: &'static str,
    },
    Preview {
        image_data_url: String,
        lines: Vec<DetailLine>,
    },
    Analysis {
        visual_analysis: Option<serde_json::Value>,
        contextual_enrichment: Option<serde_json::Value>,
        errors: Vec<String>,
    },
    Error {
        message: String,
    },
}

/// Render every card of the current generation.
pub fn render_catalog(catalog: &SiteCatalog, controller: &ActionController) -> CatalogView {
    let (generation, sites) = catalog.sites();
    let states: HashMap<ActionKey, ActionState> =
        controller.snapshot_for(generation).into_iter().collect();

    let cards = sites
        .iter()
        .enumerate()
        .map(|(index, site)| render_card(index, site, &states))
        .collect();

    CatalogView {
        generation,
        summary: catalog.summary(),
        cards,
    }
}

/// Render one card against the given state map.
pub fn render_card(index: usize, site: &Site, states: &HashMap<ActionKey, ActionState>) -> SiteCard {
    let has_coordinates = site.has_explicit_coordinates();
    let state_of = |kind| states.get(&ActionKey::new(index, kind));

    let kinds: &[ActionKind] = if has_coordinates {
        &[
            ActionKind::Analysis,
            ActionKind::Preview,
            ActionKind::Locate,
            ActionKind::Download,
        ]
    } else {
        &[ActionKind::Analysis]
    };

    let controls = kinds
        .iter()
        .map(|&kind| {
            let state = state_of(kind);
            let label = state.map(|s| s.label).unwrap_or(ControlLabel::Neutral);
            ControlView {
                kind,
                label: label_text(kind, label, has_coordinates).to_string(),
                enabled: state.map(|s| s.control_enabled).unwrap_or(true),
                status: state.map(|s| s.status).unwrap_or(ActionStatus::Idle),
            }
        })
        .collect();

    let panels = kinds
        .iter()
        .filter(|kind| kind.has_panel())
        .map(|&kind| {
            let state = state_of(kind);
            PanelView {
                kind,
                visible: state.map(|s| s.panel_visible).unwrap_or(false),
                body: state
                    .and_then(|s| s.panel.as_ref())
                    .map(|content| panel_body(kind, content)),
            }
        })
        .collect();

    SiteCard {
        index,
        title: format!("Site {}: {}", index + 1, site.display_name()),
        has_coordinates,
        coordinates: has_coordinates.then(|| coordinate_line(site)),
        details: detail_lines(site),
        controls,
        panels,
    }
}

/// Button text for a control.
pub fn label_text(kind: ActionKind, label: ControlLabel, has_coordinates: bool) -> &'static str {
    match (kind, label) {
        (_, ControlLabel::Failed) => "❌ Failed",
        (_, ControlLabel::NoCoordinates) => "❌ No Coordinates",
        (ActionKind::Analysis, ControlLabel::Neutral) if has_coordinates => "🤖 AI Analysis & Research",
        (ActionKind::Analysis, ControlLabel::Neutral) => "🔍 AI Research",
        (ActionKind::Analysis, ControlLabel::Busy) => "⏳ Analyzing...",
        (ActionKind::Analysis, ControlLabel::Succeeded) => "✅ Analysis Complete!",
        (ActionKind::Preview, ControlLabel::Neutral) => "🛰️ Preview Imagery",
        (ActionKind::Preview, ControlLabel::Busy) => "⏳ Loading...",
        (ActionKind::Preview, ControlLabel::Succeeded) => "✅ Loaded!",
        (ActionKind::Download, ControlLabel::Neutral) => "📥 Download GEE Data",
        (ActionKind::Download, ControlLabel::Busy) => "⏳ Extracting...",
        (ActionKind::Download, ControlLabel::Succeeded) => "✅ Downloaded!",
        (ActionKind::Locate, ControlLabel::Neutral) => "🗺️ View on Map",
        (ActionKind::Locate, ControlLabel::Busy) => "🗺️ Opening...",
        (ActionKind::Locate, ControlLabel::Succeeded) => "✅ Opened!",
    }
}

fn loading_message(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Analysis => {
            "⏳ Running AI analysis (satellite imagery + web research)... This may take 30-60 seconds..."
        }
        _ => "⏳ Extracting satellite imagery from Google Earth Engine...",
    }
}

fn panel_body(kind: ActionKind, content: &PanelContent) -> PanelBody {
    match content {
        PanelContent::Loading => PanelBody::Loading {
            message: loading_message(kind),
        },
        PanelContent::Preview(payload) => PanelBody::Preview {
            image_data_url: format!("data:image/png;base64,{}", payload.image),
            lines: preview_lines(&payload.metadata),
        },
        PanelContent::Analysis(payload) => PanelBody::Analysis {
            visual_analysis: payload.visual_analysis.clone(),
            contextual_enrichment: payload.contextual_enrichment.clone(),
            errors: payload.errors.clone(),
        },
        PanelContent::Error { message } => PanelBody::Error {
            message: message.clone(),
        },
    }
}

/// Metadata lines under a preview image.
pub fn preview_lines(metadata: &PreviewMetadata) -> Vec<DetailLine> {
    let image_date = metadata
        .acquisition_date
        .as_deref()
        .map(format_image_date)
        .unwrap_or_else(|| "N/A".to_string());
    let cloud_cover = metadata
        .cloud_cover
        .map(|c| format!("{:.1}%", c))
        .unwrap_or_else(|| "N/A".to_string());
    let coordinates = match (metadata.latitude, metadata.longitude) {
        (Some(lat), Some(lon)) => format!("{:.4}, {:.4}", lat, lon),
        _ => "N/A".to_string(),
    };

    let mut lines = vec![
        DetailLine {
            label: "Image Date",
            value: image_date,
        },
        DetailLine {
            label: "Cloud Cover",
            value: cloud_cover,
        },
        DetailLine {
            label: "Coordinates",
            value: coordinates,
        },
    ];
    if let Some(size) = metadata.cell_size_km {
        lines.push(DetailLine {
            label: "Grid Size",
            value: format!("{} km × {} km", size, size),
        });
    }
    lines
}

fn format_image_date(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.date_naive().to_string();
    }
    if let Some(date) = raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()) {
        return date.to_string();
    }
    raw.to_string()
}

fn coordinate_line(site: &Site) -> String {
    let Some(coordinates) = site.coordinates.as_ref() else {
        return String::new();
    };
    let mut line = coordinates.raw_text.clone();
    if let Some(format) = coordinates.format {
        line.push_str(&format!(" ({})", format.as_str()));
    }
    if let Some(datum) = coordinates.datum() {
        line.push_str(&format!(" [{}]", datum));
    }
    line
}

fn nested_str<'a>(value: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
}

fn detail_lines(site: &Site) -> Vec<DetailLine> {
    let country = site
        .extra
        .get("administrative_location")
        .and_then(|v| nested_str(v, "country"));

    [
        ("Code", site.extra_str("site_code")),
        ("Location", site.extra_str("location_description")),
        ("Country", country),
        ("Dating", nested_str(&site.temporal, "dating")),
        ("Type", nested_str(&site.characteristics, "site_type")),
        ("Confidence", nested_str(&site.metadata, "confidence_level")),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value.map(|v| DetailLine {
            label,
            value: v.to_string(),
        })
    })
    .collect()
}
