//! Per-site action types.
//!
//! State is keyed by `(site_index, kind)` and tagged with the catalog [`Generation`] it was
//! created in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::catalog::{CatalogError, Generation};
use super::gateway::{AnalysisPayload, GatewayError, PreviewPayload};
use crate::config::ActionsConfig;

/// The four per-site operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Analysis,
    Preview,
    Download,
    Locate,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Analysis,
        ActionKind::Preview,
        ActionKind::Download,
        ActionKind::Locate,
    ];

    /// Analysis and preview own a collapsible panel; download and locate only flash a label.
    pub fn has_panel(self) -> bool {
        matches!(self, ActionKind::Analysis | ActionKind::Preview)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Analysis => "analysis",
            ActionKind::Preview => "preview",
            ActionKind::Download => "download",
            ActionKind::Locate => "locate",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analysis" => Ok(ActionKind::Analysis),
            "preview" => Ok(ActionKind::Preview),
            "download" => Ok(ActionKind::Download),
            "locate" => Ok(ActionKind::Locate),
            other => Err(format!("Unknown action kind: {}", other)),
        }
    }
}

/// Lifecycle of one action key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Transient label on the triggering control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLabel {
    Neutral,
    Busy,
    Succeeded,
    Failed,
    NoCoordinates,
}

/// What a panel currently holds. Collapsing hides it without discarding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelContent {
    Loading,
    Preview(PreviewPayload),
    Analysis(AnalysisPayload),
    Error { message: String },
}

/// Identifies one control on one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionKey {
    pub site_index: usize,
    pub kind: ActionKind,
}

impl ActionKey {
    pub fn new(site_index: usize, kind: ActionKind) -> Self {
        Self { site_index, kind }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site {} / {}", self.site_index, self.kind)
    }
}

/// State of one action key, created lazily on first interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub status: ActionStatus,
    /// Only meaningful for panel actions.
    pub panel_visible: bool,
    pub control_enabled: bool,
    pub label: ControlLabel,
    pub panel: Option<PanelContent>,
    pub generation: Generation,
    /// Number of calls issued on this key; guards delayed label reverts.
    pub cycle: u64,
    pub updated_at: DateTime<Utc>,
}

impl ActionState {
    pub fn new(generation: Generation) -> Self {
        Self {
            status: ActionStatus::Idle,
            panel_visible: false,
            control_enabled: true,
            label: ControlLabel::Neutral,
            panel: None,
            generation,
            cycle: 0,
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Notifications published to observers (renderer, SSE clients).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionEvent {
    StateChanged {
        generation: Generation,
        key: ActionKey,
        state: ActionState,
    },
    CatalogReset {
        generation: Generation,
    },
    /// A call resolved after its catalog generation was replaced; the result was dropped.
    StaleResult {
        generation: Generation,
        current: Generation,
        key: ActionKey,
    },
    /// Failure of a panel-less action, shown as a blocking prompt.
    Alert {
        generation: Generation,
        key: ActionKey,
        message: String,
    },
    MapOpened {
        generation: Generation,
        key: ActionKey,
        url: String,
    },
    DownloadReady {
        generation: Generation,
        key: ActionKey,
        filename: String,
        size: usize,
    },
}

impl ActionEvent {
    /// Event name used on the SSE stream.
    pub fn name(&self) -> &'static str {
        match self {
            ActionEvent::StateChanged { .. } => "state_changed",
            ActionEvent::CatalogReset { .. } => "catalog_reset",
            ActionEvent::StaleResult { .. } => "stale_result",
            ActionEvent::Alert { .. } => "alert",
            ActionEvent::MapOpened { .. } => "map_opened",
            ActionEvent::DownloadReady { .. } => "download_ready",
        }
    }
}

/// Delays and URLs used by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSettings {
    /// Label revert delay for analysis and preview.
    pub panel_revert: Duration,
    /// Label revert delay for download and locate.
    pub flash_revert: Duration,
    pub maps_base_url: String,
}

impl ActionSettings {
    pub fn revert_delay(&self, kind: ActionKind) -> Duration {
        if kind.has_panel() {
            self.panel_revert
        } else {
            self.flash_revert
        }
    }
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self::from(&ActionsConfig::default())
    }
}

impl From<&ActionsConfig> for ActionSettings {
    fn from(config: &ActionsConfig) -> Self {
        Self {
            panel_revert: Duration::from_millis(config.panel_revert_ms),
            flash_revert: Duration::from_millis(config.flash_revert_ms),
            maps_base_url: config.maps_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Error type for action dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Action {0} is already running")]
    Blocked(ActionKey),

    #[error("Action {0} has no panel to toggle")]
    NoPanel(ActionKind),

    #[error("No coordinates available for site {site_index}")]
    NoCoordinates { site_index: usize },

    #[error("Action {0} was interrupted before it resolved")]
    Interrupted(ActionKey),
}

/// Map link for a site.
///
/// Numeric coordinates are used when both are finite and not both exactly zero; otherwise
/// the raw coordinate text is searched. `None` when neither is usable.
pub fn map_url(
    base_url: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    raw_text: &str,
) -> Option<String> {
    match (latitude, longitude) {
        (Some(lat), Some(lon))
            if lat.is_finite() && lon.is_finite() && !(lat == 0.0 && lon == 0.0) =>
        {
            let coords = format!("{},{}", lat, lon);
            Some(format!(
                "{}/place/{}/@{},500m",
                base_url,
                urlencoding::encode(&coords),
                coords
            ))
        }
        _ if !raw_text.is_empty() => Some(format!(
            "{}/place/{}",
            base_url,
            urlencoding::encode(raw_text)
        )),
        _ => None,
    }
}
