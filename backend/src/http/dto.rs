//! Data Transfer Objects for the HTTP API.
//!
//! Card view models and action states are already serializable and are re-exported from
//! the service layer.

use serde::{Deserialize, Serialize};

use crate::models::{ExtractionSummary, ManualCoordinateInput};
pub use crate::services::render::{CatalogView, ControlView, DetailLine, PanelBody, PanelView, SiteCard};
use crate::services::{ActionKey, ActionState, Generation};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub instance_id: String,
    pub generation: Generation,
    pub sites: usize,
}

/// Request body for the manual entry form.
///
/// ```json
/// { "site_name": "Tell Brak", "format": "decimal", "latitude": "36.67", "longitude": "41.06" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualSiteRequest {
    pub site_name: String,
    #[serde(flatten)]
    pub input: ManualCoordinateInput,
}

/// Query parameters for document extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractQuery {
    #[serde(default)]
    pub filename: Option<String>,
}

/// Response for a successful catalog load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub generation: Generation,
    pub sites_loaded: usize,
    pub summary: Option<ExtractionSummary>,
}

/// Optional generation guard on per-site actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionQuery {
    /// Generation the caller's index was read from; mismatches are rejected.
    #[serde(default)]
    pub generation: Option<u64>,
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Started,
    Collapsed,
}

/// Response for an analysis/preview toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub key: ActionKey,
    pub outcome: ToggleOutcome,
    pub state: ActionState,
}

/// Response for a map lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateResponse {
    pub key: ActionKey,
    pub url: String,
}

/// One touched action key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub key: ActionKey,
    pub state: ActionState,
}

/// Every action state of the current generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionListResponse {
    pub generation: Generation,
    pub actions: Vec<ActionEntry>,
    pub total: usize,
}
