//! Remote gateway contract.
//!
//! Extraction, preview, analysis and download run on an external backend. Every call is a
//! single request/response; failures carry a human-readable message that is shown to the
//! user verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ExtractionResult, Site};

/// Result type for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a usable response.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a structured error.
    #[error("{0}")]
    Application(String),

    /// The backend answered but the body had an unexpected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Message surfaced in panels and alerts.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Document submitted for site extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Coordinates sent along with preview, analysis and download requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateQuery {
    pub coordinates_raw: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CoordinateQuery {
    pub fn from_site(site: &Site) -> Self {
        let coordinates = site.coordinates.as_ref();
        Self {
            coordinates_raw: site.raw_coordinates().to_string(),
            latitude: coordinates.and_then(|c| c.latitude).filter(|v| v.is_finite()),
            longitude: coordinates.and_then(|c| c.longitude).filter(|v| v.is_finite()),
        }
    }
}

/// Imagery metadata returned with a preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewMetadata {
    #[serde(default)]
    pub acquisition_date: Option<String>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub cell_size_km: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Satellite preview: base64 PNG plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewPayload {
    pub image: String,
    #[serde(default)]
    pub metadata: PreviewMetadata,
}

/// AI analysis result. Either section may be missing; `errors` lists partial failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub has_coordinates: Option<bool>,
    #[serde(default)]
    pub visual_analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub contextual_enrichment: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Binary data archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// External collaborator for the per-site actions and for document extraction.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn extract(&self, document: DocumentUpload) -> GatewayResult<ExtractionResult>;

    async fn preview(&self, site: &Site, coordinates: &CoordinateQuery)
        -> GatewayResult<PreviewPayload>;

    async fn analyze(&self, site: &Site, coordinates: &CoordinateQuery)
        -> GatewayResult<AnalysisPayload>;

    async fn download(&self, site: &Site, coordinates: &CoordinateQuery)
        -> GatewayResult<DownloadedFile>;
}
