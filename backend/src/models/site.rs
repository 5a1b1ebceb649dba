//! Site records and extraction results.
//!
//! A [`Site`] has the same shape whether it came from document extraction or from the
//! manual entry form; everything outside `site_name` and `coordinates` is passed through
//! untouched.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::coordinates::{
    null_as_default, Coordinate, CoordinateRepair, ManualCoordinateInput, ValidationError,
};

/// A single site card's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "site_name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
    #[serde(default)]
    pub temporal: Value,
    #[serde(default)]
    pub characteristics: Value,
    #[serde(default)]
    pub metadata: Value,
    /// Any other extracted field (`site_code`, `location_description`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Site {
    /// Coordinates that satisfy the explicit-coordinate invariant.
    pub fn explicit_coordinates(&self) -> Option<&Coordinate> {
        self.coordinates
            .as_ref()
            .filter(|c| c.has_explicit_coordinates && c.explicit_pair().is_some())
    }

    pub fn has_explicit_coordinates(&self) -> bool {
        self.explicit_coordinates().is_some()
    }

    pub fn raw_coordinates(&self) -> &str {
        self.coordinates
            .as_ref()
            .map(|c| c.raw_text.as_str())
            .unwrap_or_default()
    }

    /// Name shown on the card.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unnamed Site"
        } else {
            &self.name
        }
    }

    /// Top-level passthrough string field, e.g. `site_code`.
    pub fn extra_str(&self, field: &str) -> Option<&str> {
        self.extra
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Counters reported alongside an extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_sites_found: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sites_with_explicit_coordinates: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sites_with_descriptions_only: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload loaded into the catalog: the `data` block of an extraction response, or a
/// manually assembled record of the same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sites: Vec<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_summary: Option<ExtractionSummary>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractionResult {
    /// Parse free-text coordinates and enforce the explicit-coordinate invariant on every
    /// site. Returns how many sites were changed.
    pub fn normalize_coordinates(&mut self) -> usize {
        let mut changed = 0;
        for site in &mut self.sites {
            let Some(coordinates) = site.coordinates.as_mut() else {
                continue;
            };
            match coordinates.normalize() {
                CoordinateRepair::Unchanged => {}
                CoordinateRepair::ParsedFromText => {
                    changed += 1;
                    tracing::debug!(site = %site.name, raw = %coordinates.raw_text, "parsed coordinates from text");
                }
                CoordinateRepair::FlagCleared => {
                    changed += 1;
                    tracing::warn!(
                        site = %site.name,
                        raw = %coordinates.raw_text,
                        "site claimed explicit coordinates without a usable pair; flag cleared"
                    );
                }
            }
        }
        changed
    }

    /// Summary as reported, or counted from the sites when absent.
    pub fn summary(&self) -> ExtractionSummary {
        if let Some(summary) = &self.extraction_summary {
            return summary.clone();
        }
        let with_coordinates = self
            .sites
            .iter()
            .filter(|s| s.has_explicit_coordinates())
            .count();
        ExtractionSummary {
            total_sites_found: self.sites.len(),
            sites_with_explicit_coordinates: with_coordinates,
            sites_with_descriptions_only: self.sites.len() - with_coordinates,
            extra: Map::new(),
        }
    }
}

/// Assemble a catalog-ready record from the manual entry form.
///
/// The result is structurally identical to extraction output, with
/// `metadata.source = "Manual Input"` on the single site.
pub fn build_manual_site_record(
    name: &str,
    input: &ManualCoordinateInput,
) -> Result<ExtractionResult, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingSiteName);
    }
    let format = input.format();
    let coordinates = input.to_coordinate()?;

    let site = Site {
        name: name.to_string(),
        coordinates: Some(coordinates),
        temporal: json!({ "dating": null, "cultural_period": null }),
        characteristics: json!({ "site_type": null, "features": [], "size": null }),
        metadata: json!({
            "source": "Manual Input",
            "input_format": format.as_str(),
            "confidence": "high",
        }),
        extra: Map::new(),
    };

    Ok(ExtractionResult {
        sites: vec![site],
        extraction_summary: Some(ExtractionSummary {
            total_sites_found: 1,
            sites_with_explicit_coordinates: 1,
            sites_with_descriptions_only: 0,
            extra: Map::new(),
        }),
        metadata: json!({
            "source_type": "manual_input",
            "extraction_method": format.as_str(),
            "sites_found": 1,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
        extra: Map::new(),
    })
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Fallback name for a downloaded data archive.
pub fn default_download_filename(site_name: &str) -> String {
    format!("{}_gee_data.zip", sanitize_filename(site_name))
}

/// Name for the local JSON snapshot, taken from the first site.
pub fn export_filename(result: &ExtractionResult) -> String {
    let base = result
        .sites
        .first()
        .map(|s| s.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("sites");
    format!("{}_extracted.json", sanitize_filename(base).to_lowercase())
}
