//! In-memory site catalog.
//!
//! Single source of truth for the rendered cards. Every [`SiteCatalog::load`] replaces the
//! whole collection and starts a new [`Generation`]; site indices are only meaningful
//! together with the generation they were issued in.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::models::{export_filename, ExtractionResult, ExtractionSummary, Site};

/// Lifetime of one catalog load.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for catalog lookups and exports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Site index {index} is out of range (catalog holds {len} sites)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Site index {index} belongs to catalog generation {requested}, current generation is {current}")]
    StaleGeneration {
        index: usize,
        requested: Generation,
        current: Generation,
    },

    #[error("No sites loaded")]
    Empty,

    #[error("Failed to serialize catalog snapshot: {0}")]
    Serialization(String),
}

/// JSON snapshot ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogExport {
    pub filename: String,
    pub body: String,
}

#[derive(Default)]
struct CatalogInner {
    generation: Generation,
    result: Option<ExtractionResult>,
}

/// Shared handle to the catalog. Cloning shares the same store.
#[derive(Clone, Default)]
pub struct SiteCatalog {
    inner: Arc<RwLock<CatalogInner>>,
}

impl SiteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection. No merge and no history.
    pub fn load(&self, result: ExtractionResult) -> Generation {
        let mut inner = self.inner.write();
        let generation = Self::reset_locked(&mut inner);
        let count = result.sites.len();
        inner.result = Some(result);
        tracing::info!(generation = generation.value(), sites = count, "catalog loaded");
        generation
    }

    /// Drop every site and invalidate all previously issued indices.
    pub fn reset(&self) -> Generation {
        let mut inner = self.inner.write();
        Self::reset_locked(&mut inner)
    }

    fn reset_locked(inner: &mut CatalogInner) -> Generation {
        inner.generation = inner.generation.next();
        inner.result = None;
        inner.generation
    }

    pub fn generation(&self) -> Generation {
        self.inner.read().generation
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .result
            .as_ref()
            .map(|r| r.sites.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Site at `index` in the current generation.
    pub fn get(&self, index: usize) -> Result<Site, CatalogError> {
        self.lookup(index).map(|(_, site)| site)
    }

    /// Site at `index` together with the generation it was read from.
    pub fn lookup(&self, index: usize) -> Result<(Generation, Site), CatalogError> {
        let inner = self.inner.read();
        let sites = inner.result.as_ref().map(|r| r.sites.as_slice()).unwrap_or_default();
        sites
            .get(index)
            .cloned()
            .map(|site| (inner.generation, site))
            .ok_or(CatalogError::IndexOutOfRange {
                index,
                len: sites.len(),
            })
    }

    /// Site at `index`, only if `generation` is still current.
    pub fn get_in(&self, generation: Generation, index: usize) -> Result<Site, CatalogError> {
        let current = self.generation();
        if current != generation {
            return Err(CatalogError::StaleGeneration {
                index,
                requested: generation,
                current,
            });
        }
        let (read_at, site) = self.lookup(index)?;
        if read_at != generation {
            return Err(CatalogError::StaleGeneration {
                index,
                requested: generation,
                current: read_at,
            });
        }
        Ok(site)
    }

    /// All sites of the current generation.
    pub fn sites(&self) -> (Generation, Vec<Site>) {
        let inner = self.inner.read();
        let sites = inner
            .result
            .as_ref()
            .map(|r| r.sites.clone())
            .unwrap_or_default();
        (inner.generation, sites)
    }

    pub fn summary(&self) -> Option<ExtractionSummary> {
        self.inner.read().result.as_ref().map(ExtractionResult::summary)
    }

    pub fn snapshot(&self) -> Option<ExtractionResult> {
        self.inner.read().result.clone()
    }

    /// Pretty-printed JSON of the loaded result, named after the first site.
    pub fn export_json(&self) -> Result<CatalogExport, CatalogError> {
        let snapshot = self.snapshot().ok_or(CatalogError::Empty)?;
        let body = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        Ok(CatalogExport {
            filename: export_filename(&snapshot),
            body,
        })
    }
}
