#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use site_explorer::models::{ExtractionResult, Site};
use site_explorer::services::{
    ActionKind, AnalysisPayload, CoordinateQuery, DocumentUpload, DownloadedFile, GatewayError,
    GatewayResult, PreviewPayload, RemoteGateway,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// Three sites: explicit coordinates, a 0,0 pair with descriptive text, and none at all.
pub fn sample_result() -> ExtractionResult {
    serde_json::from_value(json!({
        "sites": [
            {
                "site_name": "Tell Brak",
                "site_code": "TB",
                "coordinates": {
                    "raw_text": "36.6667, 41.0583",
                    "latitude": 36.6667,
                    "longitude": 41.0583,
                    "format": "decimal",
                    "has_explicit_coordinates": true
                }
            },
            {
                "site_name": "River Camp",
                "coordinates": {
                    "raw_text": "Near the river",
                    "latitude": 0.0,
                    "longitude": 0.0,
                    "has_explicit_coordinates": false
                }
            },
            { "site_name": "Lost Mound" }
        ],
        "extraction_summary": {
            "total_sites_found": 3,
            "sites_with_explicit_coordinates": 1,
            "sites_with_descriptions_only": 2
        }
    }))
    .unwrap()
}

pub fn preview_payload() -> PreviewPayload {
    serde_json::from_value(json!({
        "image": "iVBORw0KGgo=",
        "metadata": {
            "acquisition_date": "2023-06-14T08:21:00Z",
            "cloud_cover": 2.5,
            "latitude": 36.6667,
            "longitude": 41.0583,
            "cell_size_km": 1
        }
    }))
    .unwrap()
}

/// Gateway with canned answers and per-call counters.
///
/// When gated, preview and analysis calls wait until [`ScriptedGateway::release`] hands
/// out a permit, which lets tests observe the pending state.
pub struct ScriptedGateway {
    pub extraction: Mutex<GatewayResult<ExtractionResult>>,
    pub preview: Mutex<GatewayResult<PreviewPayload>>,
    pub analysis: Mutex<GatewayResult<AnalysisPayload>>,
    pub download: Mutex<GatewayResult<DownloadedFile>>,
    extract_calls: AtomicUsize,
    preview_calls: AtomicUsize,
    analysis_calls: AtomicUsize,
    download_calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            extraction: Mutex::new(Ok(sample_result())),
            preview: Mutex::new(Ok(preview_payload())),
            analysis: Mutex::new(Ok(AnalysisPayload {
                site_name: Some("Tell Brak".into()),
                has_coordinates: Some(true),
                visual_analysis: Some(json!({ "summary": "Tell mound with visible enclosure" })),
                contextual_enrichment: None,
                errors: vec![],
            })),
            download: Mutex::new(Ok(DownloadedFile {
                filename: "Tell_Brak_36.6667_41.0583.zip".into(),
                bytes: b"PK\x03\x04".to_vec(),
            })),
            extract_calls: AtomicUsize::new(0),
            preview_calls: AtomicUsize::new(0),
            analysis_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            gate: None,
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold preview and analysis calls until released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn fail_preview(&self, message: &str) {
        *self.preview.lock().unwrap() = Err(GatewayError::Application(message.to_string()));
    }

    pub fn fail_download(&self, message: &str) {
        *self.download.lock().unwrap() = Err(GatewayError::Application(message.to_string()));
    }

    pub fn fail_extraction(&self, error: GatewayError) {
        *self.extraction.lock().unwrap() = Err(error);
    }

    pub fn calls(&self, kind: ActionKind) -> usize {
        let counter = match kind {
            ActionKind::Analysis => &self.analysis_calls,
            ActionKind::Preview => &self.preview_calls,
            ActionKind::Download => &self.download_calls,
            ActionKind::Locate => return 0,
        };
        counter.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    pub fn into_dyn(self: Arc<Self>) -> Arc<dyn RemoteGateway> {
        self
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn extract(&self, _document: DocumentUpload) -> GatewayResult<ExtractionResult> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.extraction.lock().unwrap().clone()
    }

    async fn preview(&self, _site: &Site, _query: &CoordinateQuery) -> GatewayResult<PreviewPayload> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.preview.lock().unwrap().clone()
    }

    async fn analyze(&self, _site: &Site, _query: &CoordinateQuery) -> GatewayResult<AnalysisPayload> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.analysis.lock().unwrap().clone()
    }

    async fn download(&self, _site: &Site, _query: &CoordinateQuery) -> GatewayResult<DownloadedFile> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.download.lock().unwrap().clone()
    }
}
