//! Load orchestration.
//!
//! A session ties the catalog to the action controller so that every load (manual entry
//! or document extraction) also clears the action state of the previous generation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::action_controller::ActionController;
use super::actions::ActionSettings;
use super::catalog::{CatalogError, CatalogExport, Generation, SiteCatalog};
use super::gateway::{DocumentUpload, GatewayError, RemoteGateway};
use crate::models::{build_manual_site_record, ExtractionResult, ManualCoordinateInput, ValidationError};

/// Error type for catalog loads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("An extraction is already in progress")]
    ExtractionInProgress,

    #[error("Please select a PDF file")]
    NoDocument,
}

/// Clears the in-flight flag when an extraction ends, however it ends.
struct ExtractionGuard<'a>(&'a AtomicBool);

impl Drop for ExtractionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Catalog, controller and gateway for one user.
#[derive(Clone)]
pub struct SiteSession {
    catalog: SiteCatalog,
    controller: ActionController,
    gateway: Arc<dyn RemoteGateway>,
    extracting: Arc<AtomicBool>,
}

impl SiteSession {
    pub fn new(gateway: Arc<dyn RemoteGateway>, settings: ActionSettings) -> Self {
        let catalog = SiteCatalog::new();
        let controller = ActionController::new(catalog.clone(), Arc::clone(&gateway), settings);
        Self {
            catalog,
            controller,
            gateway,
            extracting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn catalog(&self) -> &SiteCatalog {
        &self.catalog
    }

    pub fn controller(&self) -> &ActionController {
        &self.controller
    }

    pub fn is_extracting(&self) -> bool {
        self.extracting.load(Ordering::Acquire)
    }

    /// Replace the catalog and drop every action state tied to the old one.
    pub fn load(&self, result: ExtractionResult) -> Generation {
        let generation = self.catalog.load(result);
        self.controller.reset(generation);
        generation
    }

    /// Validate the manual form and load the single resulting site.
    pub fn submit_manual(
        &self,
        site_name: &str,
        input: &ManualCoordinateInput,
    ) -> Result<Generation, SessionError> {
        let record = build_manual_site_record(site_name, input).map_err(|err| {
            tracing::debug!(error = %err, "manual entry rejected");
            err
        })?;
        tracing::info!(site = %site_name.trim(), format = %input.format().as_str(), "manual site submitted");
        Ok(self.load(record))
    }

    /// Send a document to the extraction backend and load the normalized result.
    ///
    /// On failure the current catalog is left as it was.
    pub async fn extract_document(&self, document: DocumentUpload) -> Result<Generation, SessionError> {
        if document.bytes.is_empty() {
            return Err(SessionError::NoDocument);
        }
        if self
            .extracting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::ExtractionInProgress);
        }
        let _guard = ExtractionGuard(&self.extracting);

        let filename = document.filename.clone();
        tracing::info!(filename = %filename, bytes = document.bytes.len(), "extraction started");
        let mut result = self.gateway.extract(document).await.map_err(|err| {
            tracing::warn!(filename = %filename, error = %err, "extraction failed");
            err
        })?;

        let repaired = result.normalize_coordinates();
        if repaired > 0 {
            tracing::debug!(repaired, "coordinates normalized");
        }
        Ok(self.load(result))
    }

    pub fn export(&self) -> Result<CatalogExport, SessionError> {
        Ok(self.catalog.export_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DmsFields, Site};
    use crate::services::actions::ActionKind;
    use crate::services::gateway::{
        AnalysisPayload, CoordinateQuery, DownloadedFile, GatewayResult, PreviewPayload,
    };
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedExtraction(GatewayResult<ExtractionResult>);

    #[async_trait]
    impl RemoteGateway for FixedExtraction {
        async fn extract(&self, _: DocumentUpload) -> GatewayResult<ExtractionResult> {
            self.0.clone()
        }

        async fn preview(&self, _: &Site, _: &CoordinateQuery) -> GatewayResult<PreviewPayload> {
            Err(GatewayError::Application("not used".into()))
        }

        async fn analyze(&self, _: &Site, _: &CoordinateQuery) -> GatewayResult<AnalysisPayload> {
            Err(GatewayError::Application("not used".into()))
        }

        async fn download(&self, _: &Site, _: &CoordinateQuery) -> GatewayResult<DownloadedFile> {
            Err(GatewayError::Application("not used".into()))
        }
    }

    fn session(extraction: GatewayResult<ExtractionResult>) -> SiteSession {
        SiteSession::new(Arc::new(FixedExtraction(extraction)), ActionSettings::default())
    }

    fn pdf() -> DocumentUpload {
        DocumentUpload {
            filename: "report.pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[test]
    fn test_submit_manual_dms() {
        let session = session(Err(GatewayError::Application("unused".into())));
        let input = ManualCoordinateInput::Dms {
            latitude: DmsFields {
                degrees: "40".into(),
                minutes: "26".into(),
                seconds: "46".into(),
                direction: "N".into(),
            },
            longitude: DmsFields {
                degrees: "79".into(),
                minutes: "58".into(),
                seconds: "56".into(),
                direction: "W".into(),
            },
        };
        session.submit_manual("  Pittsburgh  ", &input).unwrap();
        let site = session.catalog().get(0).unwrap();
        assert_eq!(site.name, "Pittsburgh");
        assert_eq!(site.metadata["source"], "Manual Input");
        assert_eq!(site.metadata["input_format"], "dms");
        assert!(site.has_explicit_coordinates());
    }

    #[test]
    fn test_submit_manual_rejects_and_keeps_catalog() {
        let session = session(Err(GatewayError::Application("unused".into())));
        let input = ManualCoordinateInput::Decimal {
            latitude: "90.0001".into(),
            longitude: "10".into(),
        };
        let err = session.submit_manual("X", &input).unwrap_err();
        assert!(matches!(err, SessionError::Validation(ValidationError::LatitudeOutOfRange)));
        assert!(session.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_extract_normalizes_and_loads() {
        let result: ExtractionResult = serde_json::from_value(json!({
            "sites": [
                { "site_name": "A", "coordinates": { "raw_text": "36.5, 41.25" } },
                { "site_name": "B", "coordinates": { "raw_text": "north bank", "has_explicit_coordinates": true } }
            ]
        }))
        .unwrap();
        let session = session(Ok(result));

        let generation = session.extract_document(pdf()).await.unwrap();
        assert_eq!(generation, session.catalog().generation());
        assert!(!session.is_extracting());

        let a = session.catalog().get(0).unwrap();
        let coordinates = a.coordinates.unwrap();
        assert_eq!(coordinates.latitude, Some(36.5));
        assert!(coordinates.has_explicit_coordinates);

        let b = session.catalog().get(1).unwrap();
        assert!(!b.coordinates.unwrap().has_explicit_coordinates);
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_previous_catalog() {
        let session = session(Err(GatewayError::Application("No text could be extracted from the PDF".into())));
        let input = ManualCoordinateInput::Decimal {
            latitude: "1".into(),
            longitude: "2".into(),
        };
        let before = session.submit_manual("Kept", &input).unwrap();

        let err = session.extract_document(pdf()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No text could be extracted from the PDF"
        );
        assert_eq!(session.catalog().generation(), before);
        assert_eq!(session.catalog().get(0).unwrap().name, "Kept");
        assert!(!session.is_extracting());
    }

    #[tokio::test]
    async fn test_extract_requires_document() {
        let session = session(Ok(ExtractionResult::default()));
        let empty = DocumentUpload {
            filename: "empty.pdf".into(),
            bytes: Vec::new(),
        };
        assert_eq!(session.extract_document(empty).await, Err(SessionError::NoDocument));
    }

    struct SlowExtraction(tokio::sync::Notify);

    #[async_trait]
    impl RemoteGateway for SlowExtraction {
        async fn extract(&self, _: DocumentUpload) -> GatewayResult<ExtractionResult> {
            self.0.notified().await;
            Ok(ExtractionResult::default())
        }

        async fn preview(&self, _: &Site, _: &CoordinateQuery) -> GatewayResult<PreviewPayload> {
            Err(GatewayError::Application("not used".into()))
        }

        async fn analyze(&self, _: &Site, _: &CoordinateQuery) -> GatewayResult<AnalysisPayload> {
            Err(GatewayError::Application("not used".into()))
        }

        async fn download(&self, _: &Site, _: &CoordinateQuery) -> GatewayResult<DownloadedFile> {
            Err(GatewayError::Application("not used".into()))
        }
    }

    #[tokio::test]
    async fn test_second_extraction_rejected_while_in_flight() {
        let gateway = Arc::new(SlowExtraction(tokio::sync::Notify::new()));
        let session = SiteSession::new(gateway.clone(), ActionSettings::default());

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.extract_document(pdf()).await })
        };
        while !session.is_extracting() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            session.extract_document(pdf()).await,
            Err(SessionError::ExtractionInProgress)
        );

        gateway.0.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!session.is_extracting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_clears_action_state() {
        let session = session(Err(GatewayError::Application("unused".into())));
        let input = ManualCoordinateInput::Decimal {
            latitude: "0".into(),
            longitude: "0".into(),
        };
        session.submit_manual("Origin", &input).unwrap();
        session.controller().locate(0).unwrap();
        assert_eq!(session.controller().snapshot().len(), 1);

        session.submit_manual("Origin again", &input).unwrap();
        assert!(session.controller().snapshot().is_empty());
        assert!(session
            .controller()
            .state(crate::services::actions::ActionKey::new(0, ActionKind::Locate))
            .is_none());
    }
}
