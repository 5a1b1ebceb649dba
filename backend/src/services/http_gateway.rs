//! reqwest-backed [`RemoteGateway`] talking to the extraction/imagery backend.
//!
//! Routes: `POST /extract` (multipart), `POST /preview_gee`, `POST /ai_analysis`,
//! `POST /download_gee` (JSON bodies). A non-2xx status or an `error` field in the body,
//! even under 2xx, is a failure.

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use serde_json::{json, Value};
use std::time::Duration;

use super::gateway::{
    AnalysisPayload, CoordinateQuery, DocumentUpload, DownloadedFile, GatewayError,
    GatewayResult, PreviewPayload, RemoteGateway,
};
use crate::config::GatewayConfig;
use crate::models::{default_download_filename, ExtractionResult, Site};

/// HTTP client for the remote backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Build a client. `timeout` is a transport limit; `None` leaves requests unbounded.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> GatewayResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        Self::new(
            config.base_url.clone(),
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post_json(&self, path: &str, body: &Value, fallback: &str) -> GatewayResult<Value> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let ok = response.status().is_success();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        check_response(ok, body, fallback)
    }
}

/// Fail on a non-2xx status or on a truthy `error` field.
pub(crate) fn check_response(ok: bool, body: Value, fallback: &str) -> GatewayResult<Value> {
    if let Some(message) = error_message(&body) {
        return Err(GatewayError::Application(message));
    }
    if !ok {
        return Err(GatewayError::Application(fallback.to_string()));
    }
    Ok(body)
}

fn error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Filename from a `Content-Disposition` header (`filename="a.zip"` or `filename=a.zip`).
pub(crate) fn filename_from_content_disposition(header: &str) -> Option<String> {
    let start = header.find("filename=")? + "filename=".len();
    let value = header[start..].split(';').next()?.trim();
    let value = value.trim_matches('"');
    (!value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn extract(&self, document: DocumentUpload) -> GatewayResult<ExtractionResult> {
        let part = reqwest::multipart::Part::bytes(document.bytes)
            .file_name(document.filename)
            .mime_str("application/pdf")
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("pdf_file", part);

        let response = self
            .client
            .post(self.endpoint("extract"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let ok = response.status().is_success();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let body = check_response(ok, body, "Extraction failed")?;

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        if data.is_null() {
            return Err(GatewayError::Decode("extraction response has no data".into()));
        }
        serde_json::from_value(data).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn preview(
        &self,
        site: &Site,
        coordinates: &CoordinateQuery,
    ) -> GatewayResult<PreviewPayload> {
        let body = json!({
            "site_name": site.name,
            "coordinates_raw": coordinates.coordinates_raw,
            "latitude": coordinates.latitude,
            "longitude": coordinates.longitude,
        });
        let value = self
            .post_json("preview_gee", &body, "Preview generation failed")
            .await?;
        serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn analyze(
        &self,
        site: &Site,
        coordinates: &CoordinateQuery,
    ) -> GatewayResult<AnalysisPayload> {
        let body = json!({
            "site_data": site,
            "coordinates_raw": coordinates.coordinates_raw,
            "latitude": coordinates.latitude,
            "longitude": coordinates.longitude,
        });
        let value = self
            .post_json("ai_analysis", &body, "AI analysis failed")
            .await?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn download(
        &self,
        site: &Site,
        coordinates: &CoordinateQuery,
    ) -> GatewayResult<DownloadedFile> {
        let body = json!({
            "site_name": site.name,
            "coordinates_raw": coordinates.coordinates_raw,
            "latitude": coordinates.latitude,
            "longitude": coordinates.longitude,
        });
        let response = self
            .client
            .post(self.endpoint("download_gee"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| "Download failed".to_string());
            return Err(GatewayError::Application(message));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| default_download_filename(&site.name));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(DownloadedFile {
            filename,
            bytes: bytes.to_vec(),
        })
    }
}
