// src/extract.rs

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use crate::error::{InvoiceError, Result};
use crate::model::ExtractionResult;

/// Route the extraction service exposes for document processing.
const PROCESS_ROUTE: &str = "/process-invoice/";

/// Route of the service's liveness probe.
const HEALTH_ROUTE: &str = "/health";

/// Boundary to the AI extraction service. The review session depends on this
/// trait, so tests can drive the flow with a stub instead of a live server.
#[async_trait]
pub trait Extractor: Send + Sync + 'static {
    /// Submit one document and wait for the structured result.
    async fn extract(&self, filename: &str, bytes: Vec<u8>) -> Result<ExtractionResult>;
}

/// HTTP client for the extraction service.
pub struct ExtractionClient {
    base_url: String,
    client: Client,
}

impl ExtractionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            base_url: base.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Check if the extraction service is reachable.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}{}", self.base_url, HEALTH_ROUTE);

        match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(3))
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Extraction service is reachable");
                    true
                } else {
                    warn!(status = %resp.status(), "Extraction service returned non-OK status");
                    false
                }
            }
            Err(e) => {
                warn!(error = %e, "Extraction service not reachable");
                false
            }
        }
    }
}

#[async_trait]
impl Extractor for ExtractionClient {
    async fn extract(&self, filename: &str, bytes: Vec<u8>) -> Result<ExtractionResult> {
        let url = format!("{}{}", self.base_url, PROCESS_ROUTE);
        info!(url = %url, filename = %filename, size = bytes.len(), "Submitting invoice for extraction");

        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(InvoiceError::Service { status, detail });
        }

        // Decode apart from the transport call so a body that does not match
        // the document shape surfaces as a malformed response, not a failed
        // request.
        let body = response.text().await?;
        let result: ExtractionResult = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Response body did not match the expected document shape");
            InvoiceError::MalformedResponse(e)
        })?;

        info!(
            serial = %result.invoice.serial_number,
            products = result.products.len(),
            "Extraction result received"
        );
        Ok(result)
    }
}
