//! Upload client: the one REST call the tracker needs to seed its store.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};

use crate::config::TrackerConfig;
use crate::data_model::UploadReceipt;
use crate::error::{Result, TrackerError};
use crate::utils::common::file_type_of;
use crate::utils::prometheus_metrics::{UPLOADS_TOTAL, UPLOAD_ERRORS_TOTAL};

/// An accepted upload plus the file metadata the tracker records.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub receipt: UploadReceipt,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
}

#[derive(Debug, Clone)]
pub struct DocumentApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl DocumentApi {
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let mut base_url = Url::parse(api_url).map_err(|e| {
            TrackerError::ConfigError(format!("Invalid API URL '{}': {}", api_url, e))
        })?;
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            token,
        })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        Self::new(&config.backend.api_url, config.backend.token.clone())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            TrackerError::ConfigError(format!("Cannot build endpoint URL for '{}': {}", path, e))
        })
    }

    /// Posts `data` as a multipart `file` field.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_bytes(&self, filename: &str, data: Vec<u8>) -> Result<UploadReceipt> {
        let url = self.endpoint("documents/upload")?;
        let form = Form::new().part("file", Part::bytes(data).file_name(filename.to_string()));

        let mut request = self.client.post(url).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.inspect_err(|_| UPLOAD_ERRORS_TOTAL.inc())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            UPLOAD_ERRORS_TOTAL.inc();
            warn!(%status, filename, "Upload rejected");
            return Err(TrackerError::UploadRejected {
                status: status.as_u16(),
                body,
            });
        }

        let receipt: UploadReceipt = response
            .json()
            .await
            .inspect_err(|_| UPLOAD_ERRORS_TOTAL.inc())?;
        UPLOADS_TOTAL.inc();
        info!(document_id = %receipt.document_id, filename, "Upload accepted");
        Ok(receipt)
    }

    /// Reads a file from disk and uploads it.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let file_type = file_type_of(path);
        let file_size = data.len() as u64;
        debug!(path = %path.display(), file_size, "Uploading file");

        let receipt = self.upload_bytes(&filename, data).await?;
        Ok(UploadedFile {
            receipt,
            filename,
            file_type,
            file_size,
        })
    }
}
