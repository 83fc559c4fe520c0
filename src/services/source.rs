//! Document sources: a Cloud Storage bucket or a local directory of PDFs.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::models::StorageConfig;
use crate::utils::{is_pdf_name, object_name_for};

/// A place dossier PDFs are listed and downloaded from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable location, e.g. `gs://bucket`.
    fn describe(&self) -> String;

    /// Names of all PDF objects, in listing order.
    async fn list_pdfs(&self) -> Result<Vec<String>, StorageError>;

    /// Raw bytes of one object.
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

/// Google Cloud Storage bucket accessed through the JSON API.
#[derive(Debug, Clone)]
pub struct GcsSource {
    client: Client,
    base_url: String,
    bucket: String,
    access_token: Option<String>,
}

impl GcsSource {
    pub fn new(bucket: &str, config: &StorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn objects_url(&self, object: Option<&str>) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::InvalidResponse(format!("invalid storage url: {e}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StorageError::InvalidResponse(format!("storage url cannot be a base: {}", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(["storage", "v1", "b", self.bucket.as_str(), "o"]);
            if let Some(name) = object {
                // Encodes `/` inside object names as %2F.
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentSource for GcsSource {
    fn describe(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    async fn list_pdfs(&self) -> Result<Vec<String>, StorageError> {
        let url = self.objects_url(None)?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .query(&[("fields", "items(name),nextPageToken")]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.authorized(request).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(StorageError::ServerError(format!(
                    "listing {} failed with status {}: {}",
                    self.describe(),
                    status,
                    body
                )));
            }

            let page: ListObjectsResponse = response
                .json()
                .await
                .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

            names.extend(
                page.items
                    .into_iter()
                    .map(|o| o.name)
                    .filter(|name| is_pdf_name(name)),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.objects_url(Some(name))?;
        let request = self.client.get(url).query(&[("alt", "media")]);
        let response = self.authorized(request).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(name.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::ServerError(format!(
                    "download of {} failed with status {}: {}",
                    name, status, body
                )))
            }
        }
    }
}

/// A local directory tree of PDFs. Object names are paths relative to the root.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    max_file_size: u64,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }
}

#[async_trait]
impl DocumentSource for LocalSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn list_pdfs(&self) -> Result<Vec<String>, StorageError> {
        if !self.root.is_dir() {
            return Err(StorageError::NotFound(self.describe()));
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| StorageError::WalkError(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = object_name_for(&self.root, entry.path());
            if is_pdf_name(&name) {
                names.push(name);
            }
        }

        Ok(names)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.root.join(name);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.len() > self.max_file_size {
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "file exceeds maximum size: {} > {}",
                    metadata.len(),
                    self.max_file_size
                ),
            )));
        }

        Ok(tokio::fs::read(&path).await?)
    }
}
