// API client module: talks to the Gyazo upload endpoint. One client is built
// at startup and shared by every upload task; requests are stateless.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart;
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{Error, UploadError};
use crate::metadata::{self, ExifSummary};
use crate::option::UploadOption;

/// Multipart field carrying the image bytes.
const IMAGE_FIELD: &str = "imagedata";

/// HTTP client holding the shared reqwest client, the endpoint and the
/// bearer token presented on every request.
#[derive(Clone, Debug)]
pub struct GyazoClient {
    client: Client,
    upload_url: String,
    access_token: String,
}

/// Response of the upload endpoint. Only `permalink_url` is required.
#[derive(Deserialize, Debug, Default)]
pub struct UploadResponse {
    #[serde(default)]
    pub image_id: String,
    pub permalink_url: String,
    #[serde(default)]
    pub thumb_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ResponseMetadata,
    #[serde(default)]
    pub ocr: Option<Ocr>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ResponseMetadata {
    pub app: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub desc: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Ocr {
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub description: String,
}

impl GyazoClient {
    /// Build the client once from the loaded configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("gyz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Client)?;
        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
            access_token: config.access_token.clone(),
        })
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Upload one file and return its permalink.
    ///
    /// Cancellation aborts the request while it is in flight; once a response
    /// has arrived it is decoded and reported regardless.
    pub async fn upload(
        &self,
        path: &Path,
        option: &UploadOption,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let io_err = |source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();

        let exif = if option.enable_exif {
            Some(read_exif(path).await?)
        } else {
            None
        };

        let form = fields(option, exif.as_ref())
            .into_iter()
            .fold(multipart::Form::new(), |form, (key, value)| {
                form.text(key, value)
            })
            .part(IMAGE_FIELD, image_part(path, file, len)?);

        tracing::debug!(file = %path.display(), "uploading");
        let request = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&self.access_token)
            .multipart(form);

        let response = tokio::select! {
            biased;
            res = request.send() => res.map_err(UploadError::Network)?,
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(UploadError::Network)?;
        let resp: UploadResponse = serde_json::from_slice(&bytes)?;

        tracing::debug!(file = %path.display(), url = %resp.permalink_url, "uploaded");
        Ok(resp.permalink_url)
    }
}

async fn read_exif(path: &Path) -> Result<ExifSummary, UploadError> {
    let owned = path.to_path_buf();
    let decoded = tokio::task::spawn_blocking(move || metadata::read_summary(&owned))
        .await
        .map_err(|e| UploadError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
    decoded.map_err(|source| UploadError::Exif {
        path: path.to_path_buf(),
        source,
    })
}

fn image_part(path: &Path, file: tokio::fs::File, len: u64) -> Result<multipart::Part, UploadError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    multipart::Part::stream_with_length(Body::from(file), len)
        .file_name(file_name)
        .mime_str(content_type(path))
        .map_err(UploadError::Encoding)
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Text fields of the multipart body, in wire order. Empty values are left out.
///
/// A decoded EXIF capture time replaces `created_at`; the EXIF description is
/// appended to `desc` after a blank line.
pub fn fields(option: &UploadOption, exif: Option<&ExifSummary>) -> Vec<(&'static str, String)> {
    let mut desc = option.desc.clone();
    let mut created_at = option.created_at.map(|t| t.timestamp());

    if let Some(exif) = exif.filter(|e| !e.is_empty()) {
        if let Some(captured) = exif.captured_at {
            created_at = Some(captured);
        }
        if !exif.description.is_empty() {
            if !desc.is_empty() {
                desc.push_str("\n\n");
            }
            desc.push_str(&exif.description);
        }
    }

    let mut out = Vec::new();
    if let Some(policy) = option.access_policy {
        out.push(("access_policy", policy.as_str().to_string()));
    }
    if option.metadata_is_public {
        out.push(("metadata_is_public", "true".to_string()));
    }
    let text = [
        ("referer_url", option.referer_url.clone()),
        ("app", option.app.clone()),
        ("title", option.title.clone()),
        ("desc", desc),
        ("created_at", created_at.map(|ts| ts.to_string()).unwrap_or_default()),
        ("collection_id", option.collection_id.clone()),
    ];
    out.extend(text.into_iter().filter(|(_, v)| !v.is_empty()));
    out
}
