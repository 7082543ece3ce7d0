//! HTTP implementation of [`FaceBackend`] over multipart POSTs.

use crate::wire::{self, RECOGNIZE_GROUP_PATH, UPLOAD_FACE_PATH};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use rollcall_core::{FaceBackend, FaceUpload, GroupPhoto, ImagePayload, RecognizedIdentity, UploadOutcome};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Face backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a multipart form and return status and raw body.
    async fn post(&self, path: &str, form: Form) -> Result<(u16, Vec<u8>), reqwest::Error> {
        let url = self.endpoint(path);
        let response = self.client.post(url.as_str()).multipart(form).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        tracing::debug!(%url, status, bytes = body.len(), "backend responded");
        Ok((status, body.to_vec()))
    }
}

fn image_part(image: &ImagePayload) -> Result<Part, reqwest::Error> {
    Part::bytes(image.data.to_vec())
        .file_name(image.file_name.clone())
        .mime_str(&image.mime)
}

fn upload_form(upload: &FaceUpload) -> Result<Form, reqwest::Error> {
    Ok(Form::new()
        .part("image", image_part(&upload.image)?)
        .text("name", upload.identity.name().to_string())
        .text("roll_no", upload.identity.roll_no().to_string())
        .text("class", upload.identity.class().to_string())
        .text("imageIndex", upload.slot.to_string()))
}

fn group_form(photo: &GroupPhoto) -> Result<Form, reqwest::Error> {
    let form = Form::new().part("image", image_part(&photo.image)?);
    Ok(match &photo.division {
        Some(division) => form.text("division", division.clone()),
        None => form,
    })
}

impl FaceBackend for HttpBackend {
    async fn upload_face(&self, upload: FaceUpload) -> UploadOutcome<String> {
        let form = match upload_form(&upload) {
            Ok(form) => form,
            Err(e) => return UploadOutcome::TransportFailure(format!("building request: {e}")),
        };
        match self.post(UPLOAD_FACE_PATH, form).await {
            Ok((status, body)) => wire::interpret_upload(status, &body),
            Err(e) => UploadOutcome::TransportFailure(e.to_string()),
        }
    }

    async fn recognize_group(&self, photo: GroupPhoto) -> UploadOutcome<Vec<RecognizedIdentity>> {
        let form = match group_form(&photo) {
            Ok(form) => form,
            Err(e) => return UploadOutcome::TransportFailure(format!("building request: {e}")),
        };
        match self.post(RECOGNIZE_GROUP_PATH, form).await {
            Ok((status, body)) => wire::interpret_recognition(status, &body),
            Err(e) => UploadOutcome::TransportFailure(e.to_string()),
        }
    }
}
