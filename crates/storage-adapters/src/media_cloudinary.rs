//! # Cloudinary media storage
//!
//! Signed uploads to the Cloudinary REST API. The returned `secure_url`
//! contains an `/upload/` segment, so `ImageRef::thumbnail_url` yields a
//! server-side resize transformation without any extra work here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use domains::{DomainError, DomainResult, ImageRef, MediaStorage, Upload};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const FOLDER: &str = "wanderlust_DEV";
const ALLOWED_FORMATS: &str = "png,jpg,jpeg";

pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
}

pub struct CloudinaryStorage {
    http: reqwest::Client,
    credentials: CloudinaryCredentials,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Joins the parameters Cloudinary signs: sorted by key, `k=v` pairs joined
/// with `&`. `params` must already be sorted.
fn string_to_sign(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl CloudinaryStorage {
    pub fn new(credentials: CloudinaryCredentials) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DomainError::Media(format!("http client: {e}")))?;
        Ok(Self { http, credentials })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{API_BASE}/{}/image/{action}",
            self.credentials.cloud_name
        )
    }

    async fn read_error(response: reqwest::Response) -> DomainError {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => DomainError::Media(format!("cloudinary {status}: {}", body.error.message)),
            Err(_) => DomainError::Media(format!("cloudinary {status}")),
        }
    }
}

#[async_trait]
impl MediaStorage for CloudinaryStorage {
    async fn store(&self, upload: Upload) -> DomainResult<ImageRef> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("allowed_formats", ALLOWED_FORMATS),
                ("folder", FOLDER),
                ("timestamp", timestamp.as_str()),
            ],
            self.credentials.api_secret.expose_secret(),
        );

        let file = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.clone())
            .mime_str(upload.content_type.as_ref())
            .map_err(|e| DomainError::Media(format!("bad content type: {e}")))?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.credentials.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", FOLDER)
            .text("allowed_formats", ALLOWED_FORMATS)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Media(format!("cloudinary unreachable: {e}")))?;

        if response.status().is_client_error() {
            // Cloudinary rejects unsupported formats with a 400.
            let err = Self::read_error(response).await;
            warn!(error = %err, "cloudinary rejected upload");
            return Err(DomainError::validation(err.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Media(format!("unexpected cloudinary response: {e}")))?;
        info!(public_id = %body.public_id, "image uploaded to cloudinary");
        Ok(ImageRef {
            url: body.secure_url,
            filename: body.public_id,
        })
    }

    async fn delete(&self, image: &ImageRef) -> DomainResult<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", image.filename.as_str()), ("timestamp", timestamp.as_str())],
            self.credentials.api_secret.expose_secret(),
        );
        let params = [
            ("public_id", image.filename.as_str()),
            ("api_key", self.credentials.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature_algorithm", "sha256"),
            ("signature", signature.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| DomainError::Media(format!("cloudinary unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Media(format!("unexpected cloudinary response: {e}")))?;
        if body.result != "ok" {
            warn!(public_id = %image.filename, result = %body.result, "cloudinary destroy was a no-op");
        }
        Ok(())
    }
}
