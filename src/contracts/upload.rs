//! Upload Contract Verifier
//!
//! `POST /alumnos/{id}/fotoPerfil` with a multipart field `foto`. The
//! returned `fotoPerfilUrl` must point at the storage domain, answer a direct
//! HEAD with success, and be surfaced again when the student is re-fetched.
//! Uploaded objects are left in storage.

use crate::assertions::Expect;
use crate::client::{ContractClient, MultipartPayload};
use crate::errors::Result;

/// 1x1 baseline JPEG used when no upload image is configured
pub const EMBEDDED_IMAGE: &[u8] = include_bytes!("../../assets/profile_test.jpg");
pub const EMBEDDED_IMAGE_NAME: &str = "profile_test.jpg";

pub const UPLOAD_FIELD: &str = "foto";
pub const URL_FIELD: &str = "fotoPerfilUrl";

/// MIME type from the file extension; the service only accepts images.
pub fn image_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub struct UploadContractVerifier {
    client: ContractClient,
    storage_domain: String,
}

impl UploadContractVerifier {
    pub fn new(client: ContractClient, storage_domain: &str) -> Self {
        Self {
            client,
            storage_domain: storage_domain.to_string(),
        }
    }

    /// Upload `bytes` as the student's profile picture and return the storage URL.
    pub async fn upload(&self, student_id: i64, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let payload = MultipartPayload::new(UPLOAD_FIELD, file_name, image_mime(file_name), bytes);
        let resp = self
            .client
            .post_multipart(&format!("/alumnos/{}/fotoPerfil", student_id), payload)
            .await?;
        let url = Expect::that(&resp)
            .status(200)?
            .json()?
            .field_non_empty(URL_FIELD)?
            .field_host(URL_FIELD, &self.storage_domain)?
            .extract_str(URL_FIELD)?;
        Ok(url)
    }

    /// HEAD on the storage URL must succeed.
    pub async fn confirm_retrievable(&self, url: &str) -> Result<()> {
        let resp = self.client.head_absolute(url).await?;
        Expect::that(&resp).success()?;
        Ok(())
    }

    /// Re-fetching the student must surface the same URL.
    pub async fn confirm_linked(&self, student_id: i64, url: &str) -> Result<()> {
        let resp = self
            .client
            .get(&format!("/alumnos/{}", student_id))
            .await?;
        Expect::that(&resp)
            .status(200)?
            .json()?
            .field_eq(URL_FIELD, &serde_json::Value::from(url))?;
        Ok(())
    }

    /// Full upload contract: upload, HEAD, re-fetch.
    pub async fn verify(&self, student_id: i64, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let url = self.upload(student_id, file_name, bytes).await?;
        self.confirm_retrievable(&url).await?;
        self.confirm_linked(student_id, &url).await?;
        Ok(url)
    }
}
