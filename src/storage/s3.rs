//! S3 implementation of the multipart store
//!
//! A synchronous facade over the rusoto client: each store owns a small
//! current-thread runtime and blocks on the SDK futures, keeping the engine's
//! strictly sequential part-by-part semantics.

use rusoto_core::{ByteStream, HttpClient, Region};
use rusoto_credential::StaticProvider;
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedMultipartUpload,
    CompletedPart, CreateMultipartUploadRequest, S3Client, UploadPartRequest, S3,
};
use tokio::runtime::{Builder, Runtime};
use tracing::warn;

use super::{MultipartStore, StoreError, StoreOpener, UploadedPart};
use crate::config::Credential;

pub struct S3Store {
    client: S3Client,
    runtime: Runtime,
}

impl S3Store {
    /// Build a store from one credential group's settings
    pub fn connect(credential: &Credential) -> Result<Self, StoreError> {
        let region = match credential.region.as_deref() {
            Some(name) => match name.parse::<Region>() {
                Ok(region) => region,
                Err(_) => {
                    warn!("Invalid region '{}', using default", name);
                    Region::default()
                }
            },
            None => Region::default(),
        };

        let provider =
            StaticProvider::new_minimal(credential.key.clone(), credential.secret.clone());
        let http_client = HttpClient::new()
            .map_err(|e| StoreError(format!("failed to create HTTP client: {}", e)))?;
        let client = S3Client::new_with(http_client, provider, region);

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError(format!("failed to start storage runtime: {}", e)))?;

        Ok(Self { client, runtime })
    }
}

impl MultipartStore for S3Store {
    fn initiate(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        let result = self
            .runtime
            .block_on(
                self.client
                    .create_multipart_upload(CreateMultipartUploadRequest {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        ..Default::default()
                    }),
            )
            .map_err(|e| StoreError(e.to_string()))?;

        result
            .upload_id
            .ok_or_else(|| StoreError("no upload id returned".to_string()))
    }

    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i64,
        body: Vec<u8>,
    ) -> Result<UploadedPart, StoreError> {
        let content_length = body.len() as i64;
        let output = self
            .runtime
            .block_on(self.client.upload_part(UploadPartRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                part_number,
                content_length: Some(content_length),
                body: Some(ByteStream::from(body)),
                ..Default::default()
            }))
            .map_err(|e| StoreError(e.to_string()))?;

        let etag = output
            .e_tag
            .ok_or_else(|| StoreError("no etag in part response".to_string()))?;
        Ok(UploadedPart { part_number, etag })
    }

    fn complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<(), StoreError> {
        let completed_parts = parts
            .into_iter()
            .map(|p| CompletedPart {
                e_tag: Some(p.etag),
                part_number: Some(p.part_number),
            })
            .collect();

        self.runtime
            .block_on(
                self.client
                    .complete_multipart_upload(CompleteMultipartUploadRequest {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        upload_id: upload_id.to_string(),
                        multipart_upload: Some(CompletedMultipartUpload {
                            parts: Some(completed_parts),
                        }),
                        ..Default::default()
                    }),
            )
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }

    fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.runtime
            .block_on(
                self.client
                    .abort_multipart_upload(AbortMultipartUploadRequest {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        upload_id: upload_id.to_string(),
                        ..Default::default()
                    }),
            )
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }
}

/// Opener producing a fresh S3 store per credential group
#[derive(Debug, Clone, Default)]
pub struct S3Opener;

impl S3Opener {
    pub fn new() -> Self {
        Self
    }
}

impl StoreOpener for S3Opener {
    fn open(&self, credential: &Credential) -> Result<Box<dyn MultipartStore>, StoreError> {
        Ok(Box::new(S3Store::connect(credential)?))
    }
}
