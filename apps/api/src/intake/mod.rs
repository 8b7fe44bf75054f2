//! Audio Intake: validates an uploaded answer recording and stores it for transcription.
//!
//! Objects are keyed `uploads/{userId}_{userName}/{sessionId}/{fileName}` and the returned
//! reference is what the transcriber receives.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_AUDIO_EXTENSIONS: [&str; 8] =
    ["mp3", "wav", "m4a", "webm", "ogg", "aac", "flac", "wma"];

/// Content types outside this list are accepted with a warning; the extension decides.
pub const ALLOWED_CONTENT_TYPES: [&str; 8] = [
    "audio/mpeg",
    "audio/wav",
    "audio/mp4",
    "audio/webm",
    "audio/ogg",
    "audio/aac",
    "audio/flac",
    "audio/x-ms-wma",
];

#[derive(Debug, Error, PartialEq)]
pub enum IntakeError {
    #[error("Cannot upload empty file")]
    Empty,

    #[error("Invalid file name")]
    MissingFileName,

    #[error("File must have a valid extension")]
    MissingExtension,

    #[error("Invalid file type. Allowed audio formats: {}. Received: {0}", ALLOWED_AUDIO_EXTENSIONS.join(", "))]
    UnsupportedExtension(String),

    #[error("File size exceeds maximum allowed size of {}MB", .limit / (1024 * 1024))]
    TooLarge { limit: usize },

    #[error("Failed to upload file: {0}")]
    Storage(String),
}

/// An answer recording as received from the client.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Who the recording belongs to; only used to build the object key.
#[derive(Debug, Clone, Copy)]
pub struct UploadOwner<'a> {
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub session_id: Uuid,
}

#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Stores the object and returns a stable reference to it.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, IntakeError>;
}

pub struct S3AudioStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3AudioStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl AudioStore for S3AudioStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, IntakeError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| IntakeError::Storage(format!("S3 upload failed: {e}")))?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

/// Final path component of a client-supplied file name, whichever separator it used.
fn base_name(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name).trim()
}

fn key_segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Checks the upload against the intake rules and returns the file name to store it under.
pub fn validate_audio(upload: &AudioUpload, max_bytes: usize) -> Result<String, IntakeError> {
    if upload.data.is_empty() {
        return Err(IntakeError::Empty);
    }
    if upload.data.len() > max_bytes {
        return Err(IntakeError::TooLarge { limit: max_bytes });
    }

    let file_name = upload
        .file_name
        .as_deref()
        .map(base_name)
        .filter(|n| !n.is_empty())
        .ok_or(IntakeError::MissingFileName)?;

    let extension = match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() => &file_name[dot + 1..],
        _ => return Err(IntakeError::MissingExtension),
    };
    if !ALLOWED_AUDIO_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
        return Err(IntakeError::UnsupportedExtension(extension.to_string()));
    }

    if let Some(content_type) = upload.content_type.as_deref() {
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.to_lowercase().as_str()) {
            warn!("File content type {content_type} does not match standard audio types");
        }
    }

    Ok(file_name.to_string())
}

pub fn object_key(owner: &UploadOwner<'_>, file_name: &str) -> String {
    format!(
        "uploads/{}_{}/{}/{}",
        key_segment(owner.user_id),
        key_segment(owner.user_name),
        owner.session_id,
        file_name
    )
}

/// Validates and stores an answer recording, returning its location reference.
pub async fn intake_audio(
    store: &dyn AudioStore,
    upload: AudioUpload,
    owner: &UploadOwner<'_>,
    max_bytes: usize,
) -> Result<String, IntakeError> {
    let file_name = validate_audio(&upload, max_bytes)?;
    let key = object_key(owner, &file_name);
    let size = upload.data.len();

    let location = store
        .put(&key, upload.data, upload.content_type.as_deref())
        .await?;

    info!("Stored answer audio {location} ({size} bytes)");
    Ok(location)
}
