//! Staging and validation of image attachments.
//!
//! One algorithm, parameterised by [`UploadSpec`] (form field, filename
//! prefix, size ceiling, destination directory). A request body is read
//! into a [`Submission`]: the text fields plus at most one [`StagedUpload`]
//! already written to disk. Callers must either keep the staged file (by
//! storing its path on a record) or hand it back through [`settle`] /
//! [`StagedUpload::discard`] so no orphan is left behind.

use axum::{
    body::Bytes,
    extract::{multipart::Field, multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header, StatusCode},
    Form,
};
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::entity::DEFAULT_PROFILE_IMAGE;

/// Extensions accepted for image uploads.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// Declared content types accepted for image uploads.
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Public route prefix under which the upload directory is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Why an attachment was refused. Each kind maps to its own client message.
#[derive(Error, Debug)]
pub enum UploadRejection {
    #[error("File too large. Maximum size is {}.", display_size(.limit_bytes))]
    TooLarge { limit_bytes: u64 },

    #[error("Only image files (jpeg, jpg, png, gif, webp) are allowed!")]
    UnsupportedType,

    #[error("Invalid multipart form data. Please check your request format.")]
    MalformedMultipart(String),

    #[error("Unexpected file field: {0}")]
    UnexpectedField(String),
}

impl UploadRejection {
    /// Machine-readable sub-reason included in the error body.
    pub fn reason(&self) -> &'static str {
        match self {
            UploadRejection::TooLarge { .. } => "file_too_large",
            UploadRejection::UnsupportedType => "unsupported_type",
            UploadRejection::MalformedMultipart(_) => "malformed_multipart",
            UploadRejection::UnexpectedField(_) => "unexpected_field",
        }
    }
}

/// `10MB`, `1.5MB`, `512KB` or `100 bytes`.
fn display_size(bytes: &u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    match *bytes {
        b if b >= MIB && b % MIB == 0 => format!("{}MB", b / MIB),
        b if b >= MIB => format!("{:.1}MB", b as f64 / MIB as f64),
        b if b >= KIB && b % KIB == 0 => format!("{}KB", b / KIB),
        b if b >= KIB => format!("{:.1}KB", b as f64 / KIB as f64),
        b => format!("{} bytes", b),
    }
}

/// Parameters of one upload call site.
#[derive(Debug, Clone)]
pub struct UploadSpec {
    /// Name of the multipart file field.
    pub field: &'static str,
    /// Prefix of generated filenames.
    pub prefix: &'static str,
    /// Size ceiling in bytes.
    pub max_bytes: u64,
    /// Where staged files are written.
    pub dir: PathBuf,
}

impl UploadSpec {
    pub fn profile_image(config: &Config) -> Self {
        Self {
            field: "profileImage",
            prefix: "profile",
            max_bytes: config.profile_image_max_bytes,
            dir: config.upload_dir.clone(),
        }
    }

    pub fn course_image(config: &Config) -> Self {
        Self {
            field: "lessonImage",
            prefix: "lesson",
            max_bytes: config.course_image_max_bytes,
            dir: config.upload_dir.clone(),
        }
    }
}

/// A file written to the upload directory but not yet committed to a record.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    file_name: String,
    content_type: String,
    size: u64,
}

impl StagedUpload {
    /// The reference stored on the owning record, e.g. `uploads/lesson-1700000000000-42.png`.
    ///
    /// Independent of where the upload directory lives on disk.
    pub fn stored_path(&self) -> String {
        format!("{}/{}", PUBLIC_PREFIX.trim_start_matches('/'), self.file_name)
    }

    /// The URL under which the file is served.
    pub fn public_url(&self) -> String {
        format!("{}/{}", PUBLIC_PREFIX, self.file_name)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Deletes the staged file. Failures are logged, never returned.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!("🧹 Discarded staged upload: {}", self.path.display()),
            Err(e) => tracing::warn!(
                "⚠️ Failed to delete staged upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Deletes `staged` when `outcome` is an error, then passes `outcome` through.
///
/// The caller's error is returned untouched whatever the cleanup does.
pub async fn settle<T>(staged: Option<StagedUpload>, outcome: Result<T>) -> Result<T> {
    if outcome.is_err() {
        if let Some(staged) = staged {
            staged.discard().await;
        }
    }
    outcome
}

/// Best-effort removal of a file a record no longer references.
///
/// Only files inside `dir` are touched and the shared default profile
/// image is never removed.
pub async fn remove_stored(dir: &Path, stored_path: &str) {
    if stored_path == DEFAULT_PROFILE_IMAGE {
        return;
    }
    let Some(file_name) = Path::new(stored_path).file_name() else {
        return;
    };
    let path = dir.join(file_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!("🧹 Removed replaced upload: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("Replaced upload already gone: {}", path.display())
        }
        Err(e) => tracing::warn!("⚠️ Failed to remove replaced upload {}: {}", path.display(), e),
    }
}

/// Text fields of a submitted form, JSON object or multipart body.
#[derive(Debug, Default, Clone)]
pub struct FormFields {
    values: HashMap<String, String>,
}

impl FormFields {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The field with surrounding whitespace removed, or `None` when absent or blank.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// A parsed request body.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: FormFields,
    pub file: Option<StagedUpload>,
}

/// JSON scalars accepted in non-multipart bodies.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Float(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

/// Reads the request body.
///
/// Non-multipart requests skip the upload step entirely: JSON objects and
/// URL-encoded forms become text fields and `file` is `None`.
pub async fn read_submission(request: Request, spec: &UploadSpec) -> Result<Submission> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| UploadRejection::MalformedMultipart(e.body_text()))?;
        return read_multipart(multipart, spec).await;
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(values) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| AppError::Validation(format!("Invalid form body: {}", e.body_text())))?;
        return Ok(Submission {
            fields: FormFields::new(values),
            file: None,
        });
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|e| AppError::Validation(format!("Unreadable request body: {}", e.body_text())))?;

    if body.is_empty() || !content_type.contains("json") {
        return Ok(Submission::default());
    }

    let parsed: HashMap<String, Option<FieldValue>> = sonic_rs::from_slice(&body)
        .map_err(|_| AppError::Validation("Request body must be a flat JSON object".to_string()))?;
    let values = parsed
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v.into_text())))
        .collect();

    Ok(Submission {
        fields: FormFields::new(values),
        file: None,
    })
}

async fn read_multipart(mut multipart: Multipart, spec: &UploadSpec) -> Result<Submission> {
    let mut staged: Option<StagedUpload> = None;
    match collect_fields(&mut multipart, spec, &mut staged).await {
        Ok(fields) => Ok(Submission {
            fields,
            file: staged,
        }),
        Err(e) => settle(staged, Err(e)).await,
    }
}

async fn collect_fields(
    multipart: &mut Multipart,
    spec: &UploadSpec,
    staged: &mut Option<StagedUpload>,
) -> Result<FormFields> {
    let mut values = HashMap::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e, spec.max_bytes)),
        };

        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);

        match file_name.as_deref() {
            // An empty file input: nothing was chosen.
            Some("") => {
                field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, spec.max_bytes))?;
            }
            Some(_) => {
                if name != spec.field || staged.is_some() {
                    return Err(UploadRejection::UnexpectedField(name).into());
                }
                *staged = Some(stage_field(field, spec).await?);
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, spec.max_bytes))?;
                values.insert(name, text);
            }
        }
    }

    Ok(FormFields::new(values))
}

async fn stage_field(mut field: Field<'_>, spec: &UploadSpec) -> Result<StagedUpload> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let declared = field.content_type().unwrap_or_default().to_ascii_lowercase();
    let extension = check_declared(&original_name, &declared)?;

    tokio::fs::create_dir_all(&spec.dir).await?;

    let file_name = generate_file_name(spec.prefix, &extension);
    let path = spec.dir.join(&file_name);

    tracing::debug!(
        "📤 Staging upload {} as {} (declared {})",
        original_name,
        path.display(),
        declared
    );

    match write_field(&mut field, &path, spec.max_bytes).await {
        Ok(size) => {
            tracing::info!("✅ Upload staged: {} ({} bytes)", path.display(), size);
            Ok(StagedUpload {
                path,
                file_name,
                content_type: declared,
                size,
            })
        }
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        "⚠️ Failed to delete rejected upload {}: {}",
                        path.display(),
                        remove_err
                    );
                }
            }
            Err(e)
        }
    }
}

async fn write_field(field: &mut Field<'_>, path: &Path, max_bytes: u64) -> Result<u64> {
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let mut size: u64 = 0;
    let mut sniffed = false;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if !sniffed {
            check_content(&chunk)?;
            sniffed = true;
        }
        size += chunk.len() as u64;
        check_size(size, max_bytes)?;
        writer.write_all(&chunk).await?;
    }

    writer.flush().await?;
    Ok(size)
}

fn multipart_error(err: MultipartError, max_bytes: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadRejection::TooLarge {
            limit_bytes: max_bytes,
        }
        .into();
    }
    UploadRejection::MalformedMultipart(err.body_text()).into()
}

/// Checks the original filename's extension and the declared content type
/// against the allow-list. Returns the normalised extension.
pub fn check_declared(
    original_name: &str,
    declared_type: &str,
) -> std::result::Result<String, UploadRejection> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .ok_or(UploadRejection::UnsupportedType)?;

    let mime = declared_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(UploadRejection::UnsupportedType);
    }

    Ok(extension)
}

/// Rejects content whose leading bytes identify a non-image format.
pub fn check_content(head: &[u8]) -> std::result::Result<(), UploadRejection> {
    match infer::get(head) {
        Some(kind) if !ALLOWED_MIME_TYPES.contains(&kind.mime_type()) => {
            Err(UploadRejection::UnsupportedType)
        }
        _ => Ok(()),
    }
}

pub fn check_size(size: u64, max_bytes: u64) -> std::result::Result<(), UploadRejection> {
    if size > max_bytes {
        return Err(UploadRejection::TooLarge {
            limit_bytes: max_bytes,
        });
    }
    Ok(())
}

/// `<prefix>-<unix millis>-<random>.<ext>`.
pub fn generate_file_name(prefix: &str, extension: &str) -> String {
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!(
        "{}-{}-{}.{}",
        prefix,
        Utc::now().timestamp_millis(),
        random,
        extension
    )
}
