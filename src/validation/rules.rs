use std::path::Path;

use thiserror::Error;
use url::Url;

use crate::{domain::models::EvidenceKind, infrastructure::config::EvidenceRules};

/// Reasons an evidence upload is turned away before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("file exceeds the maximum size of {limit_mb} MB")]
    TooLarge { limit_mb: u64 },
    #[error("file extension {extension:?} is not allowed; accepted: {allowed}")]
    ExtensionNotAllowed { extension: String, allowed: String },
    #[error("file name is missing an extension")]
    MissingExtension,
    #[error("{kind} evidence requires a file")]
    FileRequired { kind: &'static str },
    #[error("URL evidence requires a link")]
    UrlRequired,
    #[error("URL evidence cannot include a file")]
    UnexpectedFile,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Cheap check usable while the body is still streaming.
pub fn check_size(size_bytes: u64, rules: &EvidenceRules) -> Result<(), UploadRejection> {
    if size_bytes > rules.max_bytes {
        Err(UploadRejection::TooLarge {
            limit_mb: rules.max_bytes / (1024 * 1024),
        })
    } else {
        Ok(())
    }
}

pub fn check_extension(file_name: &str, rules: &EvidenceRules) -> Result<String, UploadRejection> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .ok_or(UploadRejection::MissingExtension)?;
    if rules
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        Ok(extension)
    } else {
        Err(UploadRejection::ExtensionNotAllowed {
            extension,
            allowed: rules.allowed_extensions.join(" "),
        })
    }
}

/// Media type sent with a stored evidence file, by extension.
pub fn media_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "mkv" => "video/x-matroska",
        "flv" => "video/x-flv",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

pub fn check_url(raw: &str) -> Result<Url, UploadRejection> {
    let url = Url::parse(raw.trim()).map_err(|err| UploadRejection::InvalidUrl(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UploadRejection::InvalidUrl(format!(
            "unsupported scheme {other}"
        ))),
    }
}

/// File metadata gathered from the upload, without the body.
#[derive(Debug, Clone, Copy)]
pub struct FileFacts<'a> {
    pub file_name: &'a str,
    pub size_bytes: u64,
}

/// Validates the kind/file/url combination plus size and extension.
pub fn check_upload(
    kind: EvidenceKind,
    file: Option<FileFacts<'_>>,
    url: Option<&str>,
    rules: &EvidenceRules,
) -> Result<Option<Url>, UploadRejection> {
    let url = url.map(str::trim).filter(|value| !value.is_empty());
    if kind.requires_file() {
        let Some(file) = file else {
            return Err(UploadRejection::FileRequired { kind: kind.label() });
        };
        check_size(file.size_bytes, rules)?;
        check_extension(file.file_name, rules)?;
        Ok(None)
    } else {
        if file.is_some() {
            return Err(UploadRejection::UnexpectedFile);
        }
        let raw = url.ok_or(UploadRejection::UrlRequired)?;
        check_url(raw).map(Some)
    }
}
