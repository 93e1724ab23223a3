//! Multipart form parsing for both endpoints.
//!
//! All request-level validation (field names, file type, size, counts) happens here,
//! before any extraction or model call.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use bytes::{Bytes, BytesMut};
use serde_json::Value;

use crate::config::{Limits, MAX_RESUME_FILES};
use crate::errors::AppError;
use crate::extraction::DocumentKind;

/// One accepted upload. The kind is already known to be PDF or DOCX.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub kind: DocumentKind,
    pub bytes: Bytes,
}

/// Raw `/score-resumes` form. Criteria are validated separately.
#[derive(Debug)]
pub struct ScoringForm {
    pub criteria: Vec<String>,
    pub files: Vec<UploadedFile>,
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {e}"))
}

/// Reads the single `file` field of `/extract-criteria`.
pub async fn read_document_upload(
    multipart: &mut Multipart,
    limits: &Limits,
) -> Result<UploadedFile, AppError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                if upload.is_some() {
                    return Err(AppError::Validation(
                        "Exactly one 'file' field is expected".to_string(),
                    ));
                }
                upload = Some(read_file_field(field, limits).await?);
            }
            other => {
                return Err(AppError::Validation(format!(
                    "Unexpected form field '{other}'"
                )))
            }
        }
    }

    upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))
}

/// Reads repeated `criteria` and `files` fields of `/score-resumes`.
///
/// The file count is checked while streaming so an oversized batch is rejected
/// without buffering the remaining files.
pub async fn read_scoring_form(
    multipart: &mut Multipart,
    limits: &Limits,
) -> Result<ScoringForm, AppError> {
    let mut criteria = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "criteria" => {
                let text = field.text().await.map_err(multipart_error)?;
                criteria.extend(expand_criteria_field(text)?);
            }
            "files" => {
                if files.len() == MAX_RESUME_FILES {
                    return Err(AppError::Validation(format!(
                        "Too many files: at most {MAX_RESUME_FILES} resumes per request"
                    )));
                }
                files.push(read_file_field(field, limits).await?);
            }
            other => {
                return Err(AppError::Validation(format!(
                    "Unexpected form field '{other}'"
                )))
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::Validation(
            "At least one resume file is required".to_string(),
        ));
    }

    Ok(ScoringForm { criteria, files })
}

/// A `criteria` field holds one criterion, or a JSON array of criteria.
fn expand_criteria_field(text: String) -> Result<Vec<String>, AppError> {
    if !text.trim_start().starts_with('[') {
        return Ok(vec![text]);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(AppError::Validation(format!(
                    "Criteria must be strings, got {other}"
                ))),
            })
            .collect(),
        // Not valid JSON: a criterion that happens to start with '['.
        _ => Ok(vec![text]),
    }
}

async fn read_file_field(mut field: Field<'_>, limits: &Limits) -> Result<UploadedFile, AppError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Uploaded file has no file name".to_string()))?;

    let kind = DocumentKind::from_file_name(&file_name)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    // Streamed so an oversized file is rejected as soon as it crosses the limit.
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > limits.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "'{file_name}' exceeds the {} byte upload limit",
                limits.max_upload_bytes
            )));
        }
        buffer.extend_from_slice(&chunk);
    }

    if buffer.is_empty() {
        return Err(AppError::Validation(format!("'{file_name}' is empty")));
    }

    Ok(UploadedFile {
        file_name,
        kind,
        bytes: buffer.freeze(),
    })
}
