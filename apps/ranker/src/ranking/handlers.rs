//! Axum route handlers for the Ranking API.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::extract_text;
use crate::ranking::criteria::{extract_criteria, validate_criteria, Criterion};
use crate::ranking::scoring::{extract_resumes, score_resumes, ScoringSettings};
use crate::ranking::upload::{read_document_upload, read_scoring_form, UploadedFile};
use crate::report::{build_report, Report, ReportFormat};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CriteriaResponse {
    pub criteria: Vec<Criterion>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// `csv`, `xlsx` or `json`; falls back to the configured default.
    pub format: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /extract-criteria
///
/// Multipart `file` (PDF or DOCX job description). Returns the ranking criteria
/// the model found; an empty list is a valid answer.
pub async fn handle_extract_criteria(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CriteriaResponse>, AppError> {
    let upload = read_document_upload(&mut multipart, &state.config.limits).await?;
    let file_name = upload.file_name;

    let jd = extract_text(upload.bytes, upload.kind).await?;
    if jd.skipped_pages > 0 {
        info!("{file_name}: skipped {} page(s) without text", jd.skipped_pages);
    }

    let criteria =
        extract_criteria(state.llm.as_ref(), &state.retry, &jd, &state.config.limits).await?;

    Ok(Json(CriteriaResponse { criteria }))
}

/// POST /score-resumes?format=csv|xlsx|json
///
/// Multipart repeated `criteria` (1–15) and `files` (1–20 PDF/DOCX resumes).
/// Returns the score report as a download. Every input check runs before any
/// extraction or model call.
pub async fn handle_score_resumes(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    mut multipart: Multipart,
) -> Result<Report, AppError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ReportFormat>().map_err(AppError::Validation)?,
        None => state.config.default_report_format,
    };

    let form = read_scoring_form(&mut multipart, &state.config.limits).await?;
    let criteria = Arc::new(validate_criteria(form.criteria)?);

    let batch_id = Uuid::new_v4();
    score_batch(&state, criteria, form.files, format)
        .instrument(info_span!("score_resumes", %batch_id))
        .await
}

async fn score_batch(
    state: &AppState,
    criteria: Arc<Vec<Criterion>>,
    files: Vec<UploadedFile>,
    format: ReportFormat,
) -> Result<Report, AppError> {
    info!(
        "Scoring {} resume(s) against {} criteria as {format}",
        files.len(),
        criteria.len()
    );

    let sources = extract_resumes(files).await;
    let outcome = score_resumes(
        Arc::clone(&state.llm),
        state.retry,
        Arc::clone(&criteria),
        sources,
        ScoringSettings::from(state.config.as_ref()),
    )
    .await;

    outcome.ensure_rows()?;

    Ok(build_report(&criteria, &outcome, format, Utc::now())?)
}
