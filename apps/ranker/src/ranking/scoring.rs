//! Resume Scoring: scores each resume against the criteria list via the LLM.
//!
//! Flow per request: extract every upload concurrently → fan scoring calls out over a
//! `JoinSet` (bounded by a semaphore) → write each outcome into the slot of its upload
//! index → assemble rows and the per-file status list in upload order.
//!
//! Scoring is best-effort per candidate. A reply with missing or out-of-range scores still
//! produces a row; the affected cells carry a non-`Model` origin so they are never mistaken
//! for genuine scores. A resume that cannot be read or scored is left out of the rows and
//! reported in the status list instead.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::extraction::{extract_text, ExtractedText, ExtractionError};
use crate::llm_client::prompts::{fill_template, UNTRUSTED_DOCUMENT_NOTICE};
use crate::llm_client::retry::{ModelFailure, RetryPolicy};
use crate::llm_client::{strip_json_fences, LanguageModel, LlmError};
use crate::ranking::criteria::Criterion;
use crate::ranking::prompts::{scoring_system, SCORING_PROMPT_TEMPLATE};
use crate::ranking::upload::UploadedFile;

pub const MAX_SCORE: u8 = 5;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Where a cell's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrigin {
    /// In-range integer supplied by the model.
    Model,
    /// Numeric but fractional or outside 0–5; rounded and clamped.
    Clamped,
    /// Missing or non-numeric; set to 0.
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreCell {
    pub value: u8,
    pub origin: ScoreOrigin,
}

impl ScoreCell {
    fn defaulted() -> Self {
        Self {
            value: 0,
            origin: ScoreOrigin::Defaulted,
        }
    }
}

/// One resume's scores. `cells` is parallel to the request's criteria list.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScoreRow {
    pub candidate_name: String,
    pub file_name: String,
    pub cells: Vec<ScoreCell>,
    pub total: u32,
}

impl CandidateScoreRow {
    pub fn new(candidate_name: String, file_name: String, cells: Vec<ScoreCell>) -> Self {
        let total = cells.iter().map(|c| u32::from(c.value)).sum();
        Self {
            candidate_name,
            file_name,
            cells,
            total,
        }
    }

    pub fn degraded(&self) -> bool {
        self.cells.iter().any(|c| c.origin != ScoreOrigin::Model)
    }

    fn count(&self, origin: ScoreOrigin) -> usize {
        self.cells.iter().filter(|c| c.origin == origin).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Scored,
    Degraded { defaulted: usize, clamped: usize },
    ExtractionFailed { reason: String },
    ScoringFailed { reason: String, unavailable: bool },
}

/// Companion status entry for one uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            FileOutcome::ExtractionFailed { .. } | FileOutcome::ScoringFailed { .. }
        )
    }
}

/// A resume after extraction, ready to be scored.
#[derive(Debug)]
pub struct ResumeSource {
    pub file_name: String,
    pub extracted: Result<ExtractedText, ExtractionError>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringSettings {
    pub concurrency: usize,
    pub max_resume_chars: usize,
}

impl From<&Config> for ScoringSettings {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.model.scoring_concurrency,
            max_resume_chars: config.limits.max_resume_chars,
        }
    }
}

/// Rows in upload order (failed files omitted) plus one status per uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringOutcome {
    pub rows: Vec<CandidateScoreRow>,
    pub files: Vec<FileStatus>,
}

impl ScoringOutcome {
    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| f.is_failure()).count()
    }

    pub fn degraded_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.degraded()).count()
    }

    /// An outcome with no rows is an error: model failures win over extraction failures,
    /// and unavailability wins over protocol errors.
    pub fn ensure_rows(&self) -> Result<(), AppError> {
        if !self.rows.is_empty() {
            return Ok(());
        }

        let summary = self
            .files
            .iter()
            .map(|f| match &f.outcome {
                FileOutcome::ExtractionFailed { reason }
                | FileOutcome::ScoringFailed { reason, .. } => format!("{}: {reason}", f.file_name),
                _ => f.file_name.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");

        let mut any_scoring_failure = false;
        let mut any_unavailable = false;
        for file in &self.files {
            if let FileOutcome::ScoringFailed { unavailable, .. } = file.outcome {
                any_scoring_failure = true;
                any_unavailable |= unavailable;
            }
        }

        if any_unavailable {
            Err(AppError::ModelTimeout(summary))
        } else if any_scoring_failure {
            Err(AppError::ModelProtocol(summary))
        } else {
            Err(AppError::Extraction(format!(
                "None of the uploaded resumes could be read: {summary}"
            )))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Extracts every upload concurrently on the blocking pool; output order equals input order.
pub async fn extract_resumes(files: Vec<UploadedFile>) -> Vec<ResumeSource> {
    let mut names: Vec<String> = Vec::with_capacity(files.len());
    let mut slots: Vec<Option<Result<ExtractedText, ExtractionError>>> =
        (0..files.len()).map(|_| None).collect();
    let mut tasks = JoinSet::new();

    for (index, file) in files.into_iter().enumerate() {
        names.push(file.file_name);
        let (bytes, kind) = (file.bytes, file.kind);
        tasks.spawn(async move { (index, extract_text(bytes, kind).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => error!("Extraction task aborted: {e}"),
        }
    }

    names
        .into_iter()
        .zip(slots)
        .map(|(file_name, slot)| ResumeSource {
            file_name,
            extracted: slot.unwrap_or_else(|| {
                Err(ExtractionError::Task("extraction task aborted".to_string()))
            }),
        })
        .collect()
}

/// Scores every readable resume concurrently. Never fails as a whole: each file ends up
/// either as a row or as a failure entry in `files`.
pub async fn score_resumes(
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    criteria: Arc<Vec<Criterion>>,
    sources: Vec<ResumeSource>,
    settings: ScoringSettings,
) -> ScoringOutcome {
    let total = sources.len();
    let mut names: Vec<String> = Vec::with_capacity(total);
    let mut slots: Vec<Option<Result<CandidateScoreRow, FileOutcome>>> =
        (0..total).map(|_| None).collect();

    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, source) in sources.into_iter().enumerate() {
        let ResumeSource {
            file_name,
            extracted,
        } = source;
        names.push(file_name.clone());

        let text = match extracted {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                warn!("{file_name}: no extractable text, excluded from scoring");
                slots[index] = Some(Err(FileOutcome::ExtractionFailed {
                    reason: "no extractable text".to_string(),
                }));
                continue;
            }
            Err(e) => {
                warn!("{file_name}: extraction failed: {e}");
                slots[index] = Some(Err(FileOutcome::ExtractionFailed {
                    reason: e.to_string(),
                }));
                continue;
            }
        };

        let model = Arc::clone(&model);
        let criteria = Arc::clone(&criteria);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let result = score_one(
                model.as_ref(),
                &policy,
                &criteria,
                &file_name,
                &text,
                settings.max_resume_chars,
            )
            .await;
            (index, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(row))) => slots[index] = Some(Ok(row)),
            Ok((index, Err(failure))) => {
                let unavailable = matches!(failure, ModelFailure::Unavailable { .. });
                slots[index] = Some(Err(FileOutcome::ScoringFailed {
                    reason: failure.to_string(),
                    unavailable,
                }));
            }
            Err(e) => error!("Scoring task aborted: {e}"),
        }
    }

    let mut rows = Vec::with_capacity(total);
    let mut files = Vec::with_capacity(total);

    for (file_name, slot) in names.into_iter().zip(slots) {
        let outcome = match slot {
            Some(Ok(row)) => {
                let outcome = if row.degraded() {
                    warn!("{file_name}: some scores were defaulted or clamped");
                    FileOutcome::Degraded {
                        defaulted: row.count(ScoreOrigin::Defaulted),
                        clamped: row.count(ScoreOrigin::Clamped),
                    }
                } else {
                    FileOutcome::Scored
                };
                rows.push(row);
                outcome
            }
            Some(Err(outcome)) => outcome,
            None => FileOutcome::ScoringFailed {
                reason: "scoring task aborted".to_string(),
                unavailable: false,
            },
        };
        files.push(FileStatus { file_name, outcome });
    }

    info!(
        "Scored {}/{} resumes ({} degraded)",
        rows.len(),
        total,
        rows.iter().filter(|r| r.degraded()).count()
    );

    ScoringOutcome { rows, files }
}

/// Scores one resume under the retry policy.
pub async fn score_one(
    model: &dyn LanguageModel,
    policy: &RetryPolicy,
    criteria: &[Criterion],
    file_name: &str,
    text: &ExtractedText,
    max_resume_chars: usize,
) -> Result<CandidateScoreRow, ModelFailure> {
    let (resume_text, was_truncated) = text.truncated(max_resume_chars);
    if was_truncated {
        debug!("{file_name}: resume truncated to {max_resume_chars} characters");
    }

    let criteria_json =
        Value::from(criteria.iter().map(Criterion::as_str).collect::<Vec<_>>()).to_string();
    let prompt = fill_template(
        SCORING_PROMPT_TEMPLATE,
        &[
            ("criteria_json", &criteria_json),
            ("notice", UNTRUSTED_DOCUMENT_NOTICE),
            ("resume_text", resume_text),
        ],
    );
    let system = scoring_system();

    let prompt = prompt.as_str();
    let system = system.as_str();
    let reply = policy
        .run(&format!("scoring {file_name}"), move || async move {
            let raw = model.complete(prompt, system).await?;
            parse_score_reply(&raw, criteria)
        })
        .await?;

    let candidate_name =
        resolve_candidate_name(reply.candidate_name.as_deref(), &text.text, file_name);

    Ok(CandidateScoreRow::new(
        candidate_name,
        file_name.to_string(),
        reply.cells,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Reply parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub struct ScoreReply {
    pub candidate_name: Option<String>,
    pub cells: Vec<ScoreCell>,
}

/// Parses `{"candidate_name": ..., "scores": {...}}` or a flat score object.
/// Only a reply that is not a JSON object is an error; individual bad values are
/// clamped or defaulted.
pub fn parse_score_reply(raw: &str, criteria: &[Criterion]) -> Result<ScoreReply, LlmError> {
    let value: Value = serde_json::from_str(strip_json_fences(raw))?;
    let Value::Object(mut obj) = value else {
        return Err(LlmError::Malformed("expected a JSON object of scores".to_string()));
    };

    let candidate_name = match obj.remove("candidate_name") {
        Some(Value::String(name)) => Some(name),
        _ => None,
    };

    let scores: Map<String, Value> = match obj.remove("scores") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(LlmError::Malformed(
                "\"scores\" must be a JSON object".to_string(),
            ))
        }
        None => obj,
    };

    let cells: Vec<ScoreCell> = criteria
        .iter()
        .map(|criterion| score_cell(lookup_score(&scores, criterion)))
        .collect();

    let unexpected = scores
        .keys()
        .filter(|k| !criteria.iter().any(|c| keys_match(k, c)))
        .count();
    if unexpected > 0 {
        debug!("Ignoring {unexpected} score(s) for criteria that were not requested");
    }

    Ok(ScoreReply {
        candidate_name,
        cells,
    })
}

fn keys_match(key: &str, criterion: &Criterion) -> bool {
    key == criterion.as_str() || key.trim().to_lowercase() == criterion.as_str().to_lowercase()
}

fn lookup_score<'a>(scores: &'a Map<String, Value>, criterion: &Criterion) -> Option<&'a Value> {
    scores.get(criterion.as_str()).or_else(|| {
        scores
            .iter()
            .find(|(k, _)| keys_match(k, criterion))
            .map(|(_, v)| v)
    })
}

fn score_cell(value: Option<&Value>) -> ScoreCell {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => {
            let in_range = n.fract() == 0.0 && (0.0..=f64::from(MAX_SCORE)).contains(&n);
            let value = n.round().clamp(0.0, f64::from(MAX_SCORE)) as u8;
            let origin = if in_range {
                ScoreOrigin::Model
            } else {
                ScoreOrigin::Clamped
            };
            ScoreCell { value, origin }
        }
        _ => ScoreCell::defaulted(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate name
// ────────────────────────────────────────────────────────────────────────────

/// Best-effort display name: the model's answer if plausible, then the first
/// name-like line of the resume, then the file stem.
pub fn resolve_candidate_name(model_name: Option<&str>, text: &str, file_name: &str) -> String {
    if let Some(name) = model_name.map(str::trim).filter(|n| is_plausible_name(n)) {
        return name.to_string();
    }

    if let Some(line) = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(10)
        .find(|l| looks_like_name_line(l))
    {
        return line.to_string();
    }

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.replace(['_', '-'], " ").trim().to_string())
        .unwrap_or_default();

    if stem.is_empty() {
        "Unknown".to_string()
    } else {
        stem
    }
}

fn is_plausible_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    (2..=80).contains(&name.chars().count())
        && !name.contains(['\n', '\r', '@'])
        && name.chars().any(char::is_alphabetic)
        && !matches!(lower.as_str(), "null" | "none" | "unknown" | "n/a")
}

fn looks_like_name_line(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    (2..=4).contains(&words.len())
        && line.chars().count() <= 60
        && words.iter().all(|w| {
            w.chars().next().is_some_and(char::is_uppercase)
                && w.chars().all(|c| c.is_alphabetic() || matches!(c, '.' | '\'' | '-'))
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
