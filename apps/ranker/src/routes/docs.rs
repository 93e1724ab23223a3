//! Interactive surface: a minimal HTML form at `/` and the OpenAPI document.

use axum::{extract::State, response::Html, Json};
use serde_json::{json, Value};

use crate::config::{MAX_CRITERIA, MAX_CRITERION_CHARS, MAX_RESUME_FILES};
use crate::state::AppState;

/// GET /openapi.json
/// OpenAPI 3.0 description of the public routes, with the configured limits filled in.
pub async fn openapi_handler(State(state): State<AppState>) -> Json<Value> {
    let limits = &state.config.limits;
    let error = json!({ "$ref": "#/components/schemas/Error" });
    let error_response = |description: &str| {
        json!({
            "description": description,
            "content": { "application/json": { "schema": error } }
        })
    };

    let extract_criteria = json!({
        "summary": "Extract ranking criteria from a job description",
        "requestBody": {
            "required": true,
            "content": {
                "multipart/form-data": {
                    "schema": {
                        "type": "object",
                        "required": ["file"],
                        "properties": {
                            "file": {
                                "type": "string",
                                "format": "binary",
                                "description": format!(
                                    "PDF or DOCX job description, at most {} bytes",
                                    limits.max_upload_bytes
                                )
                            }
                        }
                    }
                }
            }
        },
        "responses": {
            "200": {
                "description": "Extracted criteria (possibly empty)",
                "content": { "application/json": { "schema": criteria_schema(0) } }
            },
            "400": error_response("Invalid upload or unreadable document"),
            "500": error_response("Model returned an unusable reply"),
            "503": error_response("Model did not respond in time")
        }
    });

    let report_content = json!({
        "text/csv": { "schema": { "type": "string" } },
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet": {
            "schema": { "type": "string", "format": "binary" }
        },
        "application/json": { "schema": { "type": "object" } }
    });

    let report_headers = json!({
        "Content-Disposition": { "schema": { "type": "string" } },
        "X-Ranker-Failed-Files": { "schema": { "type": "integer" } },
        "X-Ranker-Degraded-Rows": { "schema": { "type": "integer" } },
        "X-Ranker-File-Status": {
            "description": "JSON array, one entry per uploaded file in upload order: \
                file_name, status (scored, degraded, extraction_failed, scoring_failed) \
                and the status details",
            "schema": { "type": "string" }
        },
        "X-Ranker-Flagged-Cells": {
            "description": "JSON array of score cells not taken from the model as given: \
                row (1-based), file_name, criterion, value, origin (clamped or defaulted)",
            "schema": { "type": "string" }
        }
    });

    let score_resumes = json!({
        "summary": "Score resumes against criteria and download the report",
        "parameters": [{
            "name": "format",
            "in": "query",
            "required": false,
            "schema": {
                "type": "string",
                "enum": ["csv", "xlsx", "json"],
                "default": state.config.default_report_format.extension()
            }
        }],
        "requestBody": {
            "required": true,
            "content": {
                "multipart/form-data": {
                    "schema": {
                        "type": "object",
                        "required": ["criteria", "files"],
                        "properties": {
                            "criteria": criteria_schema(1),
                            "files": {
                                "type": "array",
                                "minItems": 1,
                                "maxItems": MAX_RESUME_FILES,
                                "items": { "type": "string", "format": "binary" }
                            }
                        }
                    }
                }
            }
        },
        "responses": {
            "200": {
                "description": "Score report download",
                "headers": report_headers,
                "content": report_content
            },
            "400": error_response("Invalid criteria, files or format"),
            "500": error_response("Model returned unusable replies for every resume"),
            "503": error_response("Model did not respond in time")
        }
    });

    Json(json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Resume Ranker",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Extract ranking criteria from a job description and score resumes against them."
        },
        "paths": {
            "/extract-criteria": { "post": extract_criteria },
            "/score-resumes": { "post": score_resumes },
            "/health": {
                "get": {
                    "summary": "Liveness check",
                    "responses": { "200": { "description": "Service is up" } }
                }
            }
        },
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": {
                            "type": "object",
                            "properties": {
                                "code": { "type": "string" },
                                "message": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    }))
}

fn criteria_schema(min_items: usize) -> Value {
    json!({
        "type": "array",
        "minItems": min_items,
        "maxItems": MAX_CRITERIA,
        "items": { "type": "string", "maxLength": MAX_CRITERION_CHARS }
    })
}

/// GET /
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// Criteria live in the page between the two calls; the server keeps nothing.
const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Resume Ranker</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 44rem; margin: 2rem auto; padding: 0 1rem; }
  fieldset { margin-bottom: 1.5rem; }
  textarea { width: 100%; min-height: 10rem; }
  #status { white-space: pre-wrap; color: #444; }
</style>
</head>
<body>
<h1>Resume Ranker</h1>

<fieldset>
  <legend>1. Job description</legend>
  <input type="file" id="jd" accept=".pdf,.docx">
  <button id="extract">Extract criteria</button>
</fieldset>

<fieldset>
  <legend>2. Criteria (one per line)</legend>
  <textarea id="criteria"></textarea>
</fieldset>

<fieldset>
  <legend>3. Resumes</legend>
  <input type="file" id="resumes" accept=".pdf,.docx" multiple>
  <select id="format">
    <option value="xlsx">Excel</option>
    <option value="csv">CSV</option>
    <option value="json">JSON</option>
  </select>
  <button id="score">Score and download</button>
</fieldset>

<p id="status"></p>

<script>
const status = (msg) => { document.getElementById("status").textContent = msg; };

async function failure(res) {
  try { const body = await res.json(); return body.error.message; }
  catch (_) { return res.statusText; }
}

document.getElementById("extract").onclick = async () => {
  const file = document.getElementById("jd").files[0];
  if (!file) return status("Choose a job description first.");
  const form = new FormData();
  form.append("file", file);
  status("Extracting criteria…");
  const res = await fetch("/extract-criteria", { method: "POST", body: form });
  if (!res.ok) return status("Extraction failed: " + await failure(res));
  const body = await res.json();
  document.getElementById("criteria").value = body.criteria.join("\n");
  status(body.criteria.length + " criteria extracted. Edit them if needed.");
};

document.getElementById("score").onclick = async () => {
  const criteria = document.getElementById("criteria").value
    .split("\n").map((c) => c.trim()).filter((c) => c.length > 0);
  const files = document.getElementById("resumes").files;
  if (criteria.length === 0 || files.length === 0) return status("Add criteria and at least one resume.");
  const form = new FormData();
  criteria.forEach((c) => form.append("criteria", c));
  for (const f of files) form.append("files", f);
  const format = document.getElementById("format").value;
  status("Scoring " + files.length + " resume(s)…");
  const res = await fetch("/score-resumes?format=" + format, { method: "POST", body: form });
  if (!res.ok) return status("Scoring failed: " + await failure(res));
  const name = (res.headers.get("Content-Disposition") || "").match(/filename="(.+)"/);
  const link = document.createElement("a");
  link.href = URL.createObjectURL(await res.blob());
  link.download = name ? name[1] : "scores." + format;
  link.click();
  const failed = JSON.parse(res.headers.get("X-Ranker-File-Status") || "[]")
    .filter((f) => f.status.endsWith("_failed"))
    .map((f) => f.file_name + " (" + f.reason + ")");
  status("Done. Failed files: " + (failed.length ? failed.join(", ") : "none")
    + ". Rows with defaulted or clamped scores: " + res.headers.get("X-Ranker-Degraded-Rows"));
};
</script>
</body>
</html>
"#;
