// All LLM prompt constants for the ranking module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// System prompt for criteria extraction.
pub fn criteria_system() -> String {
    format!(
        "You are an experienced technical recruiter. You read job descriptions and \
        distill them into short, checkable ranking criteria. {JSON_ONLY_SYSTEM}"
    )
}

/// Criteria extraction prompt template.
/// Replace: {max_criteria}, {notice}, {jd_text}
pub const CRITERIA_PROMPT_TEMPLATE: &str = r#"Extract the ranking criteria a recruiter would use to compare candidates for the job below.

Return a JSON ARRAY of at most {max_criteria} strings, most important first:
["5+ years Python experience", "AWS Certification", "Experience with Kubernetes"]

RULES:
1. Each criterion is one short phrase (under 12 words) describing ONE requirement
2. Prefer concrete, checkable requirements: skills, years of experience, certifications, degrees
3. Do NOT repeat a requirement in different words
4. Do NOT include benefits, company descriptions, or application instructions
5. If the text contains no usable requirements, return []

{notice}

JOB DESCRIPTION:
{jd_text}"#;

/// System prompt for resume scoring.
pub fn scoring_system() -> String {
    format!(
        "You are an impartial resume screener. You score a single resume against a fixed \
        list of criteria using only evidence present in the resume. {JSON_ONLY_SYSTEM}"
    )
}

/// Resume scoring prompt template.
/// Replace: {criteria_json}, {notice}, {resume_text}
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Score the resume below against EACH of these criteria:
{criteria_json}

Return a JSON OBJECT with this EXACT schema:
{
  "candidate_name": "Full name of the candidate, or null if not stated",
  "scores": {
    "<criterion copied exactly from the list>": 0
  }
}

SCORING SCALE (integers only):
- 0: no evidence
- 1: barely mentioned or only loosely related
- 2: some related evidence
- 3: meets the criterion
- 4: clearly exceeds the criterion
- 5: outstanding, strongly evidenced

HARD RULES:
1. Include EVERY criterion from the list as a key, spelled exactly as given
2. Every score is an integer from 0 to 5
3. Do NOT add keys that are not in the list
4. Judge only from the resume text; do not guess

{notice}

RESUME:
{resume_text}"#;
