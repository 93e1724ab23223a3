// Resume ranking: criteria extraction from a job description and per-resume scoring.
// All LLM calls go through llm_client; no direct provider calls here.

pub mod criteria;
pub mod handlers;
pub mod prompts;
pub mod scoring;
pub mod upload;
