use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::LanguageModel;

/// Shared application state injected into all route handlers via Axum extractors.
/// Built once at startup; never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Production: `LlmClient`. Tests swap in a scripted fake.
    pub llm: Arc<dyn LanguageModel>,
    pub retry: RetryPolicy,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(llm: Arc<dyn LanguageModel>, config: Config) -> Self {
        Self {
            llm,
            retry: RetryPolicy::from(&config.model),
            config: Arc::new(config),
        }
    }

    #[cfg(test)]
    pub fn for_tests(llm: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self::for_tests_with_limits(llm, retry, crate::config::Limits::default())
    }

    #[cfg(test)]
    pub fn for_tests_with_limits(
        llm: Arc<dyn LanguageModel>,
        retry: RetryPolicy,
        limits: crate::config::Limits,
    ) -> Self {
        let mut config = Config::from_lookup(|key| {
            (key == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();
        config.limits = limits;

        Self {
            llm,
            retry,
            config: Arc::new(config),
        }
    }
}
