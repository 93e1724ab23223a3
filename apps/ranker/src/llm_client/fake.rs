//! Scriptable `LanguageModel` for tests. Counts calls and records prompts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm_client::{LanguageModel, LlmError};

#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    /// Replies after sleeping on the tokio clock.
    Delayed(Duration, String),
    /// Never replies.
    Hang,
    /// Provider error with the given HTTP status.
    Status(u16),
}

impl FakeReply {
    pub fn text(s: impl Into<String>) -> Self {
        FakeReply::Text(s.into())
    }
}

#[derive(Default)]
pub struct FakeModel {
    script: Mutex<VecDeque<FakeReply>>,
    routes: Vec<(String, FakeReply)>,
    fallback: Option<FakeReply>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    /// Replies are consumed in order; once exhausted the last one repeats.
    pub fn scripted(replies: Vec<FakeReply>) -> Self {
        let fallback = replies.last().cloned();
        Self {
            script: Mutex::new(replies.into()),
            fallback,
            ..Self::default()
        }
    }

    /// Every call gets the same reply.
    pub fn always(reply: FakeReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    /// Prompts containing `marker` get `reply`, checked before the script.
    pub fn route(mut self, marker: impl Into<String>, reply: FakeReply) -> Self {
        self.routes.push((marker.into(), reply));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self, prompt: &str) -> FakeReply {
        if let Some((_, reply)) = self.routes.iter().find(|(m, _)| prompt.contains(m.as_str())) {
            return reply.clone();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or(FakeReply::Status(500))
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        match self.next_reply(prompt) {
            FakeReply::Text(text) => Ok(text),
            FakeReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            FakeReply::Hang => std::future::pending().await,
            FakeReply::Status(status) => Err(LlmError::Api {
                status,
                message: "fake provider error".to_string(),
            }),
        }
    }
}
