//! Scripted model doubles for exercising the chat service without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::core_types::{GroundingSource, ReasoningMethod, SearchAnswer, VoiceGender};
use crate::errors::SearchError;
use crate::llm::{SearchModel, SpeechModel};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub prompt: String,
    pub images: Vec<String>,
    pub method: ReasoningMethod,
}

/// Replays scripted results in order, then falls back to a default answer.
pub struct MockSearchModel {
    scripted: Mutex<VecDeque<Result<SearchAnswer, SearchError>>>,
    failure: Option<SearchError>,
    requests: Mutex<Vec<RecordedSearch>>,
}

impl MockSearchModel {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<Result<SearchAnswer, SearchError>>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::from(responses)),
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `error`.
    pub fn with_error(error: SearchError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    pub fn failing_once(error: SearchError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn default_answer() -> SearchAnswer {
        SearchAnswer {
            text: "Mock grounded answer".to_string(),
            sources: vec![GroundingSource::new("Mock Source", "https://example.com/source")],
        }
    }

    pub fn requests(&self) -> Vec<RecordedSearch> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchModel for MockSearchModel {
    async fn search(
        &self,
        prompt: &str,
        images: &[String],
        method: ReasoningMethod,
    ) -> Result<SearchAnswer, SearchError> {
        self.requests.lock().unwrap().push(RecordedSearch {
            prompt: prompt.to_string(),
            images: images.to_vec(),
            method,
        });

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_answer()))
    }
}

/// Returns the same PCM bytes for every request.
pub struct MockSpeechModel {
    pcm: Vec<u8>,
    requests: Mutex<Vec<(String, VoiceGender)>>,
}

impl MockSpeechModel {
    pub fn new(pcm: Vec<u8>) -> Self {
        Self {
            pcm,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, VoiceGender)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechModel for MockSpeechModel {
    async fn synthesize(&self, text: &str, voice: VoiceGender) -> Result<Vec<u8>, SearchError> {
        self.requests.lock().unwrap().push((text.to_string(), voice));
        Ok(self.pcm.clone())
    }
}
