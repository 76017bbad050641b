//! Google Gemini API client implementation
//!
//! Talks to the REST `generateContent` endpoint for both grounded search
//! (with the `googleSearch` tool enabled) and prebuilt-voice speech synthesis.

use crate::audio::decode_base64_audio;
use crate::config::LlmConfig;
use crate::core_types::{GroundingSource, ReasoningMethod, SearchAnswer, VoiceGender};
use crate::errors::SearchError;
use crate::images::split_data_url;
use crate::instructions::system_instruction;
use crate::llm::{SearchModel, SpeechModel};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const NO_ANSWER_TEXT: &str = "I couldn't find a clear answer on Google for that query.";
pub const DEFAULT_SOURCE_TITLE: &str = "Search Result";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini API client
pub struct GeminiClient {
    api_key: Option<String>,
    search_model: String,
    tts_model: String,
    temperature: f32,
    speech_char_limit: usize,
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            api_key: config.auth.api_key.clone(),
            search_model: config.search_model.clone(),
            tts_model: config.tts_model.clone(),
            temperature: config.temperature,
            speech_char_limit: config.speech_char_limit,
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<GeminiSpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSpeechConfig {
    voice_config: GeminiVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiVoiceConfig {
    prebuilt_voice_config: GeminiPrebuiltVoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPrebuiltVoice {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    #[serde(default)]
    web: Option<GeminiWebChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiWebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    code: u16,
    message: String,
}

impl GeminiClient {
    fn build_search_request(&self, prompt: &str, images: &[String], method: ReasoningMethod) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text {
            text: prompt.to_string(),
        }];

        for image in images {
            let (mime_type, data) = split_data_url(image);
            parts.push(GeminiPart::InlineData {
                inline_data: GeminiInlineData { mime_type, data },
            });
        }

        GeminiRequest {
            contents: vec![GeminiContent { role: Some("user".to_string()), parts }],
            system_instruction: Some(GeminiContent::text(None, &system_instruction(method))),
            tools: Some(vec![GeminiTool {
                google_search: GoogleSearch {},
            }]),
            generation_config: GeminiGenerationConfig {
                temperature: Some(self.temperature),
                ..Default::default()
            },
        }
    }

    fn build_speech_request(&self, text: &str, voice: VoiceGender) -> GeminiRequest {
        let truncated: String = text.chars().take(self.speech_char_limit).collect();

        GeminiRequest {
            contents: vec![GeminiContent::text(None, &truncated)],
            system_instruction: None,
            tools: None,
            generation_config: GeminiGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(GeminiSpeechConfig {
                    voice_config: GeminiVoiceConfig {
                        prebuilt_voice_config: GeminiPrebuiltVoice {
                            voice_name: voice.voice_name().to_string(),
                        },
                    },
                }),
                ..Default::default()
            },
        }
    }

    fn convert_search_response(&self, response: GeminiResponse) -> SearchAnswer {
        let Some(candidate) = response.candidates.into_iter().next() else {
            log::warn!("Gemini search response contained no candidates");
            return SearchAnswer {
                text: NO_ANSWER_TEXT.to_string(),
                sources: Vec::new(),
            };
        };

        if let Some(reason) = &candidate.finish_reason {
            log::debug!("Gemini search finished with reason {}", reason);
        }

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| match part {
                        GeminiPart::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let sources = candidate
            .grounding_metadata
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| {
                        let uri = web.uri.filter(|u| !u.is_empty())?;
                        let title = web
                            .title
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string());
                        Some(GroundingSource { title, uri })
                    })
                    .collect()
            })
            .unwrap_or_default();

        SearchAnswer {
            text: if text.is_empty() { NO_ANSWER_TEXT.to_string() } else { text },
            sources,
        }
    }

    fn extract_audio(&self, response: GeminiResponse) -> Result<Vec<u8>, SearchError> {
        let data = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| {
                content.parts.into_iter().find_map(|part| match part {
                    GeminiPart::InlineData { inline_data } => Some(inline_data.data),
                    _ => None,
                })
            })
            .ok_or(SearchError::NoAudio)?;

        decode_base64_audio(&data)
    }

    async fn generate<T: DeserializeOwned>(&self, model: &str, request: &GeminiRequest) -> Result<T, SearchError> {
        let api_key = self.api_key.as_deref().ok_or(SearchError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        log::debug!("Sending Gemini request to {}", url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| SearchError::Api(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(gemini_error) = serde_json::from_str::<GeminiError>(&error_text) {
                log::error!(
                    "Gemini API error {}: {}",
                    gemini_error.error.code,
                    gemini_error.error.message
                );
                return Err(SearchError::Api(gemini_error.error.message));
            }

            let err_msg = format!(
                "Gemini API request failed with status {}: {}",
                status, error_text
            );
            log::error!("{}", err_msg);
            return Err(SearchError::Api(err_msg));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::Parsing(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait]
impl SearchModel for GeminiClient {
    async fn search(
        &self,
        prompt: &str,
        images: &[String],
        method: ReasoningMethod,
    ) -> Result<SearchAnswer, SearchError> {
        let request = self.build_search_request(prompt, images, method);
        log::info!(
            "Searching with {} ({} image(s), method {})",
            self.search_model,
            images.len(),
            method
        );

        let response: GeminiResponse = self.generate(&self.search_model, &request).await?;
        let answer = self.convert_search_response(response);
        log::info!("Search returned {} source(s)", answer.sources.len());
        Ok(answer)
    }
}

#[async_trait]
impl SpeechModel for GeminiClient {
    async fn synthesize(&self, text: &str, voice: VoiceGender) -> Result<Vec<u8>, SearchError> {
        let request = self.build_speech_request(text, voice);
        log::info!("Synthesizing speech with {} ({})", self.tts_model, voice.voice_name());

        let response: GeminiResponse = self.generate(&self.tts_model, &request).await?;
        self.extract_audio(response)
    }
}

/// Create a Gemini client from configuration
pub fn create_client(config: &LlmConfig) -> Arc<GeminiClient> {
    let client = GeminiClient::new(config);
    if !client.has_api_key() {
        log::warn!("No Gemini API key configured; requests will fail until one is set");
    }
    Arc::new(client)
}
