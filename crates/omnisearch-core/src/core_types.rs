//! Core type definitions for conversations and grounded answers
//!
//! These records are what the client persists and renders. They carry no
//! behaviour beyond small helpers: messages are append-only once they land in
//! a session, and session ids are unique UUIDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SearchError;

pub const NEW_SESSION_TITLE: &str = "New Search";
pub const GREETING: &str = "I'm ready to search Google for you. I can now use specific legal reasoning methods like IRAC, CREC, or IPAC if you're asking legal questions.";
pub const IMAGE_ONLY_PROMPT: &str = "Analyze this image";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Response-structuring template forwarded to the model as an instruction.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReasoningMethod {
    #[default]
    None,
    Irac,
    Crec,
    Ipac,
}

impl ReasoningMethod {
    pub const ALL: [ReasoningMethod; 4] = [
        ReasoningMethod::None,
        ReasoningMethod::Irac,
        ReasoningMethod::Crec,
        ReasoningMethod::Ipac,
    ];

    pub fn is_none(&self) -> bool {
        *self == ReasoningMethod::None
    }

    /// Short name used in menus; `OFF` for [`ReasoningMethod::None`].
    pub fn label(&self) -> &'static str {
        match self {
            ReasoningMethod::None => "OFF",
            ReasoningMethod::Irac => "IRAC",
            ReasoningMethod::Crec => "CREC",
            ReasoningMethod::Ipac => "IPAC",
        }
    }

    pub fn expansion(&self) -> &'static str {
        match self {
            ReasoningMethod::None => "No structure",
            ReasoningMethod::Irac => "Issue, Rule, Analysis, Conclusion",
            ReasoningMethod::Crec => "Conclusion, Rule, Explanation, Conclusion",
            ReasoningMethod::Ipac => "Issue, Principle, Application, Conclusion",
        }
    }
}

impl fmt::Display for ReasoningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReasoningMethod::None => "NONE",
            other => other.label(),
        };
        f.write_str(name)
    }
}

impl FromStr for ReasoningMethod {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" | "OFF" => Ok(ReasoningMethod::None),
            "IRAC" => Ok(ReasoningMethod::Irac),
            "CREC" => Ok(ReasoningMethod::Crec),
            "IPAC" => Ok(ReasoningMethod::Ipac),
            other => Err(SearchError::Config(format!(
                "Unknown reasoning method '{}'. Expected one of: off, irac, crec, ipac",
                other.to_ascii_lowercase()
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
}

impl VoiceGender {
    /// Prebuilt provider voice for this narrator.
    pub fn voice_name(&self) -> &'static str {
        match self {
            VoiceGender::Female => "Kore",
            VoiceGender::Male => "Fenrir",
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceGender::Female => write!(f, "Kore (Female)"),
            VoiceGender::Male => write!(f, "Fenrir (Male)"),
        }
    }
}

impl FromStr for VoiceGender {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "kore" => Ok(VoiceGender::Female),
            "male" | "fenrir" => Ok(VoiceGender::Male),
            other => Err(SearchError::Config(format!(
                "Unknown voice '{}'. Expected female or male",
                other
            ))),
        }
    }
}

/// A web citation attached to a grounded answer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

impl GroundingSource {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }

    /// Host part of the URI, or the URI itself when it does not parse.
    pub fn hostname(&self) -> String {
        reqwest::Url::parse(&self.uri)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.uri.clone())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Attached images as `data:` URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<GroundingSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_method: Option<ReasoningMethod>,
}

impl Message {
    pub fn user(content: &str, images: Vec<String>) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            images,
            sources: None,
            applied_method: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            timestamp: Utc::now(),
            images: Vec::new(),
            sources: None,
            applied_method: None,
        }
    }

    /// Assistant message built from a grounded answer. The method is only
    /// recorded when one was actually applied.
    pub fn from_answer(answer: SearchAnswer, method: ReasoningMethod) -> Self {
        Self {
            sources: Some(answer.sources),
            applied_method: (!method.is_none()).then_some(method),
            ..Self::assistant(&answer.text)
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub reasoning_method: ReasoningMethod,
}

impl ChatSession {
    /// Fresh session holding only the assistant greeting.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: NEW_SESSION_TITLE.to_string(),
            messages: vec![Message::assistant(GREETING)],
            last_modified: Utc::now(),
            reasoning_method: ReasoningMethod::None,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// True until the first user message lands.
    pub fn is_blank(&self) -> bool {
        self.messages.iter().all(|m| m.role == Role::Assistant)
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Text and citations returned by the search model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchAnswer {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_method_parsing() {
        assert_eq!("irac".parse::<ReasoningMethod>().unwrap(), ReasoningMethod::Irac);
        assert_eq!("OFF".parse::<ReasoningMethod>().unwrap(), ReasoningMethod::None);
        assert_eq!(" Ipac ".parse::<ReasoningMethod>().unwrap(), ReasoningMethod::Ipac);
        assert!("socratic".parse::<ReasoningMethod>().is_err());
    }

    #[test]
    fn test_reasoning_method_serializes_uppercase() {
        let json = serde_json::to_string(&ReasoningMethod::Crec).unwrap();
        assert_eq!(json, "\"CREC\"");
        let parsed: ReasoningMethod = serde_json::from_str("\"NONE\"").unwrap();
        assert_eq!(parsed, ReasoningMethod::None);
    }

    #[test]
    fn test_voice_names() {
        assert_eq!(VoiceGender::default().voice_name(), "Kore");
        assert_eq!("male".parse::<VoiceGender>().unwrap().voice_name(), "Fenrir");
    }

    #[test]
    fn test_hostname_falls_back_to_uri() {
        let source = GroundingSource::new("Rust", "https://www.rust-lang.org/learn");
        assert_eq!(source.hostname(), "www.rust-lang.org");

        let broken = GroundingSource::new("Broken", "not a url");
        assert_eq!(broken.hostname(), "not a url");
    }

    #[test]
    fn test_new_session_has_greeting() {
        let session = ChatSession::new();
        assert_eq!(session.title, NEW_SESSION_TITLE);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::Assistant);
        assert_eq!(session.reasoning_method, ReasoningMethod::None);
        assert_ne!(ChatSession::new().id, session.id);
        assert!(session.is_blank());
    }

    #[test]
    fn test_applied_method_omitted_for_none() {
        let answer = SearchAnswer {
            text: "Answer".to_string(),
            sources: vec![],
        };
        let plain = Message::from_answer(answer.clone(), ReasoningMethod::None);
        assert_eq!(plain.applied_method, None);
        assert_eq!(plain.source_count(), 0);

        let structured = Message::from_answer(answer, ReasoningMethod::Irac);
        assert_eq!(structured.applied_method, Some(ReasoningMethod::Irac));
    }
}
