//! Core library for a grounded web-search chat client.
//!
//! The client collects text and image queries, forwards them to a hosted
//! generative model that answers with web search grounding, keeps the
//! resulting conversations on local disk and can turn answers into speech.
//!
//! # Architecture Overview
//!
//! - **Data model**: sessions, messages and citation sources in [`core_types`]
//! - **Provider boundary**: the [`llm::SearchModel`] and [`llm::SpeechModel`] traits
//!   and their Gemini implementation
//! - **Reasoning methods**: system instruction assembly in [`instructions`]
//! - **Persistence**: the JSON session store in [`storage`]
//! - **Session state**: the [`chat::ChatService`] driving every exchange
//! - **Media glue**: PCM speech decoding in [`audio`] and image attachments in [`images`]

pub mod audio;
pub mod chat;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod images;
pub mod instructions;
pub mod llm;
pub mod storage;

pub use chat::ChatService;
pub use config::*;
pub use core_types::*;
pub use errors::SearchError;
pub use storage::SessionStore;

#[cfg(test)]
pub mod test_utils;
