//! Session and exchange state for the chat client.
//!
//! [`ChatService`] owns the session list, which session is current, the
//! request status, pending image attachments and the selected narrator voice.
//! Every mutation of a session is written through to the [`SessionStore`].

use std::path::Path;
use std::sync::Arc;

use crate::audio::{decode_pcm16, AudioBuffer};
use crate::config::AudioConfig;
use crate::core_types::{
    AppStatus, ChatSession, Message, ReasoningMethod, VoiceGender, IMAGE_ONLY_PROMPT,
};
use crate::errors::SearchError;
use crate::images::load_image;
use crate::llm::{SearchModel, SpeechModel};
use crate::storage::SessionStore;

const TITLE_CHARS: usize = 20;

/// Resolve a full session id or a unique id prefix.
pub fn find_session<'a>(sessions: &'a [ChatSession], id_or_prefix: &str) -> Result<&'a ChatSession, SearchError> {
    if let Some(session) = sessions.iter().find(|s| s.id == id_or_prefix) {
        return Ok(session);
    }

    let mut matches = sessions.iter().filter(|s| s.id.starts_with(id_or_prefix));
    match (matches.next(), matches.next()) {
        (Some(session), None) if !id_or_prefix.is_empty() => Ok(session),
        _ => Err(SearchError::SessionNotFound(id_or_prefix.to_string())),
    }
}

pub struct ChatService {
    search: Arc<dyn SearchModel>,
    speech: Arc<dyn SpeechModel>,
    store: SessionStore,
    sample_rate: u32,
    channels: u16,
    sessions: Vec<ChatSession>,
    current_id: String,
    status: AppStatus,
    error: Option<String>,
    pending_images: Vec<String>,
    voice: VoiceGender,
}

impl ChatService {
    /// Load stored sessions and select the most recent one, starting a new
    /// chat when nothing was stored.
    pub async fn open(
        store: SessionStore,
        search: Arc<dyn SearchModel>,
        speech: Arc<dyn SpeechModel>,
        audio: &AudioConfig,
    ) -> Result<Self, SearchError> {
        let sessions = store.load().await?;
        let current_id = sessions.first().map(|s| s.id.clone()).unwrap_or_default();

        let mut service = Self {
            search,
            speech,
            store,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            sessions,
            current_id,
            status: AppStatus::Idle,
            error: None,
            pending_images: Vec::new(),
            voice: audio.voice,
        };

        if service.sessions.is_empty() {
            service.new_chat().await?;
        }

        Ok(service)
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn current(&self) -> &ChatSession {
        self.sessions
            .iter()
            .find(|s| s.id == self.current_id)
            .unwrap_or(&self.sessions[0])
    }

    fn current_mut(&mut self) -> &mut ChatSession {
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == self.current_id)
            .unwrap_or(0);
        &mut self.sessions[index]
    }

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn pending_images(&self) -> &[String] {
        &self.pending_images
    }

    pub fn voice(&self) -> VoiceGender {
        self.voice
    }

    pub fn set_voice(&mut self, voice: VoiceGender) {
        self.voice = voice;
    }

    async fn persist(&self) -> Result<(), SearchError> {
        self.store.save(&self.sessions).await
    }

    /// Start a fresh session at the front of the list and select it.
    pub async fn new_chat(&mut self) -> Result<&ChatSession, SearchError> {
        let session = ChatSession::new();
        log::info!("Created session {}", session.id);
        self.current_id = session.id.clone();
        self.sessions.insert(0, session);
        self.persist().await?;
        Ok(&self.sessions[0])
    }

    /// Select a session holding nothing but the greeting, starting a new
    /// chat when the current one already has an exchange.
    pub async fn fresh_chat(&mut self) -> Result<&ChatSession, SearchError> {
        if self.current().is_blank() {
            return Ok(self.current());
        }
        self.new_chat().await
    }

    pub fn select(&mut self, id: &str) -> Result<&ChatSession, SearchError> {
        let session = self
            .sessions
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SearchError::SessionNotFound(id.to_string()))?;
        self.current_id = session.id.clone();
        Ok(session)
    }

    pub fn select_index(&mut self, index: usize) -> Result<&ChatSession, SearchError> {
        let id = self
            .sessions
            .get(index)
            .map(|s| s.id.clone())
            .ok_or_else(|| SearchError::SessionNotFound(format!("#{}", index + 1)))?;
        self.select(&id)
    }

    pub fn find(&self, id_or_prefix: &str) -> Result<&ChatSession, SearchError> {
        find_session(&self.sessions, id_or_prefix)
    }

    /// Remove a session. Deleting the current one selects the next session,
    /// or starts a new chat when none remain.
    pub async fn delete(&mut self, id: &str) -> Result<ChatSession, SearchError> {
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SearchError::SessionNotFound(id.to_string()))?;
        let removed = self.sessions.remove(index);
        log::info!("Deleted session {}", removed.id);

        if self.sessions.is_empty() {
            self.new_chat().await?;
        } else {
            if removed.id == self.current_id {
                self.current_id = self.sessions[index.min(self.sessions.len() - 1)].id.clone();
            }
            self.persist().await?;
        }

        Ok(removed)
    }

    pub async fn set_reasoning_method(&mut self, method: ReasoningMethod) -> Result<(), SearchError> {
        let session = self.current_mut();
        session.reasoning_method = method;
        session.touch();
        self.persist().await
    }

    pub async fn attach_image<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, SearchError> {
        let image = load_image(path).await?;
        self.pending_images.push(image);
        Ok(self.pending_images.len())
    }

    /// Queue an already encoded `data:` URL.
    pub fn attach_data_url(&mut self, image: String) {
        self.pending_images.push(image);
    }

    pub fn remove_pending_image(&mut self, index: usize) -> Option<String> {
        (index < self.pending_images.len()).then(|| self.pending_images.remove(index))
    }

    pub fn clear_pending_images(&mut self) {
        self.pending_images.clear();
    }

    /// Send the input and any pending images to the search model.
    ///
    /// The user message is kept even when the search fails; the failure is
    /// recorded as the service error and returned.
    pub async fn submit(&mut self, input: &str) -> Result<Message, SearchError> {
        let prompt = input.trim();
        if prompt.is_empty() && self.pending_images.is_empty() {
            return Err(SearchError::EmptyPrompt);
        }
        if self.status == AppStatus::Loading {
            return Err(SearchError::RequestInFlight);
        }

        let images = std::mem::take(&mut self.pending_images);
        let content = if prompt.is_empty() { IMAGE_ONLY_PROMPT } else { prompt };
        self.error = None;

        let session = self.current_mut();
        let method = session.reasoning_method;
        session.push(Message::user(content, images.clone()));
        if session.messages.len() == 2 {
            session.title = content.chars().take(TITLE_CHARS).collect();
        }
        if let Err(e) = self.persist().await {
            return Err(self.fail(e));
        }

        self.status = AppStatus::Loading;
        let result = self.search.search(content, &images, method).await;
        let message = match result {
            Ok(answer) => Message::from_answer(answer, method),
            Err(e) => {
                log::error!("Search failed: {}", e);
                return Err(self.fail(e));
            }
        };

        self.current_mut().push(message.clone());
        if let Err(e) = self.persist().await {
            return Err(self.fail(e));
        }
        self.status = AppStatus::Idle;
        Ok(message)
    }

    fn fail(&mut self, error: SearchError) -> SearchError {
        self.error = Some(error.to_string());
        self.status = AppStatus::Error;
        error
    }

    /// Synthesize a message of the current session with the selected voice.
    pub async fn speak(&self, message_index: usize) -> Result<AudioBuffer, SearchError> {
        let message = self
            .current()
            .messages
            .get(message_index)
            .ok_or_else(|| SearchError::Audio(format!("No message #{}", message_index + 1)))?;
        self.speak_text(&message.content).await
    }

    pub async fn speak_text(&self, text: &str) -> Result<AudioBuffer, SearchError> {
        let pcm = self.speech.synthesize(text, self.voice).await?;
        decode_pcm16(&pcm, self.sample_rate, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Role, GREETING, NEW_SESSION_TITLE};
    use crate::test_utils::{MockSearchModel, MockSpeechModel};

    async fn service_in(dir: &Path, search: Arc<MockSearchModel>) -> ChatService {
        ChatService::open(
            SessionStore::new(dir.join("sessions.json")),
            search,
            Arc::new(MockSpeechModel::new(vec![0, 0, 0, 64])),
            &AudioConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_first_chat() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;

        assert_eq!(service.sessions().len(), 1);
        let current = service.current();
        assert_eq!(current.title, NEW_SESSION_TITLE);
        assert_eq!(current.messages[0].content, GREETING);
        assert_eq!(service.status(), AppStatus::Idle);

        let stored = SessionStore::new(dir.path().join("sessions.json")).load().await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_selects_first_stored_session() {
        let dir = tempfile::tempdir().unwrap();
        let first_id = {
            let mut service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;
            service.new_chat().await.unwrap();
            service.sessions()[0].id.clone()
        };

        let service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;
        assert_eq!(service.sessions().len(), 2);
        assert_eq!(service.current().id, first_id);
    }

    #[tokio::test]
    async fn test_submit_appends_exchange_and_titles_session() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(MockSearchModel::new());
        let mut service = service_in(dir.path(), search.clone()).await;

        let reply = service
            .submit("  What is the statute of limitations for fraud?  ")
            .await
            .unwrap();

        let session = service.current();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, Role::User);
        assert_eq!(session.messages[1].content, "What is the statute of limitations for fraud?");
        assert_eq!(session.messages[2], reply);
        assert_eq!(session.title, "What is the statute ");
        assert_eq!(reply.source_count(), 1);
        assert_eq!(reply.applied_method, None);
        assert_eq!(service.status(), AppStatus::Idle);

        service.submit("And in California?").await.unwrap();
        assert_eq!(service.current().title, "What is the statute ");
        assert_eq!(search.call_count(), 2);

        let stored = SessionStore::new(dir.path().join("sessions.json")).load().await.unwrap();
        assert_eq!(stored[0].messages.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_submit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(MockSearchModel::new());
        let mut service = service_in(dir.path(), search.clone()).await;

        assert_eq!(service.submit("   ").await.unwrap_err(), SearchError::EmptyPrompt);
        assert_eq!(service.current().messages.len(), 1);
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_only_submit() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(MockSearchModel::new());
        let mut service = service_in(dir.path(), search.clone()).await;

        service.attach_data_url("data:image/png;base64,AAAA".to_string());
        service.submit("").await.unwrap();

        let user = &service.current().messages[1];
        assert_eq!(user.content, IMAGE_ONLY_PROMPT);
        assert_eq!(user.images, vec!["data:image/png;base64,AAAA".to_string()]);
        assert!(service.pending_images().is_empty());
        assert_eq!(service.current().title, IMAGE_ONLY_PROMPT);

        let request = &search.requests()[0];
        assert_eq!(request.prompt, IMAGE_ONLY_PROMPT);
        assert_eq!(request.images.len(), 1);
    }

    #[tokio::test]
    async fn test_method_captured_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(MockSearchModel::new());
        let mut service = service_in(dir.path(), search.clone()).await;

        service.set_reasoning_method(ReasoningMethod::Ipac).await.unwrap();
        let reply = service.submit("Is jaywalking illegal?").await.unwrap();

        assert_eq!(reply.applied_method, Some(ReasoningMethod::Ipac));
        assert_eq!(search.requests()[0].method, ReasoningMethod::Ipac);
    }

    #[tokio::test]
    async fn test_failed_search_keeps_user_message() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(MockSearchModel::with_error(SearchError::MissingApiKey));
        let mut service = service_in(dir.path(), search).await;

        let err = service.submit("hello").await.unwrap_err();
        assert_eq!(err, SearchError::MissingApiKey);
        assert_eq!(service.status(), AppStatus::Error);
        assert_eq!(
            service.error(),
            Some("Search Service Configuration Error: Missing Authorization.")
        );
        assert_eq!(service.current().messages.len(), 2);
        assert_eq!(service.current().messages[1].content, "hello");
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_submit() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(MockSearchModel::failing_once(SearchError::Api("boom".to_string())));
        let mut service = service_in(dir.path(), search).await;

        assert!(service.submit("first").await.is_err());
        assert_eq!(service.error(), Some("boom"));

        service.submit("second").await.unwrap();
        assert_eq!(service.error(), None);
        assert_eq!(service.status(), AppStatus::Idle);
    }

    #[tokio::test]
    async fn test_mutations_advance_last_modified() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;
        let created = service.current().last_modified;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service.set_reasoning_method(ReasoningMethod::Irac).await.unwrap();
        let after_method = service.current().last_modified;
        assert!(after_method > created);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service.submit("Is a handshake deal enforceable?").await.unwrap();
        let after_submit = service.current().last_modified;
        assert!(after_submit > after_method);

        let stored = SessionStore::new(dir.path().join("sessions.json")).load().await.unwrap();
        assert_eq!(stored[0].last_modified, after_submit);
    }

    #[tokio::test]
    async fn test_failed_save_is_recorded_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let search = Arc::new(MockSearchModel::new());
        let mut service = ChatService::open(
            SessionStore::new(data_dir.join("sessions.json")),
            search.clone(),
            Arc::new(MockSpeechModel::new(Vec::new())),
            &AudioConfig::default(),
        )
        .await
        .unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, "not a directory").unwrap();

        let err = service.submit("hello").await.unwrap_err();
        assert!(matches!(err, SearchError::Storage(_)));
        assert_eq!(service.status(), AppStatus::Error);
        assert_eq!(service.error(), Some(err.to_string().as_str()));
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_chat_reuses_blank_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;
        let blank = service.current().id.clone();

        assert_eq!(service.fresh_chat().await.unwrap().id, blank);
        assert_eq!(service.sessions().len(), 1);

        service.submit("first question").await.unwrap();
        let fresh = service.fresh_chat().await.unwrap().id.clone();
        assert_ne!(fresh, blank);
        assert_eq!(service.sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_select_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;
        let oldest = service.current().id.clone();
        service.new_chat().await.unwrap();
        let newest = service.current().id.clone();
        assert_eq!(service.sessions()[0].id, newest);

        service.select_index(1).unwrap();
        assert_eq!(service.current().id, oldest);
        assert!(service.select("missing").is_err());
        assert_eq!(service.find(&newest[..8]).unwrap().id, newest);

        service.delete(&oldest).await.unwrap();
        assert_eq!(service.current().id, newest);

        service.delete(&newest).await.unwrap();
        assert_eq!(service.sessions().len(), 1);
        assert_ne!(service.current().id, newest);
    }

    #[tokio::test]
    async fn test_pending_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_in(dir.path(), Arc::new(MockSearchModel::new())).await;

        service.attach_data_url("a".to_string());
        service.attach_data_url("b".to_string());
        assert_eq!(service.remove_pending_image(0), Some("a".to_string()));
        assert_eq!(service.remove_pending_image(5), None);
        assert_eq!(service.pending_images(), ["b".to_string()]);
        service.clear_pending_images();
        assert!(service.pending_images().is_empty());
    }

    #[tokio::test]
    async fn test_speak_decodes_with_configured_voice() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(MockSpeechModel::new(vec![0, 0, 0, 64]));
        let mut service = ChatService::open(
            SessionStore::new(dir.path().join("sessions.json")),
            Arc::new(MockSearchModel::new()),
            speech.clone(),
            &AudioConfig::default(),
        )
        .await
        .unwrap();
        service.set_voice(VoiceGender::Male);

        let buffer = service.speak(0).await.unwrap();
        assert_eq!(buffer.sample_rate, 24000);
        assert_eq!(buffer.channels[0], vec![0.0, 0.5]);
        assert_eq!(speech.requests(), vec![(GREETING.to_string(), VoiceGender::Male)]);

        assert!(service.speak(9).await.is_err());
    }
}
