//! Non-interactive subcommands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use omnisearch_core::audio::{decode_pcm16, write_wav, AudioPlayer};
use omnisearch_core::chat::find_session;
use omnisearch_core::llm::{GeminiClient, SpeechModel};
use omnisearch_core::{ChatService, OmniConfig, ReasoningMethod, SessionStore, VoiceGender};

use crate::render;

pub async fn open_service(config: &OmniConfig, client: Arc<GeminiClient>) -> Result<ChatService> {
    let store = SessionStore::new(&config.storage.path);
    let service = ChatService::open(store, client.clone(), client, &config.audio)
        .await
        .with_context(|| format!("Failed to open sessions at {}", config.storage.path.display()))?;
    Ok(service)
}

/// One exchange in a fresh session. Prints the answer and its sources.
pub async fn ask(
    config: &OmniConfig,
    client: Arc<GeminiClient>,
    prompt: &str,
    images: &[PathBuf],
    method: ReasoningMethod,
    speak: bool,
) -> Result<()> {
    let mut service = open_service(config, client).await?;
    service.fresh_chat().await?;
    service.set_reasoning_method(method).await?;

    for image in images {
        service
            .attach_image(image)
            .await
            .with_context(|| format!("Failed to attach {}", image.display()))?;
    }

    let reply = service.submit(prompt).await?;
    println!("{}", reply.content);

    if let Some(sources) = reply.sources.as_ref().filter(|s| !s.is_empty()) {
        println!("\nSources:");
        for (i, source) in sources.iter().enumerate() {
            println!("  {}. {} ({}) {}", i + 1, source.title, source.hostname(), source.uri);
        }
    }

    if speak {
        let buffer = service.speak_text(&reply.content).await?;
        let path = AudioPlayer::new(&config.audio).play(&buffer).await?;
        log::info!("Speech written to {}", path.display());
    }

    Ok(())
}

pub async fn list_sessions(store: &SessionStore) -> Result<()> {
    let sessions = store.load().await?;
    print!("{}", render::session_list(&sessions, None));
    Ok(())
}

pub async fn show_session(store: &SessionStore, id: &str) -> Result<()> {
    let sessions = store.load().await?;
    let session = find_session(&sessions, id)?;

    println!("# {}", session.title);
    println!(
        "{} · {} · Reasoning: {}\n",
        session.id,
        session.last_modified.format("%Y-%m-%d %H:%M"),
        session.reasoning_method.label()
    );
    println!("{}", render::transcript(session));

    for (i, message) in session.messages.iter().enumerate() {
        if message.source_count() > 0 {
            println!("Sources for [{}]:", i + 1);
            print!("{}", render::sources(message));
        }
    }
    Ok(())
}

pub async fn delete_session(config: &OmniConfig, client: Arc<GeminiClient>, id: &str) -> Result<()> {
    let store = SessionStore::new(&config.storage.path);
    let id = find_session(&store.load().await?, id)?.id.clone();

    let mut service = open_service(config, client).await?;
    let removed = service.delete(&id).await?;
    println!("Deleted session {} ({})", removed.id, removed.title);
    Ok(())
}

pub fn default_export_path(id: &str) -> PathBuf {
    PathBuf::from(format!("session_{}.md", render::short_id(id)))
}

pub async fn export_session(store: &SessionStore, id: &str, path: Option<&Path>) -> Result<PathBuf> {
    let sessions = store.load().await?;
    let session = find_session(&sessions, id)?;

    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_export_path(&session.id));
    tokio::fs::write(&path, render::export_markdown(session))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Exported '{}' to {}", session.title, path.display());
    Ok(path)
}

/// Synthesize `text` and save it as a WAV file, playing it when a player is
/// configured. Sessions are left untouched.
pub async fn speak(
    config: &OmniConfig,
    speech: &dyn SpeechModel,
    text: &str,
    voice: Option<VoiceGender>,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let voice = voice.unwrap_or(config.audio.voice);
    let pcm = speech.synthesize(text, voice).await?;
    let buffer = decode_pcm16(&pcm, config.audio.sample_rate, config.audio.channels)?;
    log::info!(
        "Synthesized {:.1}s of speech with {}",
        buffer.duration().as_secs_f32(),
        voice.voice_name()
    );

    let path = match output {
        Some(path) => {
            write_wav(&buffer, path).await?;
            path.to_path_buf()
        }
        None => AudioPlayer::new(&config.audio).play(&buffer).await?,
    };

    println!("Saved speech to {}", path.display());
    Ok(path)
}
