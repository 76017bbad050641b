use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::PathBuf;

use omnisearch_core::audio::AudioPlayer;
use omnisearch_core::config::{load_config, LoggingConfig};
use omnisearch_core::llm::providers::create_client;
use omnisearch_core::{ReasoningMethod, SessionStore, VoiceGender};

mod commands;
mod render;
mod repl;

#[derive(Parser, Debug)]
#[clap(name = "omnisearch", author, version, about = "Grounded Google search chat in the terminal")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, default_value = "omnisearch.yaml", help = "Path to the YAML configuration file")]
    config: PathBuf,

    #[clap(long, short, help = "Log level (overrides logging.level from the configuration)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive search chat (default command)
    Chat,
    /// Run a single search in a new session and print the answer
    Ask {
        prompt: String,

        #[clap(long = "image", short, help = "Image to attach (repeatable)")]
        images: Vec<PathBuf>,

        #[clap(long, short, default_value = "off", help = "Reasoning method: off, irac, crec, ipac")]
        method: ReasoningMethod,

        #[clap(long, help = "Read the answer aloud")]
        speak: bool,
    },
    /// Manage saved sessions
    Sessions {
        #[clap(subcommand)]
        action: SessionCommands,
    },
    /// Convert text to speech
    Speak {
        text: String,

        #[clap(long, help = "Narrator voice: female or male")]
        voice: Option<VoiceGender>,

        #[clap(long, short, help = "WAV file to write")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// List saved sessions, most recent first
    List,
    /// Print a session transcript
    Show { id: String },
    /// Delete a session
    Delete { id: String },
    /// Export a session as Markdown
    Export {
        id: String,

        #[clap(long, short)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    better_panic::install();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let command = cli.command.unwrap_or(Commands::Chat);
    let interactive = matches!(command, Commands::Chat | Commands::Ask { .. });
    init_logging(&config.logging, cli.log_level.as_deref(), interactive)?;

    let client = create_client(&config.llm);

    match command {
        Commands::Chat => {
            let service = commands::open_service(&config, client).await?;
            repl::Repl::new(service, AudioPlayer::new(&config.audio)).run().await
        }
        Commands::Ask {
            prompt,
            images,
            method,
            speak,
        } => commands::ask(&config, client, &prompt, &images, method, speak).await,
        Commands::Sessions { action } => {
            let store = SessionStore::new(&config.storage.path);
            match action {
                SessionCommands::List => commands::list_sessions(&store).await,
                SessionCommands::Show { id } => commands::show_session(&store, &id).await,
                SessionCommands::Delete { id } => commands::delete_session(&config, client, &id).await,
                SessionCommands::Export { id, path } => {
                    commands::export_session(&store, &id, path.as_deref()).await.map(|_| ())
                }
            }
        }
        Commands::Speak { text, voice, output } => {
            commands::speak(&config, client.as_ref(), &text, voice, output.as_deref())
                .await
                .map(|_| ())
        }
    }
}

/// Interactive modes log to a file so output stays readable; everything else
/// logs to stderr.
fn init_logging(logging: &LoggingConfig, override_level: Option<&str>, to_file: bool) -> Result<()> {
    let level = override_level
        .unwrap_or(&logging.level)
        .parse()
        .unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    if to_file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", logging.file.display(), e))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}
