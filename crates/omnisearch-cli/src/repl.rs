//! Interactive chat loop.

use anyhow::Result;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::{self, Write};
use yansi::Paint;

use omnisearch_core::audio::AudioPlayer;
use omnisearch_core::{ChatService, ReasoningMethod, Role, SearchError, VoiceGender, GREETING};

use crate::render;

const COMMANDS: &[&str] = &[
    "/new", "/sessions", "/open", "/delete", "/method", "/voice", "/attach", "/detach", "/images",
    "/sources", "/speak", "/help", "/quit",
];

const HELP: &str = "\
  <text>                 search Google with the pending images
  /new                   start a new search session
  /sessions              list saved sessions
  /open <n|id>           switch to a session
  /delete [n|id]         delete a session (default: current)
  /method <m>            reasoning method: off, irac, crec, ipac
  /voice <v>             narrator voice: female, male
  /attach <path>         attach an image to the next query
  /detach <n>            remove a pending image
  /images                list pending images
  /sources [n]           show the sources of a message (default: last answer)
  /speak [n]             read a message aloud (default: last answer)
  /help                  show this help
  /quit                  exit";

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    New,
    Sessions,
    Open(String),
    Delete(Option<String>),
    Method(ReasoningMethod),
    Voice(VoiceGender),
    Attach(String),
    Detach(usize),
    Images,
    Sources(Option<usize>),
    Speak(Option<usize>),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Prompt(String),
    Command(SlashCommand),
}

/// Parse one line of user input. Numbers given to commands are 1-based.
pub fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(Input::Prompt(line.to_string()));
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (line, None),
    };

    let required = |usage: &str| arg.map(str::to_string).ok_or_else(|| format!("Usage: {}", usage));
    let number = |value: &str| {
        value
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("Expected a positive number, got '{}'", value))
    };

    let command = match name {
        "/new" => SlashCommand::New,
        "/sessions" => SlashCommand::Sessions,
        "/open" => SlashCommand::Open(required("/open <n|id>")?),
        "/delete" => SlashCommand::Delete(arg.map(str::to_string)),
        "/method" => SlashCommand::Method(
            required("/method <off|irac|crec|ipac>")?
                .parse()
                .map_err(|e: SearchError| e.to_string())?,
        ),
        "/voice" => SlashCommand::Voice(
            required("/voice <female|male>")?
                .parse()
                .map_err(|e: SearchError| e.to_string())?,
        ),
        "/attach" => SlashCommand::Attach(required("/attach <path>")?),
        "/detach" => SlashCommand::Detach(number(&required("/detach <n>")?)?),
        "/images" => SlashCommand::Images,
        "/sources" => SlashCommand::Sources(arg.map(number).transpose()?),
        "/speak" => SlashCommand::Speak(arg.map(number).transpose()?),
        "/help" | "/?" => SlashCommand::Help,
        "/quit" | "/exit" => SlashCommand::Quit,
        other => return Err(format!("Unknown command '{}'. Type /help for a list.", other)),
    };

    Ok(Input::Command(command))
}

#[derive(Clone)]
struct CliHelper;

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, Vec::new()));
        }

        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.len() < 2 || !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for CliHelper {}

impl Validator for CliHelper {}

pub struct Repl {
    service: ChatService,
    player: AudioPlayer,
}

impl Repl {
    pub fn new(service: ChatService, player: AudioPlayer) -> Self {
        Self { service, player }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut rl: Editor<CliHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(CliHelper));

        println!("{}", Paint::magenta("=== OmniSearch ===").bold());
        println!("{}", Paint::new("Type a question, or /help for commands.").dimmed());
        println!();
        self.show_current();

        loop {
            let readline = rl.readline(&self.prompt());
            let line = match readline {
                Ok(line) => line,
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("{}", Paint::yellow("CTRL-C detected. Type /quit to exit."));
                    continue;
                }
                Err(rustyline::error::ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}", Paint::red(format!("Error: {:?}", err)));
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            let _ = rl.add_history_entry(line.as_str());

            match parse_input(&line) {
                Ok(Input::Command(SlashCommand::Quit)) => break,
                Ok(Input::Command(command)) => {
                    if let Err(e) = self.handle_command(command).await {
                        println!("{}", Paint::red(e.to_string()));
                    }
                }
                Ok(Input::Prompt(prompt)) => self.submit(&prompt).await,
                Err(message) => println!("{}", Paint::yellow(message)),
            }
        }

        println!("{}", Paint::green("Goodbye!"));
        Ok(())
    }

    fn prompt(&self) -> String {
        let mut tags = Vec::new();
        if let Some(badge) = render::method_badge(self.service.current().reasoning_method) {
            tags.push(badge);
        }
        let pending = self.service.pending_images().len();
        if pending > 0 {
            tags.push(format!("{} image(s)", pending));
        }

        if tags.is_empty() {
            ">> ".to_string()
        } else {
            format!("[{}] >> ", tags.join(", "))
        }
    }

    fn show_current(&self) {
        let session = self.service.current();
        println!("{}", Paint::new(format!("# {}", session.title)).bold());
        println!("{}", render::transcript(session));
    }

    async fn submit(&mut self, prompt: &str) {
        print!("{}", Paint::new("Searching Google...").dimmed());
        let _ = io::stdout().flush();

        let result = self.service.submit(prompt).await;
        print!("\r{:20}\r", "");

        match result {
            Ok(reply) => {
                let number = self.service.current().messages.len();
                println!("{}", render::message(number, &reply));
            }
            Err(SearchError::EmptyPrompt) => {}
            Err(_) => {
                let text = self.service.error().unwrap_or("Search failed").to_string();
                println!("{}", Paint::red(text));
            }
        }
    }

    async fn handle_command(&mut self, command: SlashCommand) -> Result<()> {
        match command {
            SlashCommand::New => {
                self.service.new_chat().await?;
                self.show_current();
            }
            SlashCommand::Sessions => {
                let current = self.service.current().id.clone();
                print!("{}", render::session_list(self.service.sessions(), Some(&current)));
            }
            SlashCommand::Open(target) => {
                self.resolve_and_select(&target)?;
                self.show_current();
            }
            SlashCommand::Delete(target) => {
                let id = match target {
                    Some(target) => self.resolve(&target)?,
                    None => self.service.current().id.clone(),
                };
                let removed = self.service.delete(&id).await?;
                println!("Deleted '{}'.", removed.title);
                self.show_current();
            }
            SlashCommand::Method(method) => {
                self.service.set_reasoning_method(method).await?;
                match render::method_badge(method) {
                    Some(badge) => println!("{} ({})", badge, method.expansion()),
                    None => println!("Reasoning method off."),
                }
            }
            SlashCommand::Voice(voice) => {
                self.service.set_voice(voice);
                println!("Narrator voice: {}", voice);
            }
            SlashCommand::Attach(path) => {
                let count = self.service.attach_image(&path).await?;
                println!("Attached {} ({} pending).", path, count);
            }
            SlashCommand::Detach(n) => match self.service.remove_pending_image(n - 1) {
                Some(_) => println!("Removed image {}.", n),
                None => println!("{}", Paint::yellow(format!("No pending image #{}", n))),
            },
            SlashCommand::Images => {
                let images = self.service.pending_images();
                if images.is_empty() {
                    println!("No pending images.");
                }
                for (i, image) in images.iter().enumerate() {
                    let mime = image
                        .strip_prefix("data:")
                        .and_then(|rest| rest.split(';').next())
                        .unwrap_or("image");
                    println!("  {}. {} ({} bytes encoded)", i + 1, mime, image.len());
                }
            }
            SlashCommand::Sources(n) => {
                let index = self.message_index(n)?;
                print!("{}", render::sources(&self.service.current().messages[index]));
            }
            SlashCommand::Speak(n) => {
                let index = self.message_index(n)?;
                let buffer = self.service.speak(index).await?;
                let path = self.player.play(&buffer).await?;
                if !self.player.can_play() {
                    println!("Saved speech to {}", path.display());
                }
            }
            SlashCommand::Help => println!("{}", HELP),
            SlashCommand::Quit => {}
        }
        Ok(())
    }

    /// A 1-based position in the session list, or an id / id prefix.
    fn resolve(&self, target: &str) -> Result<String> {
        if let Ok(n) = target.parse::<usize>() {
            let session = n
                .checked_sub(1)
                .and_then(|index| self.service.sessions().get(index))
                .ok_or_else(|| SearchError::SessionNotFound(target.to_string()))?;
            return Ok(session.id.clone());
        }
        Ok(self.service.find(target)?.id.clone())
    }

    fn resolve_and_select(&mut self, target: &str) -> Result<()> {
        match target.parse::<usize>() {
            Ok(n) => {
                let index = n
                    .checked_sub(1)
                    .ok_or_else(|| SearchError::SessionNotFound(target.to_string()))?;
                self.service.select_index(index)?;
            }
            Err(_) => {
                let id = self.service.find(target)?.id.clone();
                self.service.select(&id)?;
            }
        }
        Ok(())
    }

    /// Index of message `n` (1-based), or of the latest assistant message.
    fn message_index(&self, n: Option<usize>) -> Result<usize> {
        let messages = &self.service.current().messages;
        let index = match n {
            Some(n) if n <= messages.len() => n - 1,
            Some(n) => anyhow::bail!("No message #{}", n),
            None => messages
                .iter()
                .rposition(|m| m.role == Role::Assistant && m.content != GREETING)
                .or_else(|| messages.len().checked_sub(1))
                .ok_or_else(|| anyhow::anyhow!("No messages yet"))?,
        };
        Ok(index)
    }
}
