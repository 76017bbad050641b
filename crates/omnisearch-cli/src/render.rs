//! Plain-text rendering of sessions, messages and citation sources.

use omnisearch_core::{ChatSession, Message, ReasoningMethod, Role};
use yansi::Paint;

pub fn method_badge(method: ReasoningMethod) -> Option<String> {
    (!method.is_none()).then(|| format!("{} Mode", method.label()))
}

/// One message as shown in the transcript. `number` is 1-based.
pub fn message(number: usize, message: &Message) -> String {
    let mut out = String::new();

    match message.role {
        Role::User => {
            out.push_str(&format!("{} {}\n", Paint::cyan(format!("[{}] You", number)).bold(), message.content));
            if !message.images.is_empty() {
                out.push_str(&format!(
                    "    {}\n",
                    Paint::new(format!("{} image(s) attached", message.images.len())).dimmed()
                ));
            }
        }
        Role::Assistant => {
            let mut header = format!("[{}] Search Results", number);
            if let Some(method) = message.applied_method {
                header.push_str(&format!(" · Reasoning: {}", method.label()));
            }
            out.push_str(&format!("{}\n", Paint::blue(header).bold()));
            for line in message.content.lines() {
                out.push_str(&format!("    {}\n", line));
            }

            let count = message.source_count();
            if count > 0 {
                out.push_str(&format!(
                    "    {}\n",
                    Paint::new(format!("Review {} Sources (/sources {})", count, number)).dimmed()
                ));
            }
        }
    }

    out
}

pub fn transcript(session: &ChatSession) -> String {
    session
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| message(i + 1, m))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Citation cards for one message: title, hostname and full URI.
pub fn sources(message: &Message) -> String {
    match &message.sources {
        Some(sources) if !sources.is_empty() => sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                format!(
                    "  {}. {} ({})\n     {}\n",
                    i + 1,
                    Paint::new(&source.title).bold(),
                    source.hostname(),
                    Paint::new(&source.uri).underline()
                )
            })
            .collect(),
        _ => "  No sources for this message.\n".to_string(),
    }
}

pub fn session_list(sessions: &[ChatSession], current_id: Option<&str>) -> String {
    if sessions.is_empty() {
        return "No sessions found.\n".to_string();
    }

    let mut out = format!(
        "{:<4} {:<10} {:<17} {:<5} {}\n",
        "#", "ID", "Modified", "Mode", "Title"
    );
    for (i, session) in sessions.iter().enumerate() {
        let marker = if Some(session.id.as_str()) == current_id { "*" } else { " " };
        out.push_str(&format!(
            "{:<4} {:<10} {:<17} {:<5} {}\n",
            format!("{}{}", i + 1, marker),
            short_id(&session.id),
            session.last_modified.format("%Y-%m-%d %H:%M"),
            session.reasoning_method.label(),
            session.title
        ));
    }
    out
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Markdown export of a whole session.
pub fn export_markdown(session: &ChatSession) -> String {
    let mut out = format!("# {}\n\n", session.title);
    out.push_str(&format!("- ID: {}\n", session.id));
    out.push_str(&format!("- Last modified: {}\n", session.last_modified.to_rfc3339()));
    out.push_str(&format!("- Reasoning method: {}\n", session.reasoning_method));

    for message in &session.messages {
        let who = match message.role {
            Role::User => "User".to_string(),
            Role::Assistant => match message.applied_method {
                Some(method) => format!("Assistant ({})", method.label()),
                None => "Assistant".to_string(),
            },
        };
        out.push_str(&format!(
            "\n## {} · {}\n\n{}\n",
            who,
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.content
        ));

        if !message.images.is_empty() {
            out.push_str(&format!("\n_{} image(s) attached_\n", message.images.len()));
        }

        if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
            out.push_str("\nSources:\n");
            for source in sources {
                out.push_str(&format!("- [{}]({})\n", source.title, source.uri));
            }
        }
    }

    out
}
