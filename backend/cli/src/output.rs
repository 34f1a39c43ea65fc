//! Terminal output: notes, chat tables, transcripts and streamed text.

use std::io::Write;

use mdchat_core::{ChatRecord, Role, SessionState};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

fn paint(style: &str, text: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        eprintln!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        eprintln!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

fn pad(s: &str, width: usize) -> String {
    format!("{s}{}", " ".repeat(width.saturating_sub(visible_width(s))))
}

/// Renders left-aligned columns with a dashed rule under the header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| visible_width(h)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let line = |cells: Vec<String>| format!("  {}\n", cells.join("  ").trim_end());
    let mut out = String::new();
    out.push_str(&line(
        headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| pad(&paint(BOLD, h), *w))
            .collect(),
    ));
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        out.push_str(&line(
            widths
                .iter()
                .enumerate()
                .map(|(i, w)| pad(row.get(i).map(String::as_str).unwrap_or(""), *w))
                .collect(),
        ));
    }
    out
}

/// One row per chat, newest first; the current chat is starred.
pub fn chat_table(session: &SessionState) -> String {
    let mut chats: Vec<&ChatRecord> = session.chats.iter().collect();
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let rows: Vec<Vec<String>> = chats
        .into_iter()
        .map(|chat| {
            let marker = if session.current_chat == Some(chat.id) {
                paint(GREEN, "*")
            } else {
                String::new()
            };
            vec![
                marker,
                chat.id.to_string(),
                chat.title.clone(),
                chat.messages.len().to_string(),
                chat.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    render_table(&["", "ID", "TITLE", "MESSAGES", "UPDATED"], &rows)
}

/// Plain-text transcript of a chat.
pub fn transcript(chat: &ChatRecord) -> String {
    let mut out = format!("{}\n\n", paint(BOLD, &chat.title));
    for message in &chat.messages {
        let label = match message.role {
            Role::System => paint(DIM, "system"),
            Role::User => paint(CYAN, "you"),
            Role::Assistant => paint(GREEN, "assistant"),
        };
        out.push_str(&format!("{label}: {}\n\n", message.content.trim_end()));
    }
    out
}

/// Writes a chunk and flushes so streamed text appears immediately.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdchat_core::ChatMessage;

    #[test]
    fn strips_ansi() {
        let colored = format!("{GREEN}hello{RESET}");
        assert_eq!(strip_ansi(&colored), "hello");
    }

    #[test]
    fn table_columns_line_up() {
        let table = render_table(
            &["NAME", "N"],
            &[
                vec!["émoji-free".to_string(), "42".to_string()],
                vec!["b".to_string(), "7".to_string()],
            ],
        );
        let lines: Vec<String> = table.lines().map(strip_ansi).collect();
        assert_eq!(lines[0], "  NAME        N");
        assert_eq!(lines[1], "  ----------  --");
        assert_eq!(lines[3], "  b           7");
    }

    #[test]
    fn chat_table_stars_current_chat() {
        let mut session = SessionState::default();
        session.new_chat(Some("first".into()));
        let current = session.new_chat(Some("second".into()));

        let table = strip_ansi(&chat_table(&session));
        let starred = table.lines().find(|l| l.contains('*')).unwrap();
        assert!(starred.contains(&current.to_string()));
        assert!(starred.contains("second"));
    }

    #[test]
    fn transcript_labels_roles() {
        let mut chat = ChatRecord::new(Some("Demo".into()));
        chat.push(ChatMessage::user("hi"));
        chat.push(ChatMessage::assistant("hello\n"));
        let text = strip_ansi(&transcript(&chat));
        assert!(text.starts_with("Demo\n\n"));
        assert!(text.contains("you: hi\n"));
        assert!(text.contains("assistant: hello\n"));
    }

    #[test]
    fn stream_write_appends() {
        let mut buffer = Vec::new();
        stream_write(&mut buffer, "a").unwrap();
        stream_write(&mut buffer, "b").unwrap();
        assert_eq!(buffer, b"ab");
    }
}
