//! Block Intermediate Representation
//!
//! A single forward scan classifies each line of Markdown once and groups
//! lines into blocks. The fallback renderer consumes this stream.

use serde::{Deserialize, Serialize};

use crate::code_block::CodeBlockAnalyzer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    List { ordered: bool, items: Vec<String> },
    /// Body is raw; escaping happens at render time.
    CodeBlock { language: Option<String>, body: String },
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Blockquote { lines: Vec<String> },
    Paragraph { lines: Vec<String> },
}

struct ListItem<'a> {
    ordered: bool,
    text: &'a str,
}

/// Scans Markdown into blocks. Unrecognized syntax becomes paragraph text.
pub fn scan_blocks(markdown: &str) -> Vec<Block> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some((width, language)) = fence_open(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut body = Vec::new();
            i += 1;
            while i < lines.len() && !is_fence_close(lines[i], width) {
                body.push(lines[i]);
                i += 1;
            }
            // Step past the closing fence; an unclosed fence ends the input.
            i += 1;
            blocks.push(Block::CodeBlock {
                language,
                body: body.join("\n"),
            });
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            i += 1;
            continue;
        }

        if line.contains('|') && i + 1 < lines.len() && is_table_separator(lines[i + 1]) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let header = split_row(line);
            let width = header.len();
            i += 2;
            let mut rows = Vec::new();
            while i < lines.len() && lines[i].contains('|') && !lines[i].trim().is_empty() {
                let mut row = split_row(lines[i]);
                row.resize(width, String::new());
                rows.push(row);
                i += 1;
            }
            blocks.push(Block::Table { header, rows });
            continue;
        }

        if let Some((level, text)) = heading(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level,
                text: text.to_string(),
            });
            i += 1;
            continue;
        }

        if quote_line(line).is_some() {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut quoted = Vec::new();
            while let Some(text) = lines.get(i).and_then(|l| quote_line(l)) {
                if !text.is_empty() {
                    quoted.push(text.to_string());
                }
                i += 1;
            }
            blocks.push(Block::Blockquote { lines: quoted });
            continue;
        }

        if let Some(first) = list_item(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let ordered = first.ordered;
            let mut items = vec![first.text.to_string()];
            i += 1;
            loop {
                if let Some(next) = lines.get(i).and_then(|l| list_item(l)) {
                    if next.ordered == ordered {
                        items.push(next.text.to_string());
                        i += 1;
                        continue;
                    }
                    break;
                }
                // A loose list: blank lines followed by another item of the
                // same kind keep the list open.
                let mut j = i;
                while j < lines.len() && lines[j].trim().is_empty() {
                    j += 1;
                }
                let continues = j > i
                    && lines
                        .get(j)
                        .and_then(|l| list_item(l))
                        .is_some_and(|next| next.ordered == ordered);
                if !continues {
                    break;
                }
                i = j;
            }
            blocks.push(Block::List { ordered, items });
            continue;
        }

        paragraph.push(line.trim().to_string());
        i += 1;
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(paragraph: &mut Vec<String>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph {
            lines: std::mem::take(paragraph),
        });
    }
}

fn backtick_run(line: &str) -> (usize, &str) {
    let trimmed = line.trim_start();
    let rest = trimmed.trim_start_matches('`');
    (trimmed.len() - rest.len(), rest)
}

/// Opening fence: three or more backticks, then an optional info string.
fn fence_open(line: &str) -> Option<(usize, Option<String>)> {
    let (width, info) = backtick_run(line);
    (width >= 3).then(|| (width, CodeBlockAnalyzer::fence_language(info)))
}

/// A fence closes on a bare run at least as long as the one that opened it.
fn is_fence_close(line: &str, width: usize) -> bool {
    let (run, rest) = backtick_run(line);
    run >= width && rest.trim().is_empty()
}

fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.contains('|') || !trimmed.contains('-') {
        return false;
    }
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').all(|cell| {
        let cell = cell.trim();
        let cell = cell.strip_prefix(':').unwrap_or(cell);
        let cell = cell.strip_suffix(':').unwrap_or(cell);
        !cell.is_empty() && cell.chars().all(|c| c == '-')
    })
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let text = rest.trim();
    // Optional closing sequence, only when separated by whitespace.
    let without_closing = text.trim_end_matches('#');
    let text = if without_closing.is_empty() {
        ""
    } else if without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end()
    } else {
        text
    };
    Some((level as u8, text))
}

fn quote_line(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('>')?;
    Some(rest.trim())
}

fn list_item(line: &str) -> Option<ListItem<'_>> {
    let trimmed = line.trim_start();

    if let Some(rest) = trimmed.strip_prefix(['-', '*', '+']) {
        if rest.starts_with([' ', '\t']) && !rest.trim().is_empty() {
            return Some(ListItem {
                ordered: false,
                text: rest.trim(),
            });
        }
        return None;
    }

    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = trimmed[digits..].strip_prefix(['.', ')'])?;
    if rest.starts_with([' ', '\t']) && !rest.trim().is_empty() {
        Some(ListItem {
            ordered: true,
            text: rest.trim(),
        })
    } else {
        None
    }
}
