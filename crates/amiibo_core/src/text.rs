//! Line-oriented `.nfc` dumps (Flipper NFC device files).
//!
//! Only `Version:`, `UID:` and `Page <n>:` lines are interpreted. Every other
//! line is carried through untouched so a re-encode only differs on the lines
//! whose values changed.

use std::io;

use crate::image::TagImage;
use crate::uid::spaced_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    Version(u32),
    Uid(String),
    Page(u16, Vec<u8>),
    Other,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub image: TagImage,
    original: TagImage,
    lines: Vec<String>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let mut image = TagImage::default();

        for line in &lines {
            match classify(line) {
                Line::Version(version) => image.format_version = Some(version),
                Line::Uid(uid) => image.uid_field = Some(uid),
                Line::Page(index, bytes) => image.set_page(index, bytes),
                Line::Other => {}
            }
        }

        Self {
            original: image.clone(),
            image,
            lines,
        }
    }

    pub fn parse_bytes(bytes: &[u8]) -> io::Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self::parse(text))
    }

    pub fn is_modified(&self) -> bool {
        self.image != self.original
    }

    pub fn to_string_unmodified(&self) -> String {
        self.lines.join("\n")
    }

    pub fn to_string_modified(&self) -> String {
        let changed = self.image.changed_pages(&self.original);
        let uid_changed = self.image.uid_field_changed(&self.original);

        self.lines
            .iter()
            .map(|line| {
                let rewritten = match classify(line) {
                    Line::Uid(_) if uid_changed => self
                        .image
                        .uid_field
                        .as_deref()
                        .map(|uid| format!("UID: {}", spaced_compact_hex(uid))),
                    Line::Page(index, _) if changed.contains(&index) => self
                        .image
                        .page(index)
                        .map(|bytes| format!("Page {index}: {}", spaced_hex(bytes))),
                    _ => None,
                };
                match rewritten {
                    Some(mut new_line) => {
                        if line.ends_with('\r') {
                            new_line.push('\r');
                        }
                        new_line
                    }
                    None => line.clone(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(crate) fn classify(line: &str) -> Line {
    let trimmed = line.trim_start();

    if let Some(rest) = trimmed.strip_prefix("Version:") {
        let digits: String = rest
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        return match digits.parse() {
            Ok(version) => Line::Version(version),
            Err(_) => Line::Other,
        };
    }

    if let Some(rest) = trimmed.strip_prefix("UID:") {
        let compact = compact_hex_run(rest);
        if compact.is_empty() {
            return Line::Other;
        }
        return Line::Uid(compact.to_ascii_uppercase());
    }

    if let Some(rest) = trimmed.strip_prefix("Page") {
        return parse_page(rest).unwrap_or(Line::Other);
    }

    Line::Other
}

fn parse_page(rest: &str) -> Option<Line> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (index, value) = rest.trim_start().split_once(':')?;
    let index: u16 = index.parse().ok()?;
    let compact = compact_hex_run(value);
    if compact.is_empty() {
        return None;
    }
    let bytes = hex::decode(&compact).ok()?;
    Some(Line::Page(index, bytes))
}

/// Hex digits from the leading run of hex/whitespace characters, separators dropped.
fn compact_hex_run(value: &str) -> String {
    value
        .chars()
        .take_while(|c| c.is_ascii_hexdigit() || c.is_whitespace())
        .filter(char::is_ascii_hexdigit)
        .collect()
}

fn spaced_compact_hex(compact: &str) -> String {
    compact
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
