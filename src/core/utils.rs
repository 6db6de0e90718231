use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use std::path::Path;
use tokio::io::AsyncBufReadExt;

pub async fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let file = tokio::fs::File::open(path).await?;
    let reader = tokio::io::BufReader::new(file);
    let mut lines = reader.lines();

    let mut contents = vec![];
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            contents.push(trimmed.to_string());
        }
    }

    Ok(contents)
}

/// Like [`read_lines`], but also drops `#` comment lines.
pub async fn read_lines_skip_comments(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let lines = read_lines(path).await?;
    Ok(lines.into_iter().filter(|l| !l.starts_with('#')).collect())
}

/// ISO-8601 UTC with millisecond precision, e.g. `2025-05-07T06:45:54.207Z`.
pub fn iso_timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn short_address(address: &str) -> String {
    if address.len() <= 14 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..8], &address[address.len() - 6..])
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
