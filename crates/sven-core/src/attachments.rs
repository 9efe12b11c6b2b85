// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `@path` attachment resolution.
//!
//! Scans a user message for `@path` references, reads the referenced files
//! and directories off disk (subject to size caps), and renders the result
//! as a trailing `<system-reminder>` block that is appended to the user
//! turn before it enters conversation history.

use std::path::Path;

/// Per-file cap: files larger than this are reported as an error attachment
/// rather than read in full.
const MAX_FILE_BYTES: usize = 256 * 1024;
/// Cap on the combined size of all attachments resolved from one message.
const MAX_TOTAL_BYTES: usize = 1024 * 1024;
/// Cap on how many entries of a referenced directory are listed.
const MAX_DIR_ENTRIES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentKind {
    File,
    Directory,
    Error,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub path: String,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl Attachment {
    fn file(path: &str, content: String) -> Self {
        Self {
            kind: AttachmentKind::File,
            path: path.to_string(),
            content: Some(content),
            error: None,
        }
    }

    fn directory(path: &str, listing: String) -> Self {
        Self {
            kind: AttachmentKind::Directory,
            path: path.to_string(),
            content: Some(listing),
            error: None,
        }
    }

    fn error(path: &str, msg: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Error,
            path: path.to_string(),
            content: None,
            error: Some(msg.into()),
        }
    }
}

/// Scan `text` for `@path` references and resolve each to an [`Attachment`].
///
/// A reference is a `@` immediately followed by a path token: no leading
/// whitespace, terminated by whitespace or end of string. `user@host` is not
/// a reference because the character before `@` is not whitespace/start.
pub fn collect(text: &str) -> Vec<Attachment> {
    let mut attachments = Vec::new();
    let mut total_bytes = 0usize;

    for raw_path in extract_paths(text) {
        if total_bytes >= MAX_TOTAL_BYTES {
            attachments.push(Attachment::error(
                &raw_path,
                "skipped: total attachment budget exhausted",
            ));
            continue;
        }
        let path = Path::new(&raw_path);
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                attachments.push(resolve_directory(&raw_path, path));
            }
            Ok(meta) if meta.is_file() => {
                let attachment = resolve_file(&raw_path, path, meta.len() as usize);
                if let Some(content) = &attachment.content {
                    total_bytes += content.len();
                }
                attachments.push(attachment);
            }
            Ok(_) => {
                attachments.push(Attachment::error(&raw_path, "not a regular file or directory"));
            }
            Err(e) => {
                attachments.push(Attachment::error(&raw_path, format!("cannot stat: {e}")));
            }
        }
    }

    attachments
}

fn resolve_file(raw_path: &str, path: &Path, size: usize) -> Attachment {
    if size > MAX_FILE_BYTES {
        return Attachment::error(
            raw_path,
            format!("file too large ({size} bytes, cap is {MAX_FILE_BYTES})"),
        );
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Attachment::file(raw_path, content),
        Err(e) => Attachment::error(raw_path, format!("cannot read: {e}")),
    }
}

fn resolve_directory(raw_path: &str, path: &Path) -> Attachment {
    let entries = match std::fs::read_dir(path) {
        Ok(rd) => rd,
        Err(e) => return Attachment::error(raw_path, format!("cannot read directory: {e}")),
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let truncated = names.len() > MAX_DIR_ENTRIES;
    names.truncate(MAX_DIR_ENTRIES);
    let mut listing = names.join("\n");
    if truncated {
        listing.push_str("\n… (truncated)");
    }
    Attachment::directory(raw_path, listing)
}

/// Extract `@path` tokens from `text`.
fn extract_paths(text: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == '@' && (i == 0 || bytes[i - 1].is_whitespace()) {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && !bytes[end].is_whitespace() {
                end += 1;
            }
            if end > start {
                let candidate: String = bytes[start..end].iter().collect();
                paths.push(candidate);
            }
            i = end;
        } else {
            i += 1;
        }
    }
    paths
}

/// Render resolved attachments as a trailing `<system-reminder>` block.
///
/// Returns `None` when `attachments` is empty so callers can skip appending
/// anything to the user message.
pub fn render(attachments: &[Attachment]) -> Option<String> {
    if attachments.is_empty() {
        return None;
    }
    let mut out = String::from("<system-reminder>\n");
    for a in attachments {
        match a.kind {
            AttachmentKind::File => {
                out.push_str(&format!(
                    "<file path=\"{}\">\n{}\n</file>\n",
                    a.path,
                    a.content.as_deref().unwrap_or("")
                ));
            }
            AttachmentKind::Directory => {
                out.push_str(&format!(
                    "<directory path=\"{}\">\n{}\n</directory>\n",
                    a.path,
                    a.content.as_deref().unwrap_or("")
                ));
            }
            AttachmentKind::Error => {
                out.push_str(&format!(
                    "<file path=\"{}\" error=\"{}\"/>\n",
                    a.path,
                    a.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }
    }
    out.push_str("</system-reminder>");
    Some(out)
}
