// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MIME composition of notification payloads.

use std::path::Path;

use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use tidyhq_core::NotificationPayload;

use crate::error::EmailError;

const DEFAULT_SUBJECT: &str = "Notification";

/// An attachment read from disk, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl AttachmentFile {
    /// Reads `path`, deriving the filename and a content type from it.
    pub async fn read(path: &Path) -> Result<Self, EmailError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| EmailError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self {
            content_type: content_type_for(path).to_string(),
            filename,
            content,
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("ics") => "text/calendar",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Builds the message for `payload`.
///
/// Layout: text only → `text/plain`; text + HTML → `multipart/alternative`;
/// an attachment wraps either in `multipart/mixed`.
pub fn compose(
    from: &Mailbox,
    reply_to: Option<&Mailbox>,
    payload: &NotificationPayload,
    attachment: Option<AttachmentFile>,
) -> Result<Message, EmailError> {
    let to: Mailbox = payload.recipient.parse()?;
    let mut builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(payload.subject.as_deref().unwrap_or(DEFAULT_SUBJECT));
    if let Some(reply_to) = reply_to {
        builder = builder.reply_to(reply_to.clone());
    }

    let result = match (&payload.html, attachment) {
        (None, None) => builder
            .header(ContentType::TEXT_PLAIN)
            .body(payload.message.clone()),
        (Some(html), None) => builder.multipart(MultiPart::alternative_plain_html(
            payload.message.clone(),
            html.clone(),
        )),
        (html, Some(file)) => {
            let content_type = ContentType::parse(&file.content_type)
                .map_err(|e| EmailError::Build(format!("content type {}: {e}", file.content_type)))?;
            let part = Attachment::new(file.filename).body(file.content, content_type);
            let mixed = match html {
                Some(html) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
                    payload.message.clone(),
                    html.clone(),
                )),
                None => MultiPart::mixed().singlepart(SinglePart::plain(payload.message.clone())),
            };
            builder.multipart(mixed.singlepart(part))
        }
    };
    result.map_err(|e| EmailError::Build(e.to_string()))
}
