use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChatError, Result};

/// MIME type assumed when an image source does not declare one.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A decoded image waiting to be sent or already part of a message.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    name: String,
    data: Bytes,
    mime_type: String,
}

impl ImageRef {
    pub fn new(
        name: impl Into<String>,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build an image from a `data:image/<subtype>;base64,<payload>` URL.
    ///
    /// ```
    /// use tilechat_common::ImageRef;
    ///
    /// let img = ImageRef::from_data_url("dot.png", "data:image/png;base64,AAEC").unwrap();
    /// assert_eq!(img.mime_type(), "image/png");
    /// assert_eq!(img.data().as_ref(), &[0u8, 1, 2]);
    /// ```
    pub fn from_data_url(name: impl Into<String>, url: &str) -> Result<Self> {
        let name = name.into();
        let payload = url.split_once(',').map(|(_, p)| p).unwrap_or(url);
        let data = BASE64
            .decode(payload.trim())
            .map_err(|e| ChatError::FileReadError {
                name: name.clone(),
                reason: format!("invalid base64 payload: {e}"),
            })?;
        let mime_type = mime_from_data_url(url).to_string();
        Ok(Self::new(name, data, mime_type))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Base64 encoding of the payload, as carried by `inline_data` parts.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// MIME type to declare on the wire: the stored type when it is an image
    /// type, otherwise [`DEFAULT_IMAGE_MIME`].
    pub fn wire_mime_type(&self) -> &str {
        if is_image_mime(&self.mime_type) {
            &self.mime_type
        } else {
            DEFAULT_IMAGE_MIME
        }
    }
}

/// Extract `image/<subtype>` from a data URL prefix, defaulting to `image/jpeg`.
///
/// ```
/// use tilechat_common::message::mime_from_data_url;
///
/// assert_eq!(mime_from_data_url("data:image/webp;base64,xx"), "image/webp");
/// assert_eq!(mime_from_data_url("AAAA"), "image/jpeg");
/// ```
pub fn mime_from_data_url(url: &str) -> &str {
    url.strip_prefix("data:")
        .and_then(|rest| rest.split_once(';'))
        .map(|(mime, _)| mime)
        .filter(|mime| is_image_mime(mime))
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

/// Whether `mime` names an image type with a non-empty subtype.
pub fn is_image_mime(mime: &str) -> bool {
    mime.strip_prefix("image/").is_some_and(|subtype| !subtype.is_empty())
}

/// One immutable transcript entry.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    id: Uuid,
    role: Role,
    text: Option<String>,
    attachments: Vec<ImageRef>,
    sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// A user message. Empty text is normalised to `None`.
    pub fn user(text: Option<String>, attachments: Vec<ImageRef>) -> Self {
        Self::build(Role::User, text, attachments)
    }

    /// An assistant-authored message (model replies and surfaced errors).
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::build(Role::Assistant, Some(text.into()), Vec::new())
    }

    fn build(role: Role, text: Option<String>, attachments: Vec<ImageRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.filter(|t| !t.trim().is_empty()),
            attachments,
            sent_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attachments(&self) -> &[ImageRef] {
        &self.attachments
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    /// True when the message carries neither text nor images.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachments.is_empty()
    }
}

/// Append-only, session-scoped list of messages.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn push(&mut self, message: ChatMessage) {
        tracing::debug!(id = %message.id, role = ?message.role, "transcript append");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_text_is_dropped() {
        let msg = ChatMessage::user(Some("   ".into()), Vec::new());
        assert!(msg.text().is_none());
        assert!(msg.is_empty());
    }

    #[test]
    fn data_url_without_image_prefix_defaults_to_jpeg() {
        assert_eq!(mime_from_data_url("data:text/plain;base64,AA=="), "image/jpeg");
        assert_eq!(mime_from_data_url("data:image/;base64,AA=="), "image/jpeg");
        assert_eq!(mime_from_data_url("data:image/png;base64,AA=="), "image/png");
    }

    #[test]
    fn invalid_base64_is_a_read_error() {
        let err = ImageRef::from_data_url("bad.png", "data:image/png;base64,@@@").unwrap_err();
        assert_eq!(err.file_name(), Some("bad.png"));
        assert!(matches!(err, ChatError::FileReadError { .. }));
    }

    #[test]
    fn wire_mime_falls_back_for_non_images() {
        let img = ImageRef::new("x", vec![1u8], "application/octet-stream");
        assert_eq!(img.wire_mime_type(), DEFAULT_IMAGE_MIME);
        let img = ImageRef::new("x", vec![1u8], "image/gif");
        assert_eq!(img.wire_mime_type(), "image/gif");
    }

    #[test]
    fn transcript_is_append_only_in_order() {
        let mut t = Transcript::default();
        t.push(ChatMessage::assistant("one"));
        t.push(ChatMessage::assistant("two"));
        let texts: Vec<_> = t.messages().iter().filter_map(|m| m.text()).collect();
        assert_eq!(texts, ["one", "two"]);
    }
}
