//! Outbound messages handed back to the transport layer.

use serde::{Deserialize, Serialize};

/// One outbound message. The engine never sends anything itself; the caller
/// dispatches these in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    /// A native poll. Votes come back as option hashes, see
    /// [`crate::text::poll_option_hash`].
    Poll {
        question: String,
        options: Vec<String>,
    },
    Document {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    },
    Image {
        url: String,
        caption: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// The textual part of the message, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { body } => Some(body),
            Self::Poll { question, .. } => Some(question),
            Self::Document { caption, .. } | Self::Image { caption, .. } => caption.as_deref(),
        }
    }

    /// Render a batch as one combined text, one message per paragraph.
    pub fn join_text(messages: &[OutboundMessage]) -> String {
        messages
            .iter()
            .map(|m| match m {
                Self::Poll { question, options } => {
                    let mut out = question.clone();
                    for (i, option) in options.iter().enumerate() {
                        out.push_str(&format!("\n{}. {}", i + 1, option));
                    }
                    out
                }
                other => other.as_text().unwrap_or_default().to_owned(),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
