//! Ordered in-memory transcript of the current session.
//!
//! Only the single streaming assistant message may change after it is
//! appended. Any attempt to mutate another message is a programming error and
//! panics.

use time::OffsetDateTime;
use uuid::Uuid;

pub type MessageId = Uuid;

/// Prefix rendered in front of a failed turn's error text.
pub const ERROR_PREFIX: &str = "❌ ";

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
    pub streaming: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.streaming)
    }

    /// Appends the user message and an empty streaming assistant reply.
    ///
    /// Returns the assistant message id, which doubles as the turn id.
    pub fn append_turn(&mut self, user_text: impl Into<String>) -> MessageId {
        assert!(
            self.streaming_message().is_none(),
            "cannot start a turn while another assistant message is streaming"
        );

        let assistant_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc();
        self.messages.push(Message {
            id: Uuid::new_v4(),
            role: Role::User,
            content: user_text.into(),
            timestamp,
            streaming: false,
        });
        self.messages.push(Message {
            id: assistant_id,
            role: Role::Assistant,
            content: String::new(),
            timestamp,
            streaming: true,
        });
        assistant_id
    }

    /// Replaces the streaming message's content with the full text so far.
    pub fn replace_streaming_content(&mut self, id: MessageId, full_text: &str) {
        let message = self.streaming_mut(id);
        if message.content != full_text {
            message.content.clear();
            message.content.push_str(full_text);
        }
    }

    /// Sets the final content and ends streaming.
    pub fn finalize(&mut self, id: MessageId, full_text: impl Into<String>) {
        let message = self.streaming_mut(id);
        message.content = full_text.into();
        message.streaming = false;
    }

    /// Finalizes with the rendered error in place of any partial text.
    pub fn fail(&mut self, id: MessageId, error: &str) {
        let error = error.trim();
        let error = if error.is_empty() { UNKNOWN_ERROR } else { error };
        self.finalize(id, format!("{ERROR_PREFIX}{error}"));
    }

    /// Ends streaming on whichever message has it, keeping its content.
    ///
    /// Returns the id of the message that was streaming, if any.
    pub fn cancel_streaming(&mut self) -> Option<MessageId> {
        let message = self.messages.iter_mut().find(|message| message.streaming)?;
        message.streaming = false;
        Some(message.id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }

    fn streaming_mut(&mut self, id: MessageId) -> &mut Message {
        let Some(index) = self.position(id) else {
            panic!("message {id} is not in the log");
        };
        let message = &mut self.messages[index];
        assert!(
            message.streaming,
            "message {id} is not streaming and cannot be mutated"
        );
        message
    }
}
