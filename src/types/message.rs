//! Message types for chat requests

use serde::{Deserialize, Serialize};

use crate::cache::{Role, Turn};

/// A chat message supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<Turn> for Message {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content,
        }
    }
}

impl From<Message> for Turn {
    fn from(message: Message) -> Self {
        Turn::new(message.role, message.content)
    }
}
