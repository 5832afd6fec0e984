use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ChatMessage;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => ROLE_USER,
            Role::Assistant => ROLE_ASSISTANT,
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            ROLE_USER => Ok(Role::User),
            ROLE_ASSISTANT => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// One turn of a conversation.
///
/// Fields are private so a message cannot change after the session appends
/// it; `id` is only meaningful within the session that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    id: u64,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(id: u64, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Strip identity and timing for transmission to the provider.
    pub fn to_api_message(&self) -> ChatMessage {
        ChatMessage::new(self.role.as_str(), self.content.clone())
    }
}
