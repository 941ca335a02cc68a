use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DbUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry of `GET /people`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub text: Option<String>,
    pub file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Who owns a socket, as read from the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// Attachment as sent by the browser: the original file name and a data URL.
#[derive(Debug, Clone, Deserialize)]
pub struct FilePayload {
    pub name: String,
    pub data: String,
}

/// Frame a client sends to deliver a message.
#[derive(Debug, Default, Deserialize)]
pub struct OutgoingChat {
    pub recipient: Option<String>,
    pub text: Option<String>,
    pub file: Option<FilePayload>,
}

/// Frame pushed to the recipient's sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub recipient: String,
    pub sender: String,
    pub file: Option<String>,
    #[serde(rename = "_id")]
    pub id: String,
}

impl From<&StoredMessage> for Delivery {
    fn from(message: &StoredMessage) -> Self {
        Self {
            text: message.text.clone(),
            recipient: message.recipient.clone(),
            sender: message.sender.clone(),
            file: message.file.clone(),
            id: message.id.clone(),
        }
    }
}

/// Presence snapshot broadcast to every socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineFrame {
    pub online: Vec<Identity>,
}
