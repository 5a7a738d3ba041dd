//! The backend boundary: the three HTTP operations the client performs.

pub mod client;

pub use client::RemoteClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::state::Message;
use crate::upload::SelectedFile;

/// Which of the backend's two send contracts this client speaks.
///
/// Only one is ever active: `Chat` posts `{role, content}` to `/chat/`, `Rag`
/// posts `{content}` to `/rag/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendRoute {
    #[default]
    Chat,
    Rag,
}

impl SendRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendRoute::Chat => "chat",
            SendRoute::Rag => "rag",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Some(SendRoute::Chat),
            "rag" => Some(SendRoute::Rag),
            _ => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            SendRoute::Chat => "/chat/",
            SendRoute::Rag => "/rag/",
        }
    }
}

/// Acknowledgement of a sent turn. Callers only care that it resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendAck;

/// Whatever JSON the backend returned for an upload; not schema-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadAck(pub serde_json::Value);

/// The operations the synchronization core needs from a chat backend.
///
/// Every call is a single round trip: no retry, no timeout, no cancellation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<Message>, TransportError>;

    async fn send(&self, content: &str) -> Result<SendAck, TransportError>;

    async fn upload(&self, file: &SelectedFile) -> Result<UploadAck, TransportError>;
}
