use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;

use super::{ChatBackend, SendAck, SendRoute, UploadAck};
use crate::error::TransportError;
use crate::state::{Message, Role};
use crate::upload::SelectedFile;

/// Multipart field the backend's upload endpoint reads the document from.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Serialize)]
struct ChatTurnRequest<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
struct RagTurnRequest<'a> {
    content: &'a str,
}

/// reqwest-backed client for the chat service.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
    send_route: SendRoute,
}

impl RemoteClient {
    pub fn new(base_url: &str, send_route: SendRoute) -> Self {
        Self {
            // No timeout: a hung request keeps its owner busy until it resolves.
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            send_route,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn send_route(&self) -> SendRoute {
        self.send_route
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(url: &str, result: reqwest::Result<Response>) -> Result<Response, TransportError> {
        let response = result.map_err(|source| TransportError::Request {
            endpoint: url.to_string(),
            source,
        })?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                endpoint: url.to_string(),
                status: response.status(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatBackend for RemoteClient {
    async fn list(&self) -> Result<Vec<Message>, TransportError> {
        let url = self.url("/chat/");
        tracing::debug!(%url, "listing messages");

        let response = Self::check(&url, self.client.get(&url).send().await)?;
        let messages: Vec<Message> = response
            .json()
            .await
            .map_err(|source| TransportError::Decode { endpoint: url.clone(), source })?;

        tracing::debug!(count = messages.len(), "received timeline");
        Ok(messages)
    }

    async fn send(&self, content: &str) -> Result<SendAck, TransportError> {
        let url = self.url(self.send_route.path());
        tracing::debug!(%url, chars = content.chars().count(), "sending turn");

        let request = match self.send_route {
            SendRoute::Chat => self.client.post(&url).json(&ChatTurnRequest {
                role: Role::User,
                content,
            }),
            SendRoute::Rag => self.client.post(&url).json(&RagTurnRequest { content }),
        };

        // The reply body is ignored; the follow-up list is what the view shows.
        Self::check(&url, request.send().await)?;
        Ok(SendAck)
    }

    async fn upload(&self, file: &SelectedFile) -> Result<UploadAck, TransportError> {
        let url = self.url("/upload/");
        tracing::debug!(%url, file = %file.name(), "uploading document");

        let bytes = tokio::fs::read(file.path())
            .await
            .map_err(|source| TransportError::File {
                path: file.path().to_path_buf(),
                source,
            })?;

        let part = Part::bytes(bytes)
            .file_name(file.name().to_string())
            .mime_str("application/pdf")
            .map_err(|source| TransportError::Request {
                endpoint: url.clone(),
                source,
            })?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = Self::check(&url, self.client.post(&url).multipart(form).send().await)?;
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Decode { endpoint: url.clone(), source })?;

        // A 2xx status is the confirmation; the body is kept but not required.
        let ack = serde_json::from_slice(&body).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "upload acknowledgement is not JSON");
            serde_json::Value::Null
        });

        Ok(UploadAck(ack))
    }
}
