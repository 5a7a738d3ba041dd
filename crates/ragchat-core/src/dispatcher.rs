//! Compose-and-send lifecycle for a single user turn.
//!
//! A turn is one send followed by exactly one full refresh of the timeline.
//! The dispatcher only tracks state; the network calls are issued by the
//! session, which feeds their results back through [`MessageDispatcher::on_sent`]
//! and [`MessageDispatcher::on_refreshed`].

use crate::api::SendAck;
use crate::error::TransportError;
use crate::state::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    /// Covers both the send call and the refresh that follows it.
    Sending,
}

/// Why a send attempt did not start. Never reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRejection {
    EmptyDraft,
    Busy,
}

#[derive(Debug, Default)]
pub struct MessageDispatcher {
    draft: String,
    state: DispatchState,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == DispatchState::Sending
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Mutable access to the draft for the composer, or `None` while a turn
    /// is in flight (the composer is disabled until the cycle ends).
    pub fn edit(&mut self) -> Option<&mut String> {
        match self.state {
            DispatchState::Idle => Some(&mut self.draft),
            DispatchState::Sending => None,
        }
    }

    pub fn set_draft(&mut self, text: impl Into<String>) -> bool {
        match self.edit() {
            Some(draft) => {
                *draft = text.into();
                true
            }
            None => false,
        }
    }

    /// Idle -> Sending. Returns the content to send.
    ///
    /// The draft is sent as typed; trimming only decides whether it is empty.
    pub fn begin(&mut self) -> Result<String, DispatchRejection> {
        if self.state == DispatchState::Sending {
            return Err(DispatchRejection::Busy);
        }
        if self.draft.trim().is_empty() {
            return Err(DispatchRejection::EmptyDraft);
        }

        self.state = DispatchState::Sending;
        Ok(self.draft.clone())
    }

    /// The send call finished. The draft is cleared whatever the outcome.
    pub fn on_sent(&mut self, result: Result<SendAck, TransportError>) {
        if self.state != DispatchState::Sending {
            tracing::debug!("ignoring send completion while idle");
            return;
        }

        // Failed sends are logged and dropped; the refresh still runs.
        if let Err(err) = result {
            tracing::warn!(error = %err, "sending message failed");
        }
        self.draft.clear();
    }

    /// The follow-up refresh finished; the turn is over.
    ///
    /// Returns the fresh snapshot on success. On failure the caller keeps the
    /// timeline it already has.
    pub fn on_refreshed(
        &mut self,
        result: Result<Vec<Message>, TransportError>,
    ) -> Option<Vec<Message>> {
        if self.state != DispatchState::Sending {
            tracing::debug!("ignoring refresh completion while idle");
            return None;
        }
        self.state = DispatchState::Idle;

        match result {
            Ok(messages) => Some(messages),
            Err(err) => {
                tracing::warn!(error = %err, "refreshing messages after send failed");
                None
            }
        }
    }
}
