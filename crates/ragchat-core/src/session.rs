//! Wires the store, dispatcher and upload controller to a backend.
//!
//! Network calls run as spawned tasks. Each task reports back over a channel
//! as a [`SyncEvent`], and [`ChatSession::apply`] is the only place those
//! results change state. On a current-thread runtime this gives the
//! cooperative, lock-free model the client is built around.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{ChatBackend, SendAck, UploadAck};
use crate::dispatcher::{DispatchRejection, MessageDispatcher};
use crate::error::TransportError;
use crate::state::Message;
use crate::store::ConversationStore;
use crate::upload::{SelectedFile, UploadController, UploadRejection};

/// Completion of one network call.
///
/// `epoch` numbers every list request in issue order, so a slow response can
/// never overwrite a snapshot fetched after it.
#[derive(Debug)]
pub enum SyncEvent {
    Listed {
        epoch: u64,
        result: Result<Vec<Message>, TransportError>,
    },
    Sent(Result<SendAck, TransportError>),
    Refreshed {
        epoch: u64,
        result: Result<Vec<Message>, TransportError>,
    },
    Uploaded {
        file: SelectedFile,
        result: Result<UploadAck, TransportError>,
    },
}

pub struct ChatSession<B: ChatBackend + 'static> {
    backend: Arc<B>,
    store: ConversationStore,
    dispatcher: MessageDispatcher,
    uploads: UploadController,

    next_epoch: u64,
    applied_epoch: u64,
    pending_lists: usize,

    tx: mpsc::UnboundedSender<SyncEvent>,
    rx: mpsc::UnboundedReceiver<SyncEvent>,
}

impl<B: ChatBackend + 'static> ChatSession<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            store: ConversationStore::new(),
            dispatcher: MessageDispatcher::new(),
            uploads: UploadController::new(),
            next_epoch: 0,
            applied_epoch: 0,
            pending_lists: 0,
            tx,
            rx,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut MessageDispatcher {
        &mut self.dispatcher
    }

    pub fn uploads(&self) -> &UploadController {
        &self.uploads
    }

    pub fn uploads_mut(&mut self) -> &mut UploadController {
        &mut self.uploads
    }

    /// True when no list, send or upload is outstanding.
    pub fn is_idle(&self) -> bool {
        self.pending_lists == 0 && !self.dispatcher.is_sending() && !self.uploads.is_uploading()
    }

    fn issue_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    /// Initial population of the timeline.
    pub fn mount(&mut self) {
        tracing::info!("loading conversation");
        self.spawn_list();
    }

    /// Manual refresh. Skipped while a turn is in flight, since that turn
    /// ends with a refresh of its own.
    pub fn refresh(&mut self) -> bool {
        if self.dispatcher.is_sending() {
            return false;
        }
        self.spawn_list();
        true
    }

    fn spawn_list(&mut self) {
        let epoch = self.issue_epoch();
        self.pending_lists += 1;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.list().await;
            let _ = tx.send(SyncEvent::Listed { epoch, result });
        });
    }

    /// Start a turn: send the draft, then refresh the timeline.
    pub fn send(&mut self) -> Result<(), DispatchRejection> {
        let content = self.dispatcher.begin()?;
        // Reserved now so any list issued later supersedes this refresh.
        let epoch = self.issue_epoch();

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let sent = backend.send(&content).await;
            if tx.send(SyncEvent::Sent(sent)).is_err() {
                return;
            }
            let result = backend.list().await;
            let _ = tx.send(SyncEvent::Refreshed { epoch, result });
        });
        Ok(())
    }

    /// Submit the selected file.
    pub fn upload(&mut self) -> Result<(), UploadRejection> {
        let file = self.uploads.begin()?;
        tracing::info!(file = %file.name(), "uploading");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.upload(&file).await;
            let _ = tx.send(SyncEvent::Uploaded { file, result });
        });
        Ok(())
    }

    /// Wait for the next completion. The session holds a sender itself, so
    /// this never yields `None` while the session is alive.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SyncEvent> {
        self.rx.try_recv().ok()
    }

    pub fn apply(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Listed { epoch, result } => {
                self.pending_lists = self.pending_lists.saturating_sub(1);
                match result {
                    Ok(messages) => self.apply_snapshot(epoch, messages),
                    Err(err) => tracing::warn!(error = %err, "loading messages failed"),
                }
            }
            SyncEvent::Sent(result) => self.dispatcher.on_sent(result),
            SyncEvent::Refreshed { epoch, result } => {
                if let Some(messages) = self.dispatcher.on_refreshed(result) {
                    self.apply_snapshot(epoch, messages);
                }
            }
            SyncEvent::Uploaded { file, result } => self.uploads.finish(&file, result),
        }
    }

    fn apply_snapshot(&mut self, epoch: u64, messages: Vec<Message>) {
        if epoch < self.applied_epoch {
            tracing::debug!(epoch, applied = self.applied_epoch, "dropping stale snapshot");
            return;
        }
        self.applied_epoch = epoch;
        self.store.replace(messages);
    }

    /// Apply completions until nothing is outstanding.
    pub async fn run_until_idle(&mut self) {
        while !self.is_idle() {
            match self.next_event().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Send(String),
        Upload(String),
    }

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<Call>>,
        timeline: Mutex<Vec<Message>>,
        fail_list: bool,
        fail_send: bool,
        fail_upload: bool,
    }

    impl FakeBackend {
        fn with_timeline(messages: Vec<Message>) -> Self {
            Self {
                timeline: Mutex::new(messages),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn error(endpoint: &str) -> TransportError {
            TransportError::Status {
                endpoint: endpoint.to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            }
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn list(&self) -> Result<Vec<Message>, TransportError> {
            self.calls.lock().unwrap().push(Call::List);
            if self.fail_list {
                return Err(Self::error("/chat/"));
            }
            Ok(self.timeline.lock().unwrap().clone())
        }

        async fn send(&self, content: &str) -> Result<SendAck, TransportError> {
            self.calls.lock().unwrap().push(Call::Send(content.to_string()));
            if self.fail_send {
                return Err(Self::error("/chat/"));
            }
            let mut timeline = self.timeline.lock().unwrap();
            timeline.push(Message::user(content));
            timeline.push(Message::assistant(format!("echo: {}", content)));
            Ok(SendAck)
        }

        async fn upload(&self, file: &SelectedFile) -> Result<UploadAck, TransportError> {
            self.calls.lock().unwrap().push(Call::Upload(file.name().to_string()));
            if self.fail_upload {
                return Err(Self::error("/upload/"));
            }
            Ok(UploadAck(serde_json::json!({"status": "ok"})))
        }
    }

    fn new_session(backend: FakeBackend) -> (ChatSession<FakeBackend>, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        (ChatSession::new(Arc::clone(&backend)), backend)
    }

    #[tokio::test]
    async fn test_mount_with_empty_server() {
        let (mut session, backend) = new_session(FakeBackend::default());
        session.mount();
        session.run_until_idle().await;

        assert!(session.store().is_empty());
        assert_eq!(session.store().revision(), 1);
        assert_eq!(backend.calls(), vec![Call::List]);
    }

    #[tokio::test]
    async fn test_mount_preserves_server_order() {
        let timeline = vec![
            Message::assistant("z"),
            Message::user("a"),
            Message::assistant("z"),
        ];
        let (mut session, _) = new_session(FakeBackend::with_timeline(timeline.clone()));
        session.mount();
        session.run_until_idle().await;

        assert_eq!(session.store().current(), timeline.as_slice());
    }

    #[tokio::test]
    async fn test_failed_mount_leaves_store_untouched() {
        let (mut session, _) = new_session(FakeBackend {
            fail_list: true,
            ..Default::default()
        });
        session.mount();
        session.run_until_idle().await;

        assert!(session.store().is_empty());
        assert_eq!(session.store().revision(), 0);
        assert!(session.is_idle());
    }

    #[tokio::test]
    async fn test_blank_draft_makes_no_calls() {
        let (mut session, backend) = new_session(FakeBackend::default());
        for draft in ["", "   ", "\t\n"] {
            session.dispatcher_mut().set_draft(draft);
            assert_eq!(session.send(), Err(DispatchRejection::EmptyDraft));
        }
        session.run_until_idle().await;

        assert!(backend.calls().is_empty());
        assert!(!session.dispatcher().is_sending());
    }

    #[tokio::test]
    async fn test_send_then_refresh_in_order() {
        let (mut session, backend) = new_session(FakeBackend::default());
        session.dispatcher_mut().set_draft("hello");
        session.send().unwrap();
        // Nothing is appended before the refresh lands.
        assert!(session.store().is_empty());

        session.run_until_idle().await;

        assert_eq!(backend.calls(), vec![Call::Send("hello".to_string()), Call::List]);
        assert_eq!(session.dispatcher().draft(), "");
        assert_eq!(
            session.store().current(),
            &[Message::user("hello"), Message::assistant("echo: hello")]
        );
    }

    #[tokio::test]
    async fn test_second_send_while_sending_rejected() {
        let (mut session, backend) = new_session(FakeBackend::default());
        session.dispatcher_mut().set_draft("first");
        session.send().unwrap();

        assert!(!session.dispatcher_mut().set_draft("second"));
        assert_eq!(session.send(), Err(DispatchRejection::Busy));
        session.run_until_idle().await;

        assert_eq!(backend.calls(), vec![Call::Send("first".to_string()), Call::List]);

        session.dispatcher_mut().set_draft("second");
        session.send().unwrap();
        session.run_until_idle().await;
        assert_eq!(backend.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_send_still_refreshes_and_clears_draft() {
        let (mut session, backend) = new_session(FakeBackend {
            fail_send: true,
            timeline: Mutex::new(vec![Message::assistant("earlier")]),
            ..Default::default()
        });
        session.dispatcher_mut().set_draft("hello");
        session.send().unwrap();
        session.run_until_idle().await;

        assert_eq!(backend.calls(), vec![Call::Send("hello".to_string()), Call::List]);
        assert_eq!(session.dispatcher().draft(), "");
        assert_eq!(session.store().current(), &[Message::assistant("earlier")]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let (mut session, _) = new_session(FakeBackend {
            fail_list: true,
            ..Default::default()
        });
        session.dispatcher_mut().set_draft("hello");
        session.send().unwrap();
        session.run_until_idle().await;

        assert!(session.store().is_empty());
        assert_eq!(session.dispatcher().draft(), "");
        assert!(session.is_idle());
    }

    #[tokio::test]
    async fn test_repeated_refresh_converges() {
        let timeline = vec![Message::user("q"), Message::assistant("a")];
        let (mut session, _) = new_session(FakeBackend::with_timeline(timeline.clone()));
        session.mount();
        session.run_until_idle().await;
        assert!(session.refresh());
        session.run_until_idle().await;

        assert_eq!(session.store().current(), timeline.as_slice());
        assert_eq!(session.store().revision(), 2);
    }

    #[tokio::test]
    async fn test_refresh_skipped_while_sending() {
        let (mut session, backend) = new_session(FakeBackend::default());
        session.dispatcher_mut().set_draft("hello");
        session.send().unwrap();
        assert!(!session.refresh());
        session.run_until_idle().await;

        assert_eq!(backend.calls().iter().filter(|c| **c == Call::List).count(), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_dropped() {
        let (mut session, _) = new_session(FakeBackend::default());
        session.apply_snapshot(2, vec![Message::user("newer")]);
        session.apply_snapshot(1, vec![Message::user("older")]);

        assert_eq!(session.store().current(), &[Message::user("newer")]);
    }

    #[tokio::test]
    async fn test_upload_without_file_makes_no_calls() {
        let (mut session, backend) = new_session(FakeBackend::default());
        assert_eq!(session.upload(), Err(UploadRejection::NoFile));
        session.run_until_idle().await;
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_success_and_failure() {
        let (mut session, backend) = new_session(FakeBackend::default());
        session.uploads_mut().select(SelectedFile::new("guide.pdf"));
        session.upload().unwrap();
        session.run_until_idle().await;

        assert!(session.uploads().selected().is_none());
        assert_eq!(session.uploads().notice_count(), 1);
        assert_eq!(backend.calls(), vec![Call::Upload("guide.pdf".to_string())]);

        let (mut session, _) = new_session(FakeBackend {
            fail_upload: true,
            ..Default::default()
        });
        let file = SelectedFile::new("guide.pdf");
        session.uploads_mut().select(file.clone());
        session.upload().unwrap();
        session.run_until_idle().await;

        assert_eq!(session.uploads().selected(), Some(&file));
        assert_eq!(session.uploads().notice_count(), 0);
        assert!(!session.uploads().is_uploading());
    }

    #[tokio::test]
    async fn test_send_and_upload_run_independently() {
        let (mut session, backend) = new_session(FakeBackend::default());
        session.dispatcher_mut().set_draft("hello");
        session.uploads_mut().select(SelectedFile::new("guide.pdf"));
        session.send().unwrap();
        session.upload().unwrap();
        assert!(session.dispatcher().is_sending());
        assert!(session.uploads().is_uploading());

        session.run_until_idle().await;

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        let send_pos = calls.iter().position(|c| matches!(c, Call::Send(_))).unwrap();
        let list_pos = calls.iter().position(|c| *c == Call::List).unwrap();
        assert!(send_pos < list_pos);
        assert!(calls.contains(&Call::Upload("guide.pdf".to_string())));
    }
}
