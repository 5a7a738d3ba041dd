pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod state;
pub mod store;
pub mod upload;

// Re-export main types for convenience
pub use api::{ChatBackend, RemoteClient, SendAck, SendRoute, UploadAck};
pub use config::Config;
pub use dispatcher::{DispatchRejection, DispatchState, MessageDispatcher};
pub use error::TransportError;
pub use session::{ChatSession, SyncEvent};
pub use state::{Message, Role};
pub use store::ConversationStore;
pub use upload::{SelectedFile, UploadController, UploadNotice, UploadPhase, UploadRejection};
