//! Select-and-submit lifecycle for document uploads.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::api::UploadAck;
use crate::error::TransportError;

/// A document chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    path: PathBuf,
    name: String,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Uploading,
}

/// Why an upload did not start. Never reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    NoFile,
    Busy,
}

/// Recorded once per confirmed upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadNotice {
    pub file_name: String,
    pub ack: serde_json::Value,
}

impl fmt::Display for UploadNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uploaded {}", self.file_name)
    }
}

#[derive(Debug, Default)]
pub struct UploadController {
    selected: Option<SelectedFile>,
    phase: UploadPhase,
    notice_count: usize,
    last_notice: Option<UploadNotice>,
}

impl UploadController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn is_uploading(&self) -> bool {
        self.phase == UploadPhase::Uploading
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// Choose the file to submit next. Ignored while an upload is in flight.
    pub fn select(&mut self, file: SelectedFile) -> bool {
        if self.is_uploading() {
            return false;
        }
        tracing::debug!(file = %file.name(), "selected file for upload");
        self.selected = Some(file);
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.is_uploading() {
            return false;
        }
        self.selected.take().is_some()
    }

    /// Idle -> Uploading. Returns the file to submit; the selection stays in
    /// place until the upload is confirmed.
    pub fn begin(&mut self) -> Result<SelectedFile, UploadRejection> {
        if self.is_uploading() {
            return Err(UploadRejection::Busy);
        }
        let file = self.selected.clone().ok_or(UploadRejection::NoFile)?;

        self.phase = UploadPhase::Uploading;
        Ok(file)
    }

    /// The upload call finished. Always returns to Idle.
    pub fn finish(&mut self, file: &SelectedFile, result: Result<UploadAck, TransportError>) {
        if !self.is_uploading() {
            tracing::debug!(file = %file.name(), "ignoring upload completion while idle");
            return;
        }
        self.phase = UploadPhase::Idle;

        match result {
            Ok(UploadAck(ack)) => {
                tracing::info!(file = %file.name(), "upload succeeded");
                if self.selected.as_ref() == Some(file) {
                    self.selected = None;
                }
                self.notice_count += 1;
                self.last_notice = Some(UploadNotice {
                    file_name: file.name().to_string(),
                    ack,
                });
            }
            // Silent to the user; the same file can be submitted again.
            Err(err) => {
                tracing::warn!(file = %file.name(), error = %err, "upload failed");
            }
        }
    }

    /// Number of confirmed uploads this session.
    pub fn notice_count(&self) -> usize {
        self.notice_count
    }

    /// Only the newest notice is kept.
    pub fn last_notice(&self) -> Option<&UploadNotice> {
        self.last_notice.as_ref()
    }
}
