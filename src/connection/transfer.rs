// src/connection/transfer.rs

//! Streaming download/upload helpers layered on the operation queue.
//!
//! Transfers run with bounded memory (a fixed ceiling, checked before any
//! transfer command is issued) and return useful metadata. The transfer
//! commands themselves carry no timestamps or permissions, so both paths
//! finish with a listing of the parent directory and match the file of
//! interest by name.

use crate::connection::record::ConnectionRecord;
use crate::core::FtpBridgeError;
use crate::core::mime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Cursor;
use tracing::debug;

/// Hard ceiling on single-file transfers. An in-browser editor has no
/// business opening anything bigger.
pub const MAX_TRANSFER_BYTES: u64 = 10 * 1024 * 1024;

/// A downloaded file plus everything the editor surface needs to render it.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub permissions: Option<String>,
    pub mime_type: &'static str,
}

/// The outcome of a save, reported back to the editor.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReceipt {
    pub path: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Splits a remote path into its parent directory and file name.
fn split_parent(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(0) => ("/".to_string(), path[1..].to_string()),
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => ("/".to_string(), path.to_string()),
    }
}

impl ConnectionRecord {
    /// Downloads `path` into memory and assembles the editor's view of it.
    ///
    /// Order of commands: size probe, transfer, parent listing. A file above
    /// the ceiling is rejected after the probe, before any transfer command.
    /// A failed metadata listing degrades to absent metadata rather than
    /// failing a download that already completed.
    pub async fn load_file(&self, path: &str) -> Result<FileContent, FtpBridgeError> {
        if self.policy().log_commands {
            debug!("{}: SIZE {path}", self.key());
        }
        let probe_path = path.to_string();
        let size = self
            .run_queued(move |session| async move {
                session.lock().await.size(&probe_path).await
            })
            .await
            .map_err(|e| match e {
                FtpBridgeError::ReconnectInProgress(_) => e,
                _ => FtpBridgeError::FileInaccessible(path.to_string()),
            })?;

        if size > MAX_TRANSFER_BYTES {
            return Err(FtpBridgeError::TransferTooLarge {
                path: path.to_string(),
                size,
                limit: MAX_TRANSFER_BYTES,
            });
        }

        if self.policy().log_commands {
            debug!("{}: RETR {path}", self.key());
        }
        let transfer_path = path.to_string();
        let bytes = self
            .run_queued(move |session| async move {
                let mut sink = Cursor::new(Vec::with_capacity(size as usize));
                session
                    .lock()
                    .await
                    .download_to(&mut sink, &transfer_path)
                    .await?;
                Ok(sink.into_inner())
            })
            .await?;

        let (last_modified, permissions, _) = self.stat_via_parent(path).await;

        Ok(FileContent {
            path: path.to_string(),
            size: bytes.len() as u64,
            content: String::from_utf8_lossy(&bytes).into_owned(),
            last_modified,
            permissions,
            mime_type: mime::mime_type(path),
        })
    }

    /// Encodes `content` and uploads it to `path`, then refreshes metadata
    /// from the parent listing to report the resulting size and mtime.
    pub async fn save_file(&self, path: &str, content: &str) -> Result<SaveReceipt, FtpBridgeError> {
        let bytes = content.as_bytes().to_vec();
        let written = bytes.len() as u64;

        if self.policy().log_commands {
            debug!("{}: STOR {path} ({written} bytes)", self.key());
        }
        let transfer_path = path.to_string();
        self.run_queued(move |session| async move {
            let mut source = Cursor::new(bytes);
            session
                .lock()
                .await
                .upload_from(&mut source, &transfer_path)
                .await
        })
        .await?;

        let (last_modified, _, listed_size) = self.stat_via_parent(path).await;

        Ok(SaveReceipt {
            path: path.to_string(),
            size: listed_size.unwrap_or(written),
            last_modified,
        })
    }

    /// Best-effort metadata for a single file, recovered from a listing of
    /// its parent directory and matched by name.
    async fn stat_via_parent(
        &self,
        path: &str,
    ) -> (Option<DateTime<Utc>>, Option<String>, Option<u64>) {
        let (parent, name) = split_parent(path);
        if self.policy().log_commands {
            debug!("{}: LIST {parent}", self.key());
        }
        let listed = self
            .run_queued(move |session| async move { session.lock().await.list(&parent).await })
            .await;
        match listed {
            Ok(entries) => entries
                .into_iter()
                .find(|entry| entry.name == name)
                .map(|entry| (entry.modified_at, entry.permissions, Some(entry.size)))
                .unwrap_or((None, None, None)),
            Err(e) => {
                debug!("Metadata listing for {path} failed ({e}); omitting metadata.");
                (None, None, None)
            }
        }
    }
}
