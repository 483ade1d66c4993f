// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Uploaded media on the local filesystem.
//!
//! ## Layout
//!
//! ```text
//! {media_root}/
//!   campaign/{uuid}{ext}
//!   merchant/{uuid}{ext}
//!   detonator/{uuid}{ext}
//!   product/{uuid}{ext}
//! ```
//!
//! Stored paths are relative to the media root (`merchant/{uuid}.jpg`) and are
//! served back under `/storage/`.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Longest file extension kept from an upload's original name.
const MAX_EXTENSION_LEN: usize = 8;

/// Folder an upload is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaDestination {
    Campaign,
    Merchant,
    Detonator,
    Product,
}

impl MediaDestination {
    pub const ALL: [MediaDestination; 4] = [
        MediaDestination::Campaign,
        MediaDestination::Merchant,
        MediaDestination::Detonator,
        MediaDestination::Product,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDestination::Campaign => "campaign",
            MediaDestination::Merchant => "merchant",
            MediaDestination::Detonator => "detonator",
            MediaDestination::Product => "product",
        }
    }
}

impl FromStr for MediaDestination {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| MediaError::UnknownDestination(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("destination must be one of campaign, merchant, detonator, product (got '{0}')")]
    UnknownDestination(String),

    #[error("uploaded file '{0}' is empty")]
    Empty(String),

    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File store for uploaded media.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

/// Lowercased extension (with dot) of an uploaded file name, if it looks sane.
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root and every destination folder.
    pub async fn initialize(&self) -> Result<(), MediaError> {
        for destination in MediaDestination::ALL {
            tokio::fs::create_dir_all(self.root.join(destination.as_str())).await?;
        }
        Ok(())
    }

    /// Persist an upload under a fresh name and return its relative path.
    pub async fn save(
        &self,
        destination: MediaDestination,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty(original_name.to_string()));
        }

        let relative = format!(
            "{}/{}{}",
            destination.as_str(),
            Uuid::new_v4(),
            extension_of(original_name)
        );
        let dir = self.root.join(destination.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.root.join(&relative), bytes).await?;

        tracing::debug!(path = %relative, size = bytes.len(), "Stored uploaded media");
        Ok(relative)
    }

    /// Best-effort removal of a previously saved file.
    ///
    /// Paths that would escape the media root are ignored.
    pub async fn remove(&self, relative: &str) {
        let path = Path::new(relative);
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            tracing::warn!(path = %relative, "Refusing to remove media outside the media root");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(path)).await {
            tracing::warn!(path = %relative, error = %e, "Failed to remove media file");
        }
    }

    /// Readiness probe: the media root must exist and be a directory.
    pub async fn health_check(&self) -> Result<(), MediaError> {
        let metadata = tokio::fs::metadata(&self.root).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(MediaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "media root is not a directory",
            )))
        }
    }
}
