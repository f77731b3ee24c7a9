//! Items handed over by the catalog step.
//!
//! The catalog collaborator resolves a playlist into a JSON array of
//! [`MediaItem`]s. Field names follow the Plex media API (`key`, `size`,
//! `file`) so an export can be written without renaming.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stored byte stream of a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePart {
    /// Opaque locator passed back to the remote store.
    #[serde(rename = "key")]
    pub remote_key: String,
    #[serde(rename = "size")]
    pub declared_size: u64,
    /// Absolute path on the server; only used to derive the local path.
    #[serde(rename = "file")]
    pub source_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub parts: Vec<RemotePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub title: String,
    pub section_title: String,
    pub section_locations: Vec<String>,
    pub media: Vec<Media>,
}

impl MediaItem {
    /// Parts in natural order, tagged with their media and part index.
    pub fn parts(&self) -> impl Iterator<Item = (usize, usize, &RemotePart)> {
        self.media.iter().enumerate().flat_map(|(media_ix, media)| {
            media
                .parts
                .iter()
                .enumerate()
                .map(move |(part_ix, part)| (media_ix, part_ix, part))
        })
    }

    pub fn total_size(&self) -> u64 {
        self.parts().map(|(_, _, part)| part.declared_size).sum()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read item list {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid item list {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub fn load_items(path: &Path) -> Result<Vec<MediaItem>, CatalogError> {
    let raw = fs::read(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
