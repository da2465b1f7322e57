//! Media catalog and chunk reading.

use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mediagate_protocol::wire;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub description: String,
    /// Seconds.
    pub duration: u64,
    pub file_name: String,
    pub file_size: u64,
}

impl MediaItem {
    pub fn chunk_count(&self) -> u64 {
        wire::chunk_count(self.file_size)
    }
}

/// One `/list` entry.
#[derive(Debug, Serialize)]
pub struct ListingEntry<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub chunks: u64,
    pub duration: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("read catalog: {0}")]
    Io(#[from] io::Error),
    #[error("parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate media id {0}")]
    DuplicateId(String),
}

#[derive(Debug, Clone, Default)]
pub struct MediaCatalog {
    items: BTreeMap<String, MediaItem>,
}

impl MediaCatalog {
    pub fn from_items(items: impl IntoIterator<Item = MediaItem>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for item in items {
            if map.contains_key(&item.id) {
                return Err(CatalogError::DuplicateId(item.id));
            }
            map.insert(item.id.clone(), item);
        }
        Ok(Self { items: map })
    }

    pub fn from_json(json: &[u8]) -> Result<Self, CatalogError> {
        let items: Vec<MediaItem> = serde_json::from_slice(json)?;
        Self::from_items(items)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::from_json(&std::fs::read(path)?)
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn listing(&self) -> Vec<ListingEntry<'_>> {
        self.items
            .values()
            .map(|item| ListingEntry {
                id: &item.id,
                name: &item.name,
                description: &item.description,
                chunks: item.chunk_count(),
                duration: item.duration,
            })
            .collect()
    }
}

/// Source of media bytes.
#[async_trait]
pub trait ChunkReader: Send + Sync {
    /// Read at most `max_len` bytes of `item` starting at `offset`.
    async fn read_chunk(
        &self,
        item: &MediaItem,
        offset: u64,
        max_len: usize,
    ) -> io::Result<Vec<u8>>;
}

/// Reads media files from a directory.
#[derive(Debug, Clone)]
pub struct FsChunkReader {
    root: PathBuf,
}

impl FsChunkReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(file_name);
        let plain = !file_name.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("media file name escapes catalog directory: {file_name}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ChunkReader for FsChunkReader {
    async fn read_chunk(
        &self,
        item: &MediaItem,
        offset: u64,
        max_len: usize,
    ) -> io::Result<Vec<u8>> {
        let path = self.resolve(&item.file_name)?;
        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(max_len);
        file.take(max_len as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }
}
